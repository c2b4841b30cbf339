//! Plain SQL units: a migration file split into `-- up` / `-- down`
//! sections, and a seeder file executed whole.

use dbshift_common::{Error, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::unit::{Migration, Seeder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Up,
    Down,
}

/// A migration read from a `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    identifier: String,
    up_sql: String,
    down_sql: String,
}

impl SqlMigration {
    /// Split `content` on its `-- up` and `-- down` marker lines. Both
    /// markers are required, each at most once; only comments and blank
    /// lines may precede the first one.
    pub fn parse(identifier: &str, content: &str) -> Result<Self> {
        let mut up = None::<Vec<&str>>;
        let mut down = None::<Vec<&str>>;
        let mut current = None;

        for line in content.lines() {
            if let Some(section) = marker(line) {
                let slot = match section {
                    Section::Up => &mut up,
                    Section::Down => &mut down,
                };
                if slot.is_some() {
                    return Err(Error::Unit(format!(
                        "{identifier}: duplicate '-- {}' marker",
                        section_name(section)
                    )));
                }
                *slot = Some(Vec::new());
                current = Some(section);
                continue;
            }

            match current {
                Some(Section::Up) => up.get_or_insert_with(Vec::new).push(line),
                Some(Section::Down) => down.get_or_insert_with(Vec::new).push(line),
                None => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() && !trimmed.starts_with("--") {
                        return Err(Error::Unit(format!(
                            "{identifier}: statements found before the '-- up' marker"
                        )));
                    }
                }
            }
        }

        let (Some(up), Some(down)) = (up, down) else {
            return Err(Error::Unit(format!(
                "{identifier}: migration needs both '-- up' and '-- down' sections"
            )));
        };

        Ok(Self {
            identifier: identifier.to_string(),
            up_sql: up.join("\n").trim().to_string(),
            down_sql: down.join("\n").trim().to_string(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

impl Migration for SqlMigration {
    fn up(&self, conn: &Connection) -> Result<()> {
        execute(conn, &self.identifier, "up", &self.up_sql)
    }

    fn down(&self, conn: &Connection) -> Result<()> {
        execute(conn, &self.identifier, "down", &self.down_sql)
    }
}

/// A seeder read from a `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSeeder {
    name: String,
    sql: String,
}

impl SqlSeeder {
    pub fn new(name: &str, sql: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.into(),
        }
    }
}

impl Seeder for SqlSeeder {
    fn run(&self, conn: &Connection) -> Result<()> {
        execute(conn, &self.name, "run", &self.sql)
    }
}

fn execute(conn: &Connection, unit: &str, step: &str, sql: &str) -> Result<()> {
    if sql.trim().is_empty() {
        debug!("{unit}: empty {step} section");
        return Ok(());
    }
    conn.execute_batch(sql)
        .map_err(|e| Error::Unit(format!("{unit} {step} failed: {e}")))
}

fn marker(line: &str) -> Option<Section> {
    let rest = line.trim().strip_prefix("--")?;
    let word = rest.trim().trim_end_matches(':').trim();
    if word.eq_ignore_ascii_case("up") {
        Some(Section::Up)
    } else if word.eq_ignore_ascii_case("down") {
        Some(Section::Down)
    } else {
        None
    }
}

fn section_name(section: Section) -> &'static str {
    match section {
        Section::Up => "up",
        Section::Down => "down",
    }
}
