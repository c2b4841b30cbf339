use chrono::{DateTime, NaiveDateTime, Utc};
use dbshift_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// Column format for `applied_at`; second resolution, sorts as text.
const APPLIED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Longest identifier the ledger's primary key column accepts.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub identifier: String,
    pub applied_at: DateTime<Utc>,
}

/// The table recording which migrations are applied. A row exists for an
/// identifier iff its `up` ran and its `down` has not.
pub struct Ledger<'a> {
    conn: &'a Connection,
    table: &'a str,
}

impl<'a> Ledger<'a> {
    /// `table` must already be validated as a plain SQL identifier.
    pub fn new(conn: &'a Connection, table: &'a str) -> Self {
        Self { conn, table }
    }

    pub fn table(&self) -> &str {
        self.table
    }

    /// Create the ledger table if it is not there yet.
    pub fn ensure_table(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    identifier VARCHAR(255) PRIMARY KEY,
                    applied_at DATETIME NOT NULL
                );",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to create ledger table: {e}")))?;
        Ok(())
    }

    /// Whether the ledger table has been created.
    pub fn exists(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to inspect schema: {e}")))?;
        Ok(count > 0)
    }

    pub fn has(&self, identifier: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM \"{}\" WHERE identifier = ?1", self.table),
                params![identifier],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to look up {identifier}: {e}")))?;
        Ok(found.is_some())
    }

    pub fn insert(&self, identifier: &str, applied_at: DateTime<Utc>) -> Result<()> {
        check_identifier(identifier)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (identifier, applied_at) VALUES (?1, ?2)",
                    self.table
                ),
                params![identifier, applied_at.format(APPLIED_AT_FORMAT).to_string()],
            )
            .map_err(|e| Error::Database(format!("failed to record {identifier}: {e}")))?;
        debug!("ledger: recorded {identifier}");
        Ok(())
    }

    pub fn delete(&self, identifier: &str) -> Result<()> {
        self.conn
            .execute(
                &format!("DELETE FROM \"{}\" WHERE identifier = ?1", self.table),
                params![identifier],
            )
            .map_err(|e| Error::Database(format!("failed to remove {identifier}: {e}")))?;
        debug!("ledger: removed {identifier}");
        Ok(())
    }

    /// Applied records, most recent first: `applied_at` descending, then
    /// identifier descending for rows recorded within the same second.
    /// `limit` of `None` returns every row.
    ///
    /// Ordering goes through SQLite's `datetime()` so RFC 3339 rows with an
    /// offset compare in UTC against native rows.
    pub fn applied_desc(&self, limit: Option<usize>) -> Result<Vec<MigrationRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|n| n.min(i64::MAX as usize) as i64).unwrap_or(-1);
        self.select(
            &format!(
                "SELECT identifier, applied_at FROM \"{}\"
                 ORDER BY datetime(applied_at) DESC, identifier DESC
                 LIMIT ?1",
                self.table
            ),
            params![limit],
        )
    }

    /// Every applied record, ascending by identifier.
    pub fn applied(&self) -> Result<Vec<MigrationRecord>> {
        self.select(
            &format!(
                "SELECT identifier, applied_at FROM \"{}\" ORDER BY identifier ASC",
                self.table
            ),
            params![],
        )
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Database(format!("failed to count ledger rows: {e}")))?;
        Ok(count as usize)
    }

    fn select(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<MigrationRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare ledger query: {e}")))?;

        let rows = stmt
            .query_map(params, |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Database(format!("failed to query ledger: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let (identifier, applied_at) =
                row.map_err(|e| Error::Database(format!("failed to read ledger row: {e}")))?;
            records.push(MigrationRecord {
                applied_at: parse_applied_at(&identifier, &applied_at)?,
                identifier,
            });
        }
        Ok(records)
    }
}

/// Reject identifiers the ledger could not store.
pub fn check_identifier(identifier: &str) -> Result<()> {
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::Database(format!(
            "identifier {identifier} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    Ok(())
}

fn parse_applied_at(identifier: &str, s: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, APPLIED_AT_FORMAT) {
        return Ok(naive.and_utc());
    }
    // Rows written by other tools may carry an offset.
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(format!(
                "bad applied_at '{s}' for {identifier} in ledger: {e}"
            ))
        })
}
