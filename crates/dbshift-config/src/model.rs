use std::path::{Path, PathBuf};

use dbshift_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration, as read from `dbshift.toml` / `dbshift.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migration: MigrationConfig,
}

/// Where the target SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database/database.sqlite"),
        }
    }
}

/// Unit directories and the ledger table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Root holding the `migrations/` and `seeders/` directories.
    pub dir: PathBuf,
    /// Ledger table name.
    pub table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("database"),
            table: "migrations".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn migrations_dir(&self) -> PathBuf {
        self.dir.join("migrations")
    }

    pub fn seeders_dir(&self) -> PathBuf {
        self.dir.join("seeders")
    }

    /// The table name is spliced into SQL, so only plain identifiers pass.
    pub fn validate(&self) -> Result<()> {
        let table = self.table.as_str();
        let well_formed = !table.is_empty()
            && table.len() <= 64
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());

        if !well_formed {
            return Err(Error::Config(format!(
                "invalid ledger table name '{table}': use letters, digits and underscores"
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Anchor relative paths at `base` (normally the config file's directory).
    pub fn resolve_relative(mut self, base: &Path) -> Self {
        if self.database.path.is_relative() {
            self.database.path = base.join(&self.database.path);
        }
        if self.migration.dir.is_relative() {
            self.migration.dir = base.join(&self.migration.dir);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.migration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_layout() {
        let config = AppConfig::default();
        assert_eq!(config.migration.table, "migrations");
        assert_eq!(
            config.migration.migrations_dir(),
            PathBuf::from("database/migrations")
        );
        assert_eq!(config.migration.seeders_dir(), PathBuf::from("database/seeders"));
        assert_eq!(
            config.database.path,
            PathBuf::from("database/database.sqlite")
        );
    }

    #[test]
    fn resolve_relative_leaves_absolute_paths_alone() {
        let mut config = AppConfig::default();
        config.database.path = PathBuf::from("/var/lib/app.sqlite");

        let resolved = config.resolve_relative(Path::new("/srv/app"));
        assert_eq!(resolved.database.path, PathBuf::from("/var/lib/app.sqlite"));
        assert_eq!(resolved.migration.dir, PathBuf::from("/srv/app/database"));
    }

    #[test]
    fn table_name_must_be_plain_identifier() {
        let mut config = MigrationConfig::default();
        assert!(config.validate().is_ok());

        config.table = "schema_versions".into();
        assert!(config.validate().is_ok());

        for bad in ["", "1migrations", "migrations; DROP TABLE x", "a-b", "\"q\""] {
            config.table = bad.into();
            assert!(config.validate().is_err(), "accepted {bad:?}");
        }
    }
}
