//! New unit files from templates.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use dbshift_common::{Error, Result};
use dbshift_config::MigrationConfig;
use tracing::info;

use crate::ledger::MAX_IDENTIFIER_LEN;

/// Length of the `YYYYmmddHHMMSS_` prefix on migration file names.
const TIMESTAMP_PREFIX_LEN: usize = 15;

pub const MIGRATION_TEMPLATE: &str = "-- up
DROP TABLE IF EXISTS example;
CREATE TABLE example (
    id INTEGER PRIMARY KEY AUTOINCREMENT
);

-- down
DROP TABLE IF EXISTS example;
";

pub const SEEDER_TEMPLATE: &str = "INSERT INTO example (id) VALUES (1);
";

/// Create `<dir>`, `<dir>/migrations` and `<dir>/seeders` as needed and
/// check that each one is writable.
pub fn create_dirs(config: &MigrationConfig) -> Result<()> {
    for path in [
        config.dir.clone(),
        config.migrations_dir(),
        config.seeders_dir(),
    ] {
        if !path.is_dir() {
            std::fs::create_dir_all(&path)?;
            info!("created {}", path.display());
        }

        if std::fs::metadata(&path)?.permissions().readonly() {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                format!("{} is not writable", path.display()),
            )));
        }
    }
    Ok(())
}

/// Write `<dir>/migrations/<timestamp>_<name>.sql` and return its path.
pub fn create_migration(config: &MigrationConfig, name: &str) -> Result<PathBuf> {
    validate_name(name, MAX_IDENTIFIER_LEN - TIMESTAMP_PREFIX_LEN)?;
    create_dirs(config)?;

    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let path = config.migrations_dir().join(format!("{stamp}_{name}.sql"));
    write_new(&path, MIGRATION_TEMPLATE)?;
    Ok(path)
}

/// Write `<dir>/seeders/<name>.sql` and return its path.
pub fn create_seeder(config: &MigrationConfig, name: &str) -> Result<PathBuf> {
    validate_name(name, MAX_IDENTIFIER_LEN)?;
    create_dirs(config)?;

    let path = config.seeders_dir().join(format!("{name}.sql"));
    write_new(&path, SEEDER_TEMPLATE)?;
    Ok(path)
}

/// A unit name becomes a file name, so it must be a single plain path
/// component.
pub fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Usage("no name provided".into()));
    }
    if name.len() > max_len {
        return Err(Error::Usage(format!(
            "name '{name}' is longer than {max_len} characters"
        )));
    }
    if name.starts_with('.')
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control() || c.is_whitespace())
    {
        return Err(Error::Usage(format!(
            "invalid name '{name}': use a single word without path separators"
        )));
    }
    Ok(())
}

fn write_new(path: &Path, body: &str) -> Result<()> {
    // create_new: never clobber an existing unit.
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(body.as_bytes())?;
    info!("wrote {}", path.display());
    Ok(())
}
