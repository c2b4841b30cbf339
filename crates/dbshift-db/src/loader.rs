use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dbshift_common::{Error, Result};
use tracing::debug;

use crate::sql::{SqlMigration, SqlSeeder};
use crate::unit::{Migration, Seeder};

/// Resolves an identifier to a fresh executable unit. The engine only
/// depends on this; how units are located is up to the implementation.
pub trait UnitLoader {
    fn migration(&self, dir: &Path, identifier: &str) -> Result<Box<dyn Migration>>;
    fn seeder(&self, dir: &Path, name: &str) -> Result<Box<dyn Seeder>>;
}

/// File-per-unit loader: `<dir>/<identifier>.sql`.
#[derive(Debug, Clone)]
pub struct SqlFileLoader {
    extension: String,
}

impl Default for SqlFileLoader {
    fn default() -> Self {
        Self {
            extension: "sql".to_string(),
        }
    }
}

impl SqlFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn path_for(&self, dir: &Path, identifier: &str) -> PathBuf {
        dir.join(format!("{identifier}.{}", self.extension))
    }

    fn read(&self, dir: &Path, identifier: &str) -> Result<String> {
        let path = self.path_for(dir, identifier);
        if !path.is_file() {
            return Err(Error::MissingUnit(format!(
                "{identifier} (no file at {})",
                path.display()
            )));
        }
        debug!("loading unit from {}", path.display());
        Ok(std::fs::read_to_string(&path)?)
    }
}

impl UnitLoader for SqlFileLoader {
    fn migration(&self, dir: &Path, identifier: &str) -> Result<Box<dyn Migration>> {
        let content = self.read(dir, identifier)?;
        Ok(Box::new(SqlMigration::parse(identifier, &content)?))
    }

    fn seeder(&self, dir: &Path, name: &str) -> Result<Box<dyn Seeder>> {
        let content = self.read(dir, name)?;
        Ok(Box::new(SqlSeeder::new(name, content)))
    }
}

type MigrationFactory = Box<dyn Fn() -> Box<dyn Migration> + Send + Sync>;
type SeederFactory = Box<dyn Fn() -> Box<dyn Seeder> + Send + Sync>;

/// Compiled-in units keyed by identifier. Each resolution calls the
/// factory again, so units never carry state between runs.
///
/// Discovery still walks the directories; the registry only supplies the
/// behaviour behind each discovered name.
#[derive(Default)]
pub struct UnitRegistry {
    migrations: HashMap<String, MigrationFactory>,
    seeders: HashMap<String, SeederFactory>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migration<F, M>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Migration + 'static,
    {
        self.migrations.insert(
            identifier.into(),
            Box::new(move || Box::new(factory()) as Box<dyn Migration>),
        );
        self
    }

    pub fn with_seeder<F, S>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Seeder + 'static,
    {
        self.seeders.insert(
            name.into(),
            Box::new(move || Box::new(factory()) as Box<dyn Seeder>),
        );
        self
    }

    pub fn migration_count(&self) -> usize {
        self.migrations.len()
    }

    pub fn seeder_count(&self) -> usize {
        self.seeders.len()
    }
}

impl UnitLoader for UnitRegistry {
    fn migration(&self, _dir: &Path, identifier: &str) -> Result<Box<dyn Migration>> {
        self.migrations
            .get(identifier)
            .map(|factory| factory())
            .ok_or_else(|| Error::MissingUnit(format!("{identifier} (not registered)")))
    }

    fn seeder(&self, _dir: &Path, name: &str) -> Result<Box<dyn Seeder>> {
        self.seeders
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::MissingUnit(format!("{name} (not registered)")))
    }
}
