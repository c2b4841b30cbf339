//! Migration engine: apply pending migrations in identifier order, roll
//! back the most recently applied ones, and compose the two into reset and
//! refresh.
//!
//! Every batch is fail-stop. A unit that fails halts the batch; units
//! processed before it keep their effects and their ledger rows. There is
//! no batch transaction, no retry and no automatic reversal. Re-running
//! `migrate` after a fix only executes what is still pending.
//!
//! Nothing here guards against two processes migrating the same database
//! at once.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dbshift_common::{Error, Result};
use dbshift_config::{AppConfig, MigrationConfig};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::discovery::discover;
use crate::ledger::{self, Ledger, MigrationRecord};
use crate::loader::UnitLoader;
use crate::reporter::Reporter;
use crate::unit::Migration;

/// Outcome of [`Migrator::migrate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateSummary {
    /// Identifiers whose `up` ran, in execution order.
    pub applied: Vec<String>,
    /// Discovered identifiers already in the ledger.
    pub skipped: usize,
}

/// Outcome of [`Migrator::rollback`] and [`Migrator::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    /// Identifiers whose `down` ran, in execution order.
    pub rolled_back: Vec<String>,
}

/// Outcome of [`Migrator::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub rolled_back: Vec<String>,
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applied(DateTime<Utc>),
    /// In the ledger, but no unit file on disk.
    Missing(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub identifier: String,
    pub state: MigrationState,
}

/// Runs migrations and seeders against one SQLite database.
pub struct Migrator {
    conn: Mutex<Connection>,
    config: MigrationConfig,
    loader: Box<dyn UnitLoader>,
    reporter: Box<dyn Reporter>,
}

impl Migrator {
    pub fn new(
        conn: Connection,
        config: MigrationConfig,
        loader: Box<dyn UnitLoader>,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            conn: Mutex::new(conn),
            config,
            loader,
            reporter,
        })
    }

    /// Open the database named by `config`, creating its parent directory
    /// when needed.
    pub fn open(
        config: &AppConfig,
        loader: Box<dyn UnitLoader>,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self> {
        let db_path = config.database.path.as_path();
        info!("opening database at {}", db_path.display());

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::new(conn, config.migration.clone(), loader, reporter)
    }

    pub fn in_memory(
        config: MigrationConfig,
        loader: Box<dyn UnitLoader>,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::new(conn, config, loader, reporter)
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub(crate) fn loader(&self) -> &dyn UnitLoader {
        self.loader.as_ref()
    }

    pub(crate) fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("migrator connection lock poisoned".into()))
    }

    /// Run `f` against the target database.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection()?;
        f(&conn)
    }

    /// Apply every discovered migration the ledger does not list yet, in
    /// ascending identifier order.
    pub fn migrate(&self) -> Result<MigrateSummary> {
        let started = Instant::now();
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        ledger.ensure_table()?;

        let dir = self.config.migrations_dir();
        let mut summary = MigrateSummary::default();

        for identifier in discover(&dir)? {
            if ledger.has(&identifier)? {
                debug!("{identifier}: already applied");
                summary.skipped += 1;
                continue;
            }

            ledger::check_identifier(&identifier)?;
            self.load_and_apply(&conn, &ledger, &dir, &identifier)
                .inspect_err(|e| warn!("migrate stopped at {identifier}: {e}"))?;
            summary.applied.push(identifier);
        }

        info!(
            "migrate: {} applied, {} already applied ({:?})",
            summary.applied.len(),
            summary.skipped,
            started.elapsed()
        );
        Ok(summary)
    }

    /// Reverse the `count` most recently applied migrations, or all of them
    /// when `count` is `None`. Order is `applied_at` descending with the
    /// identifier (descending) breaking ties.
    pub fn rollback(&self, count: Option<usize>) -> Result<RollbackSummary> {
        let started = Instant::now();
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        ledger.ensure_table()?;

        let dir = self.config.migrations_dir();
        let records = ledger.applied_desc(count)?;
        if records.is_empty() {
            debug!("rollback: nothing applied");
        }

        let mut summary = RollbackSummary::default();
        for record in records {
            let identifier = record.identifier;
            self.load_and_revert(&conn, &ledger, &dir, &identifier)
                .inspect_err(|e| warn!("rollback stopped at {identifier}: {e}"))?;
            summary.rolled_back.push(identifier);
        }

        info!(
            "rollback: {} rolled back ({:?})",
            summary.rolled_back.len(),
            started.elapsed()
        );
        Ok(summary)
    }

    /// Roll back everything.
    pub fn reset(&self) -> Result<RollbackSummary> {
        self.rollback(None)
    }

    /// `reset` followed by `migrate`.
    pub fn refresh(&self) -> Result<RefreshSummary> {
        let rolled_back = self.reset()?.rolled_back;
        let applied = self.migrate()?.applied;
        Ok(RefreshSummary {
            rolled_back,
            applied,
        })
    }

    /// Apply a single already-resolved migration and record it.
    pub fn up(&self, migration: &dyn Migration, identifier: &str) -> Result<()> {
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        ledger.ensure_table()?;
        ledger::check_identifier(identifier)?;
        self.apply(&conn, &ledger, migration, identifier)
    }

    /// Reverse a single already-resolved migration and drop its record.
    pub fn down(&self, migration: &dyn Migration, identifier: &str) -> Result<()> {
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        ledger.ensure_table()?;
        self.revert(&conn, &ledger, migration, identifier)
    }

    /// Ledger rows, most recent first.
    pub fn applied(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        ledger.ensure_table()?;
        ledger.applied_desc(None)
    }

    /// Every known identifier, ascending: discovered files marked applied
    /// or pending, plus ledger rows whose file is gone. Read-only; a
    /// missing ledger table counts as empty.
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let conn = self.connection()?;
        let ledger = Ledger::new(&conn, &self.config.table);
        let records = if ledger.exists()? {
            ledger.applied()?
        } else {
            Vec::new()
        };

        let mut states: BTreeMap<String, MigrationState> = discover(&self.config.migrations_dir())?
            .into_iter()
            .map(|identifier| (identifier, MigrationState::Pending))
            .collect();

        for record in records {
            let state = match states.get(&record.identifier) {
                Some(_) => MigrationState::Applied(record.applied_at),
                None => MigrationState::Missing(record.applied_at),
            };
            states.insert(record.identifier, state);
        }

        Ok(states
            .into_iter()
            .map(|(identifier, state)| MigrationStatus { identifier, state })
            .collect())
    }

    fn load_and_apply(
        &self,
        conn: &Connection,
        ledger: &Ledger<'_>,
        dir: &Path,
        identifier: &str,
    ) -> Result<()> {
        let migration = self.loader.migration(dir, identifier)?;
        self.apply(conn, ledger, migration.as_ref(), identifier)
    }

    fn load_and_revert(
        &self,
        conn: &Connection,
        ledger: &Ledger<'_>,
        dir: &Path,
        identifier: &str,
    ) -> Result<()> {
        let migration = self.loader.migration(dir, identifier)?;
        self.revert(conn, ledger, migration.as_ref(), identifier)
    }

    // The ledger row is written only once `up` has returned Ok.
    fn apply(
        &self,
        conn: &Connection,
        ledger: &Ledger<'_>,
        migration: &dyn Migration,
        identifier: &str,
    ) -> Result<()> {
        self.reporter.success(&format!("{identifier}: migrating..."));
        migration.up(conn)?;
        ledger.insert(identifier, Utc::now())
    }

    // The ledger row is removed only once `down` has returned Ok.
    fn revert(
        &self,
        conn: &Connection,
        ledger: &Ledger<'_>,
        migration: &dyn Migration,
        identifier: &str,
    ) -> Result<()> {
        self.reporter.success(&format!("{identifier}: rolling back..."));
        migration.down(conn)?;
        ledger.delete(identifier)
    }
}
