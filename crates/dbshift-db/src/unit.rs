//! Executable units. A unit carries no identity of its own; the engine knows
//! it by the identifier it was resolved from.

use dbshift_common::Result;
use rusqlite::Connection;

/// A reversible schema or data change.
///
/// `up` must tolerate partial prior state (e.g. drop-if-exists before
/// create); the engine does not guarantee a clean target.
pub trait Migration {
    fn up(&self, conn: &Connection) -> Result<()>;
    fn down(&self, conn: &Connection) -> Result<()>;
}

/// A one-shot data load. Never tracked; every run executes it again.
pub trait Seeder {
    fn run(&self, conn: &Connection) -> Result<()>;
}
