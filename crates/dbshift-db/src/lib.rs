pub mod discovery;
pub mod ledger;
pub mod loader;
pub mod migrator;
pub mod reporter;
pub mod scaffold;
pub mod seeder;
pub mod sql;
pub mod unit;

pub use discovery::discover;
pub use ledger::{Ledger, MigrationRecord};
pub use loader::{SqlFileLoader, UnitLoader, UnitRegistry};
pub use migrator::{
    MigrateSummary, MigrationState, MigrationStatus, Migrator, RefreshSummary, RollbackSummary,
};
pub use reporter::{ConsoleReporter, MemoryReporter, Reporter, SilentReporter};
pub use unit::{Migration, Seeder};
