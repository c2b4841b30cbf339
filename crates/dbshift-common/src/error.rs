use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad invocation: missing name, unknown seeder, unknown command.
    #[error("usage error: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// A migration's `up`/`down` or a seeder's `run` failed.
    #[error("unit error: {0}")]
    Unit(String),

    /// The ledger or caller names a unit that cannot be located.
    #[error("missing unit: {0}")]
    MissingUnit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by how the command was invoked rather
    /// than by the database or the filesystem.
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}
