use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dbshift_common::Error;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "dbshift")]
#[command(about = "Apply, roll back and seed timestamp-ordered SQLite migrations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (YAML or TOML); defaults to ./dbshift.toml
    #[arg(short, long, env = "DBSHIFT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Suppress progress notices
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug-level logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Write a default config file and unit directories if absent
    Init,

    /// Scaffold a new migration file
    Create {
        /// Migration name, e.g. create_users_table
        name: Option<String>,
    },

    /// Apply every pending migration
    Migrate,

    /// Reverse the most recently applied migrations
    Rollback {
        /// How many migrations to reverse
        #[arg(default_value_t = 1)]
        count: usize,
    },

    /// Reverse every applied migration
    Reset,

    /// Reset, then migrate
    Refresh,

    /// Scaffold a new seeder file
    Seeder {
        /// Seeder name
        name: Option<String>,
    },

    /// Run one seeder, or all of them in name order
    Seed {
        /// Seeder to run; omit to run all
        name: Option<String>,
    },

    /// List migrations with their applied/pending state
    Status,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Usage errors exit with 2, the code clap uses for bad invocations.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_usage() => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match commands::execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}
