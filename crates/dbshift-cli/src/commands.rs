use std::path::Path;

use anyhow::{Context, Result};
use dbshift_config::{AppConfig, ConfigLoader};
use dbshift_db::scaffold;
use dbshift_db::{
    ConsoleReporter, MigrationState, Migrator, Reporter, SilentReporter, SqlFileLoader,
};
use tracing::{debug, info};

use crate::{Cli, Command};

/// Dispatch one parsed invocation.
pub fn execute(cli: &Cli) -> Result<()> {
    let quiet = cli.quiet;
    run(cli, &|| reporter(quiet))
}

/// `notices` builds the reporter for each engine or scaffold step.
fn run(cli: &Cli, notices: &dyn Fn() -> Box<dyn Reporter>) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => ConfigLoader::default_path()?,
    };
    debug!("using config path {}", config_path.display());

    match &cli.command {
        Command::Init => init(&config_path, notices().as_ref()),
        Command::Create { name } => {
            let config = load(&config_path)?;
            let name = name.as_deref().unwrap_or_default();
            let path = scaffold::create_migration(&config.migration, name)?;
            notices().success(&format!("{name}: migration created."));
            println!("{}", path.display());
            Ok(())
        }
        Command::Seeder { name } => {
            let config = load(&config_path)?;
            let name = name.as_deref().unwrap_or_default();
            let path = scaffold::create_seeder(&config.migration, name)?;
            notices().success(&format!("{name}: seeder created."));
            println!("{}", path.display());
            Ok(())
        }
        Command::Migrate => {
            let summary = migrator(&config_path, notices())?.migrate()?;
            if summary.applied.is_empty() {
                info!("nothing to migrate");
            }
            Ok(())
        }
        Command::Rollback { count } => {
            migrator(&config_path, notices())?.rollback(Some(*count))?;
            Ok(())
        }
        Command::Reset => {
            migrator(&config_path, notices())?.reset()?;
            Ok(())
        }
        Command::Refresh => {
            migrator(&config_path, notices())?.refresh()?;
            Ok(())
        }
        Command::Seed { name } => {
            migrator(&config_path, notices())?.seed(name.as_deref())?;
            Ok(())
        }
        Command::Status => status(&config_path),
    }
}

fn reporter(quiet: bool) -> Box<dyn Reporter> {
    if quiet {
        Box::new(SilentReporter)
    } else {
        Box::new(ConsoleReporter::new())
    }
}

fn load(config_path: &Path) -> Result<AppConfig> {
    ConfigLoader::load_or_default(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))
}

fn migrator(config_path: &Path, notices: Box<dyn Reporter>) -> Result<Migrator> {
    let config = load(config_path)?;
    Migrator::open(&config, Box::new(SqlFileLoader::new()), notices)
        .context("failed to open target database")
}

fn init(config_path: &Path, notices: &dyn Reporter) -> Result<()> {
    let created = ConfigLoader::init(config_path)
        .with_context(|| format!("could not create {}", config_path.display()))?;
    if created {
        notices.success("Config file created.");
    }

    let config = load(config_path)?;
    scaffold::create_dirs(&config.migration).with_context(|| {
        format!(
            "could not create unit directories under {}",
            config.migration.dir.display()
        )
    })?;
    Ok(())
}

/// A database that does not exist yet has nothing applied; list against an
/// empty in-memory one instead of creating the file.
fn status(config_path: &Path) -> Result<()> {
    let config = load(config_path)?;
    let migrator = if config.database.path.is_file() {
        Migrator::open(&config, Box::new(SqlFileLoader::new()), Box::new(SilentReporter))
            .context("failed to open target database")?
    } else {
        debug!("{} does not exist", config.database.path.display());
        Migrator::in_memory(
            config.migration.clone(),
            Box::new(SqlFileLoader::new()),
            Box::new(SilentReporter),
        )?
    };

    let rows = migrator.status()?;
    if rows.is_empty() {
        println!(
            "No migrations found in {}",
            migrator.config().migrations_dir().display()
        );
        return Ok(());
    }

    let width = rows.iter().map(|r| r.identifier.len()).max().unwrap_or(0);
    for row in rows {
        let state = match row.state {
            MigrationState::Pending => "pending".to_string(),
            MigrationState::Applied(at) => format!("applied  {}", at.format("%Y-%m-%d %H:%M:%S")),
            MigrationState::Missing(at) => {
                format!("missing  {} (file removed)", at.format("%Y-%m-%d %H:%M:%S"))
            }
        };
        println!("{:<width$}  {state}", row.identifier);
    }
    Ok(())
}
