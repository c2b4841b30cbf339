use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use dbshift_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "dbshift.toml";

/// Reads `AppConfig` from YAML or TOML, picked by file extension.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn default_path() -> Result<PathBuf> {
        Ok(std::env::current_dir()?.join(DEFAULT_CONFIG_FILE))
    }

    /// Load and validate the config at `path`. Relative paths inside the
    /// file are resolved against the file's own directory.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config = Self::parse(&contents, extension(path))?.resolve_relative(base_dir(path));
        config.validate()?;

        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Like [`ConfigLoader::load`], but an absent file yields the defaults
    /// anchored at the directory the file would live in.
    pub fn load_or_default(path: &Path) -> Result<AppConfig> {
        if path.is_file() {
            return Self::load(path);
        }

        debug!("no config at {}, using defaults", path.display());
        Ok(AppConfig::default().resolve_relative(base_dir(path)))
    }

    pub fn parse(contents: &str, ext: &str) -> Result<AppConfig> {
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Serialize the default config in the format implied by `ext`.
    pub fn render_default(ext: &str) -> Result<String> {
        let config = AppConfig::default();
        match ext {
            "yml" | "yaml" => serde_yaml::to_string(&config)
                .map_err(|e| Error::Config(format!("YAML serialize error: {e}"))),
            "toml" => toml::to_string_pretty(&config)
                .map_err(|e| Error::Config(format!("TOML serialize error: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// Write the default config to `path` unless a file is already there.
    /// Returns whether a file was written.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            debug!("config already present at {}", path.display());
            return Ok(false);
        }

        let body = Self::render_default(extension(path))?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(body.as_bytes())?;

        info!("config written to {}", path.display());
        Ok(true)
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn base_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
