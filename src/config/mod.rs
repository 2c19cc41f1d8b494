mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use std::path::{Path, PathBuf};

/// Location of the application's state directory.
const DATA_DIR: &str = "~/.config/autoconvert";

/// Expanded application data directory (config and logs live under it).
pub fn default_data_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DATA_DIR).as_ref())
}

/// The fixed location the scheduler reads its configuration from.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.json")
}

/// Load configuration from a file.
///
/// `.toml` files are parsed as TOML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config(path, &content)?;

    config
        .validate()
        .map_err(|message| Error::config_parse(path, message))?;

    Ok(config)
}

fn parse_config(path: &Path, content: &str) -> Result<Config> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(content).map_err(|e| Error::config_parse(path, e.to_string()))
    } else {
        serde_json::from_str(content).map_err(|e| Error::config_parse(path, e.to_string()))
    }
}

/// Where the scheduler gets a fresh [`Config`] snapshot from on every tick.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    log: LogSink,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>, log: LogSink) -> Self {
        Self {
            path: path.into(),
            log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, treating every failure as "no configuration".
    pub fn load(&self) -> Option<Config> {
        match load_config(&self.path) {
            Ok(config) => Some(config),
            Err(Error::ConfigNotFound { path }) => {
                self.log.log(format!("Config not found at {}", path.display()));
                None
            }
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                self.log.log(format!("Failed to load config: {}", e));
                None
            }
        }
    }
}
