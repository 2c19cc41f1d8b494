use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Poll interval used when no configuration is available.
pub const DEFAULT_INTERVAL_SECS: f64 = 60.0;

/// Settings document read on every scheduler tick.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Root directory to scan. Tilde-expanded before use.
    pub path: String,

    /// Seconds between scans.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Path prefixes that are never converted.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

fn default_interval() -> f64 {
    DEFAULT_INTERVAL_SECS
}

impl Config {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_INTERVAL_SECS,
            exclude: None,
        }
    }

    /// The scan root with `~` expanded.
    pub fn scan_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).as_ref())
    }

    /// The poll interval, falling back to the default for unusable values.
    pub fn interval_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_INTERVAL_SECS))
    }

    /// Configured exclusions, or an empty slice when the list is absent.
    pub fn exclusions(&self) -> &[String] {
        self.exclude.as_deref().unwrap_or(&[])
    }

    /// Check the fields that would make scanning impossible.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("path must not be empty".to_string());
        }
        let usable = Duration::try_from_secs_f64(self.interval).is_ok_and(|d| !d.is_zero());
        if !usable {
            return Err(format!(
                "interval must be a positive number of seconds, got {}",
                self.interval
            ));
        }
        Ok(())
    }
}
