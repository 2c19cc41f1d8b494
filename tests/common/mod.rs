//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary scan root, config path
//! and log directory, and can build a [`ConversionScheduler`] wired to a
//! fake transcoder script.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use autoconvert::config::ConfigSource;
use autoconvert::conversion::{ConversionScheduler, SchedulerSettings};
use autoconvert::events::ConverterEvent;
use autoconvert::log_sink::{LogSink, LogSinkSettings};
use autoconvert::tools::TranscoderLocator;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Name of an environment variable no test ever sets.
pub const UNSET_ENV_VAR: &str = "AUTOCONVERT_TEST_TRANSCODER_UNSET";

/// Temporary workspace for one test.
pub struct TestHarness {
    pub dir: TempDir,
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub log: LogSink,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = dir.path().join("media");
        std::fs::create_dir_all(&root).expect("failed to create scan root");
        let config_path = dir.path().join("config.json");
        let log = LogSink::new(LogSinkSettings::new(dir.path().join("logs")))
            .expect("failed to create log sink");

        Self {
            dir,
            root,
            config_path,
            log,
        }
    }

    /// Write a JSON config pointing at the scan root.
    pub fn write_config(&self, interval: f64, exclude: &[&Path]) {
        let exclude: Vec<String> = exclude
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let config = serde_json::json!({
            "path": self.root.to_string_lossy(),
            "interval": interval,
            "exclude": exclude,
        });
        std::fs::write(&self.config_path, config.to_string()).expect("failed to write config");
    }

    /// Create a file (and its parents) under the scan root.
    pub fn add_file(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent");
        }
        std::fs::write(&path, b"matroska").expect("failed to write file");
        path
    }

    /// Locator that only looks in `bin` under the temp dir.
    pub fn locator(&self) -> TranscoderLocator {
        let bin = self.dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("failed to create bin dir");
        TranscoderLocator::new()
            .with_env_var(UNSET_ENV_VAR)
            .with_well_known_dirs(vec![bin.clone()])
            .with_search_path(bin.into_os_string())
    }

    /// Scheduler with short timings, reading `config_path`.
    pub fn scheduler(&self) -> ConversionScheduler {
        let settings = SchedulerSettings {
            initial_delay: Duration::from_millis(10),
            default_interval: Duration::from_millis(50),
            ..SchedulerSettings::default()
        };
        ConversionScheduler::new(
            settings,
            ConfigSource::new(&self.config_path, self.log.clone()),
            self.locator(),
            self.log.clone(),
        )
    }

    /// Install a fake `HandBrakeCLI` into the locator's `bin` dir.
    #[cfg(unix)]
    pub fn install_transcoder(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin = self.dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("failed to create bin dir");
        let path = bin.join("HandBrakeCLI");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to chmod script");
        path
    }

    /// Install a `HandBrakeCLI` that is found by the locator but cannot be
    /// executed.
    #[cfg(unix)]
    pub fn install_unlaunchable_transcoder(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.install_transcoder("exit 0");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .expect("failed to chmod script");
        path
    }

    /// Write an arbitrary JSON config document.
    pub fn write_config_value(&self, config: serde_json::Value) {
        std::fs::write(&self.config_path, config.to_string()).expect("failed to write config");
    }

    /// Contents of the active log file after pending records are written.
    pub async fn log_content(&self) -> String {
        self.log.flush().await;
        std::fs::read_to_string(self.log.active_path()).unwrap_or_default()
    }

    /// Path of a scratch file under the temp dir (outside the scan root).
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Script body that prints progress, creates the output (`$4`) and exits.
pub fn succeeding_script() -> String {
    concat!(
        "echo \"Encoding: task 1 of 1\"\n",
        "printf 'Encoding 50%%\\rEncoding 100%%\\r'\n",
        "touch \"$4\"\n",
        "exit 0",
    )
    .to_string()
}

/// Script body that prints an error and exits with `code`.
pub fn failing_script(code: i32) -> String {
    format!("echo \"transcode error\" >&2\nexit {}", code)
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Receive events until `stop` matches one, returning everything seen.
pub async fn collect_events_until<F>(
    rx: &mut broadcast::Receiver<ConverterEvent>,
    timeout: Duration,
    stop: F,
) -> Vec<ConverterEvent>
where
    F: Fn(&ConverterEvent) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = rx.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}
