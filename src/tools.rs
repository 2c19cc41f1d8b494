//! Transcoder detection.

use crate::log_sink::LogSink;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Executable name of the transcoder.
pub const TRANSCODER_NAME: &str = "HandBrakeCLI";

/// Environment variable that overrides every other lookup.
pub const TRANSCODER_ENV_VAR: &str = "HAND_BRAKE_CLI_PATH";

/// Directories probed before falling back to `PATH`.
pub const WELL_KNOWN_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// How a tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Environment,
    WellKnownDir,
    SearchPath,
}

/// A located external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Finds the transcoder executable: environment override, then well-known
/// directories, then the search path. First match wins.
#[derive(Debug, Clone)]
pub struct TranscoderLocator {
    name: String,
    env_var: String,
    well_known_dirs: Vec<PathBuf>,
    /// `None` means the process `PATH`.
    search_path: Option<OsString>,
}

impl Default for TranscoderLocator {
    fn default() -> Self {
        Self {
            name: TRANSCODER_NAME.to_string(),
            env_var: TRANSCODER_ENV_VAR.to_string(),
            well_known_dirs: WELL_KNOWN_DIRS.iter().map(PathBuf::from).collect(),
            search_path: None,
        }
    }
}

impl TranscoderLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    pub fn with_well_known_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.well_known_dirs = dirs;
        self
    }

    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the lookup, recording each decision in the activity log.
    pub fn locate(&self, log: &LogSink) -> Option<ToolInfo> {
        if let Some(info) = self.from_env(log) {
            return Some(info);
        }

        for dir in &self.well_known_dirs {
            let candidate = dir.join(&self.name);
            if candidate.exists() {
                log.log(format!("Found {} at {}", self.name, candidate.display()));
                return Some(ToolInfo {
                    path: candidate,
                    source: ToolSource::WellKnownDir,
                });
            }
        }

        if let Some(path) = self.from_search_path() {
            log.log(format!("Found {} on PATH at {}", self.name, path.display()));
            return Some(ToolInfo {
                path,
                source: ToolSource::SearchPath,
            });
        }

        tracing::warn!("{} not found", self.name);
        log.log(format!(
            "{} not found. Set {} or install it",
            self.name, self.env_var
        ));
        None
    }

    fn from_env(&self, log: &LogSink) -> Option<ToolInfo> {
        let value = std::env::var(&self.env_var).ok().filter(|v| !v.is_empty())?;
        let expanded = PathBuf::from(shellexpand::tilde(&value).as_ref());

        if expanded.exists() {
            log.log(format!(
                "Using {} from {}={}",
                self.name,
                self.env_var,
                expanded.display()
            ));
            Some(ToolInfo {
                path: expanded,
                source: ToolSource::Environment,
            })
        } else {
            log.log(format!(
                "{} set but file not found at {}",
                self.env_var, value
            ));
            None
        }
    }

    fn from_search_path(&self) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_default();
                which::which_in(&self.name, Some(paths), cwd).ok()
            }
            None => which::which(&self.name).ok(),
        }
    }
}

/// Locate the transcoder with the default lookup order.
pub fn locate_transcoder(log: &LogSink) -> Option<PathBuf> {
    TranscoderLocator::default().locate(log).map(|info| info.path)
}

/// First line of `<tool> --version`, if the tool runs successfully.
pub fn tool_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::LogSinkSettings;
    use serial_test::serial;
    use tempfile::tempdir;

    fn sink(dir: &Path) -> LogSink {
        LogSink::new(LogSinkSettings::new(dir.join("logs"))).unwrap()
    }

    fn isolated(name: &str, env_var: &str) -> TranscoderLocator {
        TranscoderLocator::new()
            .with_name(name)
            .with_env_var(env_var)
            .with_well_known_dirs(Vec::new())
            .with_search_path("")
    }

    #[test]
    fn test_not_found() {
        let dir = tempdir().unwrap();
        let log = sink(dir.path());
        let locator = isolated("nonexistent_tool_12345", "AUTOCONVERT_TEST_UNSET_VAR");
        assert!(locator.locate(&log).is_none());
    }

    #[test]
    fn test_well_known_dir() {
        let dir = tempdir().unwrap();
        let log = sink(dir.path());
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        std::fs::write(bin.join("FakeCLI"), "").unwrap();

        let locator = isolated("FakeCLI", "AUTOCONVERT_TEST_UNSET_VAR")
            .with_well_known_dirs(vec![dir.path().join("missing"), bin.clone()]);

        let info = locator.locate(&log).unwrap();
        assert_eq!(info.path, bin.join("FakeCLI"));
        assert_eq!(info.source, ToolSource::WellKnownDir);
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_requires_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let log = sink(dir.path());
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let tool = bin.join("FakeCLI");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        let locator = isolated("FakeCLI", "AUTOCONVERT_TEST_UNSET_VAR")
            .with_search_path(bin.as_os_str().to_owned());
        assert!(locator.locate(&log).is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let info = locator.locate(&log).unwrap();
        assert_eq!(info.source, ToolSource::SearchPath);
        assert_eq!(info.path.file_name().unwrap(), "FakeCLI");
    }

    #[test]
    #[serial]
    fn test_env_override_wins() {
        let dir = tempdir().unwrap();
        let log = sink(dir.path());
        let override_path = dir.path().join("custom-cli");
        std::fs::write(&override_path, "").unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        std::fs::write(bin.join("FakeCLI"), "").unwrap();

        std::env::set_var("AUTOCONVERT_TEST_CLI_PATH", &override_path);
        let info = isolated("FakeCLI", "AUTOCONVERT_TEST_CLI_PATH")
            .with_well_known_dirs(vec![bin])
            .locate(&log);
        std::env::remove_var("AUTOCONVERT_TEST_CLI_PATH");

        let info = info.unwrap();
        assert_eq!(info.path, override_path);
        assert_eq!(info.source, ToolSource::Environment);
    }

    #[test]
    #[serial]
    fn test_env_override_missing_file_falls_through() {
        let dir = tempdir().unwrap();
        let log = sink(dir.path());
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        std::fs::write(bin.join("FakeCLI"), "").unwrap();

        std::env::set_var("AUTOCONVERT_TEST_CLI_PATH", dir.path().join("nope"));
        let info = isolated("FakeCLI", "AUTOCONVERT_TEST_CLI_PATH")
            .with_well_known_dirs(vec![bin.clone()])
            .locate(&log);
        std::env::remove_var("AUTOCONVERT_TEST_CLI_PATH");

        assert_eq!(info.unwrap().source, ToolSource::WellKnownDir);
    }

    #[test]
    fn test_tool_version_missing_tool() {
        assert!(tool_version(Path::new("/nonexistent/tool_12345")).is_none());
    }
}
