//! Durable, size-bounded activity log.
//!
//! Every record is handed to a dedicated writer thread over a channel, so
//! callers pay for an enqueue only and records from different callers never
//! interleave inside a line. The writer appends one line per record and
//! rotates the active file into a ring of numbered backups once it reaches
//! the size threshold.

use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

/// Rotation threshold for the active file: 5 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Number of rotated backups kept next to the active file.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Name of the active log file.
pub const DEFAULT_FILE_NAME: &str = "autoconvert.log";

/// Where and how the sink writes.
#[derive(Debug, Clone)]
pub struct LogSinkSettings {
    /// Directory holding the active file and its backups.
    pub dir: PathBuf,
    pub file_name: String,
    /// Size at or above which the active file is rotated.
    pub max_size: u64,
    /// Backups kept; `<file>.1` is the newest.
    pub max_files: usize,
}

impl LogSinkSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            max_size: DEFAULT_MAX_SIZE,
            max_files: DEFAULT_MAX_FILES,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn active_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

enum Command {
    Write(String),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the activity log.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<Command>,
    dir: PathBuf,
    active: PathBuf,
}

impl LogSink {
    /// Create the log directory and start the writer thread.
    pub fn new(settings: LogSinkSettings) -> Result<Self> {
        fs::create_dir_all(&settings.dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let dir = settings.dir.clone();
        let active = settings.active_path();

        std::thread::Builder::new()
            .name("log-sink".to_string())
            .spawn(move || writer_loop(rx, settings))?;

        Ok(Self { tx, dir, active })
    }

    /// Directory holding the log files.
    pub fn log_dir(&self) -> &Path {
        &self.dir
    }

    pub fn active_path(&self) -> &Path {
        &self.active
    }

    /// Append one record. Never blocks and never fails; a record that cannot
    /// be written is dropped.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "activity", "{}", message);

        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let _ = self.tx.send(Command::Write(format_record(&ts, &message)));
    }

    /// Wait until every record enqueued before this call has been written.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

fn format_record(timestamp: &str, message: &str) -> String {
    format!("[{}] {}\n", timestamp, message)
}

fn writer_loop(mut rx: mpsc::UnboundedReceiver<Command>, settings: LogSinkSettings) {
    let active = settings.active_path();

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Write(line) => {
                if let Err(e) = append_record(&active, &line) {
                    tracing::debug!("Dropped log record: {}", e);
                    continue;
                }
                if let Err(e) = rotate_if_needed(
                    &settings.dir,
                    &settings.file_name,
                    settings.max_size,
                    settings.max_files,
                ) {
                    tracing::debug!("Log rotation failed: {}", e);
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn append_record(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

/// Rotate `<dir>/<file_name>` if it has reached `max_size` bytes.
///
/// Backups shift up one slot (`.1` -> `.2` ...), the slot past `max_files`
/// is overwritten, the active file becomes `.1` and a fresh empty active
/// file is created. Returns whether a rotation happened.
pub fn rotate_if_needed(
    dir: &Path,
    file_name: &str,
    max_size: u64,
    max_files: usize,
) -> std::io::Result<bool> {
    let active = dir.join(file_name);
    let size = match fs::metadata(&active) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size < max_size {
        return Ok(false);
    }

    if max_files == 0 {
        fs::File::create(&active)?;
        return Ok(true);
    }

    let backup = |index: usize| dir.join(format!("{}.{}", file_name, index));

    for index in (1..max_files).rev() {
        let from = backup(index);
        if from.exists() {
            fs::rename(&from, backup(index + 1))?;
        }
    }

    fs::rename(&active, backup(1))?;
    fs::File::create(&active)?;

    Ok(true)
}
