//! Transcode runner.
//!
//! Runs the external transcoder for one file, streams its output into the
//! activity log and performs all terminal bookkeeping in one place.

use crate::error::Error;
use crate::events::{ConverterEvent, UserNotification};
use crate::log_sink::LogSink;
use crate::paths::{output_path_for, OUTPUT_EXTENSION};
use crate::tools::{TRANSCODER_ENV_VAR, TRANSCODER_NAME};
use futures::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tokio::sync::broadcast;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{debug, info, warn};

/// Transcoder invocation settings.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Preset name passed as `--preset=<name>`.
    pub preset: String,
    /// Value of `--audio-lang-list`.
    pub audio_languages: String,
    /// Extension of the converted file.
    pub output_extension: String,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            preset: "Apple 1080p60 Surround".to_string(),
            audio_languages: "eng".to_string(),
            output_extension: OUTPUT_EXTENSION.to_string(),
        }
    }
}

impl TranscodeOptions {
    /// Full argument list for converting `input` into `output`.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.into(),
            "-o".into(),
            output.into(),
            format!("--preset={}", self.preset).into(),
            "--optimize".into(),
            "--audio-lang-list".into(),
            self.audio_languages.clone().into(),
            "--all-subtitles".into(),
        ]
    }
}

/// One file being converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TranscodeJob {
    /// Base name of the input file.
    pub fn filename(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// How a transcode attempt ended.
#[derive(Debug)]
pub enum TranscodeOutcome {
    /// The transcoder exited with status 0.
    Success,
    /// The transcoder exited with another code, or `-1` when killed by a signal.
    NonZeroExit(i32),
    /// The process could not be started.
    LaunchFailed(Error),
    /// No transcoder was located at startup; nothing was spawned.
    TranscoderMissing,
}

impl TranscodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TranscodeOutcome::Success)
    }
}

/// Spawns the transcoder and reports results through the log and events.
#[derive(Debug, Clone)]
pub struct TranscodeRunner {
    transcoder: Option<PathBuf>,
    options: TranscodeOptions,
    log: LogSink,
    events: broadcast::Sender<ConverterEvent>,
}

impl TranscodeRunner {
    pub fn new(
        transcoder: Option<PathBuf>,
        options: TranscodeOptions,
        log: LogSink,
        events: broadcast::Sender<ConverterEvent>,
    ) -> Self {
        Self {
            transcoder,
            options,
            log,
            events,
        }
    }

    /// Build the job for `input`, deriving its output path.
    pub fn job_for(&self, input: PathBuf) -> TranscodeJob {
        let output = output_path_for(&input, &self.options.output_extension);
        TranscodeJob { input, output }
    }

    /// Convert one file end to end and return how it went.
    pub async fn run(&self, input: PathBuf) -> TranscodeOutcome {
        let job = self.job_for(input);
        let outcome = self.execute(&job).await;
        self.complete(&job, &outcome);
        outcome
    }

    /// Spawn the transcoder and wait for it, streaming its output into the log.
    pub async fn execute(&self, job: &TranscodeJob) -> TranscodeOutcome {
        let Some(program) = self.transcoder.as_deref() else {
            return TranscodeOutcome::TranscoderMissing;
        };

        self.log.log(format!("Starting conversion: {}", job.input.display()));
        info!("Converting {:?} -> {:?}", job.input, job.output);

        let args = self.options.arguments(&job.input, &job.output);
        debug!("Transcoder args: {:?}", args);

        let mut child = match Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return TranscodeOutcome::LaunchFailed(Error::spawn(program, e)),
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, _, _) = tokio::join!(
            child.wait(),
            stream_into_log(stdout, &self.log),
            stream_into_log(stderr, &self.log),
        );

        match status {
            Ok(status) => match status.code() {
                Some(0) => TranscodeOutcome::Success,
                Some(code) => TranscodeOutcome::NonZeroExit(code),
                None => {
                    self.log.log(format!("Transcoder terminated abnormally: {}", status));
                    TranscodeOutcome::NonZeroExit(-1)
                }
            },
            Err(e) => {
                self.log.log(format!("Failed waiting for transcoder: {}", e));
                TranscodeOutcome::NonZeroExit(-1)
            }
        }
    }

    /// Terminal bookkeeping for every outcome: log line, source removal on
    /// success, user notification and the closing `idle` status event.
    pub fn complete(&self, job: &TranscodeJob, outcome: &TranscodeOutcome) {
        let filename = job.filename();

        match outcome {
            TranscodeOutcome::Success => {
                self.log.log(format!("Conversion succeeded: {}", job.output.display()));
                info!("Conversion succeeded: {:?}", job.output);

                if let Err(e) = std::fs::remove_file(&job.input) {
                    warn!("Failed to remove source {:?}: {}", job.input, e);
                    self.log.log(format!(
                        "Failed to remove source {}: {}",
                        job.input.display(),
                        e
                    ));
                }

                self.publish(ConverterEvent::Notification(UserNotification::converted(
                    &filename,
                )));
            }
            TranscodeOutcome::NonZeroExit(code) => {
                self.log.log(format!(
                    "Conversion failed for {}, exit {}",
                    job.input.display(),
                    code
                ));
                warn!("Conversion failed for {:?}, exit {}", job.input, code);

                self.publish(ConverterEvent::Notification(UserNotification::failed(
                    &filename,
                )));
            }
            TranscodeOutcome::LaunchFailed(e) => {
                self.log.log(format!("Failed to start {}: {}", TRANSCODER_NAME, e));
                warn!("Failed to start {}: {}", TRANSCODER_NAME, e);
            }
            TranscodeOutcome::TranscoderMissing => {
                let message = format!(
                    "{} not found; skipping conversion for {}. Set {} or install {}.",
                    TRANSCODER_NAME,
                    job.input.display(),
                    TRANSCODER_ENV_VAR,
                    TRANSCODER_NAME
                );
                warn!("{}", message);
                self.log.log(message);

                self.publish(ConverterEvent::Notification(
                    UserNotification::transcoder_missing(TRANSCODER_NAME, TRANSCODER_ENV_VAR),
                ));
            }
        }

        self.publish(ConverterEvent::idle());
    }

    fn publish(&self, event: ConverterEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for converter event");
        }
    }
}

/// Append every line (split on `\n` or `\r`) of `reader` to the log as it arrives.
async fn stream_into_log<R>(reader: Option<R>, log: &LogSink)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let codec = AnyDelimiterCodec::new(b"\r\n".to_vec(), Vec::new());
    let mut lines = FramedRead::new(reader, codec);

    while let Some(chunk) = lines.next().await {
        match chunk {
            Ok(bytes) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim_end();
                if !line.is_empty() {
                    log.log(line);
                }
            }
            Err(e) => {
                debug!("Stopped reading transcoder output: {}", e);
                break;
            }
        }
    }
}
