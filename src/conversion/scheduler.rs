//! Conversion scheduler.
//!
//! A single worker task owns the [`ConversionState`]. Timer ticks and job
//! completions are both handled inside that task's loop, so ticks never
//! overlap and at most one transcode is in flight at any time.

use super::runner::{TranscodeOptions, TranscodeRunner};
use super::scan::select_candidate;
use super::state::ConversionState;
use crate::config::{Config, ConfigSource, DEFAULT_INTERVAL_SECS};
use crate::events::{ConverterEvent, StatusEvent};
use crate::log_sink::LogSink;
use crate::paths::SOURCE_EXTENSION;
use crate::tools::TranscoderLocator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunables that are not part of the configuration document.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Delay before the first tick.
    pub initial_delay: Duration,
    /// Interval used when no configuration is available at start.
    pub default_interval: Duration,
    /// Extension of files to convert.
    pub source_extension: String,
    pub transcode: TranscodeOptions,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            default_interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            source_extension: SOURCE_EXTENSION.to_string(),
            transcode: TranscodeOptions::default(),
        }
    }
}

/// Periodically scans the configured root and converts one file at a time.
pub struct ConversionScheduler {
    settings: SchedulerSettings,
    config: ConfigSource,
    locator: TranscoderLocator,
    log: LogSink,
    events: broadcast::Sender<ConverterEvent>,
    state: Arc<watch::Sender<ConversionState>>,
    running: Option<Running>,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConversionScheduler {
    pub fn new(
        settings: SchedulerSettings,
        config: ConfigSource,
        locator: TranscoderLocator,
        log: LogSink,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state, _) = watch::channel(ConversionState::Idle);

        Self {
            settings,
            config,
            locator,
            log,
            events,
            state: Arc::new(state),
            running: None,
        }
    }

    /// Subscribe to status events and notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConverterEvent> {
        self.events.subscribe()
    }

    /// Watch the conversion state.
    pub fn state_receiver(&self) -> watch::Receiver<ConversionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConversionState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.cancel.is_cancelled())
    }

    /// Load the configuration, locate the transcoder and arm the timer.
    ///
    /// The interval is read here only; a changed `interval` in the document
    /// takes effect on the next `start`. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Conversion scheduler already running");
            return;
        }

        let config = self.config.load();
        log_config(&self.log, config.as_ref());

        let transcoder = self.locator.locate(&self.log).map(|info| info.path);
        let interval = config
            .as_ref()
            .map(Config::interval_duration)
            .unwrap_or(self.settings.default_interval);

        let runner = TranscodeRunner::new(
            transcoder,
            self.settings.transcode.clone(),
            self.log.clone(),
            self.events.clone(),
        );

        let worker = Worker {
            config: self.config.clone(),
            source_extension: self.settings.source_extension.clone(),
            runner,
            log: self.log.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            in_flight: false,
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker.run(
            self.settings.initial_delay,
            interval,
            cancel.clone(),
        ));

        info!("Conversion scheduler started (interval {:?})", interval);
        self.running = Some(Running { cancel, task });
    }

    /// Cancel future ticks. A conversion in flight keeps running.
    ///
    /// The state is shared across restarts, so a job left over from a
    /// previous `start` still blocks new ticks until it finishes.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.as_ref().filter(|r| !r.cancel.is_cancelled()) {
            running.cancel.cancel();
            info!("Conversion scheduler stopped");
        }
    }

    /// Stop ticking and wait for the worker to finish any conversion in flight.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(running) = self.running.take() {
            if let Err(e) = running.task.await {
                error!("Conversion worker ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ConversionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_config(log: &LogSink, config: Option<&Config>) {
    match config {
        Some(config) => log.log(format!(
            "Loaded config: path={} interval={}",
            config.path, config.interval
        )),
        None => log.log("No config found, using defaults and waiting for config"),
    }
}

/// Sent back to the worker loop when a job task ends.
struct JobFinished;

/// Reports a finished job when dropped, so the state is reset even if the
/// job task panics.
struct CompletionGuard {
    done: mpsc::UnboundedSender<JobFinished>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.done.send(JobFinished);
    }
}

/// Owns the conversion state; runs on its own task.
struct Worker {
    config: ConfigSource,
    source_extension: String,
    runner: TranscodeRunner,
    log: LogSink,
    events: broadcast::Sender<ConverterEvent>,
    state: Arc<watch::Sender<ConversionState>>,
    /// Whether this worker started the job currently in flight.
    in_flight: bool,
}

impl Worker {
    async fn run(mut self, initial_delay: Duration, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<JobFinished>();
        let mut ticking = true;

        loop {
            tokio::select! {
                _ = cancel.cancelled(), if ticking => {
                    ticking = false;
                }
                _ = ticker.tick(), if ticking => {
                    self.tick(&done_tx).await;
                }
                Some(JobFinished) = done_rx.recv() => {
                    self.finish();
                }
            }

            if !ticking && !self.in_flight {
                break;
            }
        }

        debug!("Conversion worker exited");
    }

    fn is_converting(&self) -> bool {
        self.state.borrow().is_converting()
    }

    async fn tick(&mut self, done_tx: &mpsc::UnboundedSender<JobFinished>) {
        let Some(config) = self.config.load() else {
            debug!("No configuration, skipping scan");
            log_config(&self.log, None);
            return;
        };
        log_config(&self.log, Some(&config));

        if self.is_converting() {
            debug!("Conversion in progress, skipping tick");
            return;
        }

        let root = config.scan_root();
        if !root.exists() {
            warn!("Scan path does not exist: {:?}", root);
            self.log.log(format!("Scan path does not exist: {}", root.display()));
            return;
        }

        let Some(input) = self.find_candidate(root, &config).await else {
            return;
        };

        self.log.log(format!("Found {}: {}", self.source_extension, input.display()));
        self.begin(input, done_tx);
    }

    async fn find_candidate(&self, root: PathBuf, config: &Config) -> Option<PathBuf> {
        let extension = self.source_extension.clone();
        let exclusions = config.exclusions().to_vec();
        let log = self.log.clone();

        let scan = tokio::task::spawn_blocking(move || {
            select_candidate(&root, &extension, &exclusions, &log)
        });

        match scan.await {
            Ok(candidate) => candidate,
            Err(e) => {
                error!("Scan task failed: {}", e);
                None
            }
        }
    }

    fn begin(&mut self, input: PathBuf, done_tx: &mpsc::UnboundedSender<JobFinished>) {
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let state = ConversionState::Converting { filename };
        let status = ConverterEvent::Status(StatusEvent::from(&state));
        self.state.send_replace(state);
        if self.events.send(status).is_err() {
            debug!("No subscribers for converter event");
        }

        self.in_flight = true;

        let runner = self.runner.clone();
        let guard = CompletionGuard {
            done: done_tx.clone(),
        };

        tokio::spawn(async move {
            let _guard = guard;
            runner.run(input).await;
        });
    }

    fn finish(&mut self) {
        self.in_flight = false;
        self.state.send_replace(ConversionState::Idle);
        debug!("Conversion state reset to idle");
    }
}
