//! MKV to MP4 conversion.
//!
//! - [`ConversionScheduler`] polls the configured root on a timer and picks
//!   at most one file per tick
//! - [`TranscodeRunner`] drives the external transcoder for that file
//! - [`scan`] is the lazy directory traversal both share

mod runner;
pub mod scan;
mod scheduler;
mod state;

pub use runner::{TranscodeJob, TranscodeOptions, TranscodeOutcome, TranscodeRunner};
pub use scheduler::{ConversionScheduler, SchedulerSettings};
pub use state::ConversionState;
