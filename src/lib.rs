//! autoconvert - converts MKV files dropped into a directory tree to MP4
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod conversion;
pub mod error;
pub mod events;
pub mod log_sink;
pub mod paths;
pub mod tools;

pub use error::{Error, Result};
