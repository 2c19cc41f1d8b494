use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autoconvert")]
#[command(author, version, about = "Converts MKV files in a watched directory to MP4")]
pub struct Cli {
    /// Path to config file (default: ~/.config/autoconvert/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the activity log (default: ~/.config/autoconvert/logs)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start polling the configured directory and converting files
    Start,

    /// Convert a single file now
    Run {
        /// Input file to convert
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Print the output path a file would be converted to
    Resolve {
        /// Input file name or path
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Check that the transcoder can be found
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
