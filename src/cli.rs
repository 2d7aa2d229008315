use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ptsmap")]
#[command(author, version, about = "Bitstream offset to PTS correspondence engine")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines trace of checkins and lookups against the engine
    Replay {
        /// Trace file to replay
        #[arg(required = true)]
        trace: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Timestamp arrivals with the real clock instead of the trace's advance events
        #[arg(long)]
        wall_clock: bool,

        /// Exit with an error if any event failed
        #[arg(long)]
        strict: bool,
    },

    /// Validate a configuration file and print the effective settings
    Validate {
        /// Config file to validate (defaults to the usual search path)
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}
