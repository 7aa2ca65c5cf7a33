use std::path::PathBuf;

use clap::Parser;

/// Bounded-buffer producer/consumer run
#[derive(Debug, Clone, Parser)]
pub struct Args {
    /// Number of buffer slots
    #[arg(short, long, default_value_t = 5)]
    pub capacity: usize,
    /// Number of producer threads
    #[arg(short, long, default_value_t = 2)]
    pub producers: usize,
    /// Items inserted by each producer
    #[arg(short = 'n', long, default_value_t = 10)]
    pub items: usize,
    /// Number of watcher threads waiting for completion
    #[arg(short, long, default_value_t = 1)]
    pub watchers: usize,
    /// Upper bound in microseconds of a random pause before every slot acquire
    #[arg(long)]
    pub jitter_us: Option<u64>,
    /// Write the event journal as CSV to this file
    #[arg(long)]
    pub trace: Option<PathBuf>,
}
