use std::{path::Path, time::Duration};

use anyhow::{ensure, Context};
use clap::Parser;
use tracing::info;

pub mod cli;

use cli::Args;
use monitor::{Config, Event, Report};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    let report = monitor::run(&config(&args))?;
    verify(&report)?;

    if let Some(path) = &args.trace {
        write_trace(path, &report.journal)
            .with_context(|| format!("writing trace to {}", path.display()))?;
        info!(path = %path.display(), events = report.journal.len(), "trace written");
    }

    println!(
        "Run complete: {} produced, {} consumed, {} watcher(s) notified",
        report.produced,
        report.consumed,
        report.completions.len()
    );
    Ok(())
}

/// The journal is only kept in memory when it will be written out.
fn config(args: &Args) -> Config {
    Config {
        capacity: args.capacity,
        producers: args.producers,
        items_per_producer: args.items,
        watchers: args.watchers,
        jitter: args.jitter_us.map(Duration::from_micros),
        journal: args.trace.is_some(),
    }
}

fn verify(report: &Report) -> anyhow::Result<()> {
    ensure!(
        report.produced == report.total_items && report.consumed == report.total_items,
        "run ended with {} produced and {} consumed of {}",
        report.produced,
        report.consumed,
        report.total_items
    );
    ensure!(
        report.permits.1 == 0,
        "{} filled slots left behind",
        report.permits.1
    );
    Ok(())
}

fn write_trace(path: &Path, journal: &[Event]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for event in journal {
        writer.serialize(event)?;
    }
    writer.flush()?;
    Ok(())
}
