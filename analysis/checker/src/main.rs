use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context};
use clap::Parser;

/// Verifies an event journal written by `runner --trace`
#[derive(Debug, Parser)]
struct Args {
    /// CSV journal
    trace: PathBuf,
    /// Buffer capacity of the run, enables the occupancy bound check
    #[arg(short, long)]
    capacity: Option<usize>,
    /// Expected number of items of the run
    #[arg(short, long)]
    total: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
enum Kind {
    Produced,
    Consumed,
    Completed,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct Record {
    seq: usize,
    kind: Kind,
    producer: Option<usize>,
    sequence: Option<usize>,
    value: Option<u64>,
    produced: usize,
    consumed: usize,
    occupancy: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    produced: usize,
    consumed: usize,
    completions: usize,
    producers: usize,
    peak_occupancy: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let records = load_csv(&args.trace)?;
    let summary = check(&records, args.capacity, args.total)?;

    println!("--- Summary ---");
    println!();
    println!("events:          {}", records.len());
    println!("producers:       {}", summary.producers);
    println!("produced:        {}", summary.produced);
    println!("consumed:        {}", summary.consumed);
    println!("peak occupancy:  {}", summary.peak_occupancy);
    println!("completions:     {}", summary.completions);
    println!();
    println!("journal is consistent");
    Ok(())
}

fn load_csv(path: &Path) -> anyhow::Result<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let list: Result<Vec<Record>, _> = reader.deserialize().collect();
    Ok(list?)
}

fn check(
    records: &[Record],
    capacity: Option<usize>,
    total: Option<usize>,
) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    let mut pending = HashSet::new();
    let mut next_sequence: HashMap<usize, usize> = HashMap::new();

    for (index, r) in records.iter().enumerate() {
        ensure!(r.seq == index, "event {index} carries seq {}", r.seq);
        ensure!(
            r.consumed <= r.produced,
            "event {index}: consumed {} exceeds produced {}",
            r.consumed,
            r.produced
        );
        ensure!(
            r.occupancy == r.produced - r.consumed,
            "event {index}: occupancy {} does not match counters",
            r.occupancy
        );
        if let Some(capacity) = capacity {
            ensure!(
                r.occupancy <= capacity,
                "event {index}: occupancy {} exceeds capacity {capacity}",
                r.occupancy
            );
        }
        summary.peak_occupancy = summary.peak_occupancy.max(r.occupancy);

        match r.kind {
            Kind::Produced | Kind::Consumed if summary.completions > 0 => {
                bail!("event {index}: {:?} after completion", r.kind)
            }
            Kind::Produced => {
                ensure!(
                    r.produced == summary.produced + 1 && r.consumed == summary.consumed,
                    "event {index}: produced total does not advance by one"
                );
                summary.produced = r.produced;
                let key = item_key(r, index)?;
                ensure!(pending.insert(key), "event {index}: item {key:?} produced twice");
            }
            Kind::Consumed => {
                ensure!(
                    r.consumed == summary.consumed + 1 && r.produced == summary.produced,
                    "event {index}: consumed total does not advance by one"
                );
                summary.consumed = r.consumed;
                let key = item_key(r, index)?;
                ensure!(pending.remove(&key), "event {index}: item {key:?} was not in the buffer");

                let next = next_sequence.entry(key.0).or_default();
                ensure!(
                    key.1 == *next,
                    "event {index}: producer {} consumed out of order",
                    key.0
                );
                *next += 1;
            }
            Kind::Completed => {
                ensure!(
                    r.consumed == summary.produced && pending.is_empty(),
                    "event {index}: completion before the last item was consumed"
                );
                summary.completions += 1;
            }
        }
    }

    ensure!(summary.completions > 0, "journal has no completion record");
    if let Some(total) = total {
        ensure!(
            summary.consumed == total,
            "expected {total} items, journal consumed {}",
            summary.consumed
        );
    }
    summary.producers = next_sequence.len();
    Ok(summary)
}

/// Identity of the item an event carries. The value must encode its origin.
fn item_key(r: &Record, index: usize) -> anyhow::Result<(usize, usize)> {
    let (Some(producer), Some(sequence), Some(value)) = (r.producer, r.sequence, r.value) else {
        bail!("event {index}: item fields missing");
    };
    ensure!(
        value == producer as u64 * 100 + sequence as u64,
        "event {index}: value {value} does not match item ({producer}, {sequence})"
    );
    Ok((producer, sequence))
}
