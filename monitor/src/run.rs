use std::{
    io,
    thread::{self, Scope, ScopedJoinHandle},
};

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::{
    agents::{consume, produce, watch, Completion},
    journal::Event,
    Config, Monitor, Phase,
};

/// Outcome of a run, assembled after every agent was joined.
#[derive(Debug)]
pub struct Report {
    pub total_items: usize,
    pub produced: usize,
    pub consumed: usize,
    pub phase: Phase,
    pub completions: Vec<Completion>,
    pub journal: Vec<Event>,
    /// Slot counts left behind, `(free, filled)`
    pub permits: (usize, usize),
}

struct Agents<'scope> {
    consumer: ScopedJoinHandle<'scope, usize>,
    watchers: Vec<ScopedJoinHandle<'scope, Option<Completion>>>,
    producers: Vec<ScopedJoinHandle<'scope, usize>>,
}

/// Runs producers, the consumer and the watchers to completion.
///
/// Returns once every thread has been joined. If a thread cannot be spawned, the agents
/// already running are released through the start gate with an abort and the spawn error
/// is returned. If an agent panics, the others are released through [`Monitor::fail`] and
/// the panic is returned as an error.
pub fn run(config: &Config) -> anyhow::Result<Report> {
    run_with(config, |_, _| Ok(()))
}

/// [`run`] with a hook called before each agent thread is spawned. An error from the hook
/// is handled like a failed spawn.
fn run_with<H>(config: &Config, before_spawn: H) -> anyhow::Result<Report>
where
    H: FnMut(&Monitor, &str) -> io::Result<()>,
{
    let monitor = Monitor::new(config)?;
    info!(
        capacity = config.capacity,
        producers = config.producers,
        items_per_producer = config.items_per_producer,
        total_items = monitor.total_items(),
        "starting run"
    );

    let completions = {
        let monitor = &monitor;
        thread::scope(|s| {
            let mut launcher = Launcher {
                monitor,
                before_spawn,
            };
            let agents = spawn_agents(s, &mut launcher);
            monitor.open_gate(agents.is_ok());
            join_agents(agents?)
        })?
    };

    let permits = (
        monitor.slots().available_empty(),
        monitor.slots().available_full(),
    );
    let total_items = monitor.total_items();
    let state = monitor.into_state();

    Ok(Report {
        total_items,
        produced: state.produced(),
        consumed: state.consumed(),
        phase: state.phase(),
        completions,
        permits,
        journal: state.into_journal(),
    })
}

struct Launcher<'env, H> {
    monitor: &'env Monitor,
    before_spawn: H,
}

impl<'env, H> Launcher<'env, H>
where
    H: FnMut(&Monitor, &str) -> io::Result<()>,
{
    fn spawn<'scope, T, F>(
        &mut self,
        s: &'scope Scope<'scope, 'env>,
        name: String,
        f: F,
    ) -> anyhow::Result<ScopedJoinHandle<'scope, T>>
    where
        T: Send + 'scope,
        F: FnOnce() -> T + Send + 'scope,
    {
        (self.before_spawn)(self.monitor, &name)
            .and_then(|()| thread::Builder::new().name(name.clone()).spawn_scoped(s, f))
            .with_context(|| format!("failed to spawn {name}"))
    }
}

fn spawn_agents<'scope, 'env, H>(
    s: &'scope Scope<'scope, 'env>,
    launcher: &mut Launcher<'env, H>,
) -> anyhow::Result<Agents<'scope>>
where
    H: FnMut(&Monitor, &str) -> io::Result<()>,
{
    let monitor = launcher.monitor;
    let config = monitor.config();

    let consumer = launcher.spawn(s, "consumer".to_string(), move || consume(monitor))?;

    let mut watchers = Vec::with_capacity(config.watchers);
    for id in 0..config.watchers {
        watchers.push(launcher.spawn(s, format!("watcher-{id}"), move || watch(monitor, id))?);
    }

    let mut producers = Vec::with_capacity(config.producers);
    for id in 0..config.producers {
        producers.push(launcher.spawn(s, format!("producer-{id}"), move || {
            produce(monitor, id)
        })?);
    }

    debug!(threads = 1 + watchers.len() + producers.len(), "agents spawned");
    Ok(Agents {
        consumer,
        watchers,
        producers,
    })
}

fn join_agents(agents: Agents<'_>) -> anyhow::Result<Vec<Completion>> {
    for producer in agents.producers {
        join(producer)?;
    }
    debug!("all producers joined");

    join(agents.consumer)?;

    let mut completions = Vec::with_capacity(agents.watchers.len());
    for watcher in agents.watchers {
        completions.push(join(watcher)?.context("watcher exited without completion")?);
    }
    Ok(completions)
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> anyhow::Result<T> {
    let name = handle.thread().name().unwrap_or("agent").to_string();
    handle.join().map_err(|_| anyhow!("{name} thread panicked"))
}
