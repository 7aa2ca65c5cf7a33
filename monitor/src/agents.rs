//! The three agent bodies. Each one first waits at the start gate and returns early, without
//! touching any semaphore, if the gate was opened with an abort.
//!
//! No agent holds the monitor mutex across a semaphore wait: the permit is always taken
//! first, then the mutex.
//!
//! An agent that unwinds marks the run failed through [`Monitor::fail`]. The others see the
//! failure after their next wake-up and return with a partial count.

use std::thread;

use tracing::{debug, info};

use crate::{journal::EventKind, Item, Monitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub watcher: usize,
    pub total_items: usize,
    /// Sequence number of the watcher's completion record, its journal index when the
    /// journal is kept
    pub seq: usize,
}

/// Fails the run if dropped while the owning agent is panicking.
struct FailOnUnwind<'a>(&'a Monitor);

impl Drop for FailOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.fail();
        }
    }
}

/// Inserts this producer's quota of items. Returns how many were inserted.
pub fn produce(monitor: &Monitor, producer: usize) -> usize {
    let _unwind = FailOnUnwind(monitor);
    if !monitor.await_start() {
        debug!(producer, "start aborted");
        return 0;
    }

    let quota = monitor.config().items_per_producer;
    for sequence in 0..quota {
        let item = Item::new(producer, sequence);

        monitor.config().pause();
        let permit = monitor.slots().acquire_empty();

        let mut state = monitor.lock();
        if state.failed() {
            debug!(producer, produced = sequence, "run failed, stopping");
            // dropping the permit un-passed wakes the next blocked producer
            return sequence;
        }
        state.buffer.insert(item);
        state.count_produced(monitor.total_items());
        let event = state.record(EventKind::Produced, Some(item));
        info!("{event}");
        drop(state);

        permit.pass();
    }
    quota
}

/// Drains items until every one of them was consumed, then opens the completion latch.
/// Returns how many items were consumed.
pub fn consume(monitor: &Monitor) -> usize {
    let _unwind = FailOnUnwind(monitor);
    if !monitor.await_start() {
        debug!("start aborted");
        return 0;
    }

    loop {
        monitor.config().pause();
        let permit = monitor.slots().acquire_full();

        let mut state = monitor.lock();
        if state.failed() {
            debug!(consumed = state.consumed(), "run failed, stopping");
            return state.consumed();
        }
        let item = state.buffer.remove();
        let consumed = state.count_consumed();
        let event = state.record(EventKind::Consumed, Some(item));
        info!("{event}");

        let last = consumed == monitor.total_items();
        if last {
            monitor.complete(&mut state);
        }
        drop(state);

        permit.pass();
        if last {
            return consumed;
        }
    }
}

/// Waits for the completion latch and reports once. Returns `None` if the run was aborted
/// or failed.
pub fn watch(monitor: &Monitor, watcher: usize) -> Option<Completion> {
    let _unwind = FailOnUnwind(monitor);
    if !monitor.await_start() {
        debug!(watcher, "start aborted");
        return None;
    }

    let mut state = monitor.await_completion();
    if state.failed() {
        debug!(watcher, "run failed, no completion");
        return None;
    }
    let event = state.record(EventKind::Completed, None);
    info!(watcher, "{event}");

    Some(Completion {
        watcher,
        total_items: state.consumed(),
        seq: event.seq,
    })
}
