use tracing::{debug, warn};

use crate::{
    buffer::BoundedBuffer,
    journal::{Event, EventKind},
    slots::SlotAccounting,
    sync::{Latch, Latched, Mutex, MutexGuard},
    Config,
};

const JOURNAL_PREALLOC: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    pub producer: usize,
    pub sequence: usize,
    pub value: u64,
}

impl Item {
    pub fn new(producer: usize, sequence: usize) -> Self {
        Self {
            producer,
            sequence,
            value: producer as u64 * 100 + sequence as u64,
        }
    }
}

/// Lifecycle of a run. Every transition moves exactly one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Producers still have items to insert
    #[default]
    Running,
    /// Every item was produced, the consumer is working off the backlog
    Draining,
    /// Every item was consumed, terminal
    Complete,
}

impl Phase {
    fn advance(&mut self, to: Phase) {
        let next = match self {
            Phase::Running => Phase::Draining,
            Phase::Draining => Phase::Complete,
            Phase::Complete => panic!("no transition out of {self:?}"),
        };
        assert_eq!(next, to, "illegal phase transition from {self:?}");
        debug!(from = ?self, ?to, "phase transition");
        *self = to;
    }
}

/// Everything the agents share, guarded by the single monitor mutex.
#[derive(Debug)]
pub struct State {
    pub(crate) buffer: BoundedBuffer<Item>,
    produced: usize,
    consumed: usize,
    phase: Phase,
    done: Latched,
    start: Latched,
    aborted: bool,
    failed: bool,
    events: usize,
    keep_journal: bool,
    journal: Vec<Event>,
}

impl State {
    fn new(config: &Config) -> Self {
        Self {
            buffer: BoundedBuffer::new(config.capacity),
            produced: 0,
            consumed: 0,
            phase: Phase::default(),
            done: Latched::default(),
            start: Latched::default(),
            aborted: false,
            failed: false,
            events: 0,
            keep_journal: config.journal,
            journal: if config.journal {
                Vec::with_capacity(
                    config
                        .total_items()
                        .saturating_mul(2)
                        .saturating_add(config.watchers)
                        .min(JOURNAL_PREALLOC),
                )
            } else {
                Vec::new()
            },
        }
    }

    pub fn produced(&self) -> usize {
        self.produced
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once the last item was consumed. A failed run is never done.
    pub fn is_done(&self) -> bool {
        self.done.is_set() && !self.failed
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn occupancy(&self) -> usize {
        self.buffer.len()
    }

    /// Number of events recorded so far, retained in the journal or not.
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn journal(&self) -> &[Event] {
        &self.journal
    }

    pub(crate) fn count_produced(&mut self, total_items: usize) {
        self.produced += 1;
        if self.produced == total_items {
            self.phase.advance(Phase::Draining);
        }
    }

    pub(crate) fn count_consumed(&mut self) -> usize {
        self.consumed += 1;
        assert!(
            self.consumed <= self.produced,
            "consumed {} items but only {} were produced",
            self.consumed,
            self.produced
        );
        self.consumed
    }

    pub(crate) fn record(&mut self, kind: EventKind, item: Option<Item>) -> Event {
        let event = Event {
            seq: self.events,
            kind,
            producer: item.map(|i| i.producer),
            sequence: item.map(|i| i.sequence),
            value: item.map(|i| i.value),
            produced: self.produced,
            consumed: self.consumed,
            occupancy: self.buffer.len(),
        };
        self.events += 1;
        if self.keep_journal {
            self.journal.push(event);
        }
        event
    }

    pub(crate) fn into_journal(self) -> Vec<Event> {
        self.journal
    }
}

/// The bounded-buffer monitor: one mutex over [`State`], the slot semaphores, the
/// completion latch and the start gate.
#[derive(Debug)]
pub struct Monitor {
    config: Config,
    total_items: usize,
    state: Mutex<State>,
    slots: SlotAccounting,
    completion: Latch,
    gate: Latch,
}

impl Monitor {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            total_items: config.total_items(),
            state: Mutex::new(State::new(config))?,
            slots: SlotAccounting::new(config.capacity)?,
            completion: Latch::new()?,
            gate: Latch::new()?,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn slots(&self) -> &SlotAccounting {
        &self.slots
    }

    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Lets the spawned agents start, or with `proceed == false` makes every one of them
    /// return without touching the buffer.
    pub fn open_gate(&self, proceed: bool) {
        let mut state = self.lock();
        state.aborted = !proceed;
        if self.gate.open(&mut state.start) {
            debug!(proceed, "start gate opened");
        }
    }

    pub(crate) fn await_start(&self) -> bool {
        let state = self.gate.wait(self.lock(), |state| &state.start);
        !state.aborted && !state.failed
    }

    /// Blocks until the last item was consumed or the run failed. Returns with the mutex
    /// held.
    pub fn await_completion(&self) -> MutexGuard<'_, State> {
        self.completion.wait(self.lock(), |state| &state.done)
    }

    /// Marks the run complete and wakes every watcher. The caller holds the mutex.
    pub(crate) fn complete(&self, state: &mut State) {
        assert_eq!(state.consumed, self.total_items);
        state.phase.advance(Phase::Complete);
        let opened = self.completion.open(&mut state.done);
        assert!(opened, "completion signalled twice");
    }

    /// Marks the run failed and releases every agent that could otherwise block forever.
    ///
    /// Watchers are woken through the completion latch and see the failure. One free and
    /// one filled slot are posted; every agent that takes such a permit sees the failure and
    /// drops it un-passed, which hands it on to the next blocked agent. Returns false if the
    /// run had already failed.
    pub fn fail(&self) -> bool {
        let mut state = self.lock();
        if state.failed {
            return false;
        }
        state.failed = true;
        warn!(
            produced = state.produced,
            consumed = state.consumed,
            "agent failed, releasing the others"
        );
        self.completion.open(&mut state.done);
        drop(state);

        self.slots.release_empty();
        self.slots.release_full();
        true
    }

    pub fn into_state(self) -> State {
        self.state.into_inner()
    }
}

#[cfg(test)]
mod test {
    use super::{Monitor, Phase};
    use crate::Config;

    #[test]
    fn phase_moves_one_step_at_a_time() {
        let mut phase = Phase::default();
        phase.advance(Phase::Draining);
        phase.advance(Phase::Complete);
        assert_eq!(phase, Phase::Complete);
    }

    #[test]
    #[should_panic(expected = "illegal phase transition")]
    fn phase_cannot_skip_draining() {
        Phase::Running.advance(Phase::Complete);
    }

    #[test]
    #[should_panic(expected = "no transition out of Complete")]
    fn complete_is_terminal() {
        Phase::Complete.advance(Phase::Complete);
    }

    #[test]
    fn item_value_tags_origin() {
        let item = super::Item::new(3, 7);
        assert_eq!(item.value, 307);
    }

    #[test]
    fn fresh_monitor_is_idle() {
        let monitor = Monitor::new(&Config::new(4, 2, 3)).unwrap();
        assert_eq!(monitor.total_items(), 6);
        assert_eq!(monitor.slots().available_empty(), 4);
        assert_eq!(monitor.slots().available_full(), 0);

        let state = monitor.lock();
        assert_eq!(state.phase(), Phase::Running);
        assert_eq!((state.produced(), state.consumed(), state.occupancy()), (0, 0, 0));
        assert!(!state.is_done());
    }

    #[test]
    fn journal_can_be_turned_off() {
        let config = Config {
            journal: false,
            ..Config::new(2, 1, 1)
        };
        let monitor = Monitor::new(&config).unwrap();
        let mut state = monitor.lock();
        let first = state.record(crate::EventKind::Completed, None);
        let second = state.record(crate::EventKind::Completed, None);
        assert_eq!((first.seq, second.seq), (0, 1));
        assert_eq!(state.events(), 2);
        assert!(state.journal().is_empty());
    }

    #[test]
    fn failure_is_sticky_and_not_done() {
        let monitor = Monitor::new(&Config::new(2, 1, 1)).unwrap();
        assert!(monitor.fail());
        assert!(!monitor.fail());

        let state = monitor.await_completion();
        assert!(state.failed());
        assert!(!state.is_done());
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(Monitor::new(&Config::new(0, 1, 1)).is_err());
    }
}
