use std::fmt;

use serde::Serialize;

use crate::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Produced,
    Consumed,
    Completed,
}

/// Observability record, appended under the monitor mutex.
///
/// `seq` is the position in the journal, so journal order is the order in which the
/// critical sections ran. The counters and occupancy are the values right after the
/// recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    pub seq: usize,
    pub kind: EventKind,
    pub producer: Option<usize>,
    pub sequence: Option<usize>,
    pub value: Option<u64>,
    pub produced: usize,
    pub consumed: usize,
    pub occupancy: usize,
}

impl Event {
    pub fn item(&self) -> Option<Item> {
        Some(Item {
            producer: self.producer?,
            sequence: self.sequence?,
            value: self.value?,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.unwrap_or_default();
        match self.kind {
            EventKind::Produced => write!(
                f,
                "[P{}] produce {value}   (total={})",
                self.producer.unwrap_or_default(),
                self.produced
            ),
            EventKind::Consumed => write!(f, "[C] consume {value}   (total={})", self.consumed),
            EventKind::Completed => write!(
                f,
                "[Watcher] all {} items have been produced & consumed",
                self.consumed
            ),
        }
    }
}
