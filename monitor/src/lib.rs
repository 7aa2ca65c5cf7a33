//! Bounded-buffer monitor: producers and one consumer coordinate over a fixed-capacity ring
//! through a pair of counting semaphores and a single mutex, and watchers learn about the
//! end of the run through a one-shot latch.

use anyhow::bail;
use libc::c_int;

pub mod agents;
pub mod buffer;
pub mod config;
pub mod journal;
pub mod monitor;
pub mod run;
pub mod slots;
pub mod sync;

pub use agents::Completion;
pub use config::Config;
pub use journal::{Event, EventKind};
pub use monitor::{Item, Monitor, Phase, State};
pub use run::{run, Report};

pub trait CheckOk<R> {
    fn r(self, op: &str) -> Result<R, anyhow::Error>;
}

impl CheckOk<()> for c_int {
    fn r(self, op: &str) -> Result<(), anyhow::Error> {
        if self != 0 {
            bail!("Operation {op} failed: Code {self}");
        }
        Ok(())
    }
}
