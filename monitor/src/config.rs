use std::{thread, time::Duration};

use anyhow::{bail, Context};
use rand::Rng;

// POSIX guarantees semaphore values up to SEM_VALUE_MAX, which is i32::MAX on Linux
const MAX_CAPACITY: usize = i32::MAX as usize;

/// Startup parameters of a run. Fixed before any agent starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub capacity: usize,
    pub producers: usize,
    pub items_per_producer: usize,
    pub watchers: usize,
    /// Upper bound of a random pause taken before every slot acquire
    pub jitter: Option<Duration>,
    /// Keep every event in memory for the report. When off, events are still logged and
    /// numbered but the journal stays empty.
    pub journal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 5,
            producers: 2,
            items_per_producer: 10,
            watchers: 1,
            jitter: None,
            journal: true,
        }
    }
}

impl Config {
    pub fn new(capacity: usize, producers: usize, items_per_producer: usize) -> Self {
        Self {
            capacity,
            producers,
            items_per_producer,
            ..Self::default()
        }
    }

    pub fn total_items(&self) -> usize {
        self.producers.saturating_mul(self.items_per_producer)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.capacity == 0 {
            bail!("capacity must be at least 1");
        }
        if self.capacity > MAX_CAPACITY {
            bail!("capacity {} exceeds {MAX_CAPACITY}", self.capacity);
        }
        if self.producers == 0 {
            bail!("at least one producer is required");
        }
        if self.items_per_producer == 0 {
            bail!("every producer must produce at least one item");
        }
        if self.watchers == 0 {
            bail!("at least one watcher is required");
        }
        self.producers
            .checked_mul(self.items_per_producer)
            .context("total item count overflows")?;
        Ok(())
    }

    pub(crate) fn pause(&self) {
        let Some(jitter) = self.jitter.filter(|j| !j.is_zero()) else {
            return;
        };
        thread::sleep(rand::thread_rng().gen_range(Duration::ZERO..jitter));
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::Config;

    #[test]
    fn default_is_reference_run() {
        let config = Config::default();
        assert_eq!(config.total_items(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_parameters() {
        assert!(Config::new(0, 1, 1).validate().is_err());
        assert!(Config::new(1, 0, 1).validate().is_err());
        assert!(Config::new(1, 1, 0).validate().is_err());

        let config = Config {
            watchers: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overflowing_total() {
        let config = Config::new(1, usize::MAX, 2);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn zero_jitter_does_not_sleep() {
        let config = Config {
            jitter: Some(Duration::ZERO),
            ..Config::default()
        };
        config.pause();
    }
}
