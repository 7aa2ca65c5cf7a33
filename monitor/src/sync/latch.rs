//! One-shot latch.
//!
//! A [`Latch`] pairs a condition variable with a [`Latched`] flag that lives inside the
//! mutex-guarded state it describes. The flag is only reachable through a guard of that
//! mutex, so setting it and waking the waiters always happens under the lock, and
//! [`Latch::wait`] re-checks the flag after every wakeup. Waiters arriving after the latch
//! opened return immediately.

use super::{Condvar, MutexGuard};

#[derive(Debug, Default)]
pub struct Latched {
    set: bool,
}

impl Latched {
    pub fn is_set(&self) -> bool {
        self.set
    }
}

#[derive(Debug)]
pub struct Latch {
    cond: Condvar,
}

impl Latch {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            cond: Condvar::new()?,
        })
    }

    /// Sets the flag and wakes every waiter.
    ///
    /// Returns false, without broadcasting again, if the latch was already open.
    pub fn open(&self, flag: &mut Latched) -> bool {
        if flag.set {
            return false;
        }
        flag.set = true;
        self.cond.broadcast();
        true
    }

    /// Blocks until the flag selected by `flag` is set. The guard is released while
    /// suspended and held again on return.
    pub fn wait<'m, T>(
        &self,
        mut guard: MutexGuard<'m, T>,
        flag: impl Fn(&T) -> &Latched,
    ) -> MutexGuard<'m, T> {
        while !flag(&guard).set {
            guard = self.cond.wait(guard);
        }
        guard
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::{Latch, Latched};
    use crate::sync::Mutex;

    #[derive(Default)]
    struct Shared {
        done: Latched,
        value: usize,
    }

    #[test]
    fn opens_exactly_once() {
        let latch = Latch::new().unwrap();
        let mut flag = Latched::default();
        assert!(!flag.is_set());
        assert!(latch.open(&mut flag));
        assert!(!latch.open(&mut flag));
        assert!(flag.is_set());
    }

    #[test]
    fn releases_all_waiters() {
        let shared = Mutex::new(Shared::default()).unwrap();
        let latch = Latch::new().unwrap();

        thread::scope(|s| {
            let waiters: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let guard = latch.wait(shared.lock(), |state| &state.done);
                        guard.value
                    })
                })
                .collect();

            let mut guard = shared.lock();
            guard.value = 42;
            assert!(latch.open(&mut guard.done));
            drop(guard);

            for waiter in waiters {
                assert_eq!(waiter.join().unwrap(), 42);
            }
        });
    }

    #[test]
    fn late_waiter_does_not_block() {
        let shared = Mutex::new(Shared::default()).unwrap();
        let latch = Latch::new().unwrap();

        latch.open(&mut shared.lock().done);

        let guard = latch.wait(shared.lock(), |state| &state.done);
        assert!(guard.done.is_set());
    }
}
