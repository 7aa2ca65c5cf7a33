use std::mem;

use crate::sync::Semaphore;

/// Free and filled slot counters of a bounded buffer.
///
/// `empty` starts at the buffer capacity, `full` at zero. Neither semaphore knows anything
/// about the buffer itself.
#[derive(Debug)]
pub struct SlotAccounting {
    empty: Semaphore,
    full: Semaphore,
}

impl SlotAccounting {
    pub fn new(capacity: usize) -> anyhow::Result<Self> {
        let capacity = u32::try_from(capacity)?;
        Ok(Self {
            empty: Semaphore::new(capacity)?,
            full: Semaphore::new(0)?,
        })
    }

    /// Blocks until a slot is free. Passing the permit releases a filled slot.
    pub fn acquire_empty(&self) -> Permit<'_> {
        self.empty.wait();
        Permit {
            from: &self.empty,
            to: &self.full,
        }
    }

    /// Blocks until a slot is filled. Passing the permit releases a free slot.
    pub fn acquire_full(&self) -> Permit<'_> {
        self.full.wait();
        Permit {
            from: &self.full,
            to: &self.empty,
        }
    }

    pub fn release_full(&self) {
        self.full.post();
    }

    pub fn release_empty(&self) {
        self.empty.post();
    }

    pub fn available_empty(&self) -> usize {
        self.empty.value()
    }

    pub fn available_full(&self) -> usize {
        self.full.value()
    }
}

/// A taken slot permit.
///
/// [`Permit::pass`] hands it to the opposite counter once the buffer was mutated. Dropping
/// it un-passed gives it back to the counter it came from, so an agent that fails between
/// the acquire and the buffer access leaves the counts as it found them.
#[must_use = "dropping a permit returns it without moving a slot"]
#[derive(Debug)]
pub struct Permit<'a> {
    from: &'a Semaphore,
    to: &'a Semaphore,
}

impl Permit<'_> {
    pub fn pass(self) {
        self.to.post();
        mem::forget(self);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.from.post();
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::SlotAccounting;

    #[test]
    fn pass_moves_a_slot() {
        let slots = SlotAccounting::new(2).unwrap();
        slots.acquire_empty().pass();
        assert_eq!((slots.available_empty(), slots.available_full()), (1, 1));
        slots.acquire_full().pass();
        assert_eq!((slots.available_empty(), slots.available_full()), (2, 0));
    }

    #[test]
    fn dropped_permit_is_returned() {
        let slots = SlotAccounting::new(1).unwrap();
        let permit = slots.acquire_empty();
        assert_eq!(slots.available_empty(), 0);
        drop(permit);
        assert_eq!((slots.available_empty(), slots.available_full()), (1, 0));
    }

    #[test]
    fn permit_returned_on_panic() {
        let slots = SlotAccounting::new(1).unwrap();
        thread::scope(|s| {
            let failed = s.spawn(|| {
                let _permit = slots.acquire_empty();
                panic!("producer failed before inserting");
            });
            assert!(failed.join().is_err());
        });
        assert_eq!((slots.available_empty(), slots.available_full()), (1, 0));
    }

    #[test]
    fn release_pairs_unblock_the_other_side() {
        let slots = SlotAccounting::new(1).unwrap();
        thread::scope(|s| {
            let consumer = s.spawn(|| slots.acquire_full().pass());
            slots.acquire_empty().pass();
            consumer.join().unwrap();
        });

        let permit = slots.acquire_empty();
        std::mem::forget(permit);
        slots.release_full();
        assert_eq!((slots.available_empty(), slots.available_full()), (0, 1));
        std::mem::forget(slots.acquire_full());
        slots.release_empty();
        assert_eq!((slots.available_empty(), slots.available_full()), (1, 0));
    }
}
