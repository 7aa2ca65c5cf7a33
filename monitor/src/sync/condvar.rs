use std::{cell::UnsafeCell, mem::MaybeUninit, ptr::null};

use libc::{
    pthread_cond_broadcast, pthread_cond_destroy, pthread_cond_init, pthread_cond_t,
    pthread_cond_wait,
};

use crate::CheckOk;

use super::MutexGuard;

#[derive(Debug)]
pub struct Condvar {
    inner: UnsafeCell<MaybeUninit<pthread_cond_t>>,
}

impl Condvar {
    pub fn new() -> anyhow::Result<Self> {
        let inner = UnsafeCell::new(MaybeUninit::uninit());
        unsafe {
            pthread_cond_init((*inner.get()).as_mut_ptr(), null()).r("cond_init")?;
        }

        Ok(Self { inner })
    }

    pub fn broadcast(&self) {
        unsafe {
            if pthread_cond_broadcast((*self.inner.get()).as_mut_ptr()) != 0 {
                panic!("failed to broadcast condvar");
            }
        }
    }

    /// Atomically releases the guarded mutex and suspends until woken.
    ///
    /// Spurious wakeups are possible; callers re-check their predicate.
    pub fn wait<'m, T>(&self, guard: MutexGuard<'m, T>) -> MutexGuard<'m, T> {
        unsafe {
            if pthread_cond_wait((*self.inner.get()).as_mut_ptr(), guard.get_inner_lock()) != 0 {
                panic!("failed to wait on condvar");
            }
        }
        guard
    }
}

unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Drop for Condvar {
    fn drop(&mut self) {
        if unsafe { pthread_cond_destroy((*self.inner.get()).as_mut_ptr()) } != 0 {
            panic!("failed to destroy condvar");
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::Condvar;
    use crate::sync::Mutex;

    #[test]
    fn broadcast_wakes_all_waiters() {
        let ready = Mutex::new(false).unwrap();
        let cond = Condvar::new().unwrap();

        thread::scope(|s| {
            let waiters: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        let mut guard = ready.lock();
                        while !*guard {
                            guard = cond.wait(guard);
                        }
                    })
                })
                .collect();

            let mut guard = ready.lock();
            *guard = true;
            cond.broadcast();
            drop(guard);

            for waiter in waiters {
                waiter.join().unwrap();
            }
        });
    }
}
