use std::{cell::UnsafeCell, mem::MaybeUninit};

use libc::{
    __errno_location, c_int, sem_destroy, sem_getvalue, sem_init, sem_post, sem_t, sem_trywait,
    sem_wait, EAGAIN, EINTR,
};

use crate::CheckOk;

// Semaphores are private to this process
const INTER_PROCESS: c_int = 0;

/// POSIX counting semaphore.
///
/// `wait` suspends the calling thread while the count is zero, `post` increments it and
/// wakes one waiter.
#[derive(Debug)]
pub struct Semaphore {
    inner: UnsafeCell<MaybeUninit<sem_t>>,
}

impl Semaphore {
    pub fn new(value: u32) -> anyhow::Result<Self> {
        let inner = UnsafeCell::new(MaybeUninit::uninit());
        unsafe { sem_init((*inner.get()).as_mut_ptr(), INTER_PROCESS, value).r("sem_init")? };
        Ok(Self { inner })
    }

    pub fn wait(&self) {
        loop {
            if unsafe { sem_wait(self.raw()) } == 0 {
                return;
            }
            match unsafe { *__errno_location() } {
                EINTR => continue,
                e => panic!("failed to wait for semaphore: {e}"),
            }
        }
    }

    /// Takes a permit without blocking, returns false if none is available.
    pub fn try_wait(&self) -> bool {
        loop {
            if unsafe { sem_trywait(self.raw()) } == 0 {
                return true;
            }
            match unsafe { *__errno_location() } {
                EAGAIN => return false,
                EINTR => continue,
                e => panic!("failed to try-wait semaphore: {e}"),
            }
        }
    }

    pub fn post(&self) {
        if unsafe { sem_post(self.raw()) } != 0 {
            panic!("failed to post semaphore");
        }
    }

    /// Snapshot of the permit count. Stale as soon as it is returned.
    pub fn value(&self) -> usize {
        let mut i: c_int = 0;
        if unsafe { sem_getvalue(self.raw(), &raw mut i) } != 0 {
            panic!("failed to read semaphore value");
        }
        i.max(0) as usize
    }

    fn raw(&self) -> *mut sem_t {
        unsafe { (*self.inner.get()).as_mut_ptr() }
    }
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if unsafe { sem_destroy(self.raw()) } != 0 {
            panic!("failed to destroy semaphore");
        }
    }
}
