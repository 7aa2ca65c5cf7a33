use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    ops::{Deref, DerefMut},
    ptr::null,
};

use libc::{
    pthread_mutex_destroy, pthread_mutex_init, pthread_mutex_lock, pthread_mutex_t,
    pthread_mutex_unlock,
};

use crate::CheckOk;

#[derive(Debug)]
pub struct Mutex<T> {
    inner: UnsafeCell<MaybeUninit<pthread_mutex_t>>,
    data: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    pub fn new(data: T) -> anyhow::Result<Self> {
        let inner = UnsafeCell::new(MaybeUninit::uninit());
        unsafe {
            pthread_mutex_init((*inner.get()).as_mut_ptr(), null()).r("mutex_init")?;
        }

        Ok(Self {
            inner,
            data: UnsafeCell::new(data),
        })
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        unsafe {
            if pthread_mutex_lock((*self.inner.get()).as_mut_ptr()) != 0 {
                panic!("failed to lock mutex");
            }
            MutexGuard {
                lock: self,
                data: &mut *self.data.get(),
            }
        }
    }

    pub fn into_inner(self) -> T {
        let this = std::mem::ManuallyDrop::new(self);
        unsafe {
            let data = std::ptr::read(this.data.get());
            if pthread_mutex_destroy((*this.inner.get()).as_mut_ptr()) != 0 {
                panic!("failed to destroy mutex");
            }
            data
        }
    }
}

pub struct MutexGuard<'a, T: 'a> {
    lock: &'a Mutex<T>,
    data: &'a mut T,
}

impl<'a, T: 'a> MutexGuard<'a, T> {
    pub(crate) fn get_inner_lock(&self) -> *mut pthread_mutex_t {
        unsafe { (*self.lock.inner.get()).as_mut_ptr() }
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.data
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.data
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        unsafe {
            if pthread_mutex_unlock(self.get_inner_lock()) != 0 {
                panic!("failed to unlock mutex");
            }
        }
    }
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Drop for Mutex<T> {
    fn drop(&mut self) {
        if unsafe { pthread_mutex_destroy((*self.inner.get()).as_mut_ptr()) } != 0 {
            panic!("failed to destroy mutex");
        }
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::Mutex;

    #[test]
    fn serializes_increments() {
        let counter = Mutex::new(0usize).unwrap();
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                });
            }
        });
        assert_eq!(counter.into_inner(), 8000);
    }

    #[test]
    #[should_panic(expected = "failed to destroy mutex")]
    fn into_inner_rejects_a_held_lock() {
        let mutex = Mutex::new(vec![1, 2, 3]).unwrap();
        // the guard is leaked, so the mutex is still locked when it is destroyed
        std::mem::forget(mutex.lock());
        mutex.into_inner();
    }
}
