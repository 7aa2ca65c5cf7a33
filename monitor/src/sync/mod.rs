mod condvar;
mod latch;
mod mutex;
mod semaphore;

pub use condvar::*;
pub use latch::*;
pub use mutex::*;
pub use semaphore::*;
