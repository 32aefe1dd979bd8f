use std::sync::{Condvar, Mutex, PoisonError};

use super::lock;

/// Counting semaphore.
///
/// `acquire` takes one permit, blocking on the condition variable while none
/// is left; `release` returns one and wakes a single waiter. A semaphore
/// created with one permit is a mutex.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    pub fn acquire(&self) {
        let guard = lock(&self.permits);
        let mut permits = self
            .available
            .wait_while(guard, |permits| *permits == 0)
            .unwrap_or_else(PoisonError::into_inner);
        *permits -= 1;
    }

    pub fn release(&self) {
        *lock(&self.permits) += 1;
        self.available.notify_one();
    }

    pub fn available(&self) -> usize {
        *lock(&self.permits)
    }
}
