pub mod channel;
pub mod semaphore;
pub mod session;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use channel::SyncChannel;
pub use semaphore::Semaphore;
pub use session::{Item, ProducerConsumer, SessionPlan, SessionReport};

/// Locks `mutex`, recovering the data if another holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
