//! Read/write cache in front of the keyed store, with change notification.

mod bus;
mod coalescer;
mod context;

pub use bus::{ChangeBus, Listener, Subscription};
pub use coalescer::ReadCoalescer;
pub use context::SyncContext;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a panicking holder poisoned it.
/// Every critical section here leaves the maps consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
