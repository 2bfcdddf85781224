pub mod debouncer;
pub mod task;
pub mod watchdog;

pub use debouncer::Debouncer;
pub use task::{schedule_after, TaskHandle};
pub use watchdog::{Watchdog, WatchdogState};

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
