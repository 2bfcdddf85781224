use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::debug;
use tokio::time::{Duration, Instant};

use super::{lock, schedule_after, TaskHandle};

/// Coalesces bursts of requests into a single run, spaced at least `delay`
/// after the previous run.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    inner: Arc<DebouncerInner>,
}

struct DebouncerInner {
    last_fired: Mutex<Option<Instant>>,
    pending: Mutex<Option<TaskHandle>>,
    /// Held for the whole action so runs never overlap.
    run_lock: tokio::sync::Mutex<()>,
    fired_count: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::new(DebouncerInner {
                last_fired: Mutex::new(None),
                pending: Mutex::new(None),
                run_lock: tokio::sync::Mutex::new(()),
                fired_count: AtomicU64::new(0),
            }),
        }
    }

    /// Replaces any pending run with `action`.
    pub fn request<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay_at(Instant::now());
        let inner = self.inner.clone();

        let handle = schedule_after(delay, async move {
            let _running = inner.run_lock.lock().await;
            *lock(&inner.last_fired) = Some(Instant::now());
            inner.fired_count.fetch_add(1, Ordering::SeqCst);
            action().await;
        });

        let mut pending = lock(&self.inner.pending);
        if let Some(previous) = pending.replace(handle) {
            if previous.cancel() {
                debug!("debounced pending refresh; next run in {delay:?}");
            }
        }
    }

    /// Delay a request made at `now` has to wait before firing.
    pub fn delay_at(&self, now: Instant) -> Duration {
        match *lock(&self.inner.last_fired) {
            None => Duration::ZERO,
            Some(last) => (last + self.delay).saturating_duration_since(now),
        }
    }

    pub fn cancel_pending(&self) -> bool {
        lock(&self.inner.pending)
            .take()
            .map(|handle| handle.cancel())
            .unwrap_or(false)
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.inner.pending)
            .as_ref()
            .map(TaskHandle::is_pending)
            .unwrap_or(false)
    }

    pub fn last_fired(&self) -> Option<Instant> {
        *lock(&self.inner.last_fired)
    }

    pub fn fired_count(&self) -> u64 {
        self.inner.fired_count.load(Ordering::SeqCst)
    }
}
