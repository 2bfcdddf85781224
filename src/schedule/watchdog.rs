use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use tokio::time::Duration;

use super::{lock, schedule_after, TaskHandle};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Armed,
    /// Fallback is running; goes back to `Armed` once the refresh re-arms it.
    Fired,
}

/// Single-slot fallback timer. Arming always replaces whatever was pending.
#[derive(Clone)]
pub struct Watchdog {
    interval: Duration,
    inner: Arc<WatchdogInner>,
}

struct WatchdogInner {
    pending: Mutex<Option<TaskHandle>>,
    state: Mutex<WatchdogState>,
    fired_count: AtomicU64,
    cancelled_count: AtomicU64,
}

impl Watchdog {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            inner: Arc::new(WatchdogInner {
                pending: Mutex::new(None),
                state: Mutex::new(WatchdogState::Idle),
                fired_count: AtomicU64::new(0),
                cancelled_count: AtomicU64::new(0),
            }),
        }
    }

    pub fn arm<F, Fut>(&self, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = self.inner.clone();
        let interval = self.interval;

        let mut pending = lock(&self.inner.pending);
        if let Some(previous) = pending.take() {
            if previous.cancel() {
                self.inner.cancelled_count.fetch_add(1, Ordering::SeqCst);
            }
        }

        *pending = Some(schedule_after(interval, async move {
            *lock(&inner.state) = WatchdogState::Fired;
            inner.fired_count.fetch_add(1, Ordering::SeqCst);
            log_warn!(
                "no refresh for {}s; forcing one so staleness is shown",
                interval.as_secs()
            );
            on_fire().await;
        }));
        *lock(&self.inner.state) = WatchdogState::Armed;
    }

    pub fn disarm(&self) {
        if let Some(previous) = lock(&self.inner.pending).take() {
            if previous.cancel() {
                self.inner.cancelled_count.fetch_add(1, Ordering::SeqCst);
                log_info!("watchdog disarmed");
            }
        }
        *lock(&self.inner.state) = WatchdogState::Idle;
    }

    pub fn state(&self) -> WatchdogState {
        *lock(&self.inner.state)
    }

    /// Always 0 or 1.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending)
            .iter()
            .filter(|handle| handle.is_pending())
            .count()
    }

    pub fn fired_count(&self) -> u64 {
        self.inner.fired_count.load(Ordering::SeqCst)
    }

    pub fn cancelled_count(&self) -> u64 {
        self.inner.cancelled_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    const INTERVAL: Duration = Duration::from_secs(315);

    #[tokio::test(start_paused = true)]
    async fn starts_idle() {
        let watchdog = Watchdog::new(INTERVAL);
        assert_eq!(watchdog.state(), WatchdogState::Idle);
        assert_eq!(watchdog.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_previous_task() {
        let watchdog = Watchdog::new(INTERVAL);
        let fires = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let fires = fires.clone();
            watchdog.arm(move || async move {
                fires.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(watchdog.pending_count(), 1);
            assert_eq!(watchdog.state(), WatchdogState::Armed);
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        assert_eq!(watchdog.cancelled_count(), 2);
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(watchdog.state(), WatchdogState::Fired);
        assert_eq!(watchdog.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_interval() {
        let watchdog = Watchdog::new(INTERVAL);
        let fires = Arc::new(AtomicU32::new(0));
        {
            let fires = fires.clone();
            watchdog.arm(move || async move {
                fires.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(watchdog.fired_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_returns_to_idle() {
        let watchdog = Watchdog::new(INTERVAL);
        let fires = Arc::new(AtomicU32::new(0));
        {
            let fires = fires.clone();
            watchdog.arm(move || async move {
                fires.fetch_add(1, Ordering::SeqCst);
            });
        }

        watchdog.disarm();
        assert_eq!(watchdog.state(), WatchdogState::Idle);
        tokio::time::sleep(INTERVAL * 2).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);
    }
}
