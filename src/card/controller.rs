use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::schedule::{Debouncer, Watchdog, WatchdogState};
use crate::settings::SettingChange;

use super::pipeline::RefreshPipeline;
use super::ports::{ReadingSource, RecordStore, RecordStoreError};
use super::trigger::{spawn_settings_trigger, RefreshTrigger};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Host-facing entry point: debounces refresh requests, runs the pipeline and
/// keeps the watchdog armed while there is data to show.
pub struct CardController<R, S> {
    inner: Arc<ControllerInner<R, S>>,
}

struct ControllerInner<R, S> {
    pipeline: RefreshPipeline<R, S>,
    debouncer: Debouncer,
    watchdog: Watchdog,
    refresh_count: AtomicU64,
    /// Whether the card last written carries a reading.
    showing_reading: AtomicBool,
    shutdown: CancellationToken,
}

impl<R, S> Clone for CardController<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: ReadingSource, S: RecordStore> CardController<R, S> {
    pub fn new(pipeline: RefreshPipeline<R, S>) -> Self {
        let debouncer = Debouncer::new(pipeline.config().debounce);
        let watchdog = Watchdog::new(pipeline.config().watchdog);

        Self {
            inner: Arc::new(ControllerInner {
                pipeline,
                debouncer,
                watchdog,
                refresh_count: AtomicU64::new(0),
                showing_reading: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Call on new data or a relevant settings change.
    pub fn on_refresh_trigger(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let this = self.clone();
        self.inner
            .debouncer
            .request(move || async move { this.refresh_now().await });
    }

    /// One-shot removal of the managed record. Not debounced.
    pub async fn delete_managed_record(&self) -> Result<bool, RecordStoreError> {
        self.inner.pipeline.delete_managed_record().await
    }

    pub fn watch_settings(&self, changes: broadcast::Receiver<SettingChange>) -> JoinHandle<()> {
        spawn_settings_trigger(changes, self.clone(), self.inner.shutdown.clone())
    }

    /// Cancels pending work. A refresh already running is left to finish.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.debouncer.cancel_pending();
        self.inner.watchdog.disarm();
        log_info!("card controller shut down");
    }

    pub fn pipeline(&self) -> &RefreshPipeline<R, S> {
        &self.inner.pipeline
    }

    pub fn watchdog_state(&self) -> WatchdogState {
        self.inner.watchdog.state()
    }

    pub fn pending_watchdogs(&self) -> usize {
        self.inner.watchdog.pending_count()
    }

    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::SeqCst)
    }

    async fn refresh_now(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        match self.inner.pipeline.run().await {
            Ok(report) => {
                self.inner.refresh_count.fetch_add(1, Ordering::SeqCst);
                self.inner
                    .showing_reading
                    .store(report.had_reading, Ordering::SeqCst);
            }
            // The card on display is unchanged and keeps aging.
            Err(err) => log_error!("card refresh failed: {err:?}"),
        }
        self.rearm_watchdog();
    }

    /// Every refresh leaves the watchdog either armed or idle, never fired.
    fn rearm_watchdog(&self) {
        let has_data = self.inner.showing_reading.load(Ordering::SeqCst);
        let live = !self.inner.shutdown.is_cancelled() && !self.inner.pipeline.is_access_revoked();
        if has_data && live {
            let this = self.clone();
            self.inner
                .watchdog
                .arm(move || async move { this.on_refresh_trigger() });
        } else {
            // Nothing on display can go stale, or the store is off limits.
            self.inner.watchdog.disarm();
        }
    }
}

impl<R: ReadingSource, S: RecordStore> RefreshTrigger for CardController<R, S> {
    fn on_refresh_trigger(&self) {
        CardController::on_refresh_trigger(self);
    }
}
