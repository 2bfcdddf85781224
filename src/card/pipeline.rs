use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::schedule::lock;
use crate::settings::{CardSettings, SettingsStore};

use super::config::CardConfig;
use super::payload::{build_payload, DisplayPayload};
use super::ports::{CardRenderer, Clock, ReadingSource, RecordStore, RecordStoreError};
use super::sync::{self, SyncAction};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub payload: DisplayPayload,
    pub had_reading: bool,
    /// `None` when nothing was submitted because store access is revoked.
    pub sync: Option<Result<SyncAction, RecordStoreError>>,
}

/// Store access after a permission denial. Only an explicit re-enable by the
/// user, seen after the card was switched off, lifts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreAccess {
    Granted,
    Revoked { disabled_in_settings: bool },
}

/// Reads the latest data, renders it and writes it to the record store.
pub struct RefreshPipeline<R, S> {
    readings: R,
    records: S,
    renderer: Arc<dyn CardRenderer>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsStore>,
    config: CardConfig,
    access: Mutex<StoreAccess>,
}

impl<R: ReadingSource, S: RecordStore> RefreshPipeline<R, S> {
    pub fn new(
        readings: R,
        records: S,
        renderer: Arc<dyn CardRenderer>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsStore>,
        config: CardConfig,
    ) -> Self {
        Self {
            readings,
            records,
            renderer,
            clock,
            settings,
            config,
            access: Mutex::new(StoreAccess::Granted),
        }
    }

    pub fn config(&self) -> &CardConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn readings(&self) -> &R {
        &self.readings
    }

    pub fn records(&self) -> &S {
        &self.records
    }

    /// True while a permission denial keeps the pipeline off the store.
    pub fn is_access_revoked(&self) -> bool {
        matches!(*lock(&self.access), StoreAccess::Revoked { .. })
    }

    fn check_access(&self, settings: &CardSettings) -> bool {
        let mut access = lock(&self.access);
        match *access {
            StoreAccess::Granted => true,
            StoreAccess::Revoked {
                disabled_in_settings: true,
            } if settings.enabled => {
                log_info!("card re-enabled after a permission denial; retrying the store");
                *access = StoreAccess::Granted;
                true
            }
            StoreAccess::Revoked { .. } => false,
        }
    }

    /// Sync failures are handled here and reported, never returned as `Err`.
    pub async fn run(&self) -> Result<RefreshReport> {
        let settings = self.settings.snapshot();
        let readings = self
            .readings
            .recent_readings(self.config.min_gap_minutes)
            .await
            .context("failed to load recent readings")?;

        let now = self.clock.now();
        let payload = build_payload(
            self.renderer.as_ref(),
            &readings,
            &settings,
            now,
            &self.config,
        )?;

        let sync = if self.check_access(&settings) {
            let result = sync::sync_record(&self.records, &payload, now).await;
            match &result {
                Ok(action) => log_info!(
                    "card {:?}: '{}' (stale: {}, {} bytes)",
                    action,
                    payload.caption,
                    payload.is_stale,
                    payload.image.len()
                ),
                Err(err) => self.handle_sync_error(err),
            }
            Some(result)
        } else {
            log::debug!("store access revoked; skipping sync of '{}'", payload.caption);
            None
        };

        Ok(RefreshReport {
            had_reading: !readings.is_empty(),
            payload,
            sync,
        })
    }

    pub async fn delete_managed_record(&self) -> Result<bool, RecordStoreError> {
        let result = sync::delete_managed_record(&self.records).await;
        match &result {
            Ok(true) => log_info!("managed record deleted"),
            Ok(false) => log_info!("no managed record to delete"),
            Err(err) => self.handle_sync_error(err),
        }
        result
    }

    fn handle_sync_error(&self, err: &RecordStoreError) {
        match err {
            RecordStoreError::PermissionDenied => self.revoke_access(),
            RecordStoreError::CommunicationError(reason) => {
                log_warn!("record store unreachable, waiting for next trigger: {reason}");
            }
            RecordStoreError::DuplicateRecord => {
                log_error!("duplicate managed record; two syncs must have raced");
            }
            RecordStoreError::DataAccessError(reason) => {
                log_error!("record store data access failed: {reason}");
            }
            RecordStoreError::Unknown(code) => {
                log_error!("record store failed with unknown code {code}");
            }
        }
    }

    fn revoke_access(&self) {
        log_error!("record store permission denied; disabling the card");
        let disabled_in_settings = match self.settings.set_enabled(false) {
            Ok(()) => true,
            Err(err) => {
                log_error!("failed to disable card after permission loss: {err:?}");
                false
            }
        };
        *lock(&self.access) = StoreAccess::Revoked {
            disabled_in_settings,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::render::PngCardRenderer;
    use crate::card::testing::{ManualClock, MemoryReadings, MemoryRecords};
    use crate::models::{Reading, Trend};
    use crate::settings::{CardSettings, SettingKey};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn pipeline(settings: CardSettings) -> RefreshPipeline<MemoryReadings, MemoryRecords> {
        let config = CardConfig {
            image_size: 48,
            ..CardConfig::default()
        };
        RefreshPipeline::new(
            MemoryReadings::default(),
            MemoryRecords::default(),
            Arc::new(PngCardRenderer),
            Arc::new(ManualClock::new(start())),
            Arc::new(SettingsStore::in_memory(settings)),
            config,
        )
    }

    #[tokio::test]
    async fn first_run_adds_then_updates() {
        let pipeline = pipeline(CardSettings::default());
        pipeline
            .readings()
            .push(Reading::new(104.0, start() - Duration::minutes(2), Trend::Flat));

        let report = pipeline.run().await.unwrap();
        assert!(report.had_reading);
        assert_eq!(report.sync, Some(Ok(SyncAction::Added)));
        assert_eq!(report.payload.caption, "104 →");

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.sync, Some(Ok(SyncAction::Updated)));
        assert_eq!(pipeline.records().operation_kinds(), vec!["add", "update"]);
        assert_eq!(pipeline.records().records()[0].image_data, report.payload.image);
    }

    #[tokio::test]
    async fn delta_uses_reading_at_least_min_gap_older() {
        let pipeline = pipeline(CardSettings::default());
        let readings = pipeline.readings();
        readings.push(Reading::new(100.0, start() - Duration::minutes(11), Trend::Flat));
        readings.push(Reading::new(110.0, start() - Duration::minutes(6), Trend::Flat));
        readings.push(Reading::new(116.0, start() - Duration::minutes(3), Trend::FortyFiveUp));
        readings.push(Reading::new(118.0, start() - Duration::minutes(1), Trend::FortyFiveUp));

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.payload.caption, "118 ↗ +8");
    }

    #[tokio::test]
    async fn no_readings_still_syncs_an_empty_card() {
        let pipeline = pipeline(CardSettings::default());

        let report = pipeline.run().await.unwrap();
        assert!(!report.had_reading);
        assert_eq!(report.payload.caption, "---");
        assert_eq!(report.sync, Some(Ok(SyncAction::Added)));
    }

    #[tokio::test]
    async fn sync_failures_are_swallowed() {
        let pipeline = pipeline(CardSettings::default());
        pipeline
            .records()
            .fail_with(RecordStoreError::DataAccessError("disk".into()));

        let report = pipeline.run().await.unwrap();
        assert!(matches!(report.sync, Some(Err(_))));
        assert!(pipeline.settings().snapshot().enabled);
    }

    #[tokio::test]
    async fn permission_denied_disables_the_feature() {
        let pipeline = pipeline(CardSettings::default());
        let mut changes = pipeline.settings().subscribe();
        pipeline
            .records()
            .fail_with(RecordStoreError::PermissionDenied);

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.sync, Some(Err(RecordStoreError::PermissionDenied)));
        assert!(!pipeline.settings().snapshot().enabled);
        assert_eq!(changes.try_recv().unwrap().key, SettingKey::Enabled);
    }

    #[tokio::test]
    async fn permission_denial_keeps_later_runs_off_the_store() {
        let pipeline = pipeline(CardSettings::default());
        pipeline
            .readings()
            .push(Reading::new(104.0, start() - Duration::minutes(2), Trend::Flat));
        pipeline
            .records()
            .fail_with(RecordStoreError::PermissionDenied);

        pipeline.run().await.unwrap();
        assert!(pipeline.is_access_revoked());

        for _ in 0..3 {
            let report = pipeline.run().await.unwrap();
            assert_eq!(report.sync, None);
            assert_eq!(report.payload.caption, "Off");
        }
        assert_eq!(pipeline.records().operation_kinds(), vec!["add"]);
    }

    #[tokio::test]
    async fn re_enabling_after_denial_restores_store_access() {
        let pipeline = pipeline(CardSettings::default());
        pipeline
            .records()
            .fail_with(RecordStoreError::PermissionDenied);
        pipeline.run().await.unwrap();

        pipeline.records().clear_failure();
        pipeline.settings().set_enabled(true).unwrap();

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.sync, Some(Ok(SyncAction::Added)));
        assert!(!pipeline.is_access_revoked());
    }

    #[tokio::test]
    async fn delete_is_a_no_op_without_record() {
        let pipeline = pipeline(CardSettings::default());

        assert_eq!(pipeline.delete_managed_record().await, Ok(false));
        assert!(pipeline.records().operation_kinds().is_empty());
    }
}
