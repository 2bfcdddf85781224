use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ManagedRecord, RecordOperation, MANAGED_RECORD_NAME};

use super::payload::DisplayPayload;
use super::ports::{RecordStore, RecordStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Added,
    Updated,
}

pub fn creation_note(created_at: DateTime<Utc>) -> String {
    format!(
        "Managed by readingcard v{}. Created {}. The picture and name are rewritten on every new reading.",
        env!("CARGO_PKG_VERSION"),
        created_at.to_rfc3339()
    )
}

/// Writes `payload` into the managed record, creating it on first use.
/// Submits exactly one operation.
pub async fn sync_record<S: RecordStore>(
    store: &S,
    payload: &DisplayPayload,
    now: DateTime<Utc>,
) -> Result<SyncAction, RecordStoreError> {
    match store.find_by_name(MANAGED_RECORD_NAME).await? {
        Some(existing) => {
            let updated = ManagedRecord {
                image_data: payload.image.clone(),
                label: payload.caption.clone(),
                ..existing
            };
            store.submit(RecordOperation::Update(updated)).await?;
            Ok(SyncAction::Updated)
        }
        None => {
            let record = ManagedRecord {
                id: Uuid::new_v4().to_string(),
                name: MANAGED_RECORD_NAME.to_string(),
                image_data: payload.image.clone(),
                label: payload.caption.clone(),
                note: creation_note(now),
            };
            store.submit(RecordOperation::Add(record)).await?;
            Ok(SyncAction::Added)
        }
    }
}

/// Returns whether a record was found and deleted.
pub async fn delete_managed_record<S: RecordStore>(store: &S) -> Result<bool, RecordStoreError> {
    match store.find_by_name(MANAGED_RECORD_NAME).await? {
        Some(existing) => {
            store.submit(RecordOperation::Delete(existing)).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::testing::MemoryRecords;
    use chrono::TimeZone;

    fn payload(caption: &str) -> DisplayPayload {
        DisplayPayload {
            image: vec![1, 2, 3],
            caption: caption.to_string(),
            is_stale: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn adds_when_missing() {
        let store = MemoryRecords::default();

        let action = sync_record(&store, &payload("120 →"), now()).await.unwrap();

        assert_eq!(action, SyncAction::Added);
        assert_eq!(store.operation_kinds(), vec!["add"]);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, MANAGED_RECORD_NAME);
        assert!(!records[0].note.is_empty());
        assert!(records[0].note.contains(env!("CARGO_PKG_VERSION")));
        assert!(records[0].note.contains("2026-03-01"));
    }

    #[tokio::test]
    async fn updates_in_place_when_present() {
        let store = MemoryRecords::default();
        sync_record(&store, &payload("120 →"), now()).await.unwrap();
        let original = store.records()[0].clone();

        let action = sync_record(&store, &payload("131 ↗"), now()).await.unwrap();

        assert_eq!(action, SyncAction::Updated);
        assert_eq!(store.operation_kinds(), vec!["add", "update"]);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, original.id);
        assert_eq!(records[0].note, original.note);
        assert_eq!(records[0].label, "131 ↗");
    }

    #[tokio::test]
    async fn failed_submit_surfaces_category() {
        let store = MemoryRecords::default();
        store.fail_with(RecordStoreError::CommunicationError("offline".into()));

        let err = sync_record(&store, &payload("120 →"), now())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "communication");
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn delete_without_record_submits_nothing() {
        let store = MemoryRecords::default();

        assert!(!delete_managed_record(&store).await.unwrap());
        assert!(store.operation_kinds().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_existing_record() {
        let store = MemoryRecords::default();
        sync_record(&store, &payload("120 →"), now()).await.unwrap();

        assert!(delete_managed_record(&store).await.unwrap());
        assert_eq!(store.operation_kinds(), vec!["add", "delete"]);
        assert!(store.records().is_empty());
    }
}
