//! In-memory collaborators for exercising the refresh core in tests.

use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::models::{ManagedRecord, Reading, RecordOperation};
use crate::schedule::lock;

use super::ports::{Clock, ReadingSource, RecordStore, RecordStoreError};

#[derive(Default)]
pub struct MemoryReadings {
    /// Newest first.
    readings: Mutex<Vec<Reading>>,
}

impl MemoryReadings {
    pub fn push(&self, reading: Reading) {
        let mut readings = lock(&self.readings);
        readings.push(reading);
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn clear(&self) {
        lock(&self.readings).clear();
    }
}

impl ReadingSource for MemoryReadings {
    async fn recent_readings(&self, min_gap_minutes: u32) -> Result<Vec<Reading>> {
        let readings = lock(&self.readings);
        let Some(latest) = readings.first() else {
            return Ok(Vec::new());
        };
        let cutoff = latest.timestamp - Duration::minutes(i64::from(min_gap_minutes));
        let mut recent = vec![latest.clone()];
        if let Some(previous) = readings.iter().find(|r| r.timestamp <= cutoff) {
            recent.push(previous.clone());
        }
        Ok(recent)
    }
}

#[derive(Default)]
pub struct MemoryRecords {
    records: Mutex<Vec<ManagedRecord>>,
    submitted: Mutex<Vec<&'static str>>,
    failure: Mutex<Option<RecordStoreError>>,
}

impl MemoryRecords {
    pub fn records(&self) -> Vec<ManagedRecord> {
        lock(&self.records).clone()
    }

    /// Kinds of every submitted operation, failed ones included.
    pub fn operation_kinds(&self) -> Vec<&'static str> {
        lock(&self.submitted).clone()
    }

    pub fn fail_with(&self, error: RecordStoreError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }
}

impl RecordStore for MemoryRecords {
    async fn find_by_name(&self, name: &str) -> Result<Option<ManagedRecord>, RecordStoreError> {
        Ok(lock(&self.records)
            .iter()
            .find(|record| record.name == name)
            .cloned())
    }

    async fn submit(&self, operation: RecordOperation) -> Result<(), RecordStoreError> {
        lock(&self.submitted).push(operation.kind());
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }

        let mut records = lock(&self.records);
        match operation {
            RecordOperation::Add(record) => {
                if records.iter().any(|existing| existing.name == record.name) {
                    return Err(RecordStoreError::DuplicateRecord);
                }
                records.push(record);
            }
            RecordOperation::Update(record) => {
                let slot = records
                    .iter_mut()
                    .find(|existing| existing.id == record.id)
                    .ok_or_else(|| RecordStoreError::DataAccessError("no such record".into()))?;
                *slot = record;
            }
            RecordOperation::Delete(record) => records.retain(|existing| existing.id != record.id),
        }
        Ok(())
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
