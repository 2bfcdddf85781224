//! Seams between the refresh core and the host environment.

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ManagedRecord, Reading, RecordOperation, Trend};
use crate::settings::GlucoseRange;

/// Why a record store operation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordStoreError {
    #[error("permission to the record store was denied")]
    PermissionDenied,
    #[error("record store could not be reached: {0}")]
    CommunicationError(String),
    #[error("a record with this name already exists")]
    DuplicateRecord,
    #[error("record store data access failed: {0}")]
    DataAccessError(String),
    #[error("record store failed with code {0}")]
    Unknown(i32),
}

impl RecordStoreError {
    pub fn category(&self) -> &'static str {
        match self {
            RecordStoreError::PermissionDenied => "permission-denied",
            RecordStoreError::CommunicationError(_) => "communication",
            RecordStoreError::DuplicateRecord => "duplicate-record",
            RecordStoreError::DataAccessError(_) => "data-access",
            RecordStoreError::Unknown(_) => "unknown",
        }
    }
}

pub trait ReadingSource: Send + Sync + 'static {
    /// Up to two readings, newest first. The second is at least
    /// `min_gap_minutes` older than the first.
    fn recent_readings(
        &self,
        min_gap_minutes: u32,
    ) -> impl Future<Output = Result<Vec<Reading>>> + Send;
}

pub trait RecordStore: Send + Sync + 'static {
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<ManagedRecord>, RecordStoreError>> + Send;

    fn submit(
        &self,
        operation: RecordOperation,
    ) -> impl Future<Output = Result<(), RecordStoreError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    MgDl,
    MmolL,
}

impl DisplayUnit {
    pub fn from_primary(use_primary_unit: bool) -> Self {
        if use_primary_unit {
            DisplayUnit::MgDl
        } else {
            DisplayUnit::MmolL
        }
    }
}

/// Everything a renderer needs. `value` is `None` when there is no reading.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub value: Option<f64>,
    pub unit: DisplayUnit,
    pub trend: Option<Trend>,
    pub range: GlucoseRange,
    pub is_up_to_date: bool,
    pub high_contrast: bool,
    pub disabled: bool,
    pub size: u32,
}

/// Must be deterministic: identical requests produce identical bytes.
pub trait CardRenderer: Send + Sync + 'static {
    fn render(&self, request: &RenderRequest) -> Result<Vec<u8>>;
}

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
