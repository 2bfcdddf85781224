use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{ffi, params, ErrorCode, OptionalExtension};

use crate::card::{RecordStore, RecordStoreError};
use crate::db::{
    connection::{Database, WorkerUnavailable},
    helpers::format_datetime,
};
use crate::models::{ManagedRecord, RecordOperation};

/// Maps a database failure onto the record store error categories.
pub fn classify_error(err: &anyhow::Error) -> RecordStoreError {
    for cause in err.chain() {
        if let Some(unavailable) = cause.downcast_ref::<WorkerUnavailable>() {
            return RecordStoreError::CommunicationError(unavailable.to_string());
        }
        if let Some(rusqlite::Error::SqliteFailure(failure, message)) =
            cause.downcast_ref::<rusqlite::Error>()
        {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            return match failure.code {
                ErrorCode::ConstraintViolation
                    if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    RecordStoreError::DuplicateRecord
                }
                ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied => RecordStoreError::PermissionDenied,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    RecordStoreError::CommunicationError(detail)
                }
                ErrorCode::Unknown => RecordStoreError::Unknown(failure.extended_code),
                _ => RecordStoreError::DataAccessError(detail),
            };
        }
    }
    RecordStoreError::DataAccessError(format!("{err:#}"))
}

impl Database {
    pub async fn find_record_by_name(&self, name: &str) -> Result<Option<ManagedRecord>> {
        let name = name.to_string();
        self.execute(move |conn| {
            let record = conn
                .query_row(
                    "SELECT id, name, image_data, label, note
                     FROM managed_records WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok(ManagedRecord {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            image_data: row.get(2)?,
                            label: row.get(3)?,
                            note: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    pub async fn apply_record_operation(&self, operation: RecordOperation) -> Result<()> {
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            match operation {
                RecordOperation::Add(record) => {
                    conn.execute(
                        "INSERT INTO managed_records
                            (id, name, image_data, label, note, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        params![
                            record.id,
                            record.name,
                            record.image_data,
                            record.label,
                            record.note,
                            now,
                        ],
                    )
                    .context("failed to insert managed record")?;
                }
                RecordOperation::Update(record) => {
                    let changed = conn
                        .execute(
                            "UPDATE managed_records
                             SET image_data = ?1, label = ?2, note = ?3, updated_at = ?4
                             WHERE id = ?5",
                            params![record.image_data, record.label, record.note, now, record.id],
                        )
                        .context("failed to update managed record")?;
                    if changed == 0 {
                        bail!("managed record {} no longer exists", record.id);
                    }
                }
                RecordOperation::Delete(record) => {
                    conn.execute(
                        "DELETE FROM managed_records WHERE id = ?1",
                        params![record.id],
                    )
                    .context("failed to delete managed record")?;
                }
            }
            Ok(())
        })
        .await
    }
}

impl RecordStore for Database {
    async fn find_by_name(&self, name: &str) -> Result<Option<ManagedRecord>, RecordStoreError> {
        self.find_record_by_name(name)
            .await
            .map_err(|err| classify_error(&err))
    }

    async fn submit(&self, operation: RecordOperation) -> Result<(), RecordStoreError> {
        self.apply_record_operation(operation)
            .await
            .map_err(|err| classify_error(&err))
    }
}
