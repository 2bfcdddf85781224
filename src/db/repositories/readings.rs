use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::card::ReadingSource;
use crate::db::{
    connection::Database,
    helpers::{conversion_error, format_datetime, parse_datetime, parse_trend},
};
use crate::models::Reading;

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let value: f64 = row.get(0)?;
    let timestamp_str: String = row.get(1)?;
    let trend_str: String = row.get(2)?;

    Ok(Reading {
        value,
        timestamp: parse_datetime(&timestamp_str, "timestamp").map_err(conversion_error)?,
        trend: parse_trend(&trend_str).map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let record = reading.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO readings (value, timestamp, trend) VALUES (?1, ?2, ?3)",
                params![
                    record.value,
                    format_datetime(&record.timestamp),
                    record.trend.as_str(),
                ],
            )
            .context("failed to insert reading")?;
            Ok(())
        })
        .await
    }

    pub async fn latest_reading_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.execute(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT timestamp FROM readings ORDER BY timestamp DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|value| parse_datetime(&value, "timestamp"))
                .transpose()
        })
        .await
    }

    /// Newest reading plus the newest one at least `min_gap_minutes` older.
    pub async fn get_recent_readings(&self, min_gap_minutes: u32) -> Result<Vec<Reading>> {
        self.execute(move |conn| {
            let latest = conn
                .query_row(
                    "SELECT value, timestamp, trend FROM readings
                     ORDER BY timestamp DESC LIMIT 1",
                    [],
                    reading_from_row,
                )
                .optional()
                .context("failed to load latest reading")?;

            let Some(latest) = latest else {
                return Ok(Vec::new());
            };

            let cutoff = latest.timestamp - Duration::minutes(i64::from(min_gap_minutes));
            let previous = conn
                .query_row(
                    "SELECT value, timestamp, trend FROM readings
                     WHERE timestamp <= ?1
                     ORDER BY timestamp DESC LIMIT 1",
                    params![format_datetime(&cutoff)],
                    reading_from_row,
                )
                .optional()
                .context("failed to load previous reading")?;

            let mut readings = vec![latest];
            readings.extend(previous);
            Ok(readings)
        })
        .await
    }

    pub async fn prune_readings_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM readings WHERE timestamp < ?1",
                    params![format_datetime(&cutoff)],
                )
                .context("failed to prune readings")?;
            Ok(removed)
        })
        .await
    }
}

impl ReadingSource for Database {
    async fn recent_readings(&self, min_gap_minutes: u32) -> Result<Vec<Reading>> {
        self.get_recent_readings(min_gap_minutes).await
    }
}
