use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Trend;

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_trend(value: &str) -> Result<Trend> {
    match value {
        "DoubleUp" => Ok(Trend::DoubleUp),
        "SingleUp" => Ok(Trend::SingleUp),
        "FortyFiveUp" => Ok(Trend::FortyFiveUp),
        "Flat" => Ok(Trend::Flat),
        "FortyFiveDown" => Ok(Trend::FortyFiveDown),
        "SingleDown" => Ok(Trend::SingleDown),
        "DoubleDown" => Ok(Trend::DoubleDown),
        "NotComputable" => Ok(Trend::NotComputable),
        other => Err(anyhow!("unknown trend {other}")),
    }
}

/// Wraps a conversion failure inside a row mapper.
pub fn conversion_error(err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}
