use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction and rate of change reported by the sensor alongside a value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    #[default]
    NotComputable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::DoubleUp => "DoubleUp",
            Trend::SingleUp => "SingleUp",
            Trend::FortyFiveUp => "FortyFiveUp",
            Trend::Flat => "Flat",
            Trend::FortyFiveDown => "FortyFiveDown",
            Trend::SingleDown => "SingleDown",
            Trend::DoubleDown => "DoubleDown",
            Trend::NotComputable => "NotComputable",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::DoubleUp => "⇈",
            Trend::SingleUp => "↑",
            Trend::FortyFiveUp => "↗",
            Trend::Flat => "→",
            Trend::FortyFiveDown => "↘",
            Trend::SingleDown => "↓",
            Trend::DoubleDown => "⇊",
            Trend::NotComputable => "",
        }
    }
}

/// One sensor sample. Values are stored in mg/dL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// Feeds that cannot compute a direction leave this out.
    #[serde(default)]
    pub trend: Trend,
}

impl Reading {
    pub fn new(value: f64, timestamp: DateTime<Utc>, trend: Trend) -> Self {
        Self {
            value,
            timestamp,
            trend,
        }
    }
}
