use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::models::Reading;
use crate::settings::CardSettings;

use super::config::CardConfig;
use super::ports::{CardRenderer, DisplayUnit, RenderRequest};

const MGDL_PER_MMOL: f64 = 18.0182;

pub const EMPTY_CAPTION: &str = "---";
pub const DISABLED_CAPTION: &str = "Off";

/// What gets written into the managed record on each refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayPayload {
    pub image: Vec<u8>,
    pub caption: String,
    pub is_stale: bool,
}

pub fn is_up_to_date(
    now: DateTime<Utc>,
    timestamp: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    now.signed_duration_since(timestamp) < window
}

pub fn convert(value_mgdl: f64, unit: DisplayUnit) -> f64 {
    match unit {
        DisplayUnit::MgDl => value_mgdl,
        DisplayUnit::MmolL => value_mgdl / MGDL_PER_MMOL,
    }
}

pub fn format_value(value_mgdl: f64, unit: DisplayUnit) -> String {
    match unit {
        DisplayUnit::MgDl => format!("{:.0}", convert(value_mgdl, unit)),
        DisplayUnit::MmolL => format!("{:.1}", convert(value_mgdl, unit)),
    }
}

fn format_delta(delta_mgdl: f64, unit: DisplayUnit) -> String {
    match unit {
        DisplayUnit::MgDl => format!("{:+.0}", convert(delta_mgdl, unit)),
        DisplayUnit::MmolL => format!("{:+.1}", convert(delta_mgdl, unit)),
    }
}

pub fn render_request(
    latest: Option<&Reading>,
    settings: &CardSettings,
    now: DateTime<Utc>,
    config: &CardConfig,
) -> RenderRequest {
    RenderRequest {
        value: latest.map(|reading| reading.value),
        unit: DisplayUnit::from_primary(settings.use_primary_unit),
        trend: latest
            .filter(|_| settings.show_trend)
            .map(|reading| reading.trend),
        range: settings.range,
        is_up_to_date: latest
            .map(|reading| is_up_to_date(now, reading.timestamp, config.freshness_window))
            .unwrap_or(false),
        high_contrast: settings.high_contrast,
        disabled: settings.is_disabled(),
        size: config.image_size,
    }
}

/// Text label for the record, e.g. `"112 ↗ +4"` or `"6.2 → (old)"`.
pub fn caption(readings: &[Reading], settings: &CardSettings, is_up_to_date: bool) -> String {
    if settings.is_disabled() {
        return DISABLED_CAPTION.to_string();
    }
    let Some(latest) = readings.first() else {
        return EMPTY_CAPTION.to_string();
    };

    let unit = DisplayUnit::from_primary(settings.use_primary_unit);
    let mut parts = vec![format_value(latest.value, unit)];

    if settings.show_trend && !latest.trend.arrow().is_empty() {
        parts.push(latest.trend.arrow().to_string());
    }
    if let Some(previous) = readings.get(1) {
        parts.push(format_delta(latest.value - previous.value, unit));
    }
    if !is_up_to_date {
        parts.push("(old)".to_string());
    }

    parts.join(" ")
}

pub fn build_payload(
    renderer: &dyn CardRenderer,
    readings: &[Reading],
    settings: &CardSettings,
    now: DateTime<Utc>,
    config: &CardConfig,
) -> Result<DisplayPayload> {
    let request = render_request(readings.first(), settings, now, config);
    let image = renderer
        .render(&request)
        .context("failed to render card image")?;

    Ok(DisplayPayload {
        image,
        caption: caption(readings, settings, request.is_up_to_date),
        is_stale: !request.is_up_to_date,
    })
}
