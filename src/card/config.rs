use std::time::Duration;

/// Timing and sizing knobs for the card refresh loop.
#[derive(Debug, Clone)]
pub struct CardConfig {
    /// Minimum spacing between two refresh runs.
    pub debounce: Duration,

    /// Fallback refresh if nothing else triggers one. Slightly longer than
    /// the reading cadence so a healthy feed always preempts it.
    pub watchdog: Duration,

    /// Readings at least this old are shown as stale.
    pub freshness_window: chrono::Duration,

    /// Required spacing between the two readings fetched for the delta.
    pub min_gap_minutes: u32,

    /// Side length of the square card image in pixels.
    pub image_size: u32,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            watchdog: Duration::from_secs(5 * 60 + 15),
            freshness_window: chrono::Duration::minutes(7),
            min_gap_minutes: 5,
            image_size: 256,
        }
    }
}
