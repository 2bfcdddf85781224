use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::card::CardController;
use crate::db::Database;
use crate::settings::SettingsStore;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const POLL_INTERVAL_SECS: u64 = 10;

/// Watches the reading table and the settings file, turning new readings into
/// refresh requests and file edits into settings change events.
pub async fn poll_loop(
    db: Database,
    settings: Arc<SettingsStore>,
    controller: CardController<Database, Database>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(POLL_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_seen: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match db.latest_reading_timestamp().await {
                    Ok(latest) if latest.is_some() && latest != last_seen => {
                        log_info!("new reading at {:?}", latest);
                        last_seen = latest;
                        controller.on_refresh_trigger();
                    }
                    Ok(_) => {}
                    Err(err) => log_warn!("failed to poll readings: {err:?}"),
                }

                if let Err(err) = settings.reload() {
                    log_warn!("failed to reload settings: {err:?}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("poll loop shutting down");
                break;
            }
        }
    }
}
