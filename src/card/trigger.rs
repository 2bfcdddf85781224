use log::{debug, info, warn};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::settings::SettingChange;

/// Anything that can be asked for a refresh.
pub trait RefreshTrigger: Send + Sync + 'static {
    fn on_refresh_trigger(&self);
}

/// Forwards every settings change as a refresh request until `cancel` fires
/// or the settings store goes away. Keys are not distinguished.
pub fn spawn_settings_trigger<T: RefreshTrigger>(
    mut changes: broadcast::Receiver<SettingChange>,
    target: T,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(change) => {
                        debug!("setting '{}' changed; requesting refresh", change.key.as_str());
                        target.on_refresh_trigger();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("missed {missed} settings changes; requesting refresh");
                        target.on_refresh_trigger();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("settings trigger stopped");
    })
}
