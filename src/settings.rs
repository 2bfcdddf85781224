use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeviceRole {
    Primary,
    /// Mirrors readings from another device and relies on keep-alive to refresh.
    Follower,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum KeepAliveMode {
    Disabled,
    Normal,
    Aggressive,
}

/// Thresholds in mg/dL used to pick the card colour band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlucoseRange {
    pub urgent_low: f64,
    pub low: f64,
    pub high: f64,
    pub urgent_high: f64,
}

impl Default for GlucoseRange {
    fn default() -> Self {
        Self {
            urgent_low: 55.0,
            low: 70.0,
            high: 180.0,
            urgent_high: 250.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CardSettings {
    pub enabled: bool,
    pub show_trend: bool,
    pub high_contrast: bool,
    /// mg/dL when true, mmol/L otherwise.
    pub use_primary_unit: bool,
    pub role: DeviceRole,
    pub keep_alive: KeepAliveMode,
    pub range: GlucoseRange,
}

impl Default for CardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_trend: true,
            high_contrast: false,
            use_primary_unit: true,
            role: DeviceRole::Primary,
            keep_alive: KeepAliveMode::Normal,
            range: GlucoseRange::default(),
        }
    }
}

impl CardSettings {
    /// A follower without keep-alive would show data that silently goes stale.
    pub fn is_disabled(&self) -> bool {
        !self.enabled
            || (self.role == DeviceRole::Follower && self.keep_alive == KeepAliveMode::Disabled)
    }
}

/// Settings keys whose changes are broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Enabled,
    ShowTrend,
    HighContrast,
    UsePrimaryUnit,
    Role,
    KeepAliveMode,
}

impl SettingKey {
    pub const OBSERVED: [SettingKey; 6] = [
        SettingKey::Enabled,
        SettingKey::ShowTrend,
        SettingKey::HighContrast,
        SettingKey::UsePrimaryUnit,
        SettingKey::Role,
        SettingKey::KeepAliveMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Enabled => "enabled",
            SettingKey::ShowTrend => "showTrend",
            SettingKey::HighContrast => "highContrast",
            SettingKey::UsePrimaryUnit => "usePrimaryUnit",
            SettingKey::Role => "role",
            SettingKey::KeepAliveMode => "keepAlive",
        }
    }

    fn differs(&self, old: &CardSettings, new: &CardSettings) -> bool {
        match self {
            SettingKey::Enabled => old.enabled != new.enabled,
            SettingKey::ShowTrend => old.show_trend != new.show_trend,
            SettingKey::HighContrast => old.high_contrast != new.high_contrast,
            SettingKey::UsePrimaryUnit => old.use_primary_unit != new.use_primary_unit,
            SettingKey::Role => old.role != new.role,
            SettingKey::KeepAliveMode => old.keep_alive != new.keep_alive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
}

pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<CardSettings>,
    changes: broadcast::Sender<SettingChange>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err}", path.display());
                CardSettings::default()
            })
        } else {
            CardSettings::default()
        };

        Ok(Self::with_data(Some(path), data))
    }

    /// Settings that live only for the lifetime of the process.
    pub fn in_memory(settings: CardSettings) -> Self {
        Self::with_data(None, settings)
    }

    fn with_data(path: Option<PathBuf>, data: CardSettings) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path,
            data: RwLock::new(data),
            changes,
        }
    }

    pub fn snapshot(&self) -> CardSettings {
        self.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }

    /// Applies `apply`, persists the result and notifies subscribers once per
    /// observed key whose value actually changed. Nothing changes in memory
    /// unless the write to disk succeeds.
    pub fn update<F>(&self, apply: F) -> Result<Vec<SettingKey>>
    where
        F: FnOnce(&mut CardSettings),
    {
        let changed = {
            let mut guard = self.write();
            let mut next = guard.clone();
            apply(&mut next);
            self.persist(&next)?;
            let changed = changed_keys(&guard, &next);
            *guard = next;
            changed
        };

        self.notify(&changed);
        Ok(changed)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|settings| settings.enabled = enabled).map(|_| ())
    }

    fn notify(&self, keys: &[SettingKey]) {
        for key in keys {
            // No receivers is fine; nobody is watching yet.
            let _ = self.changes.send(SettingChange { key: *key });
        }
    }

    fn persist(&self, data: &CardSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, CardSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CardSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SettingsStore {
    /// Re-reads the settings file, notifying subscribers of any external edits.
    pub fn reload(&self) -> Result<Vec<SettingKey>> {
        let Some(path) = self.path.as_ref().filter(|path| path.exists()) else {
            return Ok(Vec::new());
        };
        let contents = fs::read_to_string(path)?;
        let data: CardSettings = serde_json::from_str(&contents)?;
        let changed = {
            let mut guard = self.write();
            let changed = changed_keys(&guard, &data);
            *guard = data;
            changed
        };
        self.notify(&changed);
        Ok(changed)
    }
}

fn changed_keys(before: &CardSettings, after: &CardSettings) -> Vec<SettingKey> {
    SettingKey::OBSERVED
        .iter()
        .copied()
        .filter(|key| key.differs(before, after))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_feature_off_regardless_of_role() {
        for role in [DeviceRole::Primary, DeviceRole::Follower] {
            for keep_alive in [
                KeepAliveMode::Disabled,
                KeepAliveMode::Normal,
                KeepAliveMode::Aggressive,
            ] {
                let settings = CardSettings {
                    enabled: false,
                    role,
                    keep_alive,
                    ..CardSettings::default()
                };
                assert!(settings.is_disabled());
            }
        }
    }

    #[test]
    fn follower_without_keep_alive_is_disabled() {
        let settings = CardSettings {
            role: DeviceRole::Follower,
            keep_alive: KeepAliveMode::Disabled,
            ..CardSettings::default()
        };
        assert!(settings.is_disabled());

        let primary = CardSettings {
            keep_alive: KeepAliveMode::Disabled,
            ..CardSettings::default()
        };
        assert!(!primary.is_disabled());
    }

    #[test]
    fn update_broadcasts_only_changed_keys() {
        let store = SettingsStore::in_memory(CardSettings::default());
        let mut rx = store.subscribe();

        let changed = store
            .update(|s| {
                s.high_contrast = true;
                s.show_trend = true;
                s.range.high = 200.0;
            })
            .unwrap();

        assert_eq!(changed, vec![SettingKey::HighContrast]);
        assert_eq!(rx.try_recv().unwrap().key, SettingKey::HighContrast);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store.set_enabled(false).unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap();
        assert!(!reopened.snapshot().enabled);

        fs::write(&path, r#"{"enabled": true, "role": "follower"}"#).unwrap();
        let mut rx = reopened.subscribe();
        let changed = reopened.reload().unwrap();
        assert_eq!(changed, vec![SettingKey::Enabled, SettingKey::Role]);
        assert_eq!(rx.try_recv().unwrap().key, SettingKey::Enabled);
        assert!(reopened.snapshot().show_trend);
    }

    #[test]
    fn failed_write_leaves_settings_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("settings.json");
        let store = SettingsStore::new(path).unwrap();
        let mut rx = store.subscribe();

        assert!(store.set_enabled(false).is_err());

        assert!(store.snapshot().enabled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.snapshot(), CardSettings::default());
    }
}
