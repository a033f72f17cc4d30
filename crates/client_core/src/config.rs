use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::load_queue::LoadQueueConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub min_interval_ms: u64,
    pub cooldown_ms: u64,
}

impl QueueSettings {
    pub fn to_config(self) -> LoadQueueConfig {
        LoadQueueConfig {
            batch_size: self.batch_size.max(1),
            max_concurrency: self.max_concurrency.max(1),
            min_interval: Duration::from_millis(self.min_interval_ms),
            cooldown: Duration::from_millis(self.cooldown_ms),
        }
    }
}

impl From<LoadQueueConfig> for QueueSettings {
    fn from(config: LoadQueueConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency,
            min_interval_ms: config.min_interval.as_millis() as u64,
            cooldown_ms: config.cooldown.as_millis() as u64,
        }
    }
}

/// A queue table as written in the settings file. Keys left out keep the
/// value of the preset the table is layered onto.
#[derive(Debug, Deserialize)]
struct QueueTable {
    batch_size: Option<usize>,
    max_concurrency: Option<usize>,
    min_interval_ms: Option<u64>,
    cooldown_ms: Option<u64>,
}

impl QueueTable {
    fn layered_on(self, preset: LoadQueueConfig) -> QueueSettings {
        let preset = QueueSettings::from(preset);
        QueueSettings {
            batch_size: self.batch_size.unwrap_or(preset.batch_size),
            max_concurrency: self.max_concurrency.unwrap_or(preset.max_concurrency),
            min_interval_ms: self.min_interval_ms.unwrap_or(preset.min_interval_ms),
            cooldown_ms: self.cooldown_ms.unwrap_or(preset.cooldown_ms),
        }
    }
}

fn message_queue<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QueueSettings, D::Error> {
    QueueTable::deserialize(deserializer).map(|table| table.layered_on(LoadQueueConfig::MESSAGES))
}

fn guild_queue<'de, D: Deserializer<'de>>(deserializer: D) -> Result<QueueSettings, D::Error> {
    QueueTable::deserialize(deserializer).map(|table| table.layered_on(LoadQueueConfig::GUILDS))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub page_size: u32,
    pub hydrate_fetched_pages: bool,
    #[serde(deserialize_with = "message_queue")]
    pub message_queue: QueueSettings,
    #[serde(deserialize_with = "guild_queue")]
    pub guild_queue: QueueSettings,
    pub typing_interval_ms: u64,
    pub typing_expiry_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            hydrate_fetched_pages: true,
            message_queue: LoadQueueConfig::MESSAGES.into(),
            guild_queue: LoadQueueConfig::GUILDS.into(),
            typing_interval_ms: 8_000,
            typing_expiry_ms: 10_000,
        }
    }
}

impl SyncSettings {
    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_interval_ms)
    }

    pub fn typing_expiry(&self) -> Duration {
        Duration::from_millis(self.typing_expiry_ms)
    }
}

/// Defaults, then the optional TOML file, then `APP__*` environment overrides.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SyncSettings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
            toml::from_str::<SyncSettings>(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?
        }
        None => SyncSettings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub fn apply_env_overrides(settings: &mut SyncSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = parsed(&lookup, "APP__PAGE_SIZE") {
        settings.page_size = v;
    }
    if let Some(v) = parsed(&lookup, "APP__HYDRATE_FETCHED_PAGES") {
        settings.hydrate_fetched_pages = v;
    }
    if let Some(v) = parsed(&lookup, "APP__MESSAGE_BATCH_SIZE") {
        settings.message_queue.batch_size = v;
    }
    if let Some(v) = parsed(&lookup, "APP__MESSAGE_MAX_CONCURRENCY") {
        settings.message_queue.max_concurrency = v;
    }
    if let Some(v) = parsed(&lookup, "APP__GUILD_BATCH_SIZE") {
        settings.guild_queue.batch_size = v;
    }
    if let Some(v) = parsed(&lookup, "APP__GUILD_MAX_CONCURRENCY") {
        settings.guild_queue.max_concurrency = v;
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable setting override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
