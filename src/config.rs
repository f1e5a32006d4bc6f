use std::time::Duration;

use anyhow::Result;
use duration_str::deserialize_duration;
use serde::Deserialize;
use teloxide::types::ChatId;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Log level passed to the tracing env filter
    pub log_level: String,
    /// Directory containing one sub-directory of templates per locale
    pub templates_dir: String,
    /// Locale used when a template is missing for the requested one
    pub default_locale: String,
    /// How long transient bot replies (e.g. the settings menu) stay around
    #[serde(deserialize_with = "deserialize_duration")]
    pub menu_ttl: Duration,
    pub telegram: Telegram,
    pub broadcast: Broadcast,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Telegram {
    /// Bot token
    pub token: String,
    /// Chat ids of the bot administrators
    pub admin_ids: Vec<ChatId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Broadcast {
    /// Outbound send-rate ceiling, kept below Telegram's documented 30/s
    #[serde(default = "default_max_messages_per_second")]
    pub max_messages_per_second: u32,
}

fn default_max_messages_per_second() -> u32 {
    20
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }
}
