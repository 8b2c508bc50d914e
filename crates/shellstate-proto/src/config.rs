use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE_PATH: &str = "~/.config/shellstate/config.toml";

/// Per-subsystem polling periods, in seconds.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    #[serde(default = "default_wifi_poll")]
    pub wifi_secs: u64,
    #[serde(default = "default_bluetooth_poll")]
    pub bluetooth_secs: u64,
    #[serde(default = "default_audio_poll")]
    pub audio_secs: u64,
    #[serde(default = "default_hypr_poll")]
    pub hypr_secs: u64,
    #[serde(default = "default_battery_poll")]
    pub battery_secs: u64,
    #[serde(default = "default_media_poll")]
    pub media_secs: u64,
    #[serde(default = "default_system_poll")]
    pub system_secs: u64,
}

fn default_wifi_poll() -> u64 {
    10
}

fn default_bluetooth_poll() -> u64 {
    10
}

fn default_audio_poll() -> u64 {
    3
}

fn default_hypr_poll() -> u64 {
    2
}

fn default_battery_poll() -> u64 {
    30
}

fn default_media_poll() -> u64 {
    2
}

fn default_system_poll() -> u64 {
    300
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            wifi_secs: default_wifi_poll(),
            bluetooth_secs: default_bluetooth_poll(),
            audio_secs: default_audio_poll(),
            hypr_secs: default_hypr_poll(),
            battery_secs: default_battery_poll(),
            media_secs: default_media_poll(),
            system_secs: default_system_poll(),
        }
    }
}

/// Cache time-to-live windows, in seconds.
///
/// Freshness gates whether a read triggers a refresh; it never blocks
/// serving the cached value.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TtlConfig {
    #[serde(default = "default_updates_ttl")]
    pub updates_secs: u64,
    #[serde(default = "default_news_ttl")]
    pub news_secs: u64,
}

fn default_updates_ttl() -> u64 {
    15 * 60
}

fn default_news_ttl() -> u64 {
    30 * 60
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            updates_secs: default_updates_ttl(),
            news_secs: default_news_ttl(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for snapshot cache files; defaults to the platform cache
    /// directory. `~` is expanded.
    #[serde(default)]
    pub cache_dir: Option<String>,
    /// AUR helper binary used for the AUR leg of the updates breakdown.
    #[serde(default = "default_aur_helper")]
    pub aur_helper: String,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub ttl: TtlConfig,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_aur_helper() -> String {
    "paru".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cache_dir: None,
            aur_helper: default_aur_helper(),
            poll: PollConfig::default(),
            ttl: TtlConfig::default(),
        }
    }
}

/// Errors returned when validating a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    /// A polling period was set to zero.
    #[error("poll interval '{name}' must be greater than zero")]
    ZeroPollInterval { name: &'static str },

    /// A cache TTL was set to zero.
    #[error("cache ttl '{name}' must be greater than zero")]
    ZeroTtl { name: &'static str },

    /// The AUR helper name is blank.
    #[error("aur_helper must not be blank")]
    BlankAurHelper,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] when a polling period or TTL is
    /// zero, or the AUR helper name is blank.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let intervals = [
            ("wifi_secs", self.poll.wifi_secs),
            ("bluetooth_secs", self.poll.bluetooth_secs),
            ("audio_secs", self.poll.audio_secs),
            ("hypr_secs", self.poll.hypr_secs),
            ("battery_secs", self.poll.battery_secs),
            ("media_secs", self.poll.media_secs),
            ("system_secs", self.poll.system_secs),
        ];

        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigValidationError::ZeroPollInterval { name });
            }
        }

        let ttls = [
            ("updates_secs", self.ttl.updates_secs),
            ("news_secs", self.ttl.news_secs),
        ];

        for (name, value) in ttls {
            if value == 0 {
                return Err(ConfigValidationError::ZeroTtl { name });
            }
        }

        if self.aur_helper.trim().is_empty() {
            return Err(ConfigValidationError::BlankAurHelper);
        }

        Ok(())
    }
}
