//! Monitor configuration loaded from environment variables.
//!
//! Built once in `main` and passed by value into every component; there
//! is no global configuration state.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ewatch_core::group_monitor::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_FRESHNESS_WINDOW_MINUTES, DEFAULT_TICK_INTERVAL_MINUTES,
};
use ewatch_core::{DeviceGroup, FreshnessWindow, MonitorSettings};
use ewatch_db::SamplesTable;
use ewatch_discord::api::DEFAULT_API_URL;
use ewatch_discord::client::DEFAULT_GATEWAY_URL;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_READY_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Discord bot credentials and endpoints.
#[derive(Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
    pub gateway_url: String,
    pub api_url: String,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("gateway_url", &self.gateway_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Everything the monitor needs to start.
#[derive(Clone)]
pub struct MonitorConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub samples_table: SamplesTable,
    pub discord: DiscordConfig,
    pub left: DeviceGroup,
    pub right: DeviceGroup,
    pub settings: MonitorSettings,
    /// Upper bound on one freshness query; `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    /// Startup deadline for the alert channel; `None` waits indefinitely.
    pub ready_timeout: Option<Duration>,
    /// How long teardown waits for a unit to stop before aborting it.
    pub shutdown_grace: Duration,
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("database_url", &"<redacted>")
            .field("database_max_connections", &self.database_max_connections)
            .field("samples_table", &self.samples_table)
            .field("discord", &self.discord)
            .field("left", &self.left.label())
            .field("right", &self.right.label())
            .field("settings", &self.settings)
            .field("query_timeout", &self.query_timeout)
            .field("ready_timeout", &self.ready_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl MonitorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default                     |
    /// |----------------------------|-----------------------------|
    /// | `DATABASE_URL`             | required                    |
    /// | `DATABASE_MAX_CONNECTIONS` | `5`                         |
    /// | `SAMPLES_TABLE`            | `egauge`                    |
    /// | `DISCORD_TOKEN`            | required                    |
    /// | `DISCORD_CHANNEL_ID`       | required                    |
    /// | `DISCORD_GATEWAY_URL`      | Discord v10 JSON gateway    |
    /// | `DISCORD_API_URL`          | `https://discord.com/api/v10` |
    /// | `LEFT_DEVICE_IDS`          | required, comma-separated   |
    /// | `RIGHT_DEVICE_IDS`         | required, comma-separated   |
    /// | `LEFT_GROUP_LABEL`         | `left`                      |
    /// | `RIGHT_GROUP_LABEL`        | `right`                     |
    /// | `TICK_INTERVAL_MINS`       | `2`                         |
    /// | `FRESHNESS_WINDOW_MINS`    | `2`                         |
    /// | `FAILURE_THRESHOLD`        | `3`                         |
    /// | `QUERY_TIMEOUT_SECS`       | `30` (`0` disables)         |
    /// | `READY_TIMEOUT_SECS`       | `300` (`0` disables)        |
    /// | `SHUTDOWN_GRACE_SECS`      | `5`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let samples_table = match env.get("SAMPLES_TABLE") {
            Some(name) => SamplesTable::parse(&name).map_err(|e| ConfigError::Invalid {
                name: "SAMPLES_TABLE",
                reason: e.to_string(),
            })?,
            None => SamplesTable::default(),
        };

        let discord = DiscordConfig {
            token: env.required("DISCORD_TOKEN")?,
            channel_id: env.required_parse("DISCORD_CHANNEL_ID")?,
            gateway_url: env
                .get("DISCORD_GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            api_url: env
                .get("DISCORD_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };

        let left = env.group("LEFT_GROUP_LABEL", "left", "LEFT_DEVICE_IDS")?;
        let right = env.group("RIGHT_GROUP_LABEL", "right", "RIGHT_DEVICE_IDS")?;

        let settings = MonitorSettings {
            tick_interval_minutes: env.parse_or("TICK_INTERVAL_MINS", DEFAULT_TICK_INTERVAL_MINUTES)?,
            freshness_window: FreshnessWindow::from_minutes(
                env.parse_or("FRESHNESS_WINDOW_MINS", DEFAULT_FRESHNESS_WINDOW_MINUTES)?,
            ),
            failure_threshold: env.parse_or("FAILURE_THRESHOLD", DEFAULT_FAILURE_THRESHOLD)?,
        };
        settings.validate().map_err(|e| ConfigError::Invalid {
            name: "monitor settings",
            reason: e.to_string(),
        })?;

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            database_max_connections: env
                .parse_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            samples_table,
            discord,
            left,
            right,
            settings,
            query_timeout: env.optional_secs("QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
            ready_timeout: env.optional_secs("READY_TIMEOUT_SECS", DEFAULT_READY_TIMEOUT_SECS)?,
            shutdown_grace: Duration::from_secs(
                env.parse_or("SHUTDOWN_GRACE_SECS", DEFAULT_SHUTDOWN_GRACE_SECS)?,
            ),
        })
    }

    /// Device groups in check order.
    pub fn groups(&self) -> Vec<DeviceGroup> {
        vec![self.left.clone(), self.right.clone()]
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of `key`, treating blank as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn required_parse<T>(&self, key: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        parse(key, &self.required(key)?)
    }

    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }

    /// Seconds as a duration, where `0` means "no limit".
    fn optional_secs(&self, key: &'static str, default: u64) -> Result<Option<Duration>, ConfigError> {
        let secs: u64 = self.parse_or(key, default)?;
        Ok((secs > 0).then(|| Duration::from_secs(secs)))
    }

    fn group(
        &self,
        label_key: &'static str,
        default_label: &str,
        ids_key: &'static str,
    ) -> Result<DeviceGroup, ConfigError> {
        let label = self.get(label_key).unwrap_or_else(|| default_label.to_string());
        let ids = self.required(ids_key)?;
        DeviceGroup::new(label, ids.split(',')).map_err(|e| ConfigError::Invalid {
            name: ids_key,
            reason: e.to_string(),
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name: key,
        reason: format!("'{raw}': {e}"),
    })
}
