//! Settings schema and validators for `~/.tgfleet/settings.yaml`.
//!
//! Pure functions only. Loading and saving live in `infra::settings`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::SettingsError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_SETTINGS_KEYS: &[&str] = &[
    "agent.config_path",
    "agent.binary",
    "agent.service",
    "agent.use_sudo",
    "transport.connect_timeout_secs",
    "transport.command_timeout_secs",
    "fleet.concurrency",
    "fleet.connect_retries",
    "fleet.retry_backoff_ms",
    "status.cache_ttl_secs",
    "logs.retention_days",
];

pub const MAX_CONCURRENCY: usize = 64;

// ── Settings schema ──────────────────────────────────────────────────────────

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub agent: AgentSettings,
    pub transport: TransportSettings,
    pub fleet: FleetSettings,
    pub status: StatusSettings,
    pub logs: LogSettings,
}

/// Where and how the Telegraf agent lives on each host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentSettings {
    pub config_path: String,
    pub binary: String,
    pub service: String,
    /// Prefix privileged commands with `sudo -n`.
    pub use_sudo: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            config_path: "/etc/telegraf/telegraf.conf".to_string(),
            binary: "/usr/bin/telegraf".to_string(),
            service: "telegraf".to_string(),
            use_sudo: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransportSettings {
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
        }
    }
}

impl TransportSettings {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FleetSettings {
    pub concurrency: usize,
    /// Extra connection attempts for non-destructive operations.
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            connect_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusSettings {
    pub cache_ttl_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self { cache_ttl_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    pub retention_days: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

impl Settings {
    /// Current value of `key` rendered as text.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownKey`] for keys outside the whitelist.
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        let value = match key {
            "agent.config_path" => self.agent.config_path.clone(),
            "agent.binary" => self.agent.binary.clone(),
            "agent.service" => self.agent.service.clone(),
            "agent.use_sudo" => self.agent.use_sudo.to_string(),
            "transport.connect_timeout_secs" => self.transport.connect_timeout_secs.to_string(),
            "transport.command_timeout_secs" => self.transport.command_timeout_secs.to_string(),
            "fleet.concurrency" => self.fleet.concurrency.to_string(),
            "fleet.connect_retries" => self.fleet.connect_retries.to_string(),
            "fleet.retry_backoff_ms" => self.fleet.retry_backoff_ms.to_string(),
            "status.cache_ttl_secs" => self.status.cache_ttl_secs.to_string(),
            "logs.retention_days" => self.logs.retention_days.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Validate and apply one `key = value` change.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when the key is unknown or the value does not
    /// parse for that key. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        validate_settings_key(key)?;
        let value = value.trim();
        match key {
            "agent.config_path" => self.agent.config_path = absolute_path(key, value)?,
            "agent.binary" => self.agent.binary = absolute_path(key, value)?,
            "agent.service" => self.agent.service = unit_name(key, value)?,
            "agent.use_sudo" => self.agent.use_sudo = parse_bool(key, value)?,
            "transport.connect_timeout_secs" => {
                self.transport.connect_timeout_secs = parse_in(key, value, 1, 300)?;
            }
            "transport.command_timeout_secs" => {
                self.transport.command_timeout_secs = parse_in(key, value, 1, 3600)?;
            }
            "fleet.concurrency" => {
                self.fleet.concurrency = parse_in(key, value, 1, MAX_CONCURRENCY)?;
            }
            "fleet.connect_retries" => self.fleet.connect_retries = parse_in(key, value, 0, 5)?,
            "fleet.retry_backoff_ms" => {
                self.fleet.retry_backoff_ms = parse_in(key, value, 0, 60_000)?;
            }
            "status.cache_ttl_secs" => self.status.cache_ttl_secs = parse_in(key, value, 0, 3600)?,
            "logs.retention_days" => self.logs.retention_days = parse_in(key, value, 1, 3650)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Every key with its current value, in whitelist order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        VALID_SETTINGS_KEYS
            .iter()
            .filter_map(|key| self.get(key).ok().map(|v| (*key, v)))
            .collect()
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a settings key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_settings_key(key: &str) -> Result<(), SettingsError> {
    if VALID_SETTINGS_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(unknown_key(key))
    }
}

fn unknown_key(key: &str) -> SettingsError {
    SettingsError::UnknownKey {
        key: key.to_string(),
        valid: VALID_SETTINGS_KEYS.join(", "),
    }
}

fn invalid(key: &str, value: &str, expected: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.into(),
    }
}

fn parse_in<T>(key: &str, value: &str, min: T, max: T) -> Result<T, SettingsError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    value
        .parse::<T>()
        .ok()
        .filter(|v| *v >= min && *v <= max)
        .ok_or_else(|| invalid(key, value, format!("an integer between {min} and {max}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

fn absolute_path(key: &str, value: &str) -> Result<String, SettingsError> {
    if value.starts_with('/') && !value.contains('\0') && !value.contains('\n') {
        Ok(value.to_string())
    } else {
        Err(invalid(key, value, "an absolute path"))
    }
}

fn unit_name(key: &str, value: &str) -> Result<String, SettingsError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if ok {
        Ok(value.to_string())
    } else {
        Err(invalid(key, value, "a systemd unit name"))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
