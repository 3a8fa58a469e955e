//! Host records and SSH credentials.
//!
//! Pure types and validation only. Host records are owned by the host store;
//! the engines borrow a `Host` for the duration of one call.

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use tgfleet_common::HostStatus;

use crate::domain::error::HostError;

/// Port used when a host record carries an out-of-range `ssh_port`.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Login used when a host record does not name one.
pub const DEFAULT_SSH_USER: &str = "root";

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]{0,251}[A-Za-z0-9])?$").expect("valid regex")
});

// ── Credential ────────────────────────────────────────────────────────────────

/// SSH credential for a host. Exactly one variant is populated at a time.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Credential {
    /// Password authentication.
    Password { secret: String },
    /// Public-key authentication with in-memory private key material.
    PrivateKey {
        key_material: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
}

impl Credential {
    #[must_use]
    pub fn password(secret: impl Into<String>) -> Self {
        Self::Password {
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn private_key(key_material: impl Into<String>, passphrase: Option<String>) -> Self {
        Self::PrivateKey {
            key_material: key_material.into(),
            passphrase,
        }
    }

    /// Display name of the authentication method.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Password",
            Self::PrivateKey { .. } => "Private Key",
        }
    }

    /// Reject credentials whose secret material is empty.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::MissingSecret`] naming the missing field.
    pub fn validate(&self) -> Result<(), HostError> {
        match self {
            Self::Password { secret } if secret.is_empty() => {
                Err(HostError::MissingSecret("SSH Password", "Password"))
            }
            Self::PrivateKey { key_material, .. } if key_material.trim().is_empty() => {
                Err(HostError::MissingSecret("SSH Private Key", "Private Key"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f.debug_struct("Password").field("secret", &"***").finish(),
            Self::PrivateKey { passphrase, .. } => f
                .debug_struct("PrivateKey")
                .field("key_material", &"***")
                .field("passphrase", &passphrase.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

// ── Host ──────────────────────────────────────────────────────────────────────

/// A remote machine running one Telegraf agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Host {
    /// Unique id of the host record.
    pub hostname: String,
    pub ip_address: String,
    /// Raw port as stored; see [`Host::effective_port`].
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u32,
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
    pub credential: Credential,
    #[serde(default)]
    pub status: HostStatus,
    #[serde(default)]
    pub last_status_check: Option<DateTime<Utc>>,
    /// Per-host override of the agent configuration path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    /// Pinned SHA-256 host key fingerprint (lowercase hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key_sha256: Option<String>,
    /// Hosts with monitoring disabled are skipped by fleet-wide status checks.
    #[serde(default = "default_true")]
    pub monitoring_enabled: bool,
}

fn default_ssh_port() -> u32 {
    u32::from(DEFAULT_SSH_PORT)
}

fn default_ssh_user() -> String {
    DEFAULT_SSH_USER.to_string()
}

fn default_true() -> bool {
    true
}

impl Host {
    /// Create a host record with default port, user and an `Unknown` status.
    #[must_use]
    pub fn new(hostname: &str, ip_address: &str, credential: Credential) -> Self {
        Self {
            hostname: hostname.to_string(),
            ip_address: ip_address.to_string(),
            ssh_port: default_ssh_port(),
            ssh_user: default_ssh_user(),
            credential,
            status: HostStatus::Unknown,
            last_status_check: None,
            config_path: None,
            host_key_sha256: None,
            monitoring_enabled: true,
        }
    }

    /// Port to connect to, with out-of-range values coerced to 22.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        coerce_port(&self.hostname, self.ssh_port)
    }

    /// Parse the stored IP address.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidAddress`] when the address is not a
    /// syntactically valid IPv4 or IPv6 address.
    pub fn ip(&self) -> Result<IpAddr, HostError> {
        self.ip_address
            .trim()
            .parse()
            .map_err(|_| HostError::InvalidAddress(self.ip_address.clone()))
    }

    /// Replace the credential. The previous variant's secret material is
    /// dropped with it.
    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = credential;
    }

    /// Validate hostname, address and credential.
    ///
    /// # Errors
    ///
    /// Returns the first [`HostError`] encountered.
    pub fn validate(&self) -> Result<(), HostError> {
        validate_hostname(&self.hostname)?;
        self.ip()?;
        self.credential.validate()
    }
}

/// Validate a host id.
///
/// # Errors
///
/// Returns [`HostError::InvalidHostname`] if `hostname` is empty or contains
/// characters other than letters, digits, `.`, `-` and `_`.
pub fn validate_hostname(hostname: &str) -> Result<(), HostError> {
    if HOSTNAME_RE.is_match(hostname) {
        Ok(())
    } else {
        Err(HostError::InvalidHostname(hostname.to_string()))
    }
}

/// Coerce a stored port into `1..=65535`, falling back to 22 with a warning.
#[must_use]
pub fn coerce_port(hostname: &str, raw: u32) -> u16 {
    match u16::try_from(raw) {
        Ok(port) if port != 0 => port,
        _ => {
            tracing::warn!(
                host = hostname,
                ssh_port = raw,
                "ssh_port out of range, using {DEFAULT_SSH_PORT}"
            );
            DEFAULT_SSH_PORT
        }
    }
}
