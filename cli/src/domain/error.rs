//! Typed domain error enums.
//!
//! Every engine error maps onto a machine-readable [`FailureKind`] through
//! `kind()`, while its `Display` output is the human-readable message shown
//! to operators. All types convert to `anyhow::Error` via `?`.

use thiserror::Error;

use crate::domain::operation::{FailureKind, ServiceAction};

// ── Host record errors ────────────────────────────────────────────────────────

/// Errors raised while validating or looking up host records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Invalid hostname '{0}': use letters, digits, '.', '-' or '_'")]
    InvalidHostname(String),

    #[error("Invalid IP address '{0}': expected an IPv4 or IPv6 address")]
    InvalidAddress(String),

    #[error("{0} is required for {1} authentication.")]
    MissingSecret(&'static str, &'static str),

    #[error("Host '{0}' not found. Add it with: tgfleet hosts add {0} --ip <address>")]
    NotFound(String),

    #[error("Host '{0}' already exists. Remove it first: tgfleet hosts remove {0}")]
    AlreadyExists(String),
}

// ── Transport errors ──────────────────────────────────────────────────────────

/// Failures while opening a session to a host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("cannot reach {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("connection to {addr} timed out after {secs}s")]
    Timeout { addr: String, secs: u64 },

    #[error("SSH handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("host key mismatch for {addr} (expected {expected}, got {actual})")]
    HostKeyMismatch {
        addr: String,
        expected: String,
        actual: String,
    },

    #[error("authentication as '{user}' failed: {reason}")]
    AuthFailed { user: String, reason: String },
}

/// Failures of an already-open session, or of opening one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("remote operation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("session failed: {0}")]
    Session(String),

    #[error("remote operation failed: {0}")]
    Remote(String),
}

impl TransportError {
    /// Whether the session could not be opened at all.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

/// Failures of remote file reads and atomic writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("{path} does not exist")]
    NotFound { path: String },

    #[error("permission denied on {path}")]
    PermissionDenied { path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ── Engine errors ─────────────────────────────────────────────────────────────

/// Errors from fetching the agent configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("permission denied reading {path}")]
    PermissionDenied { path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ConnectError> for FetchError {
    fn from(err: ConnectError) -> Self {
        Self::Transport(err.into())
    }
}

impl From<FileError> for FetchError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound { path } => Self::NotFound { path },
            FileError::PermissionDenied { path } => Self::PermissionDenied { path },
            FileError::Transport(e) => Self::Transport(e),
        }
    }
}

impl FetchError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::Transport(_) => FailureKind::TransportError,
        }
    }
}

/// Errors from pushing a replacement configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("configuration rejected: {0}")]
    ValidationFailed(String),

    #[error("permission denied writing {path}")]
    PermissionDenied { path: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ConnectError> for PushError {
    fn from(err: ConnectError) -> Self {
        Self::Transport(err.into())
    }
}

impl From<FileError> for PushError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound { path } => {
                Self::Transport(TransportError::Remote(format!("{path} does not exist")))
            }
            FileError::PermissionDenied { path } => Self::PermissionDenied { path },
            FileError::Transport(e) => Self::Transport(e),
        }
    }
}

impl PushError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ValidationFailed(_) => FailureKind::ValidationFailed,
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::Transport(_) => FailureKind::TransportError,
        }
    }
}

/// Errors from running the agent's self-test.
///
/// A non-zero exit of the agent's validator is *not* an error; it is part of
/// the returned report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TestError {
    #[error("candidate configuration rejected: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ConnectError> for TestError {
    fn from(err: ConnectError) -> Self {
        Self::Transport(err.into())
    }
}

impl From<FileError> for TestError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Transport(e) => Self::Transport(e),
            other => Self::Transport(TransportError::Remote(other.to_string())),
        }
    }
}

impl TestError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ValidationFailed(_) => FailureKind::ValidationFailed,
            Self::Transport(_) => FailureKind::TransportError,
        }
    }
}

/// Errors from service lifecycle commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("service '{service}' is not installed")]
    NotInstalled { service: String },

    #[error("cannot {action} '{service}': service is not running")]
    NotRunning {
        action: ServiceAction,
        service: String,
    },

    #[error("permission denied running '{action}' on '{service}': {detail}")]
    PermissionDenied {
        action: ServiceAction,
        service: String,
        detail: String,
    },

    #[error("'{action}' on '{service}' failed with exit code {exit_code}: {stderr}")]
    Failed {
        action: ServiceAction,
        service: String,
        exit_code: i32,
        stderr: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ConnectError> for ServiceError {
    fn from(err: ConnectError) -> Self {
        Self::Transport(err.into())
    }
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotInstalled { .. } => FailureKind::NotInstalled,
            Self::NotRunning { .. } => FailureKind::NotRunning,
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::Failed { .. } => FailureKind::CommandFailed,
            Self::Transport(_) => FailureKind::TransportError,
        }
    }
}

// ── Settings errors ───────────────────────────────────────────────────────────

/// Errors related to settings key/value validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
