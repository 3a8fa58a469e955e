//! Operations, their payloads, and the `OperationResult` every engine call
//! produces.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tgfleet_common::{EventKind, HostStatus};

// ── Service actions ───────────────────────────────────────────────────────────

/// Lifecycle commands accepted by the service controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
}

impl ServiceAction {
    pub const ALL: [ServiceAction; 4] = [
        ServiceAction::Start,
        ServiceAction::Stop,
        ServiceAction::Restart,
        ServiceAction::Reload,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
        }
    }

    /// Whether a successful run (re)loads the agent's configuration.
    #[must_use]
    pub fn applies_config(self) -> bool {
        !matches!(self, Self::Stop)
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an action string is not in the whitelist.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid action '{0}'. Allowed actions are: start, stop, restart, reload")]
pub struct ParseActionError(pub String);

impl FromStr for ServiceAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseActionError(s.to_string()))
    }
}

// ── Operation kinds ───────────────────────────────────────────────────────────

/// Which operation an `OperationResult` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    FetchConfig,
    PushConfig,
    TestConfig,
    ServiceAction { action: ServiceAction },
    StatusCheck,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchConfig => f.write_str("fetch config"),
            Self::PushConfig => f.write_str("push config"),
            Self::TestConfig => f.write_str("test config"),
            Self::ServiceAction { action } => write!(f, "service {action}"),
            Self::StatusCheck => f.write_str("status check"),
        }
    }
}

/// Extra safety steps around a push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Run the agent's validator on the candidate and refuse to push when it
    /// exits non-zero.
    pub test_first: bool,
    /// Copy the live file to `<path>.bak` before replacing it.
    pub keep_backup: bool,
}

/// A fully specified request against one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOperation {
    FetchConfig,
    PushConfig {
        candidate: String,
        options: PushOptions,
    },
    TestConfig {
        candidate: Option<String>,
    },
    ServiceAction(ServiceAction),
    StatusCheck,
}

impl HostOperation {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::FetchConfig => Operation::FetchConfig,
            Self::PushConfig { .. } => Operation::PushConfig,
            Self::TestConfig { .. } => Operation::TestConfig,
            Self::ServiceAction(action) => Operation::ServiceAction { action: *action },
            Self::StatusCheck => Operation::StatusCheck,
        }
    }

    /// Whether the operation changes remote state. Destructive operations are
    /// never retried.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::PushConfig { .. } | Self::ServiceAction(_))
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// The agent configuration as fetched from a host. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigDocument {
    pub source_host: String,
    pub path: String,
    #[serde(serialize_with = "serialize_lossy")]
    pub content: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl ConfigDocument {
    /// Content as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Which configuration a test ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigSource {
    Deployed { path: String },
    Candidate,
}

/// Output of the agent's self-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    /// Stdout followed by stderr, verbatim.
    pub raw_output: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub source: ConfigSource,
}

/// Shown when the test produced no output at all.
pub const EMPTY_TEST_OUTPUT: &str =
    "Test command executed. No output received, which usually means success.";

impl TestReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Text for human display. Telegraf reports errors and informational
    /// messages on stderr, so when stderr mentions an error both streams are
    /// shown under their own headings.
    #[must_use]
    pub fn display_text(&self) -> String {
        if !self.stderr.is_empty() && self.stderr.contains("Error") {
            return format!("OUTPUT:\n{}\n\nERROR/INFO:\n{}", self.stdout, self.stderr);
        }
        if self.stdout.trim().is_empty() && self.stderr.trim().is_empty() {
            return EMPTY_TEST_OUTPUT.to_string();
        }
        self.raw_output.clone()
    }
}

/// Acknowledgement of a state-changing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub message: String,
}

/// A single status observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusObservation {
    pub status: HostStatus,
    /// Set when the observation completed, not when it started.
    pub checked_at: DateTime<Utc>,
    #[serde(rename = "response_time_ms", serialize_with = "serialize_millis")]
    pub response_time: Duration,
    pub detail: String,
}

/// Successful payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Config(ConfigDocument),
    Ack(Ack),
    TestReport(TestReport),
    Status(StatusObservation),
}

impl Payload {
    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Config(doc) => format!("fetched {} ({} bytes)", doc.path, doc.content.len()),
            Self::Ack(ack) => ack.message.clone(),
            Self::TestReport(report) => format!("agent test exited with code {}", report.exit_code),
            Self::Status(obs) => format!("{} ({})", obs.status, obs.detail),
        }
    }
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    ValidationFailed,
    TransportError,
    NotInstalled,
    NotRunning,
    CommandFailed,
    Cancelled,
    Internal,
}

impl FailureKind {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::ValidationFailed => "validation_failed",
            Self::TransportError => "transport_error",
            Self::NotInstalled => "not_installed",
            Self::NotRunning => "not_running",
            Self::CommandFailed => "command_failed",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success { payload: Payload },
    Failure { kind: FailureKind, message: String },
}

/// Outcome of one operation against one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub host_id: String,
    pub operation: Operation,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub finished_at: DateTime<Utc>,
}

impl OperationResult {
    #[must_use]
    pub fn success(host_id: &str, operation: Operation, payload: Payload, duration: Duration) -> Self {
        Self {
            host_id: host_id.to_string(),
            operation,
            outcome: Outcome::Success { payload },
            duration,
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failure(
        host_id: &str,
        operation: Operation,
        kind: FailureKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            host_id: host_id.to_string(),
            operation,
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
            duration,
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            Outcome::Success { payload } => Some(payload),
            Outcome::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Human-readable message for either outcome.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.outcome {
            Outcome::Success { payload } => payload.summary(),
            Outcome::Failure { message, .. } => message.clone(),
        }
    }

    /// Event-log kind a caller should record for this result, if any.
    ///
    /// Status checks are not mapped here: status transitions are derived by
    /// comparing with the previous record.
    #[must_use]
    pub fn event_kind(&self) -> Option<EventKind> {
        match (&self.outcome, self.operation) {
            (Outcome::Failure { kind: FailureKind::TransportError, .. }, _) => {
                Some(EventKind::ConnectionError)
            }
            (Outcome::Success { .. }, Operation::PushConfig) => Some(EventKind::ConfigUpdate),
            (Outcome::Success { .. }, Operation::ServiceAction { action })
                if action.applies_config() =>
            {
                Some(EventKind::ServiceRestart)
            }
            _ => None,
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(millis)
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}
