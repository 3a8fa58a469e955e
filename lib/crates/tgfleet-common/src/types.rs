use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Last observed state of the agent on a host.
///
/// Serialized with the capitalised names the host records have always used
/// (`"Active"`, `"Down"`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum HostStatus {
    /// Agent process is running and responding.
    Active,
    /// Agent process is absent, or the host is unreachable.
    Down,
    /// Agent is installed but explicitly disabled.
    Inactive,
    /// Not yet observed, or the observation was inconclusive.
    #[default]
    Unknown,
}

impl HostStatus {
    pub const ALL: [HostStatus; 4] = [
        HostStatus::Active,
        HostStatus::Down,
        HostStatus::Inactive,
        HostStatus::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Down => "Down",
            Self::Inactive => "Inactive",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status string is not one of the four known values.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid host status '{0}': expected one of Active, Down, Inactive, Unknown")]
pub struct ParseStatusError(pub String);

impl FromStr for HostStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Kinds of entries recorded in the host event log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    #[serde(rename = "Status Change")]
    StatusChange,
    #[serde(rename = "Config Update")]
    ConfigUpdate,
    #[serde(rename = "Connection Error")]
    ConnectionError,
    #[serde(rename = "Service Restart")]
    ServiceRestart,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusChange => "Status Change",
            Self::ConfigUpdate => "Config Update",
            Self::ConnectionError => "Connection Error",
            Self::ServiceRestart => "Service Restart",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry in the host event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Host id (hostname) the event belongs to.
    pub host: String,
    pub event_kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<HostStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<HostStatus>,
    /// Session-open latency in milliseconds, for status events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub details: String,
}

impl HostLogEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn now(host: &str, event_kind: EventKind, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            host: host.to_string(),
            event_kind,
            old_status: None,
            new_status: None,
            response_time_ms: None,
            details: details.into(),
        }
    }
}

/// Per-host row of the fleet status view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostStatusRow {
    pub hostname: String,
    pub ip_address: String,
    pub status: HostStatus,
    pub last_status_check: Option<DateTime<Utc>>,
}

/// Count of hosts per status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub down: usize,
    pub inactive: usize,
    pub unknown: usize,
}

impl StatusCounts {
    /// Tally the given statuses.
    pub fn tally(statuses: impl IntoIterator<Item = HostStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                HostStatus::Active => counts.active += 1,
                HostStatus::Down => counts.down += 1,
                HostStatus::Inactive => counts.inactive += 1,
                HostStatus::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.active + self.down + self.inactive + self.unknown
    }
}

/// Fleet-wide status snapshot rendered by `tgfleet status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStatusOutput {
    pub hosts: Vec<HostStatusRow>,
    pub status_counts: StatusCounts,
    pub total_hosts: usize,
    /// Status changes recorded during the last hour, newest first.
    pub recent_changes: Vec<HostLogEntry>,
    pub timestamp: DateTime<Utc>,
}

/// A labelled count used by log statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountEntry<K> {
    pub key: K,
    pub count: usize,
}

/// Aggregate statistics over the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStatistics {
    pub total_logs: usize,
    /// Entries recorded during the last 24 hours.
    pub recent_activity: usize,
    /// Count per event kind, largest first.
    pub event_kinds: Vec<CountEntry<EventKind>>,
    /// The ten hosts with the most entries, largest first.
    pub top_hosts: Vec<CountEntry<String>>,
}
