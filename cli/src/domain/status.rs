//! Service-state parsing and status-transition planning.
//!
//! The health check asks systemd for three unit properties:
//!
//! ```text
//! systemctl show <service> --property=LoadState,ActiveState,UnitFileState
//! ```
//!
//! | LoadState   | ActiveState                      | UnitFileState      | HostStatus |
//! |-------------|----------------------------------|--------------------|------------|
//! | `not-found` | any                              | any                | Down       |
//! | loaded      | active, reloading, activating    | any                | Active     |
//! | loaded      | anything else                    | disabled, masked   | Inactive   |
//! | loaded      | anything else                    | anything else      | Down       |
//!
//! Output that lacks `LoadState` or `ActiveState` maps to `Unknown`.

use chrono::{DateTime, Utc};
use tgfleet_common::{EventKind, HostLogEntry, HostStatus};

use crate::domain::operation::StatusObservation;

/// Source tag written into status-change log entries.
pub const STATUS_SOURCE: &str = "Realtime monitoring";

/// The subset of a systemd unit's properties the health check reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitState {
    pub load_state: String,
    pub active_state: String,
    pub unit_file_state: String,
}

/// Observed state of the agent service, as seen by the service controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
    NotInstalled,
}

/// Parse `Key=Value` lines from `systemctl show`.
///
/// Returns `None` when `LoadState` or `ActiveState` is missing.
#[must_use]
pub fn parse_unit_state(output: &str) -> Option<UnitState> {
    let mut load_state = None;
    let mut active_state = None;
    let mut unit_file_state = String::new();

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key {
            "LoadState" => load_state = Some(value),
            "ActiveState" => active_state = Some(value),
            "UnitFileState" => unit_file_state = value,
            _ => {}
        }
    }

    Some(UnitState {
        load_state: load_state.filter(|s| !s.is_empty())?,
        active_state: active_state.filter(|s| !s.is_empty())?,
        unit_file_state,
    })
}

impl UnitState {
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.load_state != "not-found"
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(
            self.active_state.as_str(),
            "active" | "reloading" | "activating"
        )
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        matches!(self.unit_file_state.as_str(), "disabled" | "masked")
    }

    #[must_use]
    pub fn service_state(&self) -> ServiceState {
        if !self.is_installed() {
            ServiceState::NotInstalled
        } else if self.is_running() {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        }
    }

    #[must_use]
    pub fn host_status(&self) -> HostStatus {
        match self.service_state() {
            ServiceState::NotInstalled => HostStatus::Down,
            ServiceState::Running => HostStatus::Active,
            ServiceState::Stopped if self.is_disabled() => HostStatus::Inactive,
            ServiceState::Stopped => HostStatus::Down,
        }
    }

    /// Short description for status details, e.g. `active (enabled)`.
    #[must_use]
    pub fn describe(&self) -> String {
        if !self.is_installed() {
            return "service not installed".to_string();
        }
        if self.unit_file_state.is_empty() {
            self.active_state.clone()
        } else {
            format!("{} ({})", self.active_state, self.unit_file_state)
        }
    }
}

// ── Status synchronisation ────────────────────────────────────────────────────

/// What a caller should persist after a status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New status for the host record, or `None` to keep the stored one.
    pub status: Option<HostStatus>,
    pub checked_at: DateTime<Utc>,
    /// Status-change log entry, present only for a real transition.
    pub log_entry: Option<HostLogEntry>,
}

impl StatusUpdate {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.log_entry.is_some()
    }
}

/// Decide how a host record changes after an observation.
///
/// The record takes the new status when it differs from the previous one or
/// when the previous one was `Unknown`. A log entry is produced only when a
/// known previous status actually changed; otherwise only the timestamp moves.
#[must_use]
pub fn plan_status_update(
    hostname: &str,
    previous: HostStatus,
    observation: &StatusObservation,
) -> StatusUpdate {
    let new = observation.status;
    let status = (previous != new || previous == HostStatus::Unknown).then_some(new);

    let log_entry = (previous != new && previous != HostStatus::Unknown).then(|| {
        let mut entry = HostLogEntry::now(
            hostname,
            EventKind::StatusChange,
            format!("{STATUS_SOURCE}: {previous} -> {new}"),
        );
        entry.timestamp = observation.checked_at;
        entry.old_status = Some(previous);
        entry.new_status = Some(new);
        entry.response_time_ms =
            Some(u64::try_from(observation.response_time.as_millis()).unwrap_or(u64::MAX));
        entry
    });

    StatusUpdate {
        status,
        checked_at: observation.checked_at,
        log_entry,
    }
}
