//! Turns operation results into host-record updates and event-log entries.
//!
//! The engines never write either store; callers pass results through here
//! once an operation has finished.

use anyhow::{Context, Result};
use chrono::Utc;
use tgfleet_common::HostLogEntry;

use crate::application::ports::{EventLog, HostStore};
use crate::domain::{
    FailureKind, Host, HostStatus, OperationResult, Outcome, Payload, StatusObservation,
    StatusUpdate, plan_status_update,
};

/// Persist one status observation for `host`.
///
/// # Errors
///
/// Returns an error if the host store or event log cannot be written.
pub fn sync_status(
    hosts: &impl HostStore,
    log: &impl EventLog,
    host: &Host,
    observation: &StatusObservation,
) -> Result<StatusUpdate> {
    let update = plan_status_update(&host.hostname, host.status, observation);
    hosts
        .record_status(&host.hostname, update.status, update.checked_at)
        .with_context(|| format!("failed to record status for {}", host.hostname))?;
    if let Some(entry) = &update.log_entry {
        log.append(entry).context("failed to append status change")?;
        tracing::info!(host = %host.hostname, from = %host.status, to = %observation.status, "status changed");
    }
    Ok(update)
}

/// Persist the outcome of a status check result.
///
/// Internal failures mark the host `Unknown`. Missing or cancelled hosts
/// leave every record untouched.
///
/// # Errors
///
/// Returns an error if the host store or event log cannot be written.
pub fn sync_status_result(
    hosts: &impl HostStore,
    log: &impl EventLog,
    host: &Host,
    result: &OperationResult,
) -> Result<Option<StatusUpdate>> {
    match &result.outcome {
        Outcome::Success {
            payload: Payload::Status(observation),
        } => sync_status(hosts, log, host, observation).map(Some),
        Outcome::Failure {
            kind: FailureKind::Internal,
            message,
        } => {
            tracing::warn!(host = %host.hostname, %message, "status check failed");
            let observation = StatusObservation {
                status: HostStatus::Unknown,
                checked_at: Utc::now(),
                response_time: result.duration,
                detail: message.clone(),
            };
            sync_status(hosts, log, host, &observation).map(Some)
        }
        _ => Ok(None),
    }
}

/// Append the event-log entry a result calls for, if any.
///
/// # Errors
///
/// Returns an error if the event log cannot be written.
pub fn record_operation(log: &impl EventLog, result: &OperationResult) -> Result<Option<HostLogEntry>> {
    let Some(kind) = result.event_kind() else {
        return Ok(None);
    };
    let details = match &result.outcome {
        Outcome::Success { .. } => result.message(),
        Outcome::Failure { message, .. } => format!("{} failed: {message}", result.operation),
    };
    let mut entry = HostLogEntry::now(&result.host_id, kind, details);
    entry.timestamp = result.finished_at;
    log.append(&entry)
        .with_context(|| format!("failed to log {kind} for {}", result.host_id))?;
    Ok(Some(entry))
}
