//! Status persistence and event-log recording.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use mockall::predicate::{always, eq};
use tgfleet_cli::application::services::status_sync;
use tgfleet_cli::domain::{
    Ack, FailureKind, HostStatus, Operation, OperationResult, Payload, ServiceAction,
    StatusObservation,
};
use tgfleet_common::EventKind;

use crate::mocks::{MemoryLog, MockHosts, host};

fn observed(status: HostStatus) -> StatusObservation {
    StatusObservation {
        status,
        checked_at: Utc::now(),
        response_time: Duration::from_millis(12),
        detail: String::new(),
    }
}

fn host_with(status: HostStatus) -> tgfleet_cli::domain::Host {
    let mut h = host("a");
    h.status = status;
    h
}

#[test]
fn test_changed_status_is_recorded_and_logged() {
    let mut hosts = MockHosts::new();
    hosts
        .expect_record_status()
        .with(eq("a"), eq(Some(HostStatus::Down)), always())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let log = MemoryLog::default();

    let update =
        status_sync::sync_status(&hosts, &log, &host_with(HostStatus::Active), &observed(HostStatus::Down))
            .unwrap();

    assert!(update.changed());
    let entries = log.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_kind, EventKind::StatusChange);
    assert_eq!(entries[0].old_status, Some(HostStatus::Active));
    assert_eq!(entries[0].new_status, Some(HostStatus::Down));
    assert_eq!(entries[0].response_time_ms, Some(12));
}

#[test]
fn test_first_observation_sets_status_without_log_entry() {
    let mut hosts = MockHosts::new();
    hosts
        .expect_record_status()
        .with(eq("a"), eq(Some(HostStatus::Active)), always())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let log = MemoryLog::default();

    status_sync::sync_status(&hosts, &log, &host_with(HostStatus::Unknown), &observed(HostStatus::Active))
        .unwrap();

    assert!(log.snapshot().is_empty());
}

#[test]
fn test_unchanged_status_only_moves_timestamp() {
    let mut hosts = MockHosts::new();
    hosts
        .expect_record_status()
        .with(eq("a"), eq(None), always())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let log = MemoryLog::default();

    let update =
        status_sync::sync_status(&hosts, &log, &host_with(HostStatus::Active), &observed(HostStatus::Active))
            .unwrap();

    assert!(!update.changed());
    assert!(log.snapshot().is_empty());
}

#[test]
fn test_store_failure_is_propagated_and_nothing_logged() {
    let mut hosts = MockHosts::new();
    hosts
        .expect_record_status()
        .returning(|_, _, _| Err(anyhow::anyhow!("disk full")));
    let log = MemoryLog::default();

    let err =
        status_sync::sync_status(&hosts, &log, &host_with(HostStatus::Active), &observed(HostStatus::Down))
            .unwrap_err();

    assert!(format!("{err:#}").contains("disk full"));
    assert!(log.snapshot().is_empty());
}

#[test]
fn test_internal_failure_marks_host_unknown() {
    let mut hosts = MockHosts::new();
    hosts
        .expect_record_status()
        .with(eq("a"), eq(Some(HostStatus::Unknown)), always())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let log = MemoryLog::default();
    let result = OperationResult::failure(
        "a",
        Operation::StatusCheck,
        FailureKind::Internal,
        "worker exited without a result",
        Duration::ZERO,
    );

    let update =
        status_sync::sync_status_result(&hosts, &log, &host_with(HostStatus::Active), &result).unwrap();

    assert!(update.is_some());
    assert_eq!(log.snapshot()[0].new_status, Some(HostStatus::Unknown));
}

#[test]
fn test_cancelled_check_leaves_records_untouched() {
    let mut hosts = MockHosts::new();
    hosts.expect_record_status().times(0);
    let log = MemoryLog::default();
    let result = OperationResult::failure(
        "a",
        Operation::StatusCheck,
        FailureKind::Cancelled,
        "cancelled before dispatch",
        Duration::ZERO,
    );

    let update =
        status_sync::sync_status_result(&hosts, &log, &host_with(HostStatus::Active), &result).unwrap();

    assert!(update.is_none());
    assert!(log.snapshot().is_empty());
}

#[test]
fn test_operations_map_to_event_kinds() {
    let log = MemoryLog::default();
    let ack = || {
        Payload::Ack(Ack {
            message: "ok".to_string(),
        })
    };

    let push = OperationResult::success("a", Operation::PushConfig, ack(), Duration::ZERO);
    let restart = OperationResult::success(
        "a",
        Operation::ServiceAction {
            action: ServiceAction::Restart,
        },
        ack(),
        Duration::ZERO,
    );
    let stop = OperationResult::success(
        "a",
        Operation::ServiceAction {
            action: ServiceAction::Stop,
        },
        ack(),
        Duration::ZERO,
    );
    let unreachable = OperationResult::failure(
        "a",
        Operation::FetchConfig,
        FailureKind::TransportError,
        "connection refused",
        Duration::ZERO,
    );

    for result in [&push, &restart, &stop, &unreachable] {
        status_sync::record_operation(&log, result).unwrap();
    }

    let kinds: Vec<_> = log.snapshot().iter().map(|e| e.event_kind).collect();
    assert_eq!(
        kinds,
        [EventKind::ConfigUpdate, EventKind::ServiceRestart, EventKind::ConnectionError]
    );
    assert!(log.snapshot()[2].details.contains("fetch config failed"));
}
