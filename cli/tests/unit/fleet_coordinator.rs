//! Fleet coordinator driven through its public API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tgfleet_cli::application::services::fleet::{
    CancelSignal, FleetCoordinator, FleetJob, FleetOptions, cancel_pair,
};
use tgfleet_cli::domain::settings::AgentSettings;
use tgfleet_cli::domain::{FailureKind, HostOperation, Operation, ServiceAction};

use crate::mocks::{ScriptedTransport, hosts_named};

fn options(concurrency: usize) -> FleetOptions {
    FleetOptions {
        concurrency,
        connect_retries: 0,
        retry_backoff: Duration::ZERO,
    }
}

fn coordinator(
    transport: ScriptedTransport,
    names: &[&str],
    concurrency: usize,
) -> FleetCoordinator<ScriptedTransport, crate::mocks::MockHosts> {
    FleetCoordinator::new(
        Arc::new(transport),
        Arc::new(hosts_named(names)),
        AgentSettings::default(),
        &options(concurrency),
    )
}

#[tokio::test]
async fn test_every_host_gets_exactly_one_result_in_job_order() {
    let fleet = coordinator(ScriptedTransport::default(), &["a", "b", "c"], 2);
    let job = FleetJob::new(["c", "a", "b"], HostOperation::StatusCheck);

    let report = fleet.run(job, CancelSignal::never()).collect().await;

    let ids: Vec<_> = report.results.iter().map(|r| r.host_id.as_str()).collect();
    assert_eq!(ids, ["c", "a", "b"]);
    assert_eq!(report.operation, Operation::StatusCheck);
    assert_eq!(report.succeeded(), 3);
}

#[tokio::test]
async fn test_unknown_host_fails_without_affecting_siblings() {
    let fleet = coordinator(ScriptedTransport::default(), &["a"], 4);
    let job = FleetJob::new(["a", "ghost"], HostOperation::ServiceAction(ServiceAction::Restart));

    let report = fleet.run(job, CancelSignal::never()).collect().await;

    assert!(report.results[0].is_success());
    assert_eq!(report.results[1].failure_kind(), Some(FailureKind::NotFound));
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_unreachable_host_reports_transport_error() {
    let transport = ScriptedTransport::default().unreachable("b");
    let fleet = coordinator(transport, &["a", "b"], 2);

    let report = fleet
        .run(FleetJob::new(["a", "b"], HostOperation::FetchConfig), CancelSignal::never())
        .collect()
        .await;

    // "a" has no config file, "b" cannot be reached.
    assert_eq!(report.results[0].failure_kind(), Some(FailureKind::NotFound));
    assert_eq!(report.results[1].failure_kind(), Some(FailureKind::TransportError));
}

#[tokio::test]
async fn test_duplicate_ids_collapse_to_one_result() {
    let fleet = coordinator(ScriptedTransport::default(), &["a"], 2);
    let job = FleetJob::new(["a", "a", "a"], HostOperation::StatusCheck);
    assert_eq!(job.len(), 1);

    let report = fleet.run(job, CancelSignal::never()).collect().await;
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let transport = ScriptedTransport::default().delay(Duration::from_millis(30));
    let names = ["h1", "h2", "h3", "h4", "h5", "h6"];
    let fleet = coordinator(transport.clone(), &names, 2);

    let report = fleet
        .run(FleetJob::new(names, HostOperation::StatusCheck), CancelSignal::never())
        .collect()
        .await;

    assert_eq!(report.results.len(), 6);
    assert!(transport.peak_in_flight() <= 2, "peak was {}", transport.peak_in_flight());
}

#[tokio::test]
async fn test_cancel_before_dispatch_marks_every_host_cancelled() {
    let fleet = coordinator(ScriptedTransport::default(), &["a", "b"], 1);
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let report = fleet
        .run(FleetJob::new(["a", "b"], HostOperation::StatusCheck), signal)
        .collect()
        .await;

    assert_eq!(report.results.len(), 2);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.failure_kind() == Some(FailureKind::Cancelled))
    );
}

#[tokio::test]
async fn test_empty_job_finishes_immediately() {
    let fleet = coordinator(ScriptedTransport::default(), &[], 4);
    let mut run = fleet.run(
        FleetJob::new(Vec::<String>::new(), HostOperation::StatusCheck),
        CancelSignal::never(),
    );
    assert!(run.is_finished());
    assert!(run.next().await.is_none());
}
