//! Command implementations

pub mod config;
pub mod hosts;
pub mod logs;
pub mod service;
pub mod settings;
pub mod status;
pub mod version;

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::{HostStore, Transport};
use crate::application::services::dispatch::{self, EngineContext};
use crate::application::services::fleet::{FleetCoordinator, FleetJob, FleetReport, cancel_pair};
use crate::application::services::status_sync;
use crate::domain::{Host, HostError, HostOperation, OperationResult};
use crate::output::{SpinnerReporter, progress};

/// Load a host record or fail with a hint on how to add it.
pub(crate) fn require_host(app: &AppContext, hostname: &str) -> Result<Host> {
    app.hosts
        .get(hostname)?
        .ok_or_else(|| HostError::NotFound(hostname.to_string()).into())
}

/// Run one operation against one host with a spinner, then log the result.
pub(crate) async fn run_single(
    app: &AppContext,
    ctx: EngineContext<'_, impl Transport>,
    host: &Host,
    operation: &HostOperation,
) -> OperationResult {
    let label = format!("{} on {}", operation.operation(), host.hostname);
    let result = if app.show_progress() {
        let pb = progress::spinner(&format!("{label}..."));
        let result =
            dispatch::execute_with(ctx, host, operation, &SpinnerReporter::new(pb.clone())).await;
        if result.is_success() {
            progress::finish_ok(&pb, &label);
        } else {
            progress::finish_err(&pb, &label);
        }
        result
    } else if app.is_json() {
        dispatch::execute(ctx, host, operation).await
    } else {
        dispatch::execute_with(ctx, host, operation, &app.reporter()).await
    };
    record(app, &result);
    result
}

/// Run a fleet job with a progress bar. Ctrl-C cancels hosts that have not
/// started yet; every host still gets a result.
pub(crate) async fn run_fleet<T, S>(
    app: &AppContext,
    coordinator: &FleetCoordinator<T, S>,
    job: FleetJob,
) -> FleetReport
where
    T: Transport + 'static,
    S: HostStore + 'static,
{
    let order: Vec<String> = job.host_ids().to_vec();
    let operation = job.operation().operation();
    let (handle, signal) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling hosts that have not started");
            handle.cancel();
        }
    });

    let pb = app
        .show_progress()
        .then(|| progress::fleet_bar(order.len() as u64, &operation.to_string()));
    let mut run = coordinator.run(job, signal);
    let mut by_host = HashMap::with_capacity(order.len());
    while let Some(result) = run.next().await {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        record(app, &result);
        by_host.insert(result.host_id.clone(), result);
    }
    interrupt.abort();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    FleetReport {
        operation,
        results: order.iter().filter_map(|id| by_host.remove(id)).collect(),
    }
}

/// Append the event-log entry for `result`. Log failures never fail the
/// command; they are reported as warnings.
pub(crate) fn record(app: &AppContext, result: &OperationResult) {
    if let Err(e) = status_sync::record_operation(&app.events, result) {
        tracing::warn!(host = %result.host_id, error = %e, "failed to append event log entry");
        app.output.warn(&format!("Could not write event log: {e:#}"));
    }
}

/// Map a pass/fail outcome onto the process exit code.
pub(crate) fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
