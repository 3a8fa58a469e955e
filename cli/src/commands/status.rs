//! `tgfleet status`: probe agent status and show the fleet overview.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::HostStore;
use crate::application::services::fleet::FleetJob;
use crate::application::services::{log_report, status_sync};
use crate::commands::{exit_code, require_host, run_fleet, run_single};
use crate::domain::{Host, HostOperation, OperationResult};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Host ids to probe. Without hosts or --all, shows stored statuses
    /// without contacting any host.
    #[arg(conflicts_with = "all")]
    pub hosts: Vec<String>,

    /// Probe every host with monitoring enabled
    #[arg(long)]
    pub all: bool,

    /// Ignore cached observations and probe again
    #[arg(long)]
    pub refresh: bool,
}

/// Run the status command.
///
/// # Errors
///
/// Returns an error if a single named host is unknown or the local stores
/// cannot be read.
pub async fn run(app: &AppContext, args: StatusArgs) -> Result<ExitCode> {
    let StatusArgs {
        hosts,
        all,
        refresh,
    } = args;

    if let [only] = hosts.as_slice() {
        return probe_one(app, only, refresh).await;
    }

    let targets: Vec<String> = if all {
        app.hosts
            .list()?
            .into_iter()
            .filter(|h| h.monitoring_enabled)
            .map(|h| h.hostname)
            .collect()
    } else {
        hosts
    };
    if targets.is_empty() {
        return show_stored(app);
    }
    probe_many(app, targets, refresh).await
}

fn show_stored(app: &AppContext) -> Result<ExitCode> {
    let snapshot = log_report::fleet_snapshot(&app.hosts.list()?, &app.events, Utc::now())?;
    app.renderer().render_fleet_status(&snapshot)?;
    Ok(ExitCode::SUCCESS)
}

async fn probe_one(app: &AppContext, hostname: &str, refresh: bool) -> Result<ExitCode> {
    let host = require_host(app, hostname)?;
    let cache = app.status_cache()?;
    if refresh {
        cache.invalidate(Some(hostname));
    }
    let result = run_single(app, app.engine(Some(&cache)), &host, &HostOperation::StatusCheck).await;
    sync(app, &host, &result);
    app.renderer().render_result(&result)?;
    Ok(exit_code(result.is_success()))
}

async fn probe_many(app: &AppContext, targets: Vec<String>, refresh: bool) -> Result<ExitCode> {
    let known: HashMap<String, Host> = app
        .hosts
        .list()?
        .into_iter()
        .map(|h| (h.hostname.clone(), h))
        .collect();

    let cache = app.status_cache()?;
    if refresh {
        cache.invalidate(None);
    }
    let coordinator = app.fleet().with_status_cache(Arc::new(cache));
    let report = run_fleet(app, &coordinator, FleetJob::new(targets, HostOperation::StatusCheck)).await;

    for result in &report.results {
        match known.get(&result.host_id) {
            Some(host) => sync(app, host, result),
            None => app.output.error(&format!("{}: {}", result.host_id, result.message())),
        }
    }

    // Re-read so the overview shows the statuses just recorded.
    let probed: Vec<Host> = app
        .hosts
        .list()?
        .into_iter()
        .filter(|h| report.results.iter().any(|r| r.host_id == h.hostname))
        .collect();
    let snapshot = log_report::fleet_snapshot(&probed, &app.events, Utc::now())?;
    app.renderer().render_fleet_status(&snapshot)?;
    Ok(exit_code(report.failed() == 0))
}

fn sync(app: &AppContext, host: &Host, result: &OperationResult) {
    if let Err(e) = status_sync::sync_status_result(app.hosts.as_ref(), &app.events, host, result) {
        tracing::warn!(host = %host.hostname, error = %e, "failed to record status");
        app.output.warn(&format!("Could not record status for {}: {e:#}", host.hostname));
    }
}
