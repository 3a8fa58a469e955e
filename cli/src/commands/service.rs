//! `tgfleet service <action> <host>...`: start, stop, restart or reload the
//! agent service on one or many hosts.

use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::HostStore;
use crate::application::services::fleet::FleetJob;
use crate::commands::{exit_code, require_host, run_fleet, run_single};
use crate::domain::{HostOperation, ServiceAction};

/// Arguments for the service command.
#[derive(Args)]
pub struct ServiceArgs {
    /// Action to perform: start, stop, restart or reload
    pub action: ServiceAction,

    /// Host ids
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub hosts: Vec<String>,

    /// Apply to every registered host
    #[arg(long)]
    pub all: bool,
}

/// Run the service command.
///
/// # Errors
///
/// Returns an error if a host is unknown (single host), no hosts are
/// registered (`--all`), or rendering fails.
pub async fn run(app: &AppContext, args: ServiceArgs) -> Result<ExitCode> {
    let ServiceArgs { action, hosts, all } = args;
    let targets = if all {
        app.hosts.list()?.into_iter().map(|h| h.hostname).collect()
    } else {
        hosts
    };
    if targets.is_empty() {
        bail!("No hosts registered. Add one: tgfleet hosts add <host> --ip <address>");
    }

    let single = match targets.as_slice() {
        [only] => Some(require_host(app, only)?),
        _ => None,
    };

    let service = &app.settings.agent.service;
    let prompt = match targets.as_slice() {
        [only] => format!("{} '{service}' on {only}?", capitalize(action.as_str())),
        many => format!(
            "{} '{service}' on {} hosts ({})?",
            capitalize(action.as_str()),
            many.len(),
            many.join(", ")
        ),
    };
    if !app.confirm(&prompt, true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let operation = HostOperation::ServiceAction(action);
    if let Some(host) = single {
        let result = run_single(app, app.engine(None), &host, &operation).await;
        app.renderer().render_result(&result)?;
        return Ok(exit_code(result.is_success()));
    }

    let report = run_fleet(app, &app.fleet(), FleetJob::new(targets, operation)).await;
    app.renderer().render_fleet_report(&report)?;
    Ok(exit_code(report.failed() == 0))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
