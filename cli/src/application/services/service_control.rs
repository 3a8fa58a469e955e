//! Service controller: start/stop/restart/reload of the agent's systemd unit.
//!
//! The unit is probed once before acting. The requested action then runs
//! exactly once; nothing here retries.

use crate::application::ports::{RemoteSession, Transport};
use crate::domain::remote::{self, AgentLayout};
use crate::domain::settings::AgentSettings;
use crate::domain::{Ack, Host, ServiceAction, ServiceError, ServiceState, parse_unit_state};

/// Apply `action` to the agent service on `host`.
///
/// `Stop` on a stopped service and `Start` on a running one are acknowledged
/// like any other successful run.
///
/// # Errors
///
/// Returns [`ServiceError::NotInstalled`] when the unit does not exist,
/// [`ServiceError::NotRunning`] for `Reload` on a stopped service, and the
/// classified failure when `systemctl` itself fails.
pub async fn manage(
    transport: &impl Transport,
    host: &Host,
    agent: &AgentSettings,
    action: ServiceAction,
) -> Result<Ack, ServiceError> {
    let layout = AgentLayout::for_host(agent, host);
    let session = transport.open(host).await?;
    let result = apply(&session, &layout, action).await;
    session.close().await;

    match &result {
        Ok(_) => tracing::info!(host = %host.hostname, %action, service = %layout.service, "service action applied"),
        Err(e) => tracing::warn!(host = %host.hostname, %action, error = %e, "service action failed"),
    }
    result.map(|()| Ack {
        message: format!(
            "Action '{action}' sent to Telegraf service on {}.",
            host.hostname
        ),
    })
}

async fn apply(
    session: &impl RemoteSession,
    layout: &AgentLayout,
    action: ServiceAction,
) -> Result<(), ServiceError> {
    let probe = session.run(&layout.unit_state_command()).await?;
    let state = parse_unit_state(&probe.stdout_text()).map(|unit| unit.service_state());
    tracing::debug!(service = %layout.service, ?state, "observed service state");

    match (state, action) {
        (Some(ServiceState::NotInstalled), _) => {
            return Err(ServiceError::NotInstalled {
                service: layout.service.clone(),
            });
        }
        (Some(ServiceState::Stopped), ServiceAction::Reload) => {
            return Err(ServiceError::NotRunning {
                action,
                service: layout.service.clone(),
            });
        }
        _ => {}
    }

    let out = session.run(&layout.service_command(action)).await?;
    if out.success() {
        Ok(())
    } else {
        Err(remote::classify_service_failure(
            action,
            &layout.service,
            out.exit_code,
            &out.stderr_text(),
        ))
    }
}
