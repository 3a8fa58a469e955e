//! Config fetch/push engine.
//!
//! Imports only from `crate::domain`, `crate::application::ports` and the
//! test runner.

use chrono::Utc;

use crate::application::ports::{ProgressReporter, RemoteSession, Transport};
use crate::application::services::test_runner;
use crate::domain::remote::{self, AgentLayout};
use crate::domain::settings::AgentSettings;
use crate::domain::{
    Ack, ConfigDocument, FetchError, Host, PushError, PushOptions, TestError, TransportError,
};

/// Read the agent configuration from `host`, byte for byte.
///
/// # Errors
///
/// Returns [`FetchError`] when the file is missing, unreadable, or the host
/// cannot be reached.
pub async fn fetch(
    transport: &impl Transport,
    host: &Host,
    agent: &AgentSettings,
) -> Result<ConfigDocument, FetchError> {
    let layout = AgentLayout::for_host(agent, host);
    let session = transport.open(host).await?;
    let content = session.read_file(&layout.config_path).await;
    session.close().await;

    let content = content?;
    tracing::info!(host = %host.hostname, path = %layout.config_path, bytes = content.len(), "fetched config");
    Ok(ConfigDocument {
        source_host: host.hostname.clone(),
        path: layout.config_path,
        content,
        fetched_at: Utc::now(),
    })
}

/// Replace the agent configuration on `host` with `candidate`.
///
/// Empty or whitespace-only candidates are rejected before any session is
/// opened. The service is not restarted.
///
/// # Errors
///
/// Returns [`PushError`] on validation, permission, or transport failure.
pub async fn push(
    transport: &impl Transport,
    host: &Host,
    agent: &AgentSettings,
    candidate: &str,
    options: PushOptions,
    reporter: &impl ProgressReporter,
) -> Result<Ack, PushError> {
    if candidate.trim().is_empty() {
        return Err(PushError::ValidationFailed(
            "configuration is empty".to_string(),
        ));
    }

    if options.test_first {
        reporter.step(&format!("testing candidate on {}...", host.hostname));
        let report = test_runner::test(transport, host, agent, Some(candidate))
            .await
            .map_err(|e| match e {
                TestError::ValidationFailed(msg) => PushError::ValidationFailed(msg),
                TestError::Transport(t) => PushError::Transport(t),
            })?;
        if !report.passed() {
            return Err(PushError::ValidationFailed(format!(
                "agent test exited with code {}: {}",
                report.exit_code,
                first_line(&report.raw_output)
            )));
        }
        reporter.success("candidate passed agent test");
    }

    let layout = AgentLayout::for_host(agent, host);
    let session = transport.open(host).await?;
    let result = write_config(&session, &layout, candidate, options, reporter).await;
    session.close().await;
    result?;

    tracing::info!(
        host = %host.hostname,
        path = %layout.config_path,
        bytes = candidate.len(),
        backup = options.keep_backup,
        "pushed config"
    );
    Ok(Ack {
        message: format!(
            "Configuration written to {} on {}. Restart or reload the service to apply it.",
            layout.config_path, host.hostname
        ),
    })
}

async fn write_config(
    session: &impl RemoteSession,
    layout: &AgentLayout,
    candidate: &str,
    options: PushOptions,
    reporter: &impl ProgressReporter,
) -> Result<(), PushError> {
    if options.keep_backup {
        let out = session
            .run(&remote::backup_command(&layout.config_path, layout.use_sudo))
            .await?;
        if !out.success() {
            let stderr = out.stderr_text();
            return Err(match remote::classify_file_failure(&stderr) {
                remote::FileFailure::PermissionDenied => PushError::PermissionDenied {
                    path: remote::backup_path(&layout.config_path),
                },
                _ => PushError::Transport(TransportError::Remote(format!(
                    "backup of {} failed: {}",
                    layout.config_path,
                    stderr.trim()
                ))),
            });
        }
        reporter.step(&format!(
            "saved previous config to {}",
            remote::backup_path(&layout.config_path)
        ));
    }

    session
        .write_file(&layout.config_path, candidate.as_bytes())
        .await?;
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
}
