//! Runs the agent's built-in config test (`telegraf --config <path> --test`).
//!
//! The live service is never touched. A candidate is written to a scratch
//! file under `/tmp`, tested, then removed.

use crate::application::ports::{CommandOutput, RemoteSession, Transport};
use crate::domain::remote::{self, AgentLayout};
use crate::domain::settings::AgentSettings;
use crate::domain::{ConfigSource, Host, TestError, TestReport};

/// Test the deployed configuration, or `candidate` when given.
///
/// A non-zero exit of the agent is reported in [`TestReport::exit_code`],
/// not as an error.
///
/// # Errors
///
/// Returns [`TestError::ValidationFailed`] for an empty candidate (no session
/// is opened) and [`TestError::Transport`] when the test could not be run.
pub async fn test(
    transport: &impl Transport,
    host: &Host,
    agent: &AgentSettings,
    candidate: Option<&str>,
) -> Result<TestReport, TestError> {
    if candidate.is_some_and(|c| c.trim().is_empty()) {
        return Err(TestError::ValidationFailed(
            "candidate configuration is empty".to_string(),
        ));
    }

    let layout = AgentLayout::for_host(agent, host);
    let session = transport.open(host).await?;
    let result = match candidate {
        None => run_test(&session, &layout, &layout.config_path).await.map(|out| {
            report(
                out,
                ConfigSource::Deployed {
                    path: layout.config_path.clone(),
                },
            )
        }),
        Some(candidate) => test_candidate(&session, &layout, candidate)
            .await
            .map(|out| report(out, ConfigSource::Candidate)),
    };
    session.close().await;

    let report = result?;
    tracing::info!(host = %host.hostname, exit_code = report.exit_code, "agent config test finished");
    Ok(report)
}

async fn run_test(
    session: &impl RemoteSession,
    layout: &AgentLayout,
    path: &str,
) -> Result<CommandOutput, TestError> {
    Ok(session.run(&layout.test_command(path)).await?)
}

async fn test_candidate(
    session: &impl RemoteSession,
    layout: &AgentLayout,
    candidate: &str,
) -> Result<CommandOutput, TestError> {
    let scratch = remote::candidate_path(&remote::scratch_nonce());
    session.write_file(&scratch, candidate.as_bytes()).await?;
    let result = run_test(session, layout, &scratch).await;

    let cleanup = remote::remove_file_command(&scratch, layout.use_sudo);
    match session.run(&cleanup).await {
        Ok(out) if out.success() => {}
        Ok(out) => tracing::warn!(path = %scratch, stderr = %out.stderr_text().trim(), "could not remove candidate file"),
        Err(e) => tracing::warn!(path = %scratch, error = %e, "could not remove candidate file"),
    }
    result
}

fn report(out: CommandOutput, source: ConfigSource) -> TestReport {
    let stdout = out.stdout_text();
    let stderr = out.stderr_text();
    TestReport {
        raw_output: format!("{stdout}{stderr}"),
        stdout,
        stderr,
        exit_code: out.exit_code,
        source,
    }
}
