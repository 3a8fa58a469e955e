//! `tgfleet config`: fetch, push and test the agent configuration.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::app::AppContext;
use crate::commands::{exit_code, require_host, run_single};
use crate::domain::{HostOperation, Outcome, Payload, PushOptions};

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Download the agent configuration from a host
    Fetch {
        /// Host id
        host: String,
        /// Write the configuration to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Replace the agent configuration on a host
    Push {
        /// Host id
        host: String,
        /// Candidate configuration file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
        /// Validate the candidate with the agent before writing it
        #[arg(long)]
        test_first: bool,
        /// Copy the live file to <path>.bak before replacing it
        #[arg(long)]
        backup: bool,
    },
    /// Run the agent's configuration test on a host
    Test {
        /// Host id
        host: String,
        /// Test this candidate file instead of the deployed configuration
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the host is unknown, a local file cannot be read or
/// written, or output rendering fails. Remote failures are rendered and
/// reflected in the exit code.
pub async fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Fetch { host, output } => fetch(app, &host, output.as_deref()).await,
        ConfigCommand::Push {
            host,
            file,
            test_first,
            backup,
        } => {
            let options = PushOptions {
                test_first,
                keep_backup: backup,
            };
            push(app, &host, &file, options).await
        }
        ConfigCommand::Test { host, file } => test(app, &host, file.as_deref()).await,
    }
}

async fn fetch(app: &AppContext, hostname: &str, output: Option<&Path>) -> Result<ExitCode> {
    let host = require_host(app, hostname)?;
    let result = run_single(app, app.engine(None), &host, &HostOperation::FetchConfig).await;

    if let (
        Some(path),
        Outcome::Success {
            payload: Payload::Config(doc),
        },
    ) = (output, &result.outcome)
    {
        std::fs::write(path, &doc.content)
            .with_context(|| format!("cannot write {}", path.display()))?;
        if app.is_json() {
            app.renderer().render_result(&result)?;
        } else {
            app.output.success(&format!(
                "Saved {} from {} to {}",
                doc.path,
                hostname,
                path.display()
            ));
        }
        return Ok(ExitCode::SUCCESS);
    }

    app.renderer().render_result(&result)?;
    Ok(exit_code(result.is_success()))
}

async fn push(
    app: &AppContext,
    hostname: &str,
    file: &Path,
    options: PushOptions,
) -> Result<ExitCode> {
    let host = require_host(app, hostname)?;
    let candidate = read_candidate(file)?;

    let prompt = format!(
        "Replace the Telegraf configuration on {hostname} with {}?",
        file.display()
    );
    if !app.confirm(&prompt, true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let operation = HostOperation::PushConfig { candidate, options };
    let result = run_single(app, app.engine(None), &host, &operation).await;
    app.renderer().render_result(&result)?;
    Ok(exit_code(result.is_success()))
}

async fn test(app: &AppContext, hostname: &str, file: Option<&Path>) -> Result<ExitCode> {
    let host = require_host(app, hostname)?;
    let candidate = file.map(read_candidate).transpose()?;

    let operation = HostOperation::TestConfig { candidate };
    let result = run_single(app, app.engine(None), &host, &operation).await;
    app.renderer().render_result(&result)?;

    let passed = matches!(
        &result.outcome,
        Outcome::Success { payload: Payload::TestReport(report) } if report.passed()
    );
    Ok(exit_code(passed))
}

fn read_candidate(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    String::from_utf8(bytes).map_err(|_| {
        anyhow::anyhow!(
            "{} is not valid UTF-8; Telegraf configuration must be text",
            path.display()
        )
    })
}
