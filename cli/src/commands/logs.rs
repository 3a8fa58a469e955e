//! `tgfleet logs`: view, summarise and prune the host event log.

use std::process::ExitCode;

use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::application::ports::EventLog;
use crate::application::services::log_report::{self, DEFAULT_LOG_LIMIT};

/// Arguments for the logs command.
#[derive(Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: Option<LogsCommand>,

    /// Only entries for this host
    #[arg(long)]
    pub host: Option<String>,

    /// Maximum number of entries, newest first
    #[arg(long, default_value_t = DEFAULT_LOG_LIMIT)]
    pub limit: usize,
}

/// Logs subcommands.
#[derive(Subcommand)]
pub enum LogsCommand {
    /// Counts per event kind and most active hosts
    Stats,
    /// Delete entries older than N days
    Cleanup {
        /// Age limit in days (default: logs.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

/// Run the logs command.
///
/// # Errors
///
/// Returns an error if the event log cannot be read or rewritten.
pub fn run(app: &AppContext, args: LogsArgs) -> Result<ExitCode> {
    match args.command {
        None => {
            let entries = app.events.list(args.host.as_deref(), args.limit)?;
            app.renderer().render_logs(&entries)?;
        }
        Some(LogsCommand::Stats) => {
            let stats = log_report::statistics(&app.events.all()?, Utc::now());
            app.renderer().render_log_stats(&stats)?;
        }
        Some(LogsCommand::Cleanup { days }) => {
            let days = days.unwrap_or(app.settings.logs.retention_days);
            if days == 0 {
                bail!("--days must be at least 1");
            }
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            let removed = app.events.cleanup(cutoff)?;
            tracing::info!(removed, days, "event log cleaned up");
            app.renderer().render_message(&format!(
                "Removed {removed} log entries older than {days} days"
            ))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
