//! Human-readable terminal renderer.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize as _;
use tgfleet_common::{FleetStatusOutput, HostLogEntry, HostStatus, LogStatistics};

use crate::application::services::fleet::FleetReport;
use crate::domain::{ConfigDocument, Host, OperationResult, Outcome, Payload, Settings};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("tgfleet {version}");
    }

    /// Render a confirmation line for a completed local change.
    pub fn render_message(&self, message: &str) {
        self.ctx.success(message);
    }

    pub fn render_hosts(&self, hosts: &[Host]) {
        if hosts.is_empty() {
            if !self.ctx.quiet {
                println!("No hosts registered. Add one: tgfleet hosts add <host> --ip <address>");
            }
            return;
        }
        println!(
            "  {:<24} {:<40} {:<10} {:<12} {}",
            "HOST".style(self.ctx.styles.bold),
            "ADDRESS".style(self.ctx.styles.bold),
            "STATUS".style(self.ctx.styles.bold),
            "AUTH".style(self.ctx.styles.bold),
            "LAST CHECK".style(self.ctx.styles.bold),
        );
        let now = Utc::now();
        for host in hosts {
            let address = format!("{}@{}:{}", host.ssh_user, host.ip_address, host.effective_port());
            let status = format!("{:<10}", host.status.as_str());
            let monitoring = if host.monitoring_enabled { "" } else { "  (monitoring off)" };
            println!(
                "  {:<24} {:<40} {} {:<12} {}{monitoring}",
                host.hostname,
                address,
                status.style(self.ctx.styles.status(host.status)),
                host.credential.method_name(),
                format_check_age(host.last_status_check, now),
            );
        }
    }

    pub fn render_host(&self, host: &Host) {
        println!();
        self.ctx.header(&host.hostname);
        self.ctx.kv("Address:      ", &host.ip_address);
        self.ctx.kv("Port:         ", &host.effective_port().to_string());
        self.ctx.kv("User:         ", &host.ssh_user);
        self.ctx.kv("Auth:         ", host.credential.method_name());
        self.ctx.kv("Status:       ", host.status.as_str());
        self.ctx.kv(
            "Last check:   ",
            &format_check_age(host.last_status_check, Utc::now()),
        );
        self.ctx.kv(
            "Config path:  ",
            host.config_path.as_deref().unwrap_or("(default)"),
        );
        self.ctx.kv(
            "Host key:     ",
            host.host_key_sha256.as_deref().unwrap_or("(not pinned)"),
        );
        self.ctx.kv(
            "Monitoring:   ",
            if host.monitoring_enabled { "enabled" } else { "disabled" },
        );
        println!();
    }

    /// Render the result of a single-host operation.
    ///
    /// Fetched configuration bytes go to stdout unchanged and test output is
    /// printed verbatim; other payloads become a one-line summary.
    ///
    /// # Errors
    ///
    /// Returns an error if stdout cannot be written.
    pub fn render_result(&self, result: &OperationResult) -> Result<()> {
        match &result.outcome {
            Outcome::Success {
                payload: Payload::Config(doc),
            } => write_config(&mut std::io::stdout().lock(), doc)?,
            Outcome::Success {
                payload: Payload::TestReport(report),
            } => {
                println!("{}", report.display_text());
                if report.passed() {
                    self.ctx.success(&format!("Configuration test passed on {}", result.host_id));
                } else {
                    self.ctx.error(&format!(
                        "Configuration test failed on {} (exit code {})",
                        result.host_id, report.exit_code
                    ));
                }
            }
            Outcome::Success {
                payload: Payload::Status(obs),
            } => {
                let status = obs.status.as_str();
                if !self.ctx.quiet {
                    println!(
                        "  {}  {}  {}  {}",
                        result.host_id.style(self.ctx.styles.bold),
                        status.style(self.ctx.styles.status(obs.status)),
                        obs.detail.style(self.ctx.styles.dim),
                        format!("{}ms", obs.response_time.as_millis()).style(self.ctx.styles.dim),
                    );
                }
            }
            Outcome::Success { payload } => self.ctx.success(&payload.summary()),
            Outcome::Failure { kind, message } => {
                self.ctx.error(&format!("{}: {message} [{kind}]", result.host_id));
            }
        }
        Ok(())
    }

    /// Render a fleet job: one line per host, then a summary.
    pub fn render_fleet_report(&self, report: &FleetReport) {
        if self.ctx.quiet {
            for result in report.results.iter().filter(|r| !r.is_success()) {
                self.ctx.error(&format!("{}: {}", result.host_id, result.message()));
            }
            return;
        }
        println!();
        self.ctx.header(&format!("{} on {} hosts", report.operation, report.results.len()));
        for result in &report.results {
            match &result.outcome {
                Outcome::Success { payload } => println!(
                    "    {} {:<24} {}",
                    "✓".style(self.ctx.styles.success),
                    result.host_id,
                    payload.summary()
                ),
                Outcome::Failure { kind, message } => println!(
                    "    {} {:<24} {} {}",
                    "✗".style(self.ctx.styles.error),
                    result.host_id,
                    message,
                    format!("[{kind}]").style(self.ctx.styles.dim)
                ),
            }
        }
        println!();
        let summary = format!("{} succeeded, {} failed", report.succeeded(), report.failed());
        if report.failed() == 0 {
            self.ctx.success(&summary);
        } else {
            self.ctx.warn(&summary);
        }
    }

    /// Render the fleet status table with counts and recent changes.
    pub fn render_fleet_status(&self, status: &FleetStatusOutput) {
        if self.ctx.quiet {
            return;
        }
        if status.hosts.is_empty() {
            println!("No hosts registered. Add one: tgfleet hosts add <host> --ip <address>");
            return;
        }
        println!(
            "  {:<24} {:<40} {:<10} {}",
            "HOST".style(self.ctx.styles.bold),
            "ADDRESS".style(self.ctx.styles.bold),
            "STATUS".style(self.ctx.styles.bold),
            "LAST CHECK".style(self.ctx.styles.bold),
        );
        for row in &status.hosts {
            let label = format!("{:<10}", row.status.as_str());
            println!(
                "  {:<24} {:<40} {} {}",
                row.hostname,
                row.ip_address,
                label.style(self.ctx.styles.status(row.status)),
                format_check_age(row.last_status_check, status.timestamp),
            );
        }
        println!();
        let counts = &status.status_counts;
        println!(
            "  {} hosts: {} active, {} down, {} inactive, {} unknown",
            status.total_hosts,
            counts.active.style(self.ctx.styles.status(HostStatus::Active)),
            counts.down.style(self.ctx.styles.status(HostStatus::Down)),
            counts.inactive.style(self.ctx.styles.status(HostStatus::Inactive)),
            counts.unknown,
        );
        if !status.recent_changes.is_empty() {
            println!();
            self.ctx.header("Changes in the last hour:");
            for entry in &status.recent_changes {
                println!(
                    "    {}  {:<24} {}",
                    format_timestamp(entry.timestamp).style(self.ctx.styles.dim),
                    entry.host,
                    entry.details
                );
            }
        }
    }

    pub fn render_logs(&self, entries: &[HostLogEntry]) {
        if self.ctx.quiet {
            return;
        }
        if entries.is_empty() {
            println!("No log entries.");
            return;
        }
        for entry in entries {
            println!(
                "  {}  {:<24} {:<17} {}",
                format_timestamp(entry.timestamp).style(self.ctx.styles.dim),
                entry.host,
                entry.event_kind.as_str(),
                entry.details
            );
        }
    }

    pub fn render_log_stats(&self, stats: &LogStatistics) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.kv("Total entries:     ", &stats.total_logs.to_string());
        self.ctx.kv("Last 24 hours:     ", &stats.recent_activity.to_string());
        if !stats.event_kinds.is_empty() {
            println!();
            self.ctx.header("By event kind:");
            for entry in &stats.event_kinds {
                println!("    {:<20} {}", entry.key.as_str(), entry.count);
            }
        }
        if !stats.top_hosts.is_empty() {
            println!();
            self.ctx.header("Most active hosts:");
            for entry in &stats.top_hosts {
                println!("    {:<24} {}", entry.key, entry.count);
            }
        }
        println!();
    }

    /// Render the current settings.
    pub fn render_settings(&self, settings: &Settings, path: &std::path::Path) {
        println!();
        println!(
            "  {}",
            format!("Settings ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in settings.entries() {
            println!("  {:<34} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in ["TGFLEET_HOME", "TGFLEET_SETTINGS", "NO_COLOR"] {
            println!(
                "    {:<18} {}",
                format!("{var}:"),
                std::env::var(var).unwrap_or_else(|_| "(not set)".to_string())
            );
        }
        println!();
    }
}

// ── Display helpers ───────────────────────────────────────────────────────────

#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `"never"`, `"just now"`, `"5m ago"`, `"3h ago"` or `"2d ago"`.
#[must_use]
pub fn format_check_age(checked: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(checked) = checked else {
        return "never".to_string();
    };
    let secs = now.signed_duration_since(checked).num_seconds().max(0);
    match secs {
        0..60 => "just now".to_string(),
        60..3600 => format!("{}m ago", secs / 60),
        3600..86_400 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// Write fetched configuration bytes exactly as they were read.
fn write_config(out: &mut impl Write, doc: &ConfigDocument) -> Result<()> {
    out.write_all(&doc.content)
        .and_then(|()| out.flush())
        .with_context(|| format!("writing configuration from {}", doc.source_host))
}
