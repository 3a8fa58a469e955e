//! JSON output: the machine-readable renderer and the error-object formatter
//! used by all `--json` code paths when a command fails.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tgfleet_common::{FleetStatusOutput, HostLogEntry, HostStatus, LogStatistics};

use crate::application::services::fleet::FleetReport;
use crate::domain::{Host, HostError, OperationResult, Settings, SettingsError};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable code for a command-level error.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(host_err) = err.downcast_ref::<HostError>() {
        return match host_err {
            HostError::NotFound(_) => "not_found",
            HostError::AlreadyExists(_) => "already_exists",
            _ => "invalid_host",
        };
    }
    if err.downcast_ref::<SettingsError>().is_some() {
        return "invalid_setting";
    }
    "error"
}

/// Host record as shown to operators. Secret material never leaves the
/// store; only the authentication method does.
#[derive(Debug, Serialize)]
pub struct HostView<'a> {
    pub hostname: &'a str,
    pub ip_address: &'a str,
    pub ssh_port: u16,
    pub ssh_user: &'a str,
    pub auth_method: &'static str,
    pub status: HostStatus,
    pub last_status_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_key_sha256: Option<&'a str>,
    pub monitoring_enabled: bool,
}

impl<'a> From<&'a Host> for HostView<'a> {
    fn from(host: &'a Host) -> Self {
        Self {
            hostname: &host.hostname,
            ip_address: &host.ip_address,
            ssh_port: host.effective_port(),
            ssh_user: &host.ssh_user,
            auth_method: host.credential.method_name(),
            status: host.status,
            last_status_check: host.last_status_check,
            config_path: host.config_path.as_deref(),
            host_key_sha256: host.host_key_sha256.as_deref(),
            monitoring_enabled: host.monitoring_enabled,
        }
    }
}

#[derive(Serialize)]
struct FleetReportView<'a> {
    operation: String,
    total: usize,
    succeeded: usize,
    failed: usize,
    results: &'a [OperationResult],
}

#[derive(Serialize)]
struct SettingView<'a> {
    key: &'a str,
    value: String,
}

/// Renders domain types as pretty-printed JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    fn print(value: &impl Serialize) -> Result<()> {
        let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        Self::print(&serde_json::json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_hosts(&self, hosts: &[Host]) -> Result<()> {
        let views: Vec<HostView<'_>> = hosts.iter().map(HostView::from).collect();
        Self::print(&serde_json::json!({ "hosts": views }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_host(&self, host: &Host) -> Result<()> {
        Self::print(&HostView::from(host))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_result(&self, result: &OperationResult) -> Result<()> {
        Self::print(result)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_fleet_report(&self, report: &FleetReport) -> Result<()> {
        Self::print(&FleetReportView {
            operation: report.operation.to_string(),
            total: report.results.len(),
            succeeded: report.succeeded(),
            failed: report.failed(),
            results: &report.results,
        })
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_fleet_status(&self, status: &FleetStatusOutput) -> Result<()> {
        Self::print(status)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_logs(&self, entries: &[HostLogEntry]) -> Result<()> {
        Self::print(&serde_json::json!({ "logs": entries, "count": entries.len() }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_log_stats(&self, stats: &LogStatistics) -> Result<()> {
        Self::print(stats)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_settings(&self, settings: &Settings) -> Result<()> {
        let entries = settings.entries();
        let views: Vec<SettingView<'_>> = entries
            .into_iter()
            .map(|(key, value)| SettingView { key, value })
            .collect();
        Self::print(&serde_json::json!({ "settings": views }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_message(&self, message: &str) -> Result<()> {
        Self::print(&serde_json::json!({ "message": message }))
    }
}
