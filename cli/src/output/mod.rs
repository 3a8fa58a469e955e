//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;
use tgfleet_common::{FleetStatusOutput, HostLogEntry, LogStatistics};

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::{SpinnerReporter, TerminalReporter};
pub use styles::Styles;

use crate::application::services::fleet::FleetReport;
use crate::domain::{Host, OperationResult, Settings};

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Human or JSON rendering, chosen once per invocation.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(r) => r.render_version(version),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_message(&self, message: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_message(message);
                Ok(())
            }
            Self::Json(r) => r.render_message(message),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_hosts(&self, hosts: &[Host]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_hosts(hosts);
                Ok(())
            }
            Self::Json(r) => r.render_hosts(hosts),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_host(&self, host: &Host) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_host(host);
                Ok(())
            }
            Self::Json(r) => r.render_host(host),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_result(&self, result: &OperationResult) -> Result<()> {
        match self {
            Self::Human(r) => r.render_result(result),
            Self::Json(r) => r.render_result(result),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_fleet_report(&self, report: &FleetReport) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_fleet_report(report);
                Ok(())
            }
            Self::Json(r) => r.render_fleet_report(report),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_fleet_status(&self, status: &FleetStatusOutput) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_fleet_status(status);
                Ok(())
            }
            Self::Json(r) => r.render_fleet_status(status),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_logs(&self, entries: &[HostLogEntry]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_logs(entries);
                Ok(())
            }
            Self::Json(r) => r.render_logs(entries),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_log_stats(&self, stats: &LogStatistics) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_log_stats(stats);
                Ok(())
            }
            Self::Json(r) => r.render_log_stats(stats),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_settings(&self, settings: &Settings, path: &std::path::Path) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_settings(settings, path);
                Ok(())
            }
            Self::Json(r) => r.render_settings(settings),
        }
    }
}
