//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tgfleet_common::HostLogEntry;

use crate::domain::{ConnectError, FileError, Host, HostStatus, Settings, TransportError};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

// ── Transport Ports ───────────────────────────────────────────────────────────

/// Opens authenticated sessions to hosts.
///
/// Futures are `Send` so the fleet coordinator can move them onto worker
/// tasks. Implementations never retry a failed connect.
pub trait Transport: Send + Sync {
    type Session: RemoteSession + 'static;

    /// Open a session to `host`, bounded by the connect timeout.
    fn open(&self, host: &Host) -> impl Future<Output = Result<Self::Session, ConnectError>> + Send;
}

/// One open session, exclusively owned by the operation that opened it.
///
/// Every network call is bounded by the command timeout.
pub trait RemoteSession: Send + Sync {
    /// Run a command and capture stdout, stderr and exit code.
    fn run(&self, command: &str)
    -> impl Future<Output = Result<CommandOutput, TransportError>> + Send;

    /// Run a command with `stdin` written to its standard input.
    fn run_with_stdin(
        &self,
        command: &str,
        stdin: &[u8],
    ) -> impl Future<Output = Result<CommandOutput, TransportError>> + Send;

    /// Read a file verbatim.
    fn read_file(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, FileError>> + Send;

    /// Replace a file atomically: write a temporary sibling, then rename it
    /// over `path`. A failed write leaves `path` untouched.
    fn write_file(
        &self,
        path: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<(), FileError>> + Send;

    /// Close the session. Dropping a session without calling this still
    /// releases it.
    fn close(self) -> impl Future<Output = ()> + Send;
}

// ── Persistence Ports ─────────────────────────────────────────────────────────

/// Host records, keyed by hostname. Owned by external persistence.
pub trait HostStore: Send + Sync {
    /// Look up one host.
    fn get(&self, hostname: &str) -> Result<Option<Host>>;
    /// All hosts, sorted by hostname.
    fn list(&self) -> Result<Vec<Host>>;
    /// Insert or replace a host record.
    fn upsert(&self, host: &Host) -> Result<()>;
    /// Remove a host. Returns `false` if it did not exist.
    fn remove(&self, hostname: &str) -> Result<bool>;
    /// Write the outcome of a status observation. `status = None` keeps the
    /// stored status and only moves `last_status_check`.
    fn record_status(
        &self,
        hostname: &str,
        status: Option<HostStatus>,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Append-only host event log.
pub trait EventLog: Send + Sync {
    fn append(&self, entry: &HostLogEntry) -> Result<()>;
    /// Entries newest first, optionally for one host, at most `limit`.
    fn list(&self, host: Option<&str>, limit: usize) -> Result<Vec<HostLogEntry>>;
    /// Every entry in append order.
    fn all(&self) -> Result<Vec<HostLogEntry>>;
    /// Drop entries older than `cutoff`. Returns how many were removed.
    fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Abstracts settings persistence (load/save).
pub trait SettingsStore {
    /// Load settings, returning defaults when nothing is stored.
    fn load(&self) -> Result<Settings>;
    fn save(&self, settings: &Settings) -> Result<()>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Reporter that discards everything. Used for fleet workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
