//! Shared mock infrastructure for unit tests.
//!
//! A `mockall` host store, an in-memory event log and a scripted
//! transport, so each test file doesn't have to re-define the same
//! boilerplate.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use mockall::mock;
use tgfleet_cli::application::ports::{CommandOutput, EventLog, HostStore, RemoteSession, Transport};
use tgfleet_cli::domain::{ConnectError, Credential, FileError, Host, HostStatus, TransportError};
use tgfleet_common::HostLogEntry;

// ── Persistence mocks ─────────────────────────────────────────────────────────

mock! {
    pub Hosts {}

    impl HostStore for Hosts {
        fn get(&self, hostname: &str) -> Result<Option<Host>>;
        fn list(&self) -> Result<Vec<Host>>;
        fn upsert(&self, host: &Host) -> Result<()>;
        fn remove(&self, hostname: &str) -> Result<bool>;
        fn record_status(
            &self,
            hostname: &str,
            status: Option<HostStatus>,
            checked_at: DateTime<Utc>,
        ) -> Result<()>;
    }
}

/// In-memory event log recording every appended entry.
#[derive(Default)]
pub struct MemoryLog {
    pub entries: Mutex<Vec<HostLogEntry>>,
}

impl MemoryLog {
    pub fn snapshot(&self) -> Vec<HostLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl EventLog for MemoryLog {
    fn append(&self, entry: &HostLogEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn list(&self, host: Option<&str>, limit: usize) -> Result<Vec<HostLogEntry>> {
        let mut entries: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| host.is_none_or(|h| e.host == h))
            .collect();
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    fn all(&self) -> Result<Vec<HostLogEntry>> {
        Ok(self.snapshot())
    }

    fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        Ok(before - entries.len())
    }
}

pub fn host(name: &str) -> Host {
    Host::new(name, "10.0.0.10", Credential::password("pw"))
}

/// Host store that answers `get` for the given hostnames.
pub fn hosts_named(names: &[&str]) -> MockHosts {
    let known: Vec<String> = names.iter().map(ToString::to_string).collect();
    let mut store = MockHosts::new();
    store
        .expect_get()
        .returning(move |id| Ok(known.iter().any(|k| k == id).then(|| host(id))));
    store
}

// ── Scripted transport ────────────────────────────────────────────────────────

pub const CONFIG_PATH: &str = "/etc/telegraf/telegraf.conf";

#[derive(Default)]
struct Script {
    unreachable: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    responses: Vec<(String, CommandOutput)>,
    delay: Duration,
    commands: Vec<String>,
}

/// Transport whose hosts run a healthy Telegraf unit unless told otherwise.
/// Files live in one shared map keyed by `host:path`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn unreachable(self, host: &str) -> Self {
        self.script.lock().unwrap().unreachable.push(host.to_string());
        self
    }

    pub fn with_file(self, host: &str, path: &str, content: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .files
            .insert(format!("{host}:{path}"), content.as_bytes().to_vec());
        self
    }

    /// Answer any command containing `needle` with `output`.
    pub fn respond(self, needle: &str, output: CommandOutput) -> Self {
        self.script
            .lock()
            .unwrap()
            .responses
            .push((needle.to_string(), output));
        self
    }

    pub fn delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().delay = delay;
        self
    }

    pub fn file(&self, host: &str, path: &str) -> Option<Vec<u8>> {
        self.script
            .lock()
            .unwrap()
            .files
            .get(&format!("{host}:{path}"))
            .cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.script.lock().unwrap().commands.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
        exit_code: code,
    }
}

impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    async fn open(&self, host: &Host) -> Result<ScriptedSession, ConnectError> {
        let delay = self.script.lock().unwrap().delay;
        if self
            .script
            .lock()
            .unwrap()
            .unreachable
            .contains(&host.hostname)
        {
            return Err(ConnectError::Timeout {
                addr: format!("{}:22", host.ip_address),
                secs: 10,
            });
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        Ok(ScriptedSession {
            host: host.hostname.clone(),
            transport: self.clone(),
        })
    }
}

pub struct ScriptedSession {
    host: String,
    transport: ScriptedTransport,
}

impl ScriptedSession {
    fn answer(&self, command: &str) -> CommandOutput {
        let mut script = self.transport.script.lock().unwrap();
        script.commands.push(command.to_string());
        if let Some((_, out)) = script.responses.iter().find(|(n, _)| command.contains(n)) {
            return out.clone();
        }
        if command.contains("systemctl show") {
            return output(
                0,
                "LoadState=loaded\nActiveState=active\nUnitFileState=enabled\n",
                "",
            );
        }
        output(0, "", "")
    }
}

impl RemoteSession for ScriptedSession {
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        Ok(self.answer(command))
    }

    async fn run_with_stdin(
        &self,
        command: &str,
        _stdin: &[u8],
    ) -> Result<CommandOutput, TransportError> {
        Ok(self.answer(command))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, FileError> {
        self.transport
            .file(&self.host, path)
            .ok_or_else(|| FileError::NotFound {
                path: path.to_string(),
            })
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FileError> {
        self.transport
            .script
            .lock()
            .unwrap()
            .files
            .insert(format!("{}:{path}", self.host), content.to_vec());
        Ok(())
    }

    async fn close(self) {
        self.transport.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
