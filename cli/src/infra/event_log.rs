//! Infrastructure implementation of the `EventLog` port: one JSON object per
//! line in `~/.tgfleet/events.jsonl`.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tgfleet_common::HostLogEntry;

use crate::application::ports::EventLog;
use crate::infra::fs::{data_dir, write_private};

pub struct JsonlEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventLog {
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(data_dir()?.join("events.jsonl")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn read_content(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path)
            .map(Some)
            .with_context(|| format!("reading event log {}", self.path.display()))
    }

    fn read_all(&self) -> Result<Vec<HostLogEntry>> {
        let Some(content) = self.read_content()? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HostLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(line = index + 1, error = %e, "skipping malformed log entry"),
            }
        }
        Ok(entries)
    }
}

impl EventLog for JsonlEventLog {
    fn append(&self, entry: &HostLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_vec(entry).context("serializing log entry")?;
        line.push(b'\n');

        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("opening event log {}", self.path.display()))?;
        file.write_all(&line)
            .with_context(|| format!("appending to {}", self.path.display()))
    }

    fn list(&self, host: Option<&str>, limit: usize) -> Result<Vec<HostLogEntry>> {
        let mut entries: Vec<HostLogEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| host.is_none_or(|h| e.host == h))
            .collect();
        // Stable sort keeps append order for equal timestamps; reverse gives
        // newest first.
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    fn all(&self) -> Result<Vec<HostLogEntry>> {
        self.read_all()
    }

    /// Drop entries older than `cutoff`. Lines that do not parse are kept
    /// verbatim, since their age is unknown.
    fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(content) = self.read_content()? else {
            return Ok(0);
        };
        let mut kept = String::with_capacity(content.len());
        let mut removed = 0;
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HostLogEntry>(line) {
                Ok(entry) if entry.timestamp < cutoff => {
                    removed += 1;
                    continue;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(line = index + 1, error = %e, "keeping malformed log entry"),
            }
            kept.push_str(line);
            kept.push('\n');
        }
        if removed > 0 {
            write_private(&self.path, kept.as_bytes())?;
        }
        Ok(removed)
    }
}
