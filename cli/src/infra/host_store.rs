//! Infrastructure implementation of the `HostStore` port.
//!
//! All records live in one YAML document (`~/.tgfleet/hosts.yaml`), rewritten
//! atomically on every change. The file holds credentials, so it is created
//! with mode 0600.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::HostStore;
use crate::domain::{Host, HostError, HostStatus};
use crate::infra::fs::{data_dir, write_private};

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostsFile {
    #[serde(default)]
    hosts: Vec<Host>,
}

/// YAML-file host store.
pub struct YamlHostStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl YamlHostStore {
    /// Store at `<data dir>/hosts.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(data_dir()?.join("hosts.yaml")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<HostsFile> {
        if !self.path.exists() {
            return Ok(HostsFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading host file {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(HostsFile::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("parsing host file {}", self.path.display()))
    }

    fn write(&self, file: &HostsFile) -> Result<()> {
        let content = serde_yaml::to_string(file).context("serializing hosts")?;
        write_private(&self.path, content.as_bytes())
    }

    fn modify<R>(&self, f: impl FnOnce(&mut Vec<Host>) -> Result<R>) -> Result<R> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.read()?;
        let out = f(&mut file.hosts)?;
        file.hosts.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        self.write(&file)?;
        Ok(out)
    }
}

impl HostStore for YamlHostStore {
    fn get(&self, hostname: &str) -> Result<Option<Host>> {
        Ok(self
            .read()?
            .hosts
            .into_iter()
            .find(|h| h.hostname == hostname))
    }

    fn list(&self) -> Result<Vec<Host>> {
        let mut hosts = self.read()?.hosts;
        hosts.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(hosts)
    }

    fn upsert(&self, host: &Host) -> Result<()> {
        host.validate()?;
        self.modify(|hosts| {
            match hosts.iter_mut().find(|h| h.hostname == host.hostname) {
                Some(existing) => *existing = host.clone(),
                None => hosts.push(host.clone()),
            }
            Ok(())
        })
    }

    fn remove(&self, hostname: &str) -> Result<bool> {
        self.modify(|hosts| {
            let before = hosts.len();
            hosts.retain(|h| h.hostname != hostname);
            Ok(hosts.len() != before)
        })
    }

    fn record_status(
        &self,
        hostname: &str,
        status: Option<HostStatus>,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.modify(|hosts| {
            let host = hosts
                .iter_mut()
                .find(|h| h.hostname == hostname)
                .ok_or_else(|| HostError::NotFound(hostname.to_string()))?;
            if let Some(status) = status {
                host.status = status;
            }
            host.last_status_check = Some(checked_at);
            Ok(())
        })
    }
}
