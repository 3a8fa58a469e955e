//! Status prober and the process-wide status cache.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::application::ports::{RemoteSession, Transport};
use crate::domain::remote::AgentLayout;
use crate::domain::settings::AgentSettings;
use crate::domain::{Host, HostStatus, StatusObservation, parse_unit_state};

/// Observe the agent on `host`.
///
/// Never fails: a host that cannot be reached is `Down`, and output that
/// cannot be interpreted is `Unknown`. `checked_at` is taken when the
/// observation completes; `response_time` is the session-open latency.
pub async fn probe(transport: &impl Transport, host: &Host, agent: &AgentSettings) -> StatusObservation {
    let layout = AgentLayout::for_host(agent, host);
    let started = Instant::now();
    let session = match transport.open(host).await {
        Ok(session) => session,
        Err(e) => {
            tracing::info!(host = %host.hostname, error = %e, "host unreachable");
            return StatusObservation {
                status: HostStatus::Down,
                checked_at: Utc::now(),
                response_time: started.elapsed(),
                detail: e.to_string(),
            };
        }
    };
    let response_time = started.elapsed();

    let (status, detail) = match session.run(&layout.unit_state_command()).await {
        Ok(out) => match parse_unit_state(&out.stdout_text()) {
            Some(unit) => (unit.host_status(), unit.describe()),
            None => (
                HostStatus::Unknown,
                format!("unrecognised systemctl output (exit {})", out.exit_code),
            ),
        },
        Err(e) => (HostStatus::Unknown, e.to_string()),
    };
    session.close().await;

    tracing::debug!(host = %host.hostname, %status, ?response_time, "probed");
    StatusObservation {
        status,
        checked_at: Utc::now(),
        response_time,
        detail,
    }
}

// ── Status cache ──────────────────────────────────────────────────────────────

/// Last-known status per host, for throttling repeated probes.
///
/// Created explicitly and passed to whoever needs it. Writers race freely;
/// the last write wins.
#[derive(Debug)]
pub struct StatusCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, StatusObservation>>,
}

impl StatusCache {
    /// A cache whose entries stay fresh for `ttl`. A zero ttl disables it.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Seed from stored host records whose last check is still fresh.
    pub fn seed<'a>(&self, hosts: impl IntoIterator<Item = &'a Host>, now: DateTime<Utc>) {
        for host in hosts {
            if let Some(checked_at) = host.last_status_check {
                self.insert_at(
                    &host.hostname,
                    StatusObservation {
                        status: host.status,
                        checked_at,
                        response_time: Duration::ZERO,
                        detail: "cached".to_string(),
                    },
                    now,
                );
            }
        }
    }

    /// The cached observation for `hostname`, if still fresh.
    #[must_use]
    pub fn get(&self, hostname: &str) -> Option<StatusObservation> {
        self.get_at(hostname, Utc::now())
    }

    fn get_at(&self, hostname: &str, now: DateTime<Utc>) -> Option<StatusObservation> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(hostname)
            .filter(|obs| self.is_fresh(obs, now))
            .cloned()
    }

    pub fn insert(&self, hostname: &str, observation: StatusObservation) {
        self.insert_at(hostname, observation, Utc::now());
    }

    fn insert_at(&self, hostname: &str, observation: StatusObservation, now: DateTime<Utc>) {
        if !self.is_fresh(&observation, now) {
            return;
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hostname.to_string(), observation);
    }

    /// Drop one host's entry, or every entry when `hostname` is `None`.
    pub fn invalidate(&self, hostname: Option<&str>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match hostname {
            Some(name) => {
                entries.remove(name);
            }
            None => entries.clear(),
        }
    }

    /// Probe unconditionally and store the result.
    pub async fn refresh(
        &self,
        transport: &impl Transport,
        host: &Host,
        agent: &AgentSettings,
    ) -> StatusObservation {
        let observation = probe(transport, host, agent).await;
        self.insert(&host.hostname, observation.clone());
        observation
    }

    /// Fresh cached observation, or a new probe.
    pub async fn probe_cached(
        &self,
        transport: &impl Transport,
        host: &Host,
        agent: &AgentSettings,
    ) -> StatusObservation {
        match self.get(&host.hostname) {
            Some(cached) => cached,
            None => self.refresh(transport, host, agent).await,
        }
    }

    fn is_fresh(&self, observation: &StatusObservation, now: DateTime<Utc>) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let age = now.signed_duration_since(observation.checked_at);
        age.to_std().map_or(true, |age| age < self.ttl)
    }
}
