//! Read-side views over host records and the event log.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tgfleet_common::{
    CountEntry, EventKind, FleetStatusOutput, HostLogEntry, HostStatusRow, LogStatistics,
    StatusCounts,
};

use crate::application::ports::EventLog;
use crate::domain::Host;

/// Default number of entries shown by `logs`.
pub const DEFAULT_LOG_LIMIT: usize = 50;

const TOP_HOSTS: usize = 10;
const RECENT_CHANGES: usize = 20;

/// Counts by kind, the busiest hosts, last-24h activity and the total.
#[must_use]
pub fn statistics(entries: &[HostLogEntry], now: DateTime<Utc>) -> LogStatistics {
    let day_ago = now - Duration::hours(24);

    let mut kinds: HashMap<EventKind, usize> = HashMap::new();
    let mut hosts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *kinds.entry(entry.event_kind).or_default() += 1;
        *hosts.entry(entry.host.as_str()).or_default() += 1;
    }

    let mut event_kinds: Vec<CountEntry<EventKind>> = kinds
        .into_iter()
        .map(|(key, count)| CountEntry { key, count })
        .collect();
    event_kinds.sort_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));

    let mut top_hosts: Vec<CountEntry<String>> = hosts
        .into_iter()
        .map(|(key, count)| CountEntry {
            key: key.to_string(),
            count,
        })
        .collect();
    top_hosts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    top_hosts.truncate(TOP_HOSTS);

    LogStatistics {
        total_logs: entries.len(),
        recent_activity: entries.iter().filter(|e| e.timestamp >= day_ago).count(),
        event_kinds,
        top_hosts,
    }
}

/// Fleet-wide snapshot: every host with its stored status, counts per status,
/// and status changes from the last hour.
///
/// # Errors
///
/// Returns an error if the event log cannot be read.
pub fn fleet_snapshot(
    hosts: &[Host],
    log: &impl EventLog,
    now: DateTime<Utc>,
) -> Result<FleetStatusOutput> {
    let hour_ago = now - Duration::hours(1);
    let mut recent_changes: Vec<HostLogEntry> = log
        .all()
        .context("failed to read event log")?
        .into_iter()
        .filter(|e| e.event_kind == EventKind::StatusChange && e.timestamp >= hour_ago)
        .collect();
    recent_changes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_changes.truncate(RECENT_CHANGES);

    let mut rows: Vec<HostStatusRow> = hosts
        .iter()
        .map(|h| HostStatusRow {
            hostname: h.hostname.clone(),
            ip_address: h.ip_address.clone(),
            status: h.status,
            last_status_check: h.last_status_check,
        })
        .collect();
    rows.sort_by(|a, b| a.hostname.cmp(&b.hostname));

    Ok(FleetStatusOutput {
        status_counts: StatusCounts::tally(rows.iter().map(|r| r.status)),
        total_hosts: rows.len(),
        hosts: rows,
        recent_changes,
        timestamp: now,
    })
}
