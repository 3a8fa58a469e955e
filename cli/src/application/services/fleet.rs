//! Fleet coordinator: one operation fanned out over many hosts.
//!
//! Hosts are dispatched in job order onto a bounded pool of worker tasks.
//! Each worker loads its host record, runs the operation through
//! [`dispatch`], and sends exactly one [`OperationResult`] back over a
//! channel. A failure, timeout or panic on one host never touches its
//! siblings.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{FutureExt, Stream};
use tokio::sync::{Semaphore, mpsc, watch};

use crate::application::ports::{HostStore, Transport};
use crate::application::services::dispatch::{self, EngineContext};
use crate::application::services::status_probe::StatusCache;
use crate::domain::settings::{AgentSettings, FleetSettings, MAX_CONCURRENCY};
use crate::domain::{FailureKind, HostOperation, Operation, OperationResult};

// ── Job ───────────────────────────────────────────────────────────────────────

/// A batch of host ids plus the operation to apply to each.
#[derive(Debug, Clone)]
pub struct FleetJob {
    host_ids: Vec<String>,
    operation: HostOperation,
}

impl FleetJob {
    /// Build a job. Repeated ids are collapsed, keeping the first occurrence.
    pub fn new<I, S>(host_ids: I, operation: HostOperation) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let host_ids = host_ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self {
            host_ids,
            operation,
        }
    }

    #[must_use]
    pub fn host_ids(&self) -> &[String] {
        &self.host_ids
    }

    #[must_use]
    pub fn operation(&self) -> &HostOperation {
        &self.operation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.host_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host_ids.is_empty()
    }
}

/// Pool size and retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetOptions {
    pub concurrency: usize,
    /// Extra attempts after a transport failure. Destructive operations are
    /// never retried.
    pub connect_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self::from(&FleetSettings::default())
    }
}

impl From<&FleetSettings> for FleetOptions {
    fn from(settings: &FleetSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            connect_retries: settings.connect_retries,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }
}

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Trigger side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

/// Observed side of a cancellation pair. Cancelling stops new dispatches;
/// operations already running finish or time out on their own.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        cancel_pair().1
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

struct Worker<T, S> {
    transport: Arc<T>,
    hosts: Arc<S>,
    agent: AgentSettings,
    status_cache: Option<Arc<StatusCache>>,
    connect_retries: u32,
    retry_backoff: Duration,
}

/// Runs [`FleetJob`]s with bounded concurrency.
pub struct FleetCoordinator<T, S> {
    worker: Arc<Worker<T, S>>,
    concurrency: usize,
}

impl<T, S> FleetCoordinator<T, S>
where
    T: Transport + 'static,
    S: HostStore + 'static,
{
    pub fn new(transport: Arc<T>, hosts: Arc<S>, agent: AgentSettings, options: &FleetOptions) -> Self {
        Self {
            worker: Arc::new(Worker {
                transport,
                hosts,
                agent,
                status_cache: None,
                connect_retries: options.connect_retries,
                retry_backoff: options.retry_backoff,
            }),
            concurrency: options.concurrency.clamp(1, MAX_CONCURRENCY),
        }
    }

    /// Route status checks through `cache`.
    #[must_use]
    pub fn with_status_cache(self, cache: Arc<StatusCache>) -> Self {
        let worker = &self.worker;
        Self {
            worker: Arc::new(Worker {
                transport: Arc::clone(&worker.transport),
                hosts: Arc::clone(&worker.hosts),
                agent: worker.agent.clone(),
                status_cache: Some(cache),
                connect_retries: worker.connect_retries,
                retry_backoff: worker.retry_backoff,
            }),
            concurrency: self.concurrency,
        }
    }

    /// Start `job`. Results arrive on the returned [`FleetRun`] as hosts
    /// complete. Running the same job again re-executes it from scratch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, job: FleetJob, mut cancel: CancelSignal) -> FleetRun {
        let FleetJob {
            host_ids,
            operation,
        } = job;
        let op = operation.operation();
        let total = host_ids.len();
        let (tx, rx) = mpsc::channel(total.max(1));
        let run = FleetRun::new(rx, host_ids.clone(), op);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::clone(&self.worker);
        let operation = Arc::new(operation);
        tracing::info!(hosts = total, operation = %op, concurrency = self.concurrency, "fleet job started");

        tokio::spawn(async move {
            let mut pending = host_ids.into_iter();
            while let Some(id) = pending.next() {
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    let skipped: Vec<String> = std::iter::once(id).chain(pending).collect();
                    tracing::info!(skipped = skipped.len(), "fleet job cancelled");
                    for id in skipped {
                        let cancelled = OperationResult::failure(
                            &id,
                            op,
                            FailureKind::Cancelled,
                            "cancelled before dispatch",
                            Duration::ZERO,
                        );
                        if tx.send(cancelled).await.is_err() {
                            break;
                        }
                    }
                    return;
                };

                let tx = tx.clone();
                let worker = Arc::clone(&worker);
                let operation = Arc::clone(&operation);
                tokio::spawn(async move {
                    let result = worker.run_one(&id, &operation).await;
                    drop(permit);
                    // The receiver may be gone if the caller stopped listening.
                    let _ = tx.send(result).await;
                });
            }
        });

        run
    }
}

impl<T, S> Worker<T, S>
where
    T: Transport,
    S: HostStore,
{
    async fn run_one(&self, id: &str, operation: &HostOperation) -> OperationResult {
        let op = operation.operation();
        let started = Instant::now();
        let work = async {
            let host = match self.hosts.get(id) {
                Ok(Some(host)) => host,
                Ok(None) => {
                    return OperationResult::failure(
                        id,
                        op,
                        FailureKind::NotFound,
                        format!("host '{id}' not found"),
                        started.elapsed(),
                    );
                }
                Err(e) => {
                    return OperationResult::failure(
                        id,
                        op,
                        FailureKind::Internal,
                        format!("cannot load host '{id}': {e:#}"),
                        started.elapsed(),
                    );
                }
            };
            let ctx = EngineContext {
                transport: &*self.transport,
                agent: &self.agent,
                status_cache: self.status_cache.as_deref(),
            };

            let mut attempt = 0;
            loop {
                let mut result = dispatch::execute(ctx, &host, operation).await;
                let retry = attempt < self.connect_retries
                    && !operation.is_destructive()
                    && result.failure_kind() == Some(FailureKind::TransportError);
                if !retry {
                    result.duration = started.elapsed();
                    return result;
                }
                attempt += 1;
                let backoff = self.retry_backoff * attempt;
                tracing::info!(host = id, attempt, ?backoff, error = %result.message(), "retrying");
                tokio::time::sleep(backoff).await;
            }
        };

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(host = id, %detail, "fleet worker panicked");
                OperationResult::failure(
                    id,
                    op,
                    FailureKind::Internal,
                    format!("internal error: {detail}"),
                    started.elapsed(),
                )
            }
        }
    }
}

// ── Run ───────────────────────────────────────────────────────────────────────

/// Results of one in-progress job, in completion order.
///
/// Yields exactly one result per host in the job, then `None`.
pub struct FleetRun {
    rx: mpsc::Receiver<OperationResult>,
    host_ids: Vec<String>,
    operation: Operation,
    seen: HashSet<String>,
}

impl FleetRun {
    fn new(rx: mpsc::Receiver<OperationResult>, host_ids: Vec<String>, operation: Operation) -> Self {
        Self {
            rx,
            host_ids,
            operation,
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.host_ids.len()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed() == self.total()
    }

    /// Next completed result, or `None` once every host has one.
    pub async fn next(&mut self) -> Option<OperationResult> {
        if self.is_finished() {
            return None;
        }
        if let Some(result) = self.rx.recv().await {
            self.seen.insert(result.host_id.clone());
            return Some(result);
        }
        // Every sender is gone but some hosts never reported.
        let missing = self
            .host_ids
            .iter()
            .find(|id| !self.seen.contains(*id))?
            .clone();
        self.seen.insert(missing.clone());
        Some(OperationResult::failure(
            &missing,
            self.operation,
            FailureKind::Internal,
            "worker exited without a result",
            Duration::ZERO,
        ))
    }

    /// Adapt into a `Stream` of results.
    pub fn into_stream(self) -> impl Stream<Item = OperationResult> {
        futures_util::stream::unfold(self, |mut run| async move {
            run.next().await.map(|result| (result, run))
        })
    }

    /// Wait for every host and return results in job order.
    pub async fn collect(mut self) -> FleetReport {
        let mut by_host = HashMap::new();
        while let Some(result) = self.next().await {
            by_host.insert(result.host_id.clone(), result);
        }
        let results = self
            .host_ids
            .iter()
            .filter_map(|id| by_host.remove(id))
            .collect();
        FleetReport {
            operation: self.operation,
            results,
        }
    }
}

/// Terminal state of a job: one result per host, in job order.
#[derive(Debug, Clone)]
pub struct FleetReport {
    pub operation: Operation,
    pub results: Vec<OperationResult>,
}

impl FleetReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}
