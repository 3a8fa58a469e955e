//! Routes a [`HostOperation`] to its engine and wraps the outcome in an
//! [`OperationResult`].

use std::time::Instant;

use crate::application::ports::{ProgressReporter, SilentReporter, Transport};
use crate::application::services::status_probe::StatusCache;
use crate::application::services::{config_engine, service_control, status_probe, test_runner};
use crate::domain::settings::AgentSettings;
use crate::domain::{Host, HostOperation, OperationResult, Payload};

/// Everything an engine call needs besides the host.
pub struct EngineContext<'a, T> {
    pub transport: &'a T,
    pub agent: &'a AgentSettings,
    /// Status checks go through the cache when present.
    pub status_cache: Option<&'a StatusCache>,
}

impl<T> Clone for EngineContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EngineContext<'_, T> {}

/// Run `operation` against `host` without progress output.
pub async fn execute<T: Transport>(
    ctx: EngineContext<'_, T>,
    host: &Host,
    operation: &HostOperation,
) -> OperationResult {
    execute_with(ctx, host, operation, &SilentReporter).await
}

/// Run `operation` against `host`, reporting intermediate steps.
pub async fn execute_with<T: Transport>(
    ctx: EngineContext<'_, T>,
    host: &Host,
    operation: &HostOperation,
    reporter: &impl ProgressReporter,
) -> OperationResult {
    let started = Instant::now();
    let op = operation.operation();
    let id = host.hostname.as_str();

    let outcome = match operation {
        HostOperation::FetchConfig => config_engine::fetch(ctx.transport, host, ctx.agent)
            .await
            .map(Payload::Config)
            .map_err(|e| (e.kind(), e.to_string())),
        HostOperation::PushConfig { candidate, options } => config_engine::push(
            ctx.transport,
            host,
            ctx.agent,
            candidate,
            *options,
            reporter,
        )
        .await
        .map(Payload::Ack)
        .map_err(|e| (e.kind(), e.to_string())),
        HostOperation::TestConfig { candidate } => {
            test_runner::test(ctx.transport, host, ctx.agent, candidate.as_deref())
                .await
                .map(Payload::TestReport)
                .map_err(|e| (e.kind(), e.to_string()))
        }
        HostOperation::ServiceAction(action) => {
            service_control::manage(ctx.transport, host, ctx.agent, *action)
                .await
                .map(Payload::Ack)
                .map_err(|e| (e.kind(), e.to_string()))
        }
        HostOperation::StatusCheck => {
            let observation = match ctx.status_cache {
                Some(cache) => cache.probe_cached(ctx.transport, host, ctx.agent).await,
                None => status_probe::probe(ctx.transport, host, ctx.agent).await,
            };
            Ok(Payload::Status(observation))
        }
    };

    let duration = started.elapsed();
    match outcome {
        Ok(payload) => OperationResult::success(id, op, payload, duration),
        Err((kind, message)) => {
            tracing::debug!(host = id, operation = %op, %kind, %message, "operation failed");
            OperationResult::failure(id, op, kind, message, duration)
        }
    }
}
