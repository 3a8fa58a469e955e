//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod config_engine;
pub mod dispatch;
pub mod fleet;
pub mod log_report;
pub mod service_control;
pub mod status_probe;
pub mod status_sync;
pub mod test_runner;
