//! Infrastructure layer: concrete implementations of the application ports.
//!
//! Local files (settings, host records, event log) and the SSH transport.
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod event_log;
pub mod fs;
pub mod host_store;
pub mod settings;
pub mod ssh;
