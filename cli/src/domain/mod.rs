//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`
//! sockets. All functions are synchronous and take data in, returning data
//! out.

pub mod error;
pub mod host;
pub mod operation;
pub mod remote;
pub mod settings;
pub mod status;

pub use error::{
    ConnectError, FetchError, FileError, HostError, PushError, ServiceError, SettingsError,
    TestError, TransportError,
};
pub use host::{Credential, Host, HostStatus, validate_hostname};
pub use operation::{
    Ack, ConfigDocument, ConfigSource, FailureKind, HostOperation, Operation, OperationResult,
    Outcome, Payload, PushOptions, ServiceAction, StatusObservation, TestReport,
};
pub use remote::AgentLayout;
pub use settings::Settings;
pub use status::{ServiceState, StatusUpdate, UnitState, parse_unit_state, plan_status_update};
