use persistency_core::{FailureClass, PersistencyError};
use std::path::PathBuf;
use thiserror::Error;

/// Failures detected by the driver itself rather than the core.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("agent binary '{0}' not found on PATH")]
    AgentMissing(String),

    #[error("no credentials found for agent '{agent}': {hint}")]
    AuthMissing { agent: String, hint: String },

    #[error("no metadata record in {0}: run 'persistency init' first")]
    NoRecord(PathBuf),

    #[error("freshness check failed: {0}")]
    Stale(String),
}

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NOT_A_REPOSITORY: i32 = 2;
pub const EXIT_AGENT_MISSING: i32 = 3;
pub const EXIT_AUTH_MISSING: i32 = 4;
pub const EXIT_INVALID_ARGUMENTS: i32 = 5;

/// Map an error chain onto the process exit code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<PersistencyError>() {
            return match e.class() {
                FailureClass::NotARepository => EXIT_NOT_A_REPOSITORY,
                FailureClass::InvalidArguments => EXIT_INVALID_ARGUMENTS,
                FailureClass::Failure => EXIT_FAILURE,
            };
        }
        if let Some(e) = cause.downcast_ref::<DriverError>() {
            return match e {
                DriverError::AgentMissing(_) => EXIT_AGENT_MISSING,
                DriverError::AuthMissing { .. } => EXIT_AUTH_MISSING,
                DriverError::NoRecord(_) => EXIT_INVALID_ARGUMENTS,
                DriverError::Stale(_) => EXIT_FAILURE,
            };
        }
    }
    EXIT_FAILURE
}
