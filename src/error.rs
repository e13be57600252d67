//! Error types for crewfs.
//!
//! Uses thiserror for derive macros. Every variant carries a user-actionable
//! message and maps to a stable kind string and exit code, so callers of the
//! exposed operations never see a raw parse or I/O error.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for crewfs operations.
#[derive(Error, Debug)]
pub enum CrewError {
    /// A persisted document does not have the expected shape.
    #[error("validation failed for '{path}': {message}")]
    Validation { path: String, message: String },

    /// A referenced team, task, agent, or rule does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested change conflicts with current state (status regression,
    /// dependency cycle, blocked claim, illegal lifecycle transition).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Lock could not be acquired or released.
    #[error("lock acquisition failed: {0}")]
    Lock(String),

    /// A document on disk is not valid JSON.
    #[error("failed to parse '{path}': {message}")]
    Parse { path: String, message: String },

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The acting agent lacks the role permission for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A dispatch action could not complete.
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// Invalid arguments or missing ambient context.
    #[error("{0}")]
    UserError(String),
}

impl CrewError {
    pub(crate) fn validation(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        CrewError::Validation {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        CrewError::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Stable kind string surfaced alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            CrewError::Validation { .. } => "validation",
            CrewError::NotFound(_) => "not_found",
            CrewError::Conflict(_) => "conflict",
            CrewError::Lock(_) => "lock",
            CrewError::Parse { .. } => "parse",
            CrewError::Io(_) => "io",
            CrewError::PermissionDenied(_) => "permission_denied",
            CrewError::ActionFailed(_) => "action_failed",
            CrewError::UserError(_) => "user",
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CrewError::UserError(_) | CrewError::Io(_) | CrewError::ActionFailed(_) => {
                exit_codes::USER_ERROR
            }
            CrewError::Validation { .. } | CrewError::Parse { .. } => {
                exit_codes::VALIDATION_FAILURE
            }
            CrewError::Conflict(_) | CrewError::PermissionDenied(_) => exit_codes::CONFLICT,
            CrewError::Lock(_) => exit_codes::LOCK_FAILURE,
            CrewError::NotFound(_) => exit_codes::NOT_FOUND,
        }
    }
}

/// Result type alias for crewfs operations.
pub type Result<T> = std::result::Result<T, CrewError>;
