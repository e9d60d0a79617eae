//! Error types for git-issues
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (invalid field value, unknown or ambiguous id, bad args)
//! - 3: Cancelled at an interactive prompt
//! - 4: Operation failed (store, git, io, cache)

use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;

use crate::manager::IdConflict;

/// Exit codes for the gi CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CANCELLED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for git-issues operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("{field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Property not found: {name}")]
    PropertyNotFound { name: String },

    #[error("No issue matches id '{id_prefix}'")]
    NotFound { id_prefix: String },

    #[error("Ambiguous id '{}', matches {} issues:\n{}", .0.prefix, .0.entries.len(), .0)]
    Conflict(IdConflict),

    #[error("Repository not found from {0}")]
    RepoNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    // Interrupted prompt (exit code 3)
    #[error("Cancelled")]
    Cancelled,

    // Operation failures (exit code 4)
    #[error("Key not found in store: {0}")]
    KeyNotFound(String),

    #[error("Could not generate a free identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Issue branch '{branch}' moved since it was read; run the command again")]
    BranchMoved { branch: String },

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Build a validation error for a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation { .. }
            | Error::PropertyNotFound { .. }
            | Error::NotFound { .. }
            | Error::Conflict(_)
            | Error::RepoNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::Unsupported(_) => exit_codes::USER_ERROR,

            Error::Cancelled => exit_codes::CANCELLED,

            Error::KeyNotFound(_)
            | Error::IdentifierExhausted { .. }
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::BranchMoved { .. }
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured payload for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation { field, reason } => Some(json!({
                "field": field,
                "reason": reason,
            })),
            Error::PropertyNotFound { name } => Some(json!({ "name": name })),
            Error::NotFound { id_prefix } => Some(json!({ "id_prefix": id_prefix })),
            Error::Conflict(conflict) => Some(json!({
                "prefix": conflict.prefix,
                "threshold": conflict.threshold,
                "ids": conflict.entries.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>(),
            })),
            Error::IdentifierExhausted { attempts } => Some(json!({ "attempts": attempts })),
            Error::KeyNotFound(key) => Some(json!({ "key": key })),
            Error::BranchMoved { branch } => Some(json!({ "branch": branch })),
            Error::InvalidConfig(message)
            | Error::InvalidArgument(message)
            | Error::Unsupported(message) => Some(json!({ "message": message })),
            _ => None,
        }
    }
}

/// Result type alias for git-issues operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
