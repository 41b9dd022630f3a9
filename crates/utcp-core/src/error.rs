//! Error types for the UTCP client runtime.
//!
//! `UtcpError` is the canonical error type across every crate in the
//! workspace. Protocol implementations map their transport-specific failures
//! into it, and the client facade surfaces it unchanged to callers.

use thiserror::Error;

/// Canonical result type for all UTCP operations.
pub type UtcpResult<T> = Result<T, UtcpError>;

#[derive(Debug, Error)]
pub enum UtcpError {
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("Unknown {point} kind: {kind}")]
    UnknownKind { kind: String, point: String },

    #[error("Manual '{0}' is already registered")]
    NameConflict(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Refusing insecure URL: {0}")]
    InsecureUrl(String),

    #[error("Missing credential for {kind} auth")]
    MissingCredential { kind: String },

    #[error("Registration of manual '{manual}' failed: {}", errors.join("; "))]
    RegistrationFailed { manual: String, errors: Vec<String> },

    #[error("Tool call '{tool}' failed: {message}")]
    CallFailed { tool: String, message: String },

    #[error("Timeout in {scope}")]
    Timeout { scope: String },

    #[error("Protocol '{0}' does not support streaming")]
    StreamingUnsupported(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl UtcpError {
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn unknown_kind(kind: impl Into<String>, point: impl Into<String>) -> Self {
        Self::UnknownKind {
            kind: kind.into(),
            point: point.into(),
        }
    }

    pub fn missing_credential(kind: impl Into<String>) -> Self {
        Self::MissingCredential { kind: kind.into() }
    }

    pub fn call_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn timeout(scope: impl Into<String>) -> Self {
        Self::Timeout {
            scope: scope.into(),
        }
    }
}
