//! Unified error taxonomy for the conversion pipeline and the resilient client.
//!
//! Each subsystem defines its own `thiserror` leaf error; this module collects
//! them behind one `ConverterError` so the CLI can map a failure to an exit
//! code (§7 of the spec) without knowing which stage produced it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ValueType;

/// Exit codes the CLI surface maps errors to.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_RECOVERABLE: i32 = 1;
pub const EXIT_PARSE_OR_VALIDATION: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

/// Errors raised by §4.A input/URL validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("input '{0}' must be a non-empty string")]
    InvalidInput(String),
    #[error("path '{0}' contains a traversal sequence")]
    PathTraversal(String),
    #[error("path '{0}' is a symlink and strict mode rejects symlinks")]
    SymlinkRejected(String),
    #[error("path '{0}' does not exist")]
    NotFound(String),
    #[error("path '{0}' is not readable or writable")]
    PermissionDenied(String),
    #[error("path '{0}' resolves outside the working directory")]
    OutsideWorkingDirectory(String),
    #[error("scheme '{0}' is not allowlisted")]
    DisallowedScheme(String),
    #[error("port {0} is not allowlisted")]
    DisallowedPort(u16),
    #[error("address for '{0}' is private or reserved")]
    PrivateAddress(String),
    #[error("domain '{0}' is not in the allowlist")]
    DomainNotAllowed(String),
}

/// Errors raised by §4.B the memory guard.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error(
        "estimated memory usage {estimated_bytes} bytes exceeds the safe budget \
         ({available_bytes} bytes available); pass force=true to override"
    )]
    Exceeded {
        estimated_bytes: u64,
        available_bytes: u64,
    },
    #[error("file size {0} bytes exceeds the 500 MB hard limit; pass force=true to override")]
    FileTooLarge(u64),
}

/// Errors raised while parsing a source document (§4.E/F/G).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error in {format} input: {reason}")]
    InvalidSyntax { format: String, reason: String },
    #[error("input graph contains zero triples")]
    EmptyGraph,
    #[error("DTMI '{0}' does not match the required DTDL identifier format")]
    InvalidDtmi(String),
    #[error("DTMI '{dtmi}' exceeds the maximum length of {max} characters")]
    DtmiTooLong { dtmi: String, max: usize },
    #[error("could not determine document kind for '{0}'")]
    UnknownDocumentKind(String),
    #[error("corpus path '{0}' could not be resolved")]
    UnresolvedCorpusPath(String),
}

/// Errors raised by §4.J the Fabric-limits validator in fatal (non-strict-override) mode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("{what} '{name}' has length {actual}, exceeding the limit of {limit}")]
    NameTooLong {
        what: &'static str,
        name: String,
        actual: usize,
        limit: usize,
    },
    #[error("{what} count {actual} exceeds the limit of {limit}")]
    CountExceeded {
        what: &'static str,
        actual: usize,
        limit: usize,
    },
    #[error("total definition size {actual} bytes exceeds the limit of {limit} bytes")]
    SizeExceeded { actual: usize, limit: usize },
    #[error("{what} reference '{id}' does not resolve within the bundle")]
    DanglingReference { what: &'static str, id: String },
    #[error("entity '{0}' has a self-inheritance cycle")]
    SelfInheritance(String),
    #[error("{what} reference '{id}' resolves to a property of type {value_type}, which the invariant forbids")]
    InvalidValueType {
        what: &'static str,
        id: String,
        value_type: ValueType,
    },
}

/// Errors raised by §4.M the resilient API client.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("transient error from Fabric API: status={status_code} retry_after={retry_after:?}")]
    Transient {
        status_code: u16,
        retry_after: Option<u64>,
        message: String,
    },
    #[error(
        "permanent error from Fabric API: status={status_code} error_code={error_code} message={message}"
    )]
    Permanent {
        status_code: u16,
        error_code: String,
        message: String,
    },
    #[error("circuit breaker '{name}' is open; retry after {remaining_secs}s")]
    CircuitBreakerOpen { name: String, remaining_secs: u64 },
    #[error("long running operation failed: {0}")]
    OperationFailed(String),
    #[error("long running operation timed out after {0} polls")]
    OperationTimedOut(usize),
    #[error("retry budget exhausted after {0} attempts")]
    RetryBudgetExhausted(usize),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("request error: {0}")]
    Request(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transient { .. })
    }
}

/// Raised when a cooperative cancellation token fires mid-operation (§4.N).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("operation cancelled{}", context.as_ref().map(|c| format!(" during {c}")).unwrap_or_default())]
pub struct OperationCancelled {
    pub context: Option<String>,
}

/// Top-level error for anything that can fail in the pipeline or client.
#[derive(Debug, Error)]
pub enum ConverterError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Limit(#[from] LimitError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cancelled(#[from] OperationCancelled),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConverterError {
    /// Map this error to the CLI exit code described in §6/§7.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConverterError::Cancelled(_) => EXIT_CANCELLED,
            ConverterError::Parse(_) => EXIT_PARSE_OR_VALIDATION,
            ConverterError::Limit(_) => EXIT_PARSE_OR_VALIDATION,
            ConverterError::Input(_) => EXIT_RECOVERABLE,
            ConverterError::Memory(_) => EXIT_RECOVERABLE,
            ConverterError::Client(_) => EXIT_RECOVERABLE,
            ConverterError::Other(_) => EXIT_RECOVERABLE,
        }
    }
}

/// A machine-readable error code for diagnostics, distinct from `ConverterError`
/// itself so it can be serialized into the validation report (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    PathTraversal,
    SymlinkRejected,
    NotFound,
    PermissionDenied,
    OutsideWorkingDirectory,
    DisallowedScheme,
    DisallowedPort,
    PrivateAddress,
    DomainNotAllowed,
    MemoryExceeded,
    InvalidSyntax,
    EmptyGraph,
    TransientApiError,
    PermanentApiError,
    CircuitBreakerOpen,
    OperationCancelled,
    ValidationViolation,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec() {
        let cancelled = ConverterError::Cancelled(OperationCancelled { context: None });
        assert_eq!(cancelled.exit_code(), 130);

        let parse = ConverterError::Parse(ParseError::EmptyGraph);
        assert_eq!(parse.exit_code(), 2);

        let client = ConverterError::Client(ClientError::Transient {
            status_code: 429,
            retry_after: Some(5),
            message: "rate limited".into(),
        });
        assert_eq!(client.exit_code(), 1);
    }

    #[test]
    fn client_error_retryability() {
        let transient = ClientError::Transient {
            status_code: 503,
            retry_after: None,
            message: "unavailable".into(),
        };
        assert!(transient.is_retryable());

        let permanent = ClientError::Permanent {
            status_code: 404,
            error_code: "NotFound".into(),
            message: "missing".into(),
        };
        assert!(!permanent.is_retryable());
    }
}
