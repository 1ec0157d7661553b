//! Error types for the Component Orchestrator
//!
//! Provides structured error types for translation, store access and
//! plugin-binding reconciliation, plus the classification the response
//! layer uses to pick a status code.

use std::fmt;
use thiserror::Error;

/// Unified error type for the orchestrator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("Resource version conflict: {kind}/{name}")]
    VersionConflict { kind: String, name: String },

    #[error("Store transport error: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error("{} plugin binding operation(s) failed: {}", .failures.len(), BindingFailures(.failures))]
    Reconciliation { failures: Vec<BindingFailure> },

    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// A single failed binding sub-operation inside a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingFailure {
    /// Plugin identity (`kind/name`, or `name` when kind is empty)
    pub plugin: String,
    /// Which sub-operation failed
    pub operation: BindingOperation,
    /// Rendered cause
    pub reason: String,
}

/// Binding sub-operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingOperation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for BindingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingOperation::Create => write!(f, "create"),
            BindingOperation::Update => write!(f, "update"),
            BindingOperation::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for BindingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.operation, self.plugin, self.reason)
    }
}

struct BindingFailures<'a>(&'a [BindingFailure]);

impl fmt::Display for BindingFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Coarse error class consumed by the response layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Transport,
    Reconciliation,
    Cancelled,
    Internal,
}

impl ErrorClass {
    /// HTTP status code for this class
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorClass::Validation => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::Conflict => 409,
            ErrorClass::Cancelled => 503,
            ErrorClass::Transport | ErrorClass::Reconciliation | ErrorClass::Internal => 500,
        }
    }

    /// Short machine-readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation_error",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Transport => "transport_error",
            ErrorClass::Reconciliation => "reconciliation_error",
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::Internal => "internal_error",
        }
    }
}

impl Error {
    /// Classify this error for the response layer
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Validation(_) => ErrorClass::Validation,
            Error::ResourceNotFound { .. } => ErrorClass::NotFound,
            Error::ResourceExists { .. } | Error::VersionConflict { .. } => ErrorClass::Conflict,
            Error::Transport(_) | Error::Kube(_) | Error::JsonParse(_) => ErrorClass::Transport,
            Error::Reconciliation { .. } => ErrorClass::Reconciliation,
            Error::Cancelled => ErrorClass::Cancelled,
            Error::Internal(_) | Error::Configuration(_) | Error::Metrics(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Check if resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Transport | ErrorClass::Reconciliation | ErrorClass::Cancelled
        ) || matches!(self, Error::VersionConflict { .. })
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Kube(_))
    }

    /// Plugin identities that failed, for reconciliation errors
    pub fn failed_plugins(&self) -> Vec<&str> {
        match self {
            Error::Reconciliation { failures } => {
                failures.iter().map(|f| f.plugin.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Result type alias for the orchestrator
pub type Result<T> = std::result::Result<T, Error>;
