//! Error types for the quiz generator.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating, parsing or storing questions.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request fields
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: BTreeMap<String, String>,
    },

    /// Timeout, connection failure or 5xx from the generation backend
    #[error("Backend unavailable: {0}")]
    BackendTransient(String),

    /// Non-retryable rejection from the generation backend
    #[error("Backend rejected request: {0}")]
    BackendPermanent(String),

    /// The backend replied but no usable questions could be extracted
    #[error("No valid questions found: {0}")]
    Parse(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Validation error without per-field detail.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::BackendTransient(_) | Error::BackendPermanent(_) | Error::Parse(_) => 400,
            Error::Database(_) => 503,
            _ => 500,
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::BackendTransient(_))
    }

    /// Stable tag used in JSON bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::BackendTransient(_) => "backend_unavailable",
            Error::BackendPermanent(_) => "backend_rejected",
            Error::Parse(_) => "no_valid_questions",
            Error::Database(_) => "storage",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }

    /// Message that is safe to return to a caller.
    ///
    /// Unexpected faults collapse to a generic message; the full error is only logged.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::BackendTransient(_) | Error::BackendPermanent(_) | Error::Parse(_) => {
                self.to_string()
            }
            Error::Database(_) => "Database unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                (field.to_string(), message)
            })
            .collect();

        Error::Validation {
            message: "Invalid input".to_string(),
            details,
        }
    }
}
