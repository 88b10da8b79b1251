//! Error types for pipeline mutations
//!
//! Errors are classified by recoverability:
//! - Retryable: the record store call failed (network, lock, disk)
//! - NonRetryable: caller supplied an unknown stage or invalid input
//! - Stale: the target record no longer exists and the board must reload

use thiserror::Error;

use crate::stages::PipelineKind;
use crate::store::StoreError;

/// Errors surfaced by the transition controller and the board services.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Stage '{stage}' is not part of the {kind} pipeline")]
    InvalidStage { kind: PipelineKind, stage: String },

    #[error("Record store call for {collection}/{id} failed: {source}")]
    PersistenceFailed {
        collection: String,
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("Record {collection}/{id} no longer exists")]
    NotFound { collection: String, id: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },
}

impl EngineError {
    /// Map a store failure for one record onto the engine taxonomy.
    ///
    /// A missing row becomes `NotFound`; everything else is a persistence failure.
    pub fn from_store(collection: &str, id: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => EngineError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            other => EngineError::PersistenceFailed {
                collection: collection.to_string(),
                id: id.to_string(),
                source: other,
            },
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PersistenceFailed { .. })
    }

    /// Returns true if the caller's copy of the board is out of date
    pub fn is_stale(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EngineError::InvalidStage { .. } => "Pick one of the board's columns.",
            EngineError::PersistenceFailed { .. } => {
                "The change was not saved. Check your connection and try again."
            }
            EngineError::NotFound { .. } => {
                "This entry was removed elsewhere. Reload the board."
            }
            EngineError::Validation { .. } => "Correct the highlighted field and save again.",
        }
    }
}

/// Serializable error representation for IPC
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    Stale,
}

impl From<&EngineError> for EngineErrorPayload {
    fn from(err: &EngineError) -> Self {
        let error_type = if err.is_stale() {
            ErrorType::Stale
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        EngineErrorPayload {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
