//! Error types for the rpa-tracker crate.
//!
//! Two layers: [`StoreError`] is what a persistence backend reports, and
//! [`TrackerError`] is what tracker and reporting operations return. Outcome
//! codes coming back from the platforms are never errors; they are data that
//! the result classifier turns into stage states.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::TransactionId;

/// Errors reported by a [`TrackerStore`](crate::store::TrackerStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a uniqueness constraint.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation {
        /// The name of the violated constraint.
        constraint: String,
    },

    /// Any other backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Creates a unique violation error for the named constraint.
    #[must_use]
    pub fn unique_violation(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    /// Returns true if this error is a uniqueness conflict.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// The main error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No deduplication strategy is registered for the process code.
    #[error("Unknown process code: {process_code}")]
    UnknownProcess {
        /// The process code.
        process_code: String,
    },

    /// The platform is not registered in the catalog.
    #[error("Unknown platform: {platform}")]
    UnknownPlatform {
        /// The platform code.
        platform: String,
    },

    /// The platform exists but does not declare the stage.
    #[error("Unknown stage '{stage}' for platform '{platform}'")]
    UnknownStage {
        /// The platform code.
        platform: String,
        /// The stage name.
        stage: String,
    },

    /// The transaction does not exist.
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// The transaction id.
        id: TransactionId,
    },

    /// The stage instance was never started.
    #[error("Stage not found: {id}/{platform}/{stage}")]
    StageNotFound {
        /// The transaction id.
        id: TransactionId,
        /// The platform code.
        platform: String,
        /// The stage name.
        stage: String,
    },

    /// The stage already reached a terminal state.
    #[error("Stage {id}/{platform}/{stage} is terminal ({state})")]
    StageTerminal {
        /// The transaction id.
        id: TransactionId,
        /// The platform code.
        platform: String,
        /// The stage name.
        stage: String,
        /// The terminal state.
        state: String,
    },

    /// The outcome passed to `finish_stage` does not describe a transition.
    #[error("Invalid stage outcome: {0}")]
    InvalidOutcome(String),

    /// A field used for fingerprinting is missing or null in the payload.
    #[error("Payload field '{field}' required for fingerprinting is missing")]
    MissingFingerprintField {
        /// The field name.
        field: String,
    },

    /// Payload serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl TrackerError {
    /// Creates an unknown process error.
    #[must_use]
    pub fn unknown_process(process_code: impl Into<String>) -> Self {
        Self::UnknownProcess {
            process_code: process_code.into(),
        }
    }

    /// Creates an unknown platform error.
    #[must_use]
    pub fn unknown_platform(platform: impl Into<String>) -> Self {
        Self::UnknownPlatform {
            platform: platform.into(),
        }
    }

    /// Creates an unknown stage error.
    #[must_use]
    pub fn unknown_stage(platform: impl Into<String>, stage: impl Into<String>) -> Self {
        Self::UnknownStage {
            platform: platform.into(),
            stage: stage.into(),
        }
    }

    /// Creates a missing fingerprint field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingFingerprintField {
            field: field.into(),
        }
    }

    /// Returns true for errors caused by an unregistered catalog reference.
    #[must_use]
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProcess { .. } | Self::UnknownPlatform { .. } | Self::UnknownStage { .. }
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::UnknownProcess { .. } => "UnknownProcess",
            Self::UnknownPlatform { .. } => "UnknownPlatform",
            Self::UnknownStage { .. } => "UnknownStage",
            Self::TransactionNotFound { .. } => "TransactionNotFound",
            Self::StageNotFound { .. } => "StageNotFound",
            Self::StageTerminal { .. } => "StageTerminal",
            Self::InvalidOutcome(_) => "InvalidOutcome",
            Self::MissingFingerprintField { .. } => "MissingFingerprintField",
            Self::Serialization(_) => "Serialization",
            Self::Store(_) => "Store",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(kind));
        map.insert("message".to_string(), json!(self.to_string()));
        map
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_unique_violation() {
        let err = StoreError::unique_violation("fingerprints_pk");
        assert!(err.is_unique_violation());
        assert_eq!(err.to_string(), "Unique constraint violated: fingerprints_pk");
        assert!(!StoreError::unavailable("down").is_unique_violation());
    }

    #[test]
    fn test_store_error_converts_into_tracker_error() {
        let err: TrackerError = StoreError::unavailable("connection refused").into();
        assert!(matches!(err, TrackerError::Store(StoreError::Unavailable(_))));
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_catalog_errors() {
        assert!(TrackerError::unknown_platform("X").is_catalog_error());
        assert!(TrackerError::unknown_process("P").is_catalog_error());
        assert!(TrackerError::unknown_stage("A", "s").is_catalog_error());
        assert!(!TrackerError::missing_field("f").is_catalog_error());
    }

    #[test]
    fn test_tracker_error_to_dict() {
        let dict = TrackerError::unknown_stage("B", "cerrar").to_dict();
        assert_eq!(dict.get("type").unwrap(), "UnknownStage");
        assert_eq!(
            dict.get("message").unwrap(),
            "Unknown stage 'cerrar' for platform 'B'"
        );
    }
}
