//! Classification of raw platform outcome codes.
//!
//! Platforms report a signed integer: zero for success, positive for a
//! business refusal, negative for a technical failure. [`classify`] turns
//! that code into a single [`Classification`] so state, error type and
//! retryability are always derived together.

use serde::{Deserialize, Serialize};

use super::status::{ErrorType, State};

/// The derived meaning of an outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The state the outcome points to.
    pub state: State,
    /// The error type, if the outcome is not a success.
    pub error_type: Option<ErrorType>,
    /// Set for every non-positive code. A completed stage is still terminal.
    pub retryable: bool,
}

/// Classifies a raw outcome code.
#[must_use]
pub const fn classify(code: i64) -> Classification {
    if code == 0 {
        Classification {
            state: State::Completed,
            error_type: None,
            retryable: true,
        }
    } else if code > 0 {
        Classification {
            state: State::Rejected,
            error_type: Some(ErrorType::Business),
            retryable: false,
        }
    } else {
        Classification {
            state: State::Failed,
            error_type: Some(ErrorType::System),
            retryable: true,
        }
    }
}

/// The result of one execution attempt at a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Raw outcome code reported by the platform.
    pub code: i64,
    /// Optional human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Classification derived from `code`.
    pub classification: Classification,
}

impl ExecutionResult {
    /// Creates a result from a raw code.
    #[must_use]
    pub const fn new(code: i64) -> Self {
        Self {
            code,
            description: None,
            classification: classify(code),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Shortcut for a successful result.
    #[must_use]
    pub const fn ok() -> Self {
        Self::new(0)
    }

    /// Returns the derived state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.classification.state
    }

    /// Returns the derived error type.
    #[must_use]
    pub const fn error_type(&self) -> Option<ErrorType> {
        self.classification.error_type
    }

    /// Returns true if the stage may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.classification.retryable
    }

    /// Converts into the outcome consumed by `finish_stage`.
    #[must_use]
    pub fn to_outcome(&self) -> StageOutcome {
        StageOutcome {
            state: self.state(),
            error_type: self.error_type(),
            description: self.description.clone(),
        }
    }
}

/// What a caller reports when finishing one attempt of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The reported state.
    pub state: State,
    /// The error type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StageOutcome {
    /// A successful outcome.
    #[must_use]
    pub const fn completed() -> Self {
        Self {
            state: State::Completed,
            error_type: None,
            description: None,
        }
    }

    /// A business refusal.
    #[must_use]
    pub fn rejected(description: impl Into<String>) -> Self {
        Self {
            state: State::Rejected,
            error_type: Some(ErrorType::Business),
            description: Some(description.into()),
        }
    }

    /// A transient system failure.
    #[must_use]
    pub fn system_error(description: impl Into<String>) -> Self {
        Self {
            state: State::Failed,
            error_type: Some(ErrorType::System),
            description: Some(description.into()),
        }
    }
}

impl From<&ExecutionResult> for StageOutcome {
    fn from(result: &ExecutionResult) -> Self {
        result.to_outcome()
    }
}
