//! Tracking state and error type enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The state of a transaction or of one of its stage instances.
///
/// Both transactions and stages move through the same four states; only
/// `Pending` has outgoing transitions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Still waiting for work (or for a retry).
    #[default]
    Pending,
    /// Finished successfully.
    Completed,
    /// Refused by a business rule at some platform.
    Rejected,
    /// Exhausted its retries on system errors.
    Failed,
}

/// State of a whole transaction.
pub type TransactionState = State;

/// State of a single stage instance.
pub type StageState = State;

impl State {
    /// All states, in declaration order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Completed, Self::Rejected, Self::Failed];

    /// Returns the canonical stored label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true for the terminal states that are not a success.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "REJECTED" => Ok(Self::Rejected),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown state: {other}")),
        }
    }
}

/// Classification of a non-successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// A business rule refused the work. Never retried.
    Business,
    /// A transient technical failure. Retried while the policy allows.
    System,
}

impl ErrorType {
    /// Returns the canonical stored label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "BUSINESS",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(State::Pending.to_string(), "PENDING");
        assert_eq!(State::Completed.to_string(), "COMPLETED");
        assert_eq!(State::Rejected.to_string(), "REJECTED");
        assert_eq!(State::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_state_is_terminal() {
        assert_eq!(State::default(), State::Pending);
        assert!(!State::Pending.is_terminal());
        assert!(State::Completed.is_terminal());
        assert!(State::Rejected.is_terminal());
        assert!(State::Failed.is_terminal());
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!("rejected".parse::<State>(), Ok(State::Rejected));
        assert_eq!("FAILED".parse::<State>(), Ok(State::Failed));
        assert!("TERMINATED".parse::<State>().is_err());
    }

    #[test]
    fn test_state_serialize() {
        let json = serde_json::to_string(&State::Completed).unwrap();
        assert_eq!(json, r#""COMPLETED""#);

        let deserialized: State = serde_json::from_str(r#""PENDING""#).unwrap();
        assert_eq!(deserialized, State::Pending);
    }

    #[test]
    fn test_error_type_serialize() {
        assert_eq!(ErrorType::Business.to_string(), "BUSINESS");
        let json = serde_json::to_string(&ErrorType::System).unwrap();
        assert_eq!(json, r#""SYSTEM""#);
    }
}
