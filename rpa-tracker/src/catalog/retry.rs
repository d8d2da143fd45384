//! Per-platform retry policy.

use serde::{Deserialize, Serialize};

/// Caps how many attempts a stage of a platform may consume.
///
/// `max_attempts` counts every attempt, the first one included. `None` and
/// `Some(0)` both mean unlimited: the stage is retried for as long as the
/// outcome stays transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts including the first one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// A policy without an attempt cap.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self { max_attempts: None }
    }

    /// A policy allowing at most `attempts` attempts.
    #[must_use]
    pub const fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
        }
    }

    /// Returns the effective cap, `None` when unlimited.
    #[must_use]
    pub const fn limit(&self) -> Option<u32> {
        match self.max_attempts {
            Some(0) | None => None,
            Some(n) => Some(n),
        }
    }

    /// Returns true if the policy never exhausts.
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.limit().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        assert!(RetryPolicy::default().is_unlimited());
        assert_eq!(RetryPolicy::default(), RetryPolicy::unlimited());
    }

    #[test]
    fn test_zero_means_unlimited() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert!(policy.is_unlimited());
        assert_eq!(policy.limit(), None);
    }

    #[test]
    fn test_limit() {
        let policy = RetryPolicy::with_max_attempts(2);
        assert!(!policy.is_unlimited());
        assert_eq!(policy.limit(), Some(2));
    }

    #[test]
    fn test_deserialize_missing_field() {
        let policy: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert!(policy.is_unlimited());

        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.limit(), Some(3));
    }
}
