//! Platform definitions.

use serde::{Deserialize, Serialize};

use super::RetryPolicy;

/// Name of the implicit stage of a platform that declares none.
pub const DEFAULT_STAGE: &str = "default";

/// One external platform of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDefinition {
    /// Platform code.
    pub code: String,
    /// Ordered stage names. Empty means a single [`DEFAULT_STAGE`].
    #[serde(default)]
    pub stages: Vec<String>,
    /// Retry policy shared by every stage of the platform.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Position in the pipeline; lower runs first.
    #[serde(default)]
    pub order: i32,
}

impl PlatformDefinition {
    /// Creates a platform with the default stage, unlimited retries and order 0.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            stages: Vec::new(),
            retry_policy: RetryPolicy::default(),
            order: 0,
        }
    }

    /// Sets the stage names.
    #[must_use]
    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the pipeline order.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Returns the effective stage names.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        if self.stages.is_empty() {
            vec![DEFAULT_STAGE]
        } else {
            self.stages.iter().map(String::as_str).collect()
        }
    }

    /// Returns the position of `stage` within the platform.
    #[must_use]
    pub fn stage_index(&self, stage: &str) -> Option<usize> {
        self.stage_names().iter().position(|s| *s == stage)
    }

    /// Returns true if the platform declares `stage`.
    #[must_use]
    pub fn has_stage(&self, stage: &str) -> bool {
        self.stage_index(stage).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_default_stage() {
        let platform = PlatformDefinition::new("C");
        assert_eq!(platform.stage_names(), vec![DEFAULT_STAGE]);
        assert!(platform.has_stage(DEFAULT_STAGE));
        assert!(platform.retry_policy.is_unlimited());
    }

    #[test]
    fn test_named_stages_replace_default() {
        let platform = PlatformDefinition::new("B")
            .with_stages(["procesar", "confirmar"])
            .with_retry_policy(RetryPolicy::with_max_attempts(2))
            .with_order(2);

        assert_eq!(platform.stage_names(), vec!["procesar", "confirmar"]);
        assert_eq!(platform.stage_index("confirmar"), Some(1));
        assert!(!platform.has_stage(DEFAULT_STAGE));
        assert_eq!(platform.order, 2);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let platform: PlatformDefinition = serde_json::from_str(r#"{"code": "A"}"#).unwrap();
        assert_eq!(platform, PlatformDefinition::new("A"));
    }
}
