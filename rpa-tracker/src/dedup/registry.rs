//! Registry of deduplication strategies keyed by process code.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::DeduplicationStrategy;
use crate::errors::{TrackerError, TrackerResult};

/// Maps each process code to the strategy that deduplicates its payloads.
#[derive(Default)]
pub struct DeduplicationRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn DeduplicationStrategy>>>,
}

impl DeduplicationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy, replacing any previous one for the process code.
    pub fn register(
        &self,
        process_code: impl Into<String>,
        strategy: Arc<dyn DeduplicationStrategy>,
    ) {
        self.strategies.write().insert(process_code.into(), strategy);
    }

    /// Gets the strategy for a process code.
    pub fn get(&self, process_code: &str) -> TrackerResult<Arc<dyn DeduplicationStrategy>> {
        self.strategies
            .read()
            .get(process_code)
            .cloned()
            .ok_or_else(|| TrackerError::unknown_process(process_code))
    }

    /// Returns true if a strategy is registered for the process code.
    #[must_use]
    pub fn contains(&self, process_code: &str) -> bool {
        self.strategies.read().contains_key(process_code)
    }

    /// Lists registered process codes, sorted.
    #[must_use]
    pub fn process_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.strategies.read().keys().cloned().collect();
        codes.sort();
        codes
    }
}

impl fmt::Debug for DeduplicationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeduplicationRegistry")
            .field("process_codes", &self.process_codes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::FieldDeduplication;

    #[test]
    fn test_register_and_get() {
        let registry = DeduplicationRegistry::new();
        let strategy: Arc<dyn DeduplicationStrategy> =
            Arc::new(FieldDeduplication::new(["requerimiento"]));
        registry.register("CANC_PROC", Arc::clone(&strategy));

        let retrieved = registry.get("CANC_PROC").unwrap();
        assert!(Arc::ptr_eq(&retrieved, &strategy));
        assert!(registry.contains("CANC_PROC"));
        assert!(format!("{retrieved:?}").contains("requerimiento"));
    }

    #[test]
    fn test_unknown_process_fails_fast() {
        let registry = DeduplicationRegistry::new();
        let err = registry.get("MISSING").unwrap_err();
        assert!(matches!(err, TrackerError::UnknownProcess { .. }));
    }

    #[test]
    fn test_registries_are_isolated() {
        let first = DeduplicationRegistry::new();
        let second = DeduplicationRegistry::new();
        first.register("P", Arc::new(FieldDeduplication::new(["id"])));

        assert!(first.contains("P"));
        assert!(!second.contains("P"));
        assert_eq!(first.process_codes(), vec!["P".to_string()]);
    }
}
