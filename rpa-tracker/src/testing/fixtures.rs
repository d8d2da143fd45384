//! Fixtures for tracker tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{PlatformCatalog, PlatformDefinition, RetryPolicy};
use crate::dedup::{DeduplicationRegistry, FieldDeduplication};
use crate::events::CollectingEventSink;
use crate::store::InMemoryTrackerStore;
use crate::tracking::TransactionTracker;
use crate::utils::ManualClock;

/// Process code used by the scenario fixtures.
pub const SCENARIO_PROCESS: &str = "CANC_PROC";

/// A cancellation request as received from the intake channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPayload {
    /// Request number; the deduplication key.
    pub requerimiento: String,
    /// Operation type.
    pub tipo_operacion: String,
    /// Free-form label.
    pub nombre: String,
}

impl CancellationPayload {
    /// Creates a payload.
    #[must_use]
    pub fn new(
        requerimiento: impl Into<String>,
        tipo_operacion: impl Into<String>,
        nombre: impl Into<String>,
    ) -> Self {
        Self {
            requerimiento: requerimiento.into(),
            tipo_operacion: tipo_operacion.into(),
            nombre: nombre.into(),
        }
    }
}

/// The scenario catalog:
/// - `A`: default stage, one attempt
/// - `B`: `procesar` then `confirmar`, two attempts
/// - `C`: default stage, unlimited attempts
#[must_use]
pub fn scenario_catalog() -> PlatformCatalog {
    [
        PlatformDefinition::new("A")
            .with_retry_policy(RetryPolicy::with_max_attempts(1))
            .with_order(1),
        PlatformDefinition::new("B")
            .with_stages(["procesar", "confirmar"])
            .with_retry_policy(RetryPolicy::with_max_attempts(2))
            .with_order(2),
        PlatformDefinition::new("C")
            .with_retry_policy(RetryPolicy::unlimited())
            .with_order(3),
    ]
    .into_iter()
    .collect()
}

/// A registry deduplicating [`SCENARIO_PROCESS`] on `requerimiento`.
#[must_use]
pub fn scenario_dedup() -> DeduplicationRegistry {
    let registry = DeduplicationRegistry::new();
    registry.register(
        SCENARIO_PROCESS,
        Arc::new(FieldDeduplication::new(["requerimiento"])),
    );
    registry
}

/// The three scenario payloads: `FE-0001`, `FE-0002` and `FE-0003`.
#[must_use]
pub fn scenario_payloads() -> Vec<CancellationPayload> {
    vec![
        CancellationPayload::new("FE-0001", "ALTA", "TX_FAIL_A"),
        CancellationPayload::new("FE-0002", "ALTA", "TX_RETRY_B"),
        CancellationPayload::new("FE-0003", "ALTA", "TX_OK_ALL"),
    ]
}

/// A tracker wired to an in-memory store, a collecting sink and a manual
/// clock, with handles to each.
#[derive(Debug)]
pub struct TestTracker {
    /// The tracker under test.
    pub tracker: TransactionTracker,
    /// The store behind the tracker.
    pub store: InMemoryTrackerStore,
    /// Receives every lifecycle event.
    pub sink: Arc<CollectingEventSink>,
    /// Drives every timestamp.
    pub clock: Arc<ManualClock>,
}

impl TestTracker {
    /// Creates a tracker over the scenario catalog and registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with(scenario_catalog(), scenario_dedup())
    }

    /// Creates a tracker over the given catalog and registry.
    ///
    /// The clock starts at 2024-01-01T00:00:00Z.
    #[must_use]
    pub fn with(catalog: PlatformCatalog, dedup: DeduplicationRegistry) -> Self {
        let store = InMemoryTrackerStore::new();
        let sink = Arc::new(CollectingEventSink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        ));
        let tracker = TransactionTracker::new(
            Arc::new(store.clone()),
            Arc::new(catalog),
            Arc::new(dedup),
        )
        .with_event_sink(sink.clone())
        .with_clock(clock.clone());

        Self {
            tracker,
            store,
            sink,
            clock,
        }
    }
}

impl Default for TestTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scenario_catalog_order() {
        let catalog = scenario_catalog();
        let codes: Vec<String> = catalog.all().iter().map(|p| p.code.clone()).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert_eq!(catalog.get("A").unwrap().retry_policy.limit(), Some(1));
        assert!(catalog.get("C").unwrap().retry_policy.is_unlimited());
    }

    #[test]
    fn test_scenario_payloads_are_distinct() {
        let dedup = scenario_dedup();
        let strategy = dedup.get(SCENARIO_PROCESS).unwrap();
        let fingerprints: Vec<String> = scenario_payloads()
            .iter()
            .map(|p| strategy.fingerprint(&serde_json::to_value(p).unwrap()).unwrap())
            .collect();
        assert_eq!(fingerprints, vec!["FE-0001", "FE-0002", "FE-0003"]);
    }
}
