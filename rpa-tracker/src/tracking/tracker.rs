//! The transaction tracker.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::transition::{derive_transaction_state, stage_transition, upstream_completed, StageTransition};
use crate::catalog::{PlatformCatalog, PlatformDefinition};
use crate::core::{
    EventRecord, ExecutionResult, StageKey, StageOutcome, StageRecord, State, TransactionId,
    TransactionRecord,
};
use crate::dedup::DeduplicationRegistry;
use crate::errors::{TrackerError, TrackerResult};
use crate::events::{
    EventSink, NoOpEventSink, STAGE_FINISHED, STAGE_RETRY_SCHEDULED, STAGE_STARTED,
    TRANSACTION_CREATED, TRANSACTION_RESUMED, TRANSACTION_STATE_CHANGED,
};
use crate::store::{TrackerStore, UnitOfWork};
use crate::utils::{Clock, SystemClock};

/// What finishing one stage attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedStage {
    /// The stage instance after the transition.
    pub stage: StageRecord,
    /// The transition that was applied.
    pub transition: StageTransition,
    /// The transaction state after re-derivation.
    pub transaction_state: State,
    /// True if the transaction state changed.
    pub transaction_changed: bool,
}

/// Tracks transactions and their stage instances through the pipeline.
///
/// Every operation runs in exactly one unit of work of the store. The tracker
/// holds no mutable state of its own, so one instance can be shared across
/// tasks.
pub struct TransactionTracker {
    store: Arc<dyn TrackerStore>,
    catalog: Arc<PlatformCatalog>,
    dedup: Arc<DeduplicationRegistry>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TransactionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionTracker")
            .field("catalog", &self.catalog)
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

impl TransactionTracker {
    /// Creates a tracker over a store, a platform catalog and a
    /// deduplication registry.
    #[must_use]
    pub fn new(
        store: Arc<dyn TrackerStore>,
        catalog: Arc<PlatformCatalog>,
        dedup: Arc<DeduplicationRegistry>,
    ) -> Self {
        Self {
            store,
            catalog,
            dedup,
            sink: Arc::new(NoOpEventSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the clock used for timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the platform catalog.
    #[must_use]
    pub fn catalog(&self) -> &PlatformCatalog {
        &self.catalog
    }

    /// Returns the transaction for a payload, creating it on first sight.
    ///
    /// Returns the transaction id and whether it was created by this call.
    /// When a concurrent caller creates the same fingerprint first, this
    /// call loses the insert, rolls back and returns the winner.
    pub async fn start_or_resume<P>(
        &self,
        process_code: &str,
        payload: &P,
    ) -> TrackerResult<(TransactionId, bool)>
    where
        P: Serialize + ?Sized,
    {
        let strategy = self.dedup.get(process_code)?;
        let payload = serde_json::to_value(payload)?;
        let fingerprint = strategy.fingerprint(&payload)?;

        let mut unit = self.store.begin().await?;
        if let Some(existing) = strategy
            .lookup(unit.as_mut(), process_code, &fingerprint)
            .await?
        {
            unit.rollback().await?;
            debug!(
                process_code = %process_code,
                fingerprint = %fingerprint,
                transaction_id = %existing,
                "Resuming existing transaction"
            );
            self.emit(
                TRANSACTION_RESUMED,
                json!({"transaction_id": existing, "process_code": process_code}),
            )
            .await;
            return Ok((existing, false));
        }

        let id = TransactionId::generate();
        let record = TransactionRecord::pending(id, process_code, self.clock.now());
        let written = match unit.insert_transaction(&record).await {
            Ok(()) => {
                strategy
                    .persist(unit.as_mut(), process_code, id, &payload)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        let result = match written {
            Ok(()) => unit.commit().await.map_err(TrackerError::from),
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        };

        match result {
            Ok(()) => {
                info!(
                    process_code = %process_code,
                    transaction_id = %id,
                    "Created transaction"
                );
                self.emit(
                    TRANSACTION_CREATED,
                    json!({"transaction_id": id, "process_code": process_code}),
                )
                .await;
                Ok((id, true))
            }
            Err(TrackerError::Store(e)) if e.is_unique_violation() => {
                warn!(
                    process_code = %process_code,
                    fingerprint = %fingerprint,
                    error = %e,
                    "Lost creation race, re-reading fingerprint"
                );
                let mut unit = self.store.begin().await?;
                let winner = strategy
                    .lookup(unit.as_mut(), process_code, &fingerprint)
                    .await?;
                unit.rollback().await?;
                let winner = winner.ok_or(TrackerError::Store(e))?;
                self.emit(
                    TRANSACTION_RESUMED,
                    json!({"transaction_id": winner, "process_code": process_code}),
                )
                .await;
                Ok((winner, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Registers a stage instance for a transaction.
    ///
    /// `None` selects the platform's default stage. Creates the instance
    /// PENDING with no attempts if absent; otherwise returns the stored
    /// instance untouched.
    pub async fn start_stage(
        &self,
        id: TransactionId,
        platform: &str,
        stage: Option<&str>,
    ) -> TrackerResult<StageRecord> {
        let (_, stage) = self.catalog.resolve_stage(platform, stage)?;
        let key = StageKey::new(id, platform, stage);

        let mut unit = self.store.begin().await?;
        require_transaction(unit.as_mut(), id).await?;
        let (record, created) = self.ensure_stage(unit.as_mut(), &key).await?;
        unit.commit().await?;

        if created {
            self.stage_started(&record).await;
        }
        Ok(record)
    }

    /// Registers every stage of every catalog platform for a transaction.
    ///
    /// Returns the number of instances created by this call.
    pub async fn start_all_stages(&self, id: TransactionId) -> TrackerResult<usize> {
        let platforms = self.catalog.all();

        let mut unit = self.store.begin().await?;
        require_transaction(unit.as_mut(), id).await?;
        let mut created = Vec::new();
        for platform in &platforms {
            for stage in platform.stage_names() {
                let key = StageKey::new(id, &platform.code, stage);
                let (record, is_new) = self.ensure_stage(unit.as_mut(), &key).await?;
                if is_new {
                    created.push(record);
                }
            }
        }
        unit.commit().await?;

        for record in &created {
            self.stage_started(record).await;
        }
        Ok(created.len())
    }

    /// Returns the stage instances ready to be driven at a platform stage.
    ///
    /// An instance is ready when it is PENDING, its transaction is PENDING
    /// and every started stage before it in the pipeline is COMPLETED.
    /// Results are in creation order.
    pub async fn get_pending_stages(
        &self,
        platform: &str,
        stage: Option<&str>,
    ) -> TrackerResult<Vec<StageRecord>> {
        let (_, stage) = self.catalog.resolve_stage(platform, stage)?;

        let mut unit = self.store.begin().await?;
        let candidates = unit.stages_in_state(platform, &stage, State::Pending).await?;

        let mut open = HashSet::new();
        let mut closed = HashSet::new();
        for candidate in &candidates {
            let id = candidate.transaction_id;
            if open.contains(&id) || closed.contains(&id) {
                continue;
            }
            match unit.transaction(id).await? {
                Some(transaction) if transaction.state == State::Pending => open.insert(id),
                _ => closed.insert(id),
            };
        }

        let mut siblings: HashMap<TransactionId, Vec<StageRecord>> = HashMap::new();
        for record in unit.stages_for_transactions(&open).await? {
            siblings.entry(record.transaction_id).or_default().push(record);
        }
        unit.rollback().await?;

        Ok(candidates
            .into_iter()
            .filter(|candidate| {
                siblings.get(&candidate.transaction_id).is_some_and(|stages| {
                    upstream_completed(candidate, stages, &self.catalog)
                })
            })
            .collect())
    }

    /// Appends an audit event for one attempt.
    pub async fn log_event(
        &self,
        id: TransactionId,
        platform: &str,
        stage: &str,
        attempt: u32,
        code: i64,
        description: Option<&str>,
    ) -> TrackerResult<EventRecord> {
        let event = EventRecord {
            transaction_id: id,
            platform_code: platform.to_string(),
            stage_name: stage.to_string(),
            attempt,
            code,
            description: description.map(str::to_string),
            logged_at: self.clock.now(),
        };

        let mut unit = self.store.begin().await?;
        unit.append_event(&event).await?;
        unit.commit().await?;
        Ok(event)
    }

    /// Applies the outcome of one attempt to a stage instance and re-derives
    /// the state of its transaction.
    pub async fn finish_stage(
        &self,
        id: TransactionId,
        platform: &str,
        stage: &str,
        outcome: &StageOutcome,
    ) -> TrackerResult<FinishedStage> {
        let (definition, stage) = self.catalog.resolve_stage(platform, Some(stage))?;
        let key = StageKey::new(id, platform, stage);

        let mut unit = self.store.begin().await?;
        let record = load_open_stage(unit.as_mut(), &key).await?;
        let finished = self
            .apply_outcome(unit.as_mut(), &definition, record, outcome)
            .await?;
        unit.commit().await?;

        self.stage_finished(&finished).await;
        Ok(finished)
    }

    /// Logs the event for an execution result and finishes the stage with
    /// it, in one unit of work.
    ///
    /// The event's attempt number is the attempt being consumed.
    pub async fn record_result(
        &self,
        id: TransactionId,
        platform: &str,
        stage: &str,
        result: &ExecutionResult,
    ) -> TrackerResult<FinishedStage> {
        let (definition, stage) = self.catalog.resolve_stage(platform, Some(stage))?;
        let key = StageKey::new(id, platform, stage);

        let mut unit = self.store.begin().await?;
        let record = load_open_stage(unit.as_mut(), &key).await?;
        let event = EventRecord {
            transaction_id: id,
            platform_code: key.platform_code.clone(),
            stage_name: key.stage_name.clone(),
            attempt: record.attempt_count.saturating_add(1),
            code: result.code,
            description: result.description.clone(),
            logged_at: self.clock.now(),
        };
        unit.append_event(&event).await?;
        let finished = self
            .apply_outcome(unit.as_mut(), &definition, record, &result.to_outcome())
            .await?;
        unit.commit().await?;

        self.stage_finished(&finished).await;
        Ok(finished)
    }

    /// Gets a transaction.
    pub async fn transaction(&self, id: TransactionId) -> TrackerResult<TransactionRecord> {
        let mut unit = self.store.begin().await?;
        let record = require_transaction(unit.as_mut(), id).await?;
        unit.rollback().await?;
        Ok(record)
    }

    /// Gets one stage instance.
    pub async fn stage(
        &self,
        id: TransactionId,
        platform: &str,
        stage: Option<&str>,
    ) -> TrackerResult<StageRecord> {
        let (_, stage) = self.catalog.resolve_stage(platform, stage)?;
        let key = StageKey::new(id, platform, stage);

        let mut unit = self.store.begin().await?;
        let record = unit.stage(&key).await?;
        unit.rollback().await?;
        record.ok_or_else(|| stage_not_found(&key))
    }

    /// Lists the stage instances of a transaction in creation order.
    pub async fn stages(&self, id: TransactionId) -> TrackerResult<Vec<StageRecord>> {
        let mut unit = self.store.begin().await?;
        let stages = unit.stages_for_transaction(id).await?;
        unit.rollback().await?;
        Ok(stages)
    }

    /// Lists the audit events of a transaction in logging order.
    pub async fn events(&self, id: TransactionId) -> TrackerResult<Vec<EventRecord>> {
        let mut unit = self.store.begin().await?;
        let events = unit.events_for_transaction(id).await?;
        unit.rollback().await?;
        Ok(events)
    }

    /// Gets the payload persisted when the transaction was created.
    pub async fn payload(&self, id: TransactionId) -> TrackerResult<Option<serde_json::Value>> {
        let mut unit = self.store.begin().await?;
        let payload = unit.payload(id).await?;
        unit.rollback().await?;
        Ok(payload.map(|p| p.payload))
    }

    async fn ensure_stage(
        &self,
        unit: &mut dyn UnitOfWork,
        key: &StageKey,
    ) -> TrackerResult<(StageRecord, bool)> {
        let fresh = StageRecord::pending(key, self.clock.now());
        if unit.insert_stage(&fresh).await? {
            return Ok((fresh, true));
        }
        let existing = unit
            .stage(key)
            .await?
            .ok_or_else(|| stage_not_found(key))?;
        Ok((existing, false))
    }

    async fn apply_outcome(
        &self,
        unit: &mut dyn UnitOfWork,
        definition: &PlatformDefinition,
        mut stage: StageRecord,
        outcome: &StageOutcome,
    ) -> TrackerResult<FinishedStage> {
        let transition = stage_transition(stage.attempt_count, outcome, &definition.retry_policy)?;
        let now = self.clock.now();
        transition.apply(&mut stage, outcome, now);
        unit.update_stage(&stage).await?;

        let transaction = require_transaction(unit, stage.transaction_id).await?;
        let siblings = unit.stages_for_transaction(stage.transaction_id).await?;
        let derived = derive_transaction_state(transaction.state, &siblings, &self.catalog.all());
        let transaction_changed = derived != transaction.state;
        if transaction_changed {
            unit.update_transaction_state(transaction.id, derived, now)
                .await?;
        }

        Ok(FinishedStage {
            stage,
            transition,
            transaction_state: derived,
            transaction_changed,
        })
    }

    async fn stage_started(&self, record: &StageRecord) {
        debug!(
            transaction_id = %record.transaction_id,
            platform = %record.platform_code,
            stage = %record.stage_name,
            "Stage registered"
        );
        self.emit(
            STAGE_STARTED,
            json!({
                "transaction_id": record.transaction_id,
                "platform": record.platform_code,
                "stage": record.stage_name,
            }),
        )
        .await;
    }

    async fn stage_finished(&self, finished: &FinishedStage) {
        let stage = &finished.stage;
        let data = json!({
            "transaction_id": stage.transaction_id,
            "platform": stage.platform_code,
            "stage": stage.stage_name,
            "state": stage.state,
            "attempt_count": stage.attempt_count,
        });

        match finished.transition {
            StageTransition::Retry { attempt_count } => {
                debug!(
                    transaction_id = %stage.transaction_id,
                    platform = %stage.platform_code,
                    stage = %stage.stage_name,
                    attempt_count,
                    "Transient failure, stage stays pending"
                );
                self.emit(STAGE_RETRY_SCHEDULED, data).await;
            }
            StageTransition::Exhausted { attempt_count } => {
                warn!(
                    transaction_id = %stage.transaction_id,
                    platform = %stage.platform_code,
                    stage = %stage.stage_name,
                    attempt_count,
                    "Retry budget exhausted"
                );
                self.emit(STAGE_FINISHED, data).await;
            }
            StageTransition::Completed { .. } | StageTransition::Rejected { .. } => {
                info!(
                    transaction_id = %stage.transaction_id,
                    platform = %stage.platform_code,
                    stage = %stage.stage_name,
                    state = %stage.state,
                    "Stage finished"
                );
                self.emit(STAGE_FINISHED, data).await;
            }
        }

        if finished.transaction_changed {
            info!(
                transaction_id = %stage.transaction_id,
                state = %finished.transaction_state,
                "Transaction state changed"
            );
            self.emit(
                TRANSACTION_STATE_CHANGED,
                json!({
                    "transaction_id": stage.transaction_id,
                    "state": finished.transaction_state,
                }),
            )
            .await;
        }
    }

    async fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.sink.emit(event_type, Some(data)).await;
    }
}

async fn require_transaction(
    unit: &mut dyn UnitOfWork,
    id: TransactionId,
) -> TrackerResult<TransactionRecord> {
    unit.transaction(id)
        .await?
        .ok_or(TrackerError::TransactionNotFound { id })
}

async fn load_open_stage(unit: &mut dyn UnitOfWork, key: &StageKey) -> TrackerResult<StageRecord> {
    let stage = unit.stage(key).await?.ok_or_else(|| stage_not_found(key))?;
    if stage.state.is_terminal() {
        return Err(TrackerError::StageTerminal {
            id: key.transaction_id,
            platform: key.platform_code.clone(),
            stage: key.stage_name.clone(),
            state: stage.state.to_string(),
        });
    }
    Ok(stage)
}

fn stage_not_found(key: &StageKey) -> TrackerError {
    TrackerError::StageNotFound {
        id: key.transaction_id,
        platform: key.platform_code.clone(),
        stage: key.stage_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RetryPolicy;
    use crate::core::ErrorType;
    use crate::dedup::FieldDeduplication;
    use crate::events::CollectingEventSink;
    use crate::store::InMemoryTrackerStore;
    use pretty_assertions::assert_eq;

    fn tracker() -> (TransactionTracker, InMemoryTrackerStore) {
        let store = InMemoryTrackerStore::new();
        let catalog = PlatformCatalog::new();
        catalog.register(
            PlatformDefinition::new("A")
                .with_retry_policy(RetryPolicy::with_max_attempts(2))
                .with_order(1),
        );
        let dedup = DeduplicationRegistry::new();
        dedup.register("PROC", Arc::new(FieldDeduplication::new(["id"])));

        let tracker = TransactionTracker::new(
            Arc::new(store.clone()),
            Arc::new(catalog),
            Arc::new(dedup),
        );
        (tracker, store)
    }

    #[tokio::test]
    async fn test_start_or_resume_deduplicates() {
        let (tracker, store) = tracker();
        let (first, is_new) = tracker
            .start_or_resume("PROC", &json!({"id": "X-1"}))
            .await
            .unwrap();
        assert!(is_new);

        let (second, is_new) = tracker
            .start_or_resume("PROC", &json!({"id": "X-1", "extra": true}))
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(first, second);
        assert_eq!(store.transaction_count().await, 1);

        let record = tracker.transaction(first).await.unwrap();
        assert_eq!(record.state, State::Pending);
        assert_eq!(record.process_code, "PROC");
        assert_eq!(
            tracker.payload(first).await.unwrap(),
            Some(json!({"id": "X-1"}))
        );
    }

    #[tokio::test]
    async fn test_unknown_process_creates_nothing() {
        let (tracker, store) = tracker();
        let err = tracker
            .start_or_resume("OTHER", &json!({"id": "X-1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::UnknownProcess { .. }));
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_fingerprint_field() {
        let (tracker, store) = tracker();
        let err = tracker
            .start_or_resume("PROC", &json!({"other": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::MissingFingerprintField { .. }));
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_stage_is_idempotent() {
        let (tracker, store) = tracker();
        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();

        let first = tracker.start_stage(id, "A", None).await.unwrap();
        assert_eq!(first.state, State::Pending);
        assert_eq!(first.attempt_count, 0);

        tracker
            .finish_stage(id, "A", "default", &StageOutcome::system_error("down"))
            .await
            .unwrap();

        let again = tracker.start_stage(id, "A", None).await.unwrap();
        assert_eq!(again.attempt_count, 1);
        assert_eq!(store.stage_count().await, 1);
    }

    #[tokio::test]
    async fn test_start_stage_validates_references() {
        let (tracker, _) = tracker();
        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();

        assert!(matches!(
            tracker.start_stage(id, "Z", None).await.unwrap_err(),
            TrackerError::UnknownPlatform { .. }
        ));
        assert!(matches!(
            tracker.start_stage(id, "A", Some("nope")).await.unwrap_err(),
            TrackerError::UnknownStage { .. }
        ));
        assert!(matches!(
            tracker
                .start_stage(TransactionId::generate(), "A", None)
                .await
                .unwrap_err(),
            TrackerError::TransactionNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_finish_stage_errors() {
        let (tracker, _) = tracker();
        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();

        let err = tracker
            .finish_stage(id, "A", "default", &StageOutcome::completed())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::StageNotFound { .. }));

        tracker.start_stage(id, "A", None).await.unwrap();
        let invalid = StageOutcome {
            state: State::Pending,
            error_type: None,
            description: None,
        };
        let err = tracker.finish_stage(id, "A", "default", &invalid).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidOutcome(_)));
        assert_eq!(tracker.stage(id, "A", None).await.unwrap().attempt_count, 0);

        tracker
            .finish_stage(id, "A", "default", &StageOutcome::completed())
            .await
            .unwrap();
        let err = tracker
            .finish_stage(id, "A", "default", &StageOutcome::completed())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::StageTerminal { ref state, .. } if state == "COMPLETED"));
    }

    #[tokio::test]
    async fn test_retry_then_exhausted() {
        let (tracker, _) = tracker();
        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();
        tracker.start_stage(id, "A", None).await.unwrap();

        let first = tracker
            .finish_stage(id, "A", "default", &StageOutcome::system_error("timeout"))
            .await
            .unwrap();
        assert_eq!(first.transition, StageTransition::Retry { attempt_count: 1 });
        assert_eq!(first.transaction_state, State::Pending);
        assert!(!first.transaction_changed);
        assert_eq!(tracker.get_pending_stages("A", None).await.unwrap().len(), 1);

        let second = tracker
            .finish_stage(id, "A", "default", &StageOutcome::system_error("timeout"))
            .await
            .unwrap();
        assert_eq!(second.transition, StageTransition::Exhausted { attempt_count: 2 });
        assert_eq!(second.stage.state, State::Failed);
        assert_eq!(second.stage.last_error_type, Some(ErrorType::System));
        assert_eq!(second.transaction_state, State::Failed);
        assert!(second.transaction_changed);
        assert!(tracker.get_pending_stages("A", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_result_logs_attempt_number() {
        let (tracker, _) = tracker();
        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();
        tracker.start_stage(id, "A", None).await.unwrap();

        tracker
            .record_result(id, "A", "default", &ExecutionResult::new(-2).with_description("timeout"))
            .await
            .unwrap();
        let finished = tracker
            .record_result(id, "A", "default", &ExecutionResult::ok())
            .await
            .unwrap();
        assert_eq!(finished.transaction_state, State::Completed);

        let events = tracker.events(id).await.unwrap();
        let attempts: Vec<(u32, i64)> = events.iter().map(|e| (e.attempt, e.code)).collect();
        assert_eq!(attempts, vec![(1, -2), (2, 0)]);
        assert_eq!(events[0].description.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_log_event_is_unvalidated() {
        let (tracker, _) = tracker();
        let id = TransactionId::generate();
        let event = tracker
            .log_event(id, "ANY", "thing", 7, 99, Some("free text"))
            .await
            .unwrap();
        assert_eq!(tracker.events(id).await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_events_reach_sink_after_commit() {
        let (tracker, _) = tracker();
        let sink = Arc::new(CollectingEventSink::new());
        let tracker = tracker.with_event_sink(sink.clone());

        let (id, _) = tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();
        tracker.start_or_resume("PROC", &json!({"id": 1})).await.unwrap();
        assert_eq!(tracker.start_all_stages(id).await.unwrap(), 1);
        assert_eq!(tracker.start_all_stages(id).await.unwrap(), 0);
        tracker
            .finish_stage(id, "A", "default", &StageOutcome::rejected("bad data"))
            .await
            .unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                TRANSACTION_CREATED,
                TRANSACTION_RESUMED,
                STAGE_STARTED,
                STAGE_FINISHED,
                TRANSACTION_STATE_CHANGED,
            ]
        );
        let (_, data) = &sink.events_of_type(TRANSACTION_STATE_CHANGED)[0];
        assert_eq!(data.as_ref().unwrap()["state"], json!("REJECTED"));
    }
}
