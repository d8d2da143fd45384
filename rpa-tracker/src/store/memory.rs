//! In-memory tracker store.
//!
//! Tables live behind one async mutex. A unit of work holds the lock from
//! `begin` until it commits or rolls back, so units are serialisable. Writes
//! are applied in place and recorded in an undo log that is replayed in
//! reverse on rollback.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    StageCount, TrackerStore, UnitOfWork, FINGERPRINTS_PK, PAYLOADS_PK, STAGES_PK, TRANSACTIONS_PK,
};
use crate::core::{
    EventRecord, FingerprintRecord, PayloadRecord, StageKey, StageRecord, State, TransactionId,
    TransactionRecord,
};
use crate::errors::{StoreError, StoreResult};
use crate::utils::Timestamp;

type FingerprintKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    transactions: Vec<TransactionRecord>,
    transaction_index: HashMap<TransactionId, usize>,
    stages: Vec<StageRecord>,
    stage_index: HashMap<StageKey, usize>,
    events: Vec<EventRecord>,
    fingerprints: HashMap<FingerprintKey, FingerprintRecord>,
    payloads: HashMap<TransactionId, PayloadRecord>,
}

impl Tables {
    fn transaction(&self, id: TransactionId) -> Option<&TransactionRecord> {
        self.transaction_index
            .get(&id)
            .map(|&index| &self.transactions[index])
    }

    fn in_window(record: &TransactionRecord, start: Timestamp, end: Timestamp) -> bool {
        record.created_at >= start && record.created_at < end
    }
}

#[derive(Debug)]
enum Undo {
    InsertTransaction(TransactionId),
    UpdateTransaction(usize, TransactionRecord),
    InsertFingerprint(FingerprintKey),
    InsertPayload(TransactionId),
    InsertStage(StageKey),
    UpdateStage(usize, StageRecord),
    AppendEvent,
}

impl Undo {
    fn apply(self, tables: &mut Tables) {
        match self {
            Self::InsertTransaction(id) => {
                tables.transaction_index.remove(&id);
                tables.transactions.pop();
            }
            Self::UpdateTransaction(index, previous) => {
                tables.transactions[index] = previous;
            }
            Self::InsertFingerprint(key) => {
                tables.fingerprints.remove(&key);
            }
            Self::InsertPayload(id) => {
                tables.payloads.remove(&id);
            }
            Self::InsertStage(key) => {
                tables.stage_index.remove(&key);
                tables.stages.pop();
            }
            Self::UpdateStage(index, previous) => {
                tables.stages[index] = previous;
            }
            Self::AppendEvent => {
                tables.events.pop();
            }
        }
    }
}

/// Tracker store that keeps every table in process memory.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackerStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryTrackerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `begin` fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next commit fail and roll its unit back.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of transaction rows.
    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    /// Returns the number of stage rows.
    pub async fn stage_count(&self) -> usize {
        self.tables.lock().await.stages.len()
    }

    /// Returns the number of event rows.
    pub async fn event_count(&self) -> usize {
        self.tables.lock().await.events.len()
    }

    /// Returns the number of fingerprint mappings.
    pub async fn fingerprint_count(&self) -> usize {
        self.tables.lock().await.fingerprints.len()
    }
}

#[async_trait]
impl TrackerStore for InMemoryTrackerStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory store switched off"));
        }

        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            tables: guard,
            undo: Vec::new(),
            fail_commit: Arc::clone(&self.fail_next_commit),
        }))
    }
}

/// Unit of work over [`InMemoryTrackerStore`].
struct MemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
    fail_commit: Arc<AtomicBool>,
}

impl MemoryUnitOfWork {
    fn undo_all(&mut self) {
        while let Some(step) = self.undo.pop() {
            step.apply(&mut self.tables);
        }
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.undo_all();
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_fingerprint(
        &mut self,
        process_code: &str,
        fingerprint: &str,
    ) -> StoreResult<Option<TransactionId>> {
        let key = (process_code.to_string(), fingerprint.to_string());
        Ok(self.tables.fingerprints.get(&key).map(|r| r.transaction_id))
    }

    async fn transaction(&mut self, id: TransactionId) -> StoreResult<Option<TransactionRecord>> {
        Ok(self.tables.transaction(id).cloned())
    }

    async fn payload(&mut self, id: TransactionId) -> StoreResult<Option<PayloadRecord>> {
        Ok(self.tables.payloads.get(&id).cloned())
    }

    async fn stage(&mut self, key: &StageKey) -> StoreResult<Option<StageRecord>> {
        Ok(self
            .tables
            .stage_index
            .get(key)
            .map(|&index| self.tables.stages[index].clone()))
    }

    async fn stages_for_transaction(&mut self, id: TransactionId) -> StoreResult<Vec<StageRecord>> {
        Ok(self
            .tables
            .stages
            .iter()
            .filter(|s| s.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn stages_for_transactions(
        &mut self,
        ids: &HashSet<TransactionId>,
    ) -> StoreResult<Vec<StageRecord>> {
        Ok(self
            .tables
            .stages
            .iter()
            .filter(|s| ids.contains(&s.transaction_id))
            .cloned()
            .collect())
    }

    async fn stages_in_state(
        &mut self,
        platform_code: &str,
        stage_name: &str,
        state: State,
    ) -> StoreResult<Vec<StageRecord>> {
        Ok(self
            .tables
            .stages
            .iter()
            .filter(|s| s.is_stage(platform_code, stage_name) && s.state == state)
            .cloned()
            .collect())
    }

    async fn events_for_transaction(&mut self, id: TransactionId) -> StoreResult<Vec<EventRecord>> {
        Ok(self
            .tables
            .events
            .iter()
            .filter(|e| e.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn transactions_between(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<TransactionRecord>> {
        Ok(self
            .tables
            .transactions
            .iter()
            .filter(|t| Tables::in_window(t, start, end))
            .cloned()
            .collect())
    }

    async fn count_transactions_by_state(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<(State, u64)>> {
        let mut counts: BTreeMap<State, u64> = BTreeMap::new();
        for record in &self.tables.transactions {
            if Tables::in_window(record, start, end) {
                *counts.entry(record.state).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_stages(&mut self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<StageCount>> {
        let mut counts: BTreeMap<(String, String, State), u64> = BTreeMap::new();
        for stage in &self.tables.stages {
            let in_window = self
                .tables
                .transaction(stage.transaction_id)
                .is_some_and(|t| Tables::in_window(t, start, end));
            if in_window {
                let key = (stage.platform_code.clone(), stage.stage_name.clone(), stage.state);
                *counts.entry(key).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|((platform_code, stage_name, state), count)| StageCount {
                platform_code,
                stage_name,
                state,
                count,
            })
            .collect())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> StoreResult<()> {
        if self.tables.transaction_index.contains_key(&record.id) {
            return Err(StoreError::unique_violation(TRANSACTIONS_PK));
        }
        let index = self.tables.transactions.len();
        self.tables.transactions.push(record.clone());
        self.tables.transaction_index.insert(record.id, index);
        self.undo.push(Undo::InsertTransaction(record.id));
        Ok(())
    }

    async fn update_transaction_state(
        &mut self,
        id: TransactionId,
        state: State,
        at: Timestamp,
    ) -> StoreResult<()> {
        let index = *self
            .tables
            .transaction_index
            .get(&id)
            .ok_or_else(|| StoreError::Backend(format!("no transaction row {id}")))?;
        let record = &mut self.tables.transactions[index];
        let previous = record.clone();
        record.state = state;
        record.updated_at = at;
        self.undo.push(Undo::UpdateTransaction(index, previous));
        Ok(())
    }

    async fn insert_fingerprint(&mut self, record: &FingerprintRecord) -> StoreResult<()> {
        let key = (record.process_code.clone(), record.fingerprint.clone());
        if self.tables.fingerprints.contains_key(&key) {
            return Err(StoreError::unique_violation(FINGERPRINTS_PK));
        }
        self.tables.fingerprints.insert(key.clone(), record.clone());
        self.undo.push(Undo::InsertFingerprint(key));
        Ok(())
    }

    async fn insert_payload(&mut self, record: &PayloadRecord) -> StoreResult<()> {
        if self.tables.payloads.contains_key(&record.transaction_id) {
            return Err(StoreError::unique_violation(PAYLOADS_PK));
        }
        self.tables
            .payloads
            .insert(record.transaction_id, record.clone());
        self.undo.push(Undo::InsertPayload(record.transaction_id));
        Ok(())
    }

    async fn insert_stage(&mut self, record: &StageRecord) -> StoreResult<bool> {
        let key = record.key();
        if self.tables.stage_index.contains_key(&key) {
            return Ok(false);
        }
        let index = self.tables.stages.len();
        self.tables.stages.push(record.clone());
        self.tables.stage_index.insert(key.clone(), index);
        self.undo.push(Undo::InsertStage(key));
        Ok(true)
    }

    async fn update_stage(&mut self, record: &StageRecord) -> StoreResult<()> {
        let key = record.key();
        let index = *self
            .tables
            .stage_index
            .get(&key)
            .ok_or_else(|| StoreError::Backend(format!("no stage row {key} ({STAGES_PK})")))?;
        let previous = std::mem::replace(&mut self.tables.stages[index], record.clone());
        self.undo.push(Undo::UpdateStage(index, previous));
        Ok(())
    }

    async fn append_event(&mut self, record: &EventRecord) -> StoreResult<()> {
        self.tables.events.push(record.clone());
        self.undo.push(Undo::AppendEvent);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut unit = self;
        if unit.fail_commit.swap(false, Ordering::SeqCst) {
            unit.undo_all();
            return Err(StoreError::unavailable("commit failed: connection lost"));
        }
        unit.undo.clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let mut unit = self;
        unit.undo_all();
        Ok(())
    }
}
