//! Persistence contract for the tracker.
//!
//! A [`TrackerStore`] hands out [`UnitOfWork`] handles. Every tracker
//! operation runs inside exactly one unit: the writes of a unit become
//! visible together on [`UnitOfWork::commit`] or not at all. Dropping a unit
//! without committing rolls it back.
//!
//! Backends must enforce these uniqueness constraints and report violations
//! as [`StoreError::UniqueViolation`](crate::errors::StoreError::UniqueViolation):
//! - transaction id ([`TRANSACTIONS_PK`])
//! - (process code, fingerprint) ([`FINGERPRINTS_PK`])
//! - (transaction id, platform code, stage name) ([`STAGES_PK`]), except
//!   through [`UnitOfWork::insert_stage`], which ignores the conflict.

mod memory;

pub use memory::InMemoryTrackerStore;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{
    EventRecord, FingerprintRecord, PayloadRecord, StageKey, StageRecord, State, TransactionId,
    TransactionRecord,
};
use crate::errors::StoreResult;
use crate::utils::Timestamp;

/// Constraint name for the transaction primary key.
pub const TRANSACTIONS_PK: &str = "transactions_pk";
/// Constraint name for the fingerprint mapping key.
pub const FINGERPRINTS_PK: &str = "fingerprints_pk";
/// Constraint name for the stage instance key.
pub const STAGES_PK: &str = "stages_pk";
/// Constraint name for the payload key.
pub const PAYLOADS_PK: &str = "payloads_pk";

/// Grouped stage count row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageCount {
    /// Platform code.
    pub platform_code: String,
    /// Stage name.
    pub stage_name: String,
    /// Stage state.
    pub state: State,
    /// Number of stage instances.
    pub count: u64,
}

/// A persistence backend.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Opens a new unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// One atomic unit of reads and writes.
///
/// Windows passed to the range queries are half-open: `start <= created_at < end`.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Looks up the transaction created for a fingerprint.
    async fn find_fingerprint(
        &mut self,
        process_code: &str,
        fingerprint: &str,
    ) -> StoreResult<Option<TransactionId>>;

    /// Gets a transaction by id.
    async fn transaction(&mut self, id: TransactionId) -> StoreResult<Option<TransactionRecord>>;

    /// Gets the payload persisted with a transaction.
    async fn payload(&mut self, id: TransactionId) -> StoreResult<Option<PayloadRecord>>;

    /// Gets a stage instance.
    async fn stage(&mut self, key: &StageKey) -> StoreResult<Option<StageRecord>>;

    /// Lists the stage instances of a transaction in creation order.
    async fn stages_for_transaction(&mut self, id: TransactionId) -> StoreResult<Vec<StageRecord>>;

    /// Lists the stage instances of several transactions in one read, in
    /// creation order.
    async fn stages_for_transactions(
        &mut self,
        ids: &HashSet<TransactionId>,
    ) -> StoreResult<Vec<StageRecord>>;

    /// Lists stage instances of one platform stage in a given state, in creation order.
    async fn stages_in_state(
        &mut self,
        platform_code: &str,
        stage_name: &str,
        state: State,
    ) -> StoreResult<Vec<StageRecord>>;

    /// Lists the events of a transaction in logging order.
    async fn events_for_transaction(&mut self, id: TransactionId) -> StoreResult<Vec<EventRecord>>;

    /// Lists transactions created in the window, in creation order.
    async fn transactions_between(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<TransactionRecord>>;

    /// Counts transactions created in the window, grouped by state.
    async fn count_transactions_by_state(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> StoreResult<Vec<(State, u64)>>;

    /// Counts stage instances of transactions created in the window, grouped
    /// by (platform, stage, state).
    async fn count_stages(&mut self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<StageCount>>;

    /// Inserts a transaction row.
    async fn insert_transaction(&mut self, record: &TransactionRecord) -> StoreResult<()>;

    /// Changes the state of a transaction.
    async fn update_transaction_state(
        &mut self,
        id: TransactionId,
        state: State,
        at: Timestamp,
    ) -> StoreResult<()>;

    /// Inserts a fingerprint mapping.
    async fn insert_fingerprint(&mut self, record: &FingerprintRecord) -> StoreResult<()>;

    /// Inserts the payload of a transaction.
    async fn insert_payload(&mut self, record: &PayloadRecord) -> StoreResult<()>;

    /// Inserts a stage instance unless one exists for the same key.
    ///
    /// Returns true if a row was created.
    async fn insert_stage(&mut self, record: &StageRecord) -> StoreResult<bool>;

    /// Overwrites an existing stage instance.
    async fn update_stage(&mut self, record: &StageRecord) -> StoreResult<()>;

    /// Appends an event.
    async fn append_event(&mut self, record: &EventRecord) -> StoreResult<()>;

    /// Makes every write of the unit durable.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discards every write of the unit.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
