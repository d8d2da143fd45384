//! Persisted row types: transactions, stage instances, events and
//! deduplication mappings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::status::{ErrorType, State};
use crate::utils::Timestamp;

/// Unique identifier of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Allocates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::utils::generate_uuid())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of a stage instance: one stage of one platform for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageKey {
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Platform code.
    pub platform_code: String,
    /// Stage name within the platform.
    pub stage_name: String,
}

impl StageKey {
    /// Creates a stage key.
    #[must_use]
    pub fn new(
        transaction_id: TransactionId,
        platform_code: impl Into<String>,
        stage_name: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            platform_code: platform_code.into(),
            stage_name: stage_name.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.transaction_id, self.platform_code, self.stage_name)
    }
}

/// A tracked business transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique id.
    pub id: TransactionId,
    /// Process the transaction belongs to.
    pub process_code: String,
    /// Overall state.
    pub state: State,
    /// When the transaction was first seen.
    pub created_at: Timestamp,
    /// When the state last changed.
    pub updated_at: Timestamp,
}

impl TransactionRecord {
    /// Creates a new pending transaction.
    #[must_use]
    pub fn pending(id: TransactionId, process_code: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            process_code: process_code.into(),
            state: State::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One stage instance of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Platform code.
    pub platform_code: String,
    /// Stage name.
    pub stage_name: String,
    /// Attempts consumed so far.
    pub attempt_count: u32,
    /// Current state.
    pub state: State,
    /// When the stage instance was registered.
    pub created_at: Timestamp,
    /// When the stage reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Error type of the last reported outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error_type: Option<ErrorType>,
    /// Description of the last reported outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_description: Option<String>,
}

impl StageRecord {
    /// Creates a fresh pending stage instance.
    #[must_use]
    pub fn pending(key: &StageKey, now: Timestamp) -> Self {
        Self {
            transaction_id: key.transaction_id,
            platform_code: key.platform_code.clone(),
            stage_name: key.stage_name.clone(),
            attempt_count: 0,
            state: State::Pending,
            created_at: now,
            finished_at: None,
            last_error_type: None,
            last_description: None,
        }
    }

    /// Returns the identity of this stage instance.
    #[must_use]
    pub fn key(&self) -> StageKey {
        StageKey::new(self.transaction_id, &self.platform_code, &self.stage_name)
    }

    /// Returns true if the instance belongs to the given platform and stage.
    #[must_use]
    pub fn is_stage(&self, platform: &str, stage: &str) -> bool {
        self.platform_code == platform && self.stage_name == stage
    }
}

/// Append-only audit record of one reported attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Platform code.
    pub platform_code: String,
    /// Stage name.
    pub stage_name: String,
    /// Attempt number as reported by the caller.
    pub attempt: u32,
    /// Raw outcome code.
    pub code: i64,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the event was logged.
    pub logged_at: Timestamp,
}

/// Mapping from a deduplication fingerprint to the transaction it created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Process code the fingerprint is scoped to.
    pub process_code: String,
    /// The fingerprint.
    pub fingerprint: String,
    /// The transaction created for it.
    pub transaction_id: TransactionId,
    /// Version of the strategy that computed the fingerprint.
    pub strategy_version: u32,
}

/// Payload data persisted alongside a new transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    /// Owning transaction.
    pub transaction_id: TransactionId,
    /// Process code.
    pub process_code: String,
    /// The structured payload.
    pub payload: serde_json::Value,
}
