//! Deduplication strategy trait.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::core::{FingerprintRecord, PayloadRecord, TransactionId};
use crate::errors::TrackerResult;
use crate::store::UnitOfWork;

/// Decides whether an incoming payload is new work or a transaction already
/// being tracked.
///
/// Implementors only have to provide [`fingerprint`](Self::fingerprint); the
/// default `lookup` and `persist` keep the mapping and the payload in the
/// tracker store. Both run inside the unit of work the tracker opened, so the
/// mapping commits together with the transaction row.
#[async_trait]
pub trait DeduplicationStrategy: Debug + Send + Sync {
    /// Version stored with each mapping written by this strategy.
    fn version(&self) -> u32 {
        1
    }

    /// Computes the fingerprint of a payload. Must be deterministic.
    fn fingerprint(&self, payload: &serde_json::Value) -> TrackerResult<String>;

    /// Finds the transaction already created for `fingerprint`.
    async fn lookup(
        &self,
        unit: &mut dyn UnitOfWork,
        process_code: &str,
        fingerprint: &str,
    ) -> TrackerResult<Option<TransactionId>> {
        Ok(unit.find_fingerprint(process_code, fingerprint).await?)
    }

    /// Records the mapping for a new transaction and stores its payload.
    async fn persist(
        &self,
        unit: &mut dyn UnitOfWork,
        process_code: &str,
        id: TransactionId,
        payload: &serde_json::Value,
    ) -> TrackerResult<()> {
        let fingerprint = self.fingerprint(payload)?;
        unit.insert_fingerprint(&FingerprintRecord {
            process_code: process_code.to_string(),
            fingerprint,
            transaction_id: id,
            strategy_version: self.version(),
        })
        .await?;
        unit.insert_payload(&PayloadRecord {
            transaction_id: id,
            process_code: process_code.to_string(),
            payload: payload.clone(),
        })
        .await?;
        Ok(())
    }
}
