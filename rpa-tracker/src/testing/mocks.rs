//! Deduplication doubles for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::TransactionId;
use crate::dedup::{DeduplicationStrategy, FieldDeduplication};
use crate::errors::TrackerResult;
use crate::store::UnitOfWork;

/// A field strategy whose lookups can be told to miss.
///
/// While armed, a lookup reports no match even when the store has one, the
/// way a lookup does when a concurrent creator commits right after it. The
/// tracker then loses the insert on the fingerprint constraint and must
/// resolve the race.
#[derive(Debug)]
pub struct StaleLookupDeduplication {
    inner: FieldDeduplication,
    stale_lookups: AtomicUsize,
    lookups: AtomicUsize,
}

impl StaleLookupDeduplication {
    /// Creates an unarmed double over the given fields.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: FieldDeduplication::new(fields),
            stale_lookups: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` lookups miss.
    pub fn arm(&self, count: usize) {
        self.stale_lookups.store(count, Ordering::SeqCst);
    }

    /// Returns the number of lookups performed.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeduplicationStrategy for StaleLookupDeduplication {
    fn version(&self) -> u32 {
        self.inner.version()
    }

    fn fingerprint(&self, payload: &serde_json::Value) -> TrackerResult<String> {
        self.inner.fingerprint(payload)
    }

    async fn lookup(
        &self,
        unit: &mut dyn UnitOfWork,
        process_code: &str,
        fingerprint: &str,
    ) -> TrackerResult<Option<TransactionId>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let stale = self
            .stale_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        Ok(unit.find_fingerprint(process_code, fingerprint).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryTrackerStore, TrackerStore};
    use crate::core::FingerprintRecord;

    #[tokio::test]
    async fn test_armed_lookup_misses_once() {
        let store = InMemoryTrackerStore::new();
        let id = TransactionId::generate();
        let mut unit = store.begin().await.unwrap();
        unit.insert_fingerprint(&FingerprintRecord {
            process_code: "P".to_string(),
            fingerprint: "K".to_string(),
            transaction_id: id,
            strategy_version: 1,
        })
        .await
        .unwrap();
        unit.commit().await.unwrap();

        let double = StaleLookupDeduplication::new(["k"]);
        double.arm(1);

        let mut unit = store.begin().await.unwrap();
        assert_eq!(double.lookup(unit.as_mut(), "P", "K").await.unwrap(), None);
        assert_eq!(double.lookup(unit.as_mut(), "P", "K").await.unwrap(), Some(id));
        assert_eq!(double.lookup_count(), 2);
    }
}
