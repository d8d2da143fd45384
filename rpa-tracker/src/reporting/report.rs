//! Transaction and stage summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{State, TransactionRecord};
use crate::errors::TrackerResult;
use crate::store::{StageCount, TrackerStore, UnitOfWork};
use crate::utils::{format_iso8601, Timestamp};

/// Stage instances of one platform in one state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemCount {
    /// Platform code.
    pub platform_code: String,
    /// Stage state.
    pub state: State,
    /// Number of stage instances.
    pub count: u64,
}

/// Every summary of a window, read in one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    /// Window start, inclusive.
    pub start: Timestamp,
    /// Window end, exclusive.
    pub end: Timestamp,
    /// Transactions created in the window, in creation order.
    pub transactions: Vec<TransactionRecord>,
    /// Transaction counts per state.
    pub by_state: Vec<(State, u64)>,
    /// Stage counts per (platform, state).
    pub by_system: Vec<SystemCount>,
    /// Stage counts per (platform, stage, state).
    pub by_system_and_stage: Vec<StageCount>,
}

impl ReportSnapshot {
    /// Returns the number of transactions in the window.
    #[must_use]
    pub fn total(&self) -> usize {
        self.transactions.len()
    }

    /// Returns the count of transactions in `state`.
    #[must_use]
    pub fn count_in_state(&self, state: State) -> u64 {
        self.by_state
            .iter()
            .find(|(s, _)| *s == state)
            .map_or(0, |(_, count)| *count)
    }
}

/// Aggregates tracked transactions and stages over a time window.
pub struct TransactionReport {
    store: Arc<dyn TrackerStore>,
}

impl fmt::Debug for TransactionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionReport").finish_non_exhaustive()
    }
}

impl TransactionReport {
    /// Creates a report over a store.
    #[must_use]
    pub fn new(store: Arc<dyn TrackerStore>) -> Self {
        Self { store }
    }

    /// Lists transactions created in the window.
    pub async fn transactions_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> TrackerResult<Vec<TransactionRecord>> {
        let mut unit = self.store.begin().await?;
        let transactions = unit.transactions_between(start, end).await?;
        unit.rollback().await?;
        Ok(transactions)
    }

    /// Counts transactions per state. States with no transactions are omitted.
    pub async fn summary_by_state(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> TrackerResult<Vec<(State, u64)>> {
        let mut unit = self.store.begin().await?;
        let counts = unit.count_transactions_by_state(start, end).await?;
        unit.rollback().await?;
        Ok(sorted(counts))
    }

    /// Counts stage instances per (platform, state).
    pub async fn stage_summary_by_system(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> TrackerResult<Vec<SystemCount>> {
        let by_stage = self.stage_summary_by_system_and_stage(start, end).await?;
        Ok(roll_up(&by_stage))
    }

    /// Counts stage instances per (platform, stage, state).
    pub async fn stage_summary_by_system_and_stage(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> TrackerResult<Vec<StageCount>> {
        let mut unit = self.store.begin().await?;
        let counts = unit.count_stages(start, end).await?;
        unit.rollback().await?;
        Ok(sorted(counts))
    }

    /// Reads every summary of the window from one consistent view.
    pub async fn snapshot(&self, start: Timestamp, end: Timestamp) -> TrackerResult<ReportSnapshot> {
        let mut unit = self.store.begin().await?;
        let snapshot = read_snapshot(unit.as_mut(), start, end).await?;
        unit.rollback().await?;

        debug!(
            start = %format_iso8601(&start),
            end = %format_iso8601(&end),
            transactions = snapshot.total(),
            "Built report snapshot"
        );
        Ok(snapshot)
    }
}

async fn read_snapshot(
    unit: &mut dyn UnitOfWork,
    start: Timestamp,
    end: Timestamp,
) -> TrackerResult<ReportSnapshot> {
    let transactions = unit.transactions_between(start, end).await?;
    let by_state = sorted(unit.count_transactions_by_state(start, end).await?);
    let by_system_and_stage = sorted(unit.count_stages(start, end).await?);
    let by_system = roll_up(&by_system_and_stage);

    Ok(ReportSnapshot {
        start,
        end,
        transactions,
        by_state,
        by_system,
        by_system_and_stage,
    })
}

fn sorted<T: Ord>(mut rows: Vec<T>) -> Vec<T> {
    rows.sort();
    rows
}

fn roll_up(by_stage: &[StageCount]) -> Vec<SystemCount> {
    let mut totals: BTreeMap<(&str, State), u64> = BTreeMap::new();
    for row in by_stage {
        *totals.entry((row.platform_code.as_str(), row.state)).or_default() += row.count;
    }
    totals
        .into_iter()
        .map(|((platform_code, state), count)| SystemCount {
            platform_code: platform_code.to_string(),
            state,
            count,
        })
        .collect()
}
