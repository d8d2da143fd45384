//! Pure state transition functions.
//!
//! Nothing here touches the store: the tracker loads the rows, asks these
//! functions what the next state is and writes the answer back in the same
//! unit of work.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{PipelinePosition, PlatformCatalog, PlatformDefinition, RetryPolicy};
use crate::core::{ErrorType, StageOutcome, StageRecord, State};
use crate::errors::{TrackerError, TrackerResult};
use crate::utils::Timestamp;

/// The effect of one finished attempt on a stage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageTransition {
    /// The attempt succeeded.
    Completed {
        /// Attempts consumed so far.
        attempt_count: u32,
    },
    /// The platform refused the work.
    Rejected {
        /// Attempts consumed so far.
        attempt_count: u32,
    },
    /// The attempt failed transiently and attempts remain.
    Retry {
        /// Attempts consumed so far.
        attempt_count: u32,
    },
    /// The attempt failed transiently and the retry budget is spent.
    Exhausted {
        /// Attempts consumed so far.
        attempt_count: u32,
    },
}

impl StageTransition {
    /// Returns the stage state after the transition.
    #[must_use]
    pub const fn state(&self) -> State {
        match self {
            Self::Completed { .. } => State::Completed,
            Self::Rejected { .. } => State::Rejected,
            Self::Retry { .. } => State::Pending,
            Self::Exhausted { .. } => State::Failed,
        }
    }

    /// Returns the attempt count after the transition.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        match self {
            Self::Completed { attempt_count }
            | Self::Rejected { attempt_count }
            | Self::Retry { attempt_count }
            | Self::Exhausted { attempt_count } => *attempt_count,
        }
    }

    /// Returns true if the stage is terminal after the transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retry { .. })
    }

    /// Writes the transition into a stage record.
    pub fn apply(&self, stage: &mut StageRecord, outcome: &StageOutcome, now: Timestamp) {
        stage.attempt_count = self.attempt_count();
        stage.state = self.state();
        stage.last_error_type = match self {
            Self::Completed { .. } => None,
            Self::Rejected { .. } => Some(ErrorType::Business),
            Self::Retry { .. } | Self::Exhausted { .. } => Some(ErrorType::System),
        };
        stage.last_description.clone_from(&outcome.description);
        if self.is_terminal() {
            stage.finished_at = Some(now);
        }
    }
}

/// Computes the transition of a stage that has consumed `attempt_count`
/// attempts when it receives `outcome`.
///
/// Every call consumes one attempt. A transient failure keeps the stage
/// queued while `attempt_count + 1 < max_attempts`, or forever when the
/// policy is unlimited.
pub fn stage_transition(
    attempt_count: u32,
    outcome: &StageOutcome,
    policy: &RetryPolicy,
) -> TrackerResult<StageTransition> {
    let attempts = attempt_count.saturating_add(1);

    match (outcome.state, outcome.error_type) {
        (State::Completed, None) => Ok(StageTransition::Completed {
            attempt_count: attempts,
        }),
        (State::Completed, Some(error_type)) => Err(TrackerError::InvalidOutcome(format!(
            "completed outcome carries error type {error_type}"
        ))),
        (State::Rejected, _) | (_, Some(ErrorType::Business)) => Ok(StageTransition::Rejected {
            attempt_count: attempts,
        }),
        (State::Failed, _) | (State::Pending, Some(ErrorType::System)) => {
            Ok(match policy.limit() {
                Some(max) if attempts >= max => StageTransition::Exhausted {
                    attempt_count: attempts,
                },
                _ => StageTransition::Retry {
                    attempt_count: attempts,
                },
            })
        }
        (State::Pending, None) => Err(TrackerError::InvalidOutcome(
            "pending outcome without an error type".to_string(),
        )),
    }
}

/// Derives the state of a transaction from its stage instances.
///
/// A terminal transaction keeps its state. Otherwise one rejected stage makes
/// it REJECTED. It stays PENDING until every stage of every platform exists
/// and is terminal, then becomes FAILED if any stage failed and COMPLETED if
/// none did. An empty platform list never finishes a transaction.
#[must_use]
pub fn derive_transaction_state(
    current: State,
    stages: &[StageRecord],
    platforms: &[Arc<PlatformDefinition>],
) -> State {
    if current.is_terminal() {
        return current;
    }
    if stages.iter().any(|s| s.state == State::Rejected) {
        return State::Rejected;
    }
    if platforms.is_empty() {
        return State::Pending;
    }

    let mut failed = false;
    for platform in platforms {
        for stage in platform.stage_names() {
            match stages.iter().find(|s| s.is_stage(&platform.code, stage)) {
                Some(record) if record.state == State::Failed => failed = true,
                Some(record) if record.state == State::Completed => {}
                _ => return State::Pending,
            }
        }
    }

    if failed {
        State::Failed
    } else {
        State::Completed
    }
}

/// Returns true if every started stage of the transaction that comes before
/// `target` in pipeline order is completed.
///
/// Stages that were never started do not block. Stages whose platform left
/// the catalog are ignored.
#[must_use]
pub fn upstream_completed(
    target: &StageRecord,
    siblings: &[StageRecord],
    catalog: &PlatformCatalog,
) -> bool {
    let Some(position) = catalog.position(&target.platform_code, &target.stage_name) else {
        return false;
    };
    let positions: HashMap<(&str, &str), PipelinePosition> = siblings
        .iter()
        .filter_map(|s| {
            catalog
                .position(&s.platform_code, &s.stage_name)
                .map(|p| ((s.platform_code.as_str(), s.stage_name.as_str()), p))
        })
        .collect();

    siblings.iter().all(|s| {
        positions
            .get(&(s.platform_code.as_str(), s.stage_name.as_str()))
            .map_or(true, |p| *p >= position || s.state == State::Completed)
    })
}
