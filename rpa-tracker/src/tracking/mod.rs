//! Transaction tracking.
//!
//! This module provides:
//! - The [`TransactionTracker`] that creates, resumes and advances transactions
//! - Pure transition functions for stage attempts and transaction states

mod tracker;
mod transition;

pub use tracker::{FinishedStage, TransactionTracker};
pub use transition::{
    derive_transaction_state, stage_transition, upstream_completed, StageTransition,
};
