//! Testing utilities for tracker users.
//!
//! This module provides:
//! - The three-platform scenario catalog and sample payloads
//! - A ready-made tracker over an in-memory store
//! - Deduplication doubles that force the creation race
//! - Assertions on stage and transaction records

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_stage, assert_transaction_state};
pub use fixtures::{
    scenario_catalog, scenario_dedup, scenario_payloads, CancellationPayload, TestTracker,
    SCENARIO_PROCESS,
};
pub use mocks::StaleLookupDeduplication;
