//! Core domain model types for rpa-tracker.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Tracking state and error type enums
//! - The outcome-code classifier
//! - Persisted record types

mod record;
mod result;
mod status;

pub use record::{
    EventRecord, FingerprintRecord, PayloadRecord, StageKey, StageRecord, TransactionId,
    TransactionRecord,
};
pub use result::{classify, Classification, ExecutionResult, StageOutcome};
pub use status::{ErrorType, StageState, State, TransactionState};
