//! # RPA Tracker
//!
//! Transaction tracking for pipelines that push business work items through
//! an ordered series of external platforms.
//!
//! The tracker provides:
//!
//! - **Deduplication**: payloads are fingerprinted per process code, so
//!   resubmitted work resumes the transaction already in flight
//! - **Stage progression**: each transaction gets one stage instance per
//!   platform stage, queued until everything upstream has completed
//! - **Retry admission**: transient failures keep a stage queued until the
//!   platform's attempt budget is spent
//! - **Reporting**: grouped counts of transactions and stages over a window
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rpa_tracker::prelude::*;
//! use std::sync::Arc;
//!
//! let config = TrackerConfig::from_path("tracker.json")?;
//! let tracker = TransactionTracker::new(
//!     Arc::new(InMemoryTrackerStore::new()),
//!     Arc::new(config.build_catalog()),
//!     Arc::new(config.build_dedup_registry()),
//! )
//! .with_event_sink(config.logging.event_sink()?);
//!
//! let (id, _) = tracker.start_or_resume("CANC_PROC", &payload).await?;
//! tracker.start_all_stages(id).await?;
//!
//! for stage in tracker.get_pending_stages("A", None).await? {
//!     let result = ExecutionResult::new(call_platform(&stage).await);
//!     tracker
//!         .record_result(stage.transaction_id, "A", &stage.stage_name, &result)
//!         .await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod catalog;
pub mod config;
pub mod core;
pub mod dedup;
pub mod errors;
pub mod events;
pub mod observability;
pub mod reporting;
pub mod store;
pub mod testing;
pub mod tracking;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::catalog::{PlatformCatalog, PlatformDefinition, RetryPolicy, DEFAULT_STAGE};
    pub use crate::config::{ConfigError, TrackerConfig};
    pub use crate::core::{
        classify, ErrorType, ExecutionResult, StageOutcome, StageRecord, State, TransactionId,
        TransactionRecord,
    };
    pub use crate::dedup::{
        DeduplicationRegistry, DeduplicationStrategy, FieldDeduplication,
        HashedFieldDeduplication,
    };
    pub use crate::errors::{StoreError, TrackerError, TrackerResult};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::reporting::{ReportSnapshot, TransactionReport};
    pub use crate::store::{InMemoryTrackerStore, TrackerStore, UnitOfWork};
    pub use crate::tracking::{FinishedStage, StageTransition, TransactionTracker};
    pub use crate::utils::{Clock, SystemClock, Timestamp};
}
