//! Lifecycle events emitted by the tracker.
//!
//! The tracker hands each event to the [`EventSink`] it was built with, after
//! the unit of work that produced it has committed. Sinks are for
//! observability only; the audit trail lives in the store's event table.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A new transaction was created.
pub const TRANSACTION_CREATED: &str = "transaction.created";
/// A payload matched an existing transaction.
pub const TRANSACTION_RESUMED: &str = "transaction.resumed";
/// A transaction reached a new state.
pub const TRANSACTION_STATE_CHANGED: &str = "transaction.state_changed";
/// A stage instance was registered.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage attempt failed transiently and the stage stays queued.
pub const STAGE_RETRY_SCHEDULED: &str = "stage.retry_scheduled";
/// A stage reached a terminal state.
pub const STAGE_FINISHED: &str = "stage.finished";
