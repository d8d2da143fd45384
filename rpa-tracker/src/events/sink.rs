//! Event sink trait and implementations.

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn, Level};

/// Trait for sinks that receive tracker lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stage.finished")
    /// * `data` - Optional event data
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Tries to emit an event without blocking.
    ///
    /// Must never fail; errors are logged and suppressed.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes tracker events to `tracing` under the `rpa_tracker::events`
/// target.
///
/// The transaction id, platform and stage carried in the event data are
/// lifted into their own fields; the full payload is attached as `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingEventSink {
    level: Level,
}

impl LoggingEventSink {
    /// Creates a sink that records every event at `level`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// The level events are recorded at.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    fn record(&self, event_type: &str, data: Option<&serde_json::Value>) {
        let field = |name: &str| {
            data.and_then(|d| d.get(name))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let transaction_id = field("transaction_id");
        let platform = field("platform");
        let stage = field("stage");

        match self.level {
            Level::ERROR => {
                error!(target: "rpa_tracker::events", event_type, %transaction_id, %platform, %stage, data = ?data, "Tracker event");
            }
            Level::WARN => {
                warn!(target: "rpa_tracker::events", event_type, %transaction_id, %platform, %stage, data = ?data, "Tracker event");
            }
            Level::INFO => {
                info!(target: "rpa_tracker::events", event_type, %transaction_id, %platform, %stage, data = ?data, "Tracker event");
            }
            Level::DEBUG => {
                debug!(target: "rpa_tracker::events", event_type, %transaction_id, %platform, %stage, data = ?data, "Tracker event");
            }
            _ => {
                trace!(target: "rpa_tracker::events", event_type, %transaction_id, %platform, %stage, data = ?data, "Tracker event");
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.record(event_type, data.as_ref());
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns the collected event types, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<serde_json::Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit("test", None).await;
        sink.try_emit("test", Some(serde_json::json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_logging_sink_records_at_its_level() {
        let sink = LoggingEventSink::new(Level::DEBUG);
        assert_eq!(sink.level(), Level::DEBUG);

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        sink.emit(
            "stage.finished",
            Some(serde_json::json!({"transaction_id": "t-1", "platform": "A", "stage": "default"})),
        )
        .await;
        sink.try_emit("stage.finished", Some(serde_json::json!({"attempt_count": 2})));
        sink.try_emit("transaction.created", None);
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("transaction.created", None).await;
        sink.try_emit("stage.started", Some(serde_json::json!({"platform": "A"})));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["transaction.created", "stage.started"]);
    }

    #[tokio::test]
    async fn test_collecting_sink_filter_and_clear() {
        let sink = CollectingEventSink::new();
        sink.emit("stage.started", None).await;
        sink.emit("stage.finished", None).await;
        sink.emit("transaction.state_changed", None).await;

        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.events_of_type("transaction.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
