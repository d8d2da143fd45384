//! JSON configuration for platforms, deduplication and logging.
//!
//! ```json
//! {
//!   "platforms": [
//!     {"code": "A", "max_attempts": 1, "order": 1},
//!     {"code": "B", "stages": ["procesar", "confirmar"], "max_attempts": 2, "order": 2}
//!   ],
//!   "deduplication": [
//!     {"process_code": "CANC_PROC", "fields": ["requerimiento"]}
//!   ],
//!   "logging": {"level": "debug", "json": true, "events": "info"}
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::catalog::{PlatformCatalog, PlatformDefinition, RetryPolicy};
use crate::dedup::{
    DeduplicationRegistry, DeduplicationStrategy, FieldDeduplication, HashedFieldDeduplication,
    DEFAULT_SEPARATOR,
};
use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON for the schema.
    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but is inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// One platform entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform code.
    pub code: String,
    /// Ordered stage names; empty means the default stage.
    #[serde(default)]
    pub stages: Vec<String>,
    /// Attempt cap; absent or zero means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Pipeline order.
    #[serde(default)]
    pub order: i32,
}

impl PlatformConfig {
    /// Converts into a catalog definition.
    #[must_use]
    pub fn to_definition(&self) -> PlatformDefinition {
        PlatformDefinition::new(&self.code)
            .with_stages(self.stages.iter().cloned())
            .with_retry_policy(RetryPolicy {
                max_attempts: self.max_attempts,
            })
            .with_order(self.order)
    }
}

/// One deduplication entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Process code the strategy serves.
    pub process_code: String,
    /// Payload fields forming the fingerprint.
    pub fields: Vec<String>,
    /// Separator between field values.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Store a SHA-256 digest instead of the joined values.
    #[serde(default)]
    pub hashed: bool,
    /// Strategy version recorded with each mapping.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_version() -> u32 {
    1
}

impl DeduplicationConfig {
    /// Builds the configured strategy.
    #[must_use]
    pub fn to_strategy(&self) -> Arc<dyn DeduplicationStrategy> {
        let fields = FieldDeduplication::new(self.fields.iter().cloned())
            .with_separator(&self.separator)
            .with_version(self.version);
        if self.hashed {
            Arc::new(HashedFieldDeduplication::from_fields(fields))
        } else {
            Arc::new(fields)
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of plain text.
    #[serde(default)]
    pub json: bool,
    /// Level at which tracker events are logged. Absent keeps them silent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            events: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the event sink the tracker reports lifecycle events to.
    pub fn event_sink(&self) -> Result<Arc<dyn EventSink>, ConfigError> {
        match &self.events {
            None => Ok(Arc::new(NoOpEventSink)),
            Some(level) => {
                let level = level.parse::<Level>().map_err(|_| {
                    ConfigError::Invalid(format!("unknown event log level '{level}'"))
                })?;
                Ok(Arc::new(LoggingEventSink::new(level)))
            }
        }
    }
}

/// Top-level tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Platforms of the pipeline.
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
    /// Deduplication strategy per process code.
    #[serde(default)]
    pub deduplication: Vec<DeduplicationConfig>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TrackerConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    /// Checks codes and fields for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for platform in &self.platforms {
            if platform.code.trim().is_empty() {
                return Err(ConfigError::Invalid("platform code is empty".to_string()));
            }
            if !seen.insert(platform.code.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate platform code '{}'",
                    platform.code
                )));
            }
            let mut stages = HashSet::new();
            for stage in &platform.stages {
                if stage.trim().is_empty() || !stages.insert(stage.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "platform '{}' has an empty or repeated stage name",
                        platform.code
                    )));
                }
            }
        }

        self.logging.event_sink()?;

        for dedup in &self.deduplication {
            if dedup.process_code.trim().is_empty() {
                return Err(ConfigError::Invalid("process code is empty".to_string()));
            }
            if dedup.fields.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "process '{}' has no fingerprint fields",
                    dedup.process_code
                )));
            }
        }
        Ok(())
    }

    /// Builds the platform catalog.
    #[must_use]
    pub fn build_catalog(&self) -> PlatformCatalog {
        self.platforms.iter().map(PlatformConfig::to_definition).collect()
    }

    /// Builds the deduplication registry.
    #[must_use]
    pub fn build_dedup_registry(&self) -> DeduplicationRegistry {
        let registry = DeduplicationRegistry::new();
        for dedup in &self.deduplication {
            registry.register(&dedup.process_code, dedup.to_strategy());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const DOCUMENT: &str = r#"{
        "platforms": [
            {"code": "A", "max_attempts": 1, "order": 1},
            {"code": "B", "stages": ["procesar", "confirmar"], "max_attempts": 2, "order": 2},
            {"code": "C", "order": 3}
        ],
        "deduplication": [
            {"process_code": "CANC_PROC", "fields": ["requerimiento"]},
            {"process_code": "ALTA_PROC", "fields": ["documento", "producto"], "hashed": true, "version": 2}
        ],
        "logging": {"level": "debug", "events": "info"}
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = TrackerConfig::from_json_str(DOCUMENT).unwrap();
        assert_eq!(config.platforms.len(), 3);
        assert_eq!(config.platforms[2].max_attempts, None);
        assert_eq!(config.deduplication[0].separator, "|");
        assert!(!config.deduplication[0].hashed);
        assert_eq!(config.deduplication[0].version, 1);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json);
        assert_eq!(config.logging.events.as_deref(), Some("info"));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TrackerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_build_catalog() {
        let catalog = TrackerConfig::from_json_str(DOCUMENT).unwrap().build_catalog();
        let codes: Vec<String> = catalog.all().iter().map(|p| p.code.clone()).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert_eq!(catalog.get("B").unwrap().stage_names(), vec!["procesar", "confirmar"]);
        assert!(catalog.get("C").unwrap().retry_policy.is_unlimited());
    }

    #[test]
    fn test_build_dedup_registry() {
        let registry = TrackerConfig::from_json_str(DOCUMENT)
            .unwrap()
            .build_dedup_registry();
        assert_eq!(registry.process_codes(), vec!["ALTA_PROC", "CANC_PROC"]);

        let payload = serde_json::json!({"documento": "1", "producto": "X", "requerimiento": "FE-1"});
        let plain = registry.get("CANC_PROC").unwrap();
        assert_eq!(plain.fingerprint(&payload).unwrap(), "FE-1");

        let hashed = registry.get("ALTA_PROC").unwrap();
        assert!(hashed.fingerprint(&payload).unwrap().starts_with("fp:"));
        assert_eq!(hashed.version(), 2);
    }

    #[test]
    fn test_validation_errors() {
        let duplicate = r#"{"platforms": [{"code": "A"}, {"code": "A"}]}"#;
        assert!(matches!(
            TrackerConfig::from_json_str(duplicate),
            Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")
        ));

        let no_fields = r#"{"deduplication": [{"process_code": "P", "fields": []}]}"#;
        assert!(matches!(
            TrackerConfig::from_json_str(no_fields),
            Err(ConfigError::Invalid(_))
        ));

        let repeated_stage = r#"{"platforms": [{"code": "A", "stages": ["x", "x"]}]}"#;
        assert!(matches!(
            TrackerConfig::from_json_str(repeated_stage),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            TrackerConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_event_sink_from_logging_config() {
        let config = TrackerConfig::from_json_str(DOCUMENT).unwrap();
        let tracker = crate::tracking::TransactionTracker::new(
            Arc::new(crate::store::InMemoryTrackerStore::new()),
            Arc::new(config.build_catalog()),
            Arc::new(config.build_dedup_registry()),
        )
        .with_event_sink(config.logging.event_sink().unwrap());

        let payload = serde_json::json!({"requerimiento": "FE-9"});
        let (id, is_new) = tracker.start_or_resume("CANC_PROC", &payload).await.unwrap();
        assert!(is_new);
        assert_eq!(tracker.start_all_stages(id).await.unwrap(), 4);

        assert!(LoggingConfig::default().event_sink().is_ok());
        let noisy = r#"{"logging": {"events": "loud"}}"#;
        assert!(matches!(
            TrackerConfig::from_json_str(noisy),
            Err(ConfigError::Invalid(msg)) if msg.contains("loud")
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();

        let config = TrackerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.deduplication.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            TrackerConfig::from_path(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
