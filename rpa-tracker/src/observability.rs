//! Process-wide tracing setup.
//!
//! The library only emits `tracing` events; binaries and tests call
//! [`init_tracing`] once to install a subscriber.

use tracing::Subscriber;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Builds a subscriber with plain or JSON output without installing it.
#[must_use]
pub fn build_subscriber(config: &LoggingConfig) -> Box<dyn Subscriber + Send + Sync> {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    if config.json {
        Box::new(registry.with(fmt::layer().json().with_target(true)))
    } else {
        Box::new(registry.with(fmt::layer().with_target(false)))
    }
}

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already installed, which callers may
/// ignore.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
    build_subscriber(config).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_is_scoped_to_the_closure() {
        for json in [false, true] {
            let config = LoggingConfig {
                level: "debug".to_string(),
                json,
                events: None,
            };
            let from_config = std::env::var_os("RUST_LOG").is_none();
            let subscriber = build_subscriber(&config);
            tracing::subscriber::with_default(subscriber, || {
                if from_config {
                    assert!(tracing::enabled!(tracing::Level::DEBUG));
                    assert!(!tracing::enabled!(tracing::Level::TRACE));
                }
                tracing::debug!(component = "observability", json, "scoped subscriber");
            });
        }
    }

    #[test]
    fn test_env_filter_falls_back_to_config_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), "warn");
    }
}
