//! Field-based fingerprinting strategies.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::DeduplicationStrategy;
use crate::errors::{TrackerError, TrackerResult};

/// Default separator between joined field values.
pub const DEFAULT_SEPARATOR: &str = "|";

/// Fingerprints a payload by joining the values of configured fields.
///
/// Field names may use dots to reach into nested objects
/// (`"cliente.documento"`). Strings are used verbatim, other scalars by their
/// JSON text. A missing or null field is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeduplication {
    fields: Vec<String>,
    separator: String,
    version: u32,
}

impl FieldDeduplication {
    /// Creates a strategy over the given fields.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            separator: DEFAULT_SEPARATOR.to_string(),
            version: 1,
        }
    }

    /// Sets the separator.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Sets the strategy version.
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns the configured fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Joins the field values of `payload`.
    pub fn joined_key(&self, payload: &Value) -> TrackerResult<String> {
        let parts = self
            .fields
            .iter()
            .map(|field| field_text(payload, field))
            .collect::<TrackerResult<Vec<_>>>()?;
        Ok(parts.join(&self.separator))
    }
}

impl DeduplicationStrategy for FieldDeduplication {
    fn version(&self) -> u32 {
        self.version
    }

    fn fingerprint(&self, payload: &Value) -> TrackerResult<String> {
        self.joined_key(payload)
    }
}

/// Like [`FieldDeduplication`], but stores a fixed-size SHA-256 digest of the
/// joined key instead of the key itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedFieldDeduplication {
    inner: FieldDeduplication,
}

impl HashedFieldDeduplication {
    /// Creates a hashed strategy over the given fields.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: FieldDeduplication::new(fields),
        }
    }

    /// Wraps an existing field strategy.
    #[must_use]
    pub const fn from_fields(inner: FieldDeduplication) -> Self {
        Self { inner }
    }
}

impl DeduplicationStrategy for HashedFieldDeduplication {
    fn version(&self) -> u32 {
        self.inner.version
    }

    fn fingerprint(&self, payload: &Value) -> TrackerResult<String> {
        let joined = self.inner.joined_key(payload)?;
        Ok(hash_key(&joined))
    }
}

/// Hashes a joined key into a `fp:`-prefixed hex digest.
#[must_use]
pub fn hash_key(joined: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let result = hasher.finalize();
    format!("fp:{}", hex::encode(&result[..16]))
}

fn field_text(payload: &Value, field: &str) -> TrackerResult<String> {
    let value = field
        .split('.')
        .try_fold(payload, |current, segment| current.get(segment))
        .ok_or_else(|| TrackerError::missing_field(field))?;

    match value {
        Value::Null => Err(TrackerError::missing_field(field)),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Ok(serde_json::to_string(other)?),
    }
}
