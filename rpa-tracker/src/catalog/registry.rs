//! Ordered registry of platforms.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{PlatformDefinition, DEFAULT_STAGE};
use crate::errors::{TrackerError, TrackerResult};

#[derive(Debug)]
struct CatalogEntry {
    seq: usize,
    definition: Arc<PlatformDefinition>,
}

/// Position of a stage in the pipeline: platform order, then the platform's
/// registration sequence, then the stage index within the platform.
pub type PipelinePosition = (i32, usize, usize);

/// Registry of platform definitions.
///
/// Registration is last-write-wins per platform code. Iteration follows the
/// pipeline order, ties broken by first registration.
#[derive(Debug, Default)]
pub struct PlatformCatalog {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

impl PlatformCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a platform, replacing any previous definition with the same code.
    ///
    /// Returns the replaced definition.
    pub fn register(&self, definition: PlatformDefinition) -> Option<Arc<PlatformDefinition>> {
        let mut entries = self.entries.write();
        let next_seq = entries.len();
        let code = definition.code.clone();
        let definition = Arc::new(definition);

        match entries.get_mut(&code) {
            Some(entry) => Some(std::mem::replace(&mut entry.definition, definition)),
            None => {
                entries.insert(
                    code,
                    CatalogEntry {
                        seq: next_seq,
                        definition,
                    },
                );
                None
            }
        }
    }

    /// Gets a platform by code.
    pub fn get(&self, code: &str) -> TrackerResult<Arc<PlatformDefinition>> {
        self.entries
            .read()
            .get(code)
            .map(|entry| Arc::clone(&entry.definition))
            .ok_or_else(|| TrackerError::unknown_platform(code))
    }

    /// Returns true if the platform is registered.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.entries.read().contains_key(code)
    }

    /// Returns all platforms in pipeline order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<PlatformDefinition>> {
        let entries = self.entries.read();
        let mut ordered: Vec<&CatalogEntry> = entries.values().collect();
        ordered.sort_by_key(|entry| (entry.definition.order, entry.seq));
        ordered
            .into_iter()
            .map(|entry| Arc::clone(&entry.definition))
            .collect()
    }

    /// Returns the number of registered platforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no platform is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Resolves a platform and stage reference.
    ///
    /// `None` selects [`DEFAULT_STAGE`]. Fails if either is not registered.
    pub fn resolve_stage(
        &self,
        platform: &str,
        stage: Option<&str>,
    ) -> TrackerResult<(Arc<PlatformDefinition>, String)> {
        let definition = self.get(platform)?;
        let stage = stage.unwrap_or(DEFAULT_STAGE);
        if !definition.has_stage(stage) {
            return Err(TrackerError::unknown_stage(platform, stage));
        }
        Ok((definition, stage.to_string()))
    }

    /// Returns the pipeline position of a stage, if registered.
    #[must_use]
    pub fn position(&self, platform: &str, stage: &str) -> Option<PipelinePosition> {
        let entries = self.entries.read();
        let entry = entries.get(platform)?;
        let index = entry.definition.stage_index(stage)?;
        Some((entry.definition.order, entry.seq, index))
    }
}

impl FromIterator<PlatformDefinition> for PlatformCatalog {
    fn from_iter<T: IntoIterator<Item = PlatformDefinition>>(iter: T) -> Self {
        let catalog = Self::new();
        for definition in iter {
            catalog.register(definition);
        }
        catalog
    }
}
