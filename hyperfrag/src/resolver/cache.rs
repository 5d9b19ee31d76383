//! Identifier → resolved template cache
//!
//! Only successful resolutions are stored, so a template added after a miss
//! is picked up on the next request. The resolver drops an entry whose file
//! has disappeared; otherwise entries live until [`ResolutionCache::clear`].

use super::ResolvedTemplate;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Thread-safe resolution cache keyed by extension and raw identifier
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<(String, String), ResolvedTemplate>>,
}

impl ResolutionCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolution for an identifier
    #[must_use]
    pub fn get(&self, extension: &str, identifier: &str) -> Option<ResolvedTemplate> {
        self.entries
            .read()
            .get(&(extension.to_string(), identifier.to_string()))
            .cloned()
    }

    /// Store a successful resolution
    pub fn insert(&self, extension: &str, identifier: &str, resolved: ResolvedTemplate) {
        self.entries
            .write()
            .insert((extension.to_string(), identifier.to_string()), resolved);
    }

    /// Drop one entry, returning it if present
    pub fn remove(&self, extension: &str, identifier: &str) -> Option<ResolvedTemplate> {
        self.entries
            .write()
            .remove(&(extension.to_string(), identifier.to_string()))
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::debug!("template resolution cache cleared");
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
