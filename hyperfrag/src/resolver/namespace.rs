//! Template namespace registry
//!
//! Third parties contribute template directories under their own namespace,
//! addressed as `namespace:relative/path`. The registry is filled during
//! bootstrap and then shared read-only (`Arc<NamespaceRegistry>`) by every
//! request.

use super::sanitize::sanitize_key;
use crate::error::NamespaceError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Mapping from namespace key to absolute base directory
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    namespaces: HashMap<String, PathBuf>,
}

impl NamespaceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace
    ///
    /// The last registration for a key wins. The replaced directory, if any,
    /// is returned so callers can tell an overwrite happened.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError`] if the name is not already in the key
    /// charset (lowercase letters, digits, `_`, `-`) or the directory is not
    /// absolute.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Option<PathBuf>, NamespaceError> {
        let name = name.into();
        let base_dir = base_dir.into();

        if name.is_empty() || sanitize_key(&name) != name {
            return Err(NamespaceError::InvalidName(name));
        }

        if !base_dir.is_absolute() {
            return Err(NamespaceError::RelativeBaseDir {
                name,
                path: base_dir,
            });
        }

        let previous = self.namespaces.insert(name.clone(), base_dir);
        if let Some(previous) = &previous {
            tracing::warn!(
                namespace = %name,
                replaced = %previous.display(),
                "template namespace re-registered, last registration wins"
            );
        } else {
            tracing::debug!(namespace = %name, "registered template namespace");
        }

        Ok(previous)
    }

    /// Base directory of a namespace
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.namespaces.get(name).map(PathBuf::as_path)
    }

    /// Whether a namespace is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Number of registered namespaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Whether no namespace is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Registered namespace names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
