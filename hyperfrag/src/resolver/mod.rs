//! Template identifier resolution
//!
//! Turns a requested identifier into a file on disk without ever leaving the
//! directory it was resolved against.
//!
//! # Identifier forms
//!
//! - `name` / `dir/name` — un-namespaced, tried against each default
//!   directory in order, first hit wins
//! - `ns:dir/name` — namespaced, resolved against the directory registered
//!   for `ns` only. An unknown namespace never falls back to the defaults.
//!
//! # Containment
//!
//! Every candidate is canonicalized (symlinks and relative components
//! resolved) and must remain a component-wise descendant of the canonical
//! base directory, so `/srv/foo-evil/x` is never accepted for base `/srv/foo`.
//!
//! # Example
//!
//! ```rust,no_run
//! use hyperfrag::resolver::{NamespaceRegistry, PathResolver};
//! use std::path::PathBuf;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut namespaces = NamespaceRegistry::new();
//! namespaces.register("acme", "/srv/acme/hypermedia")?;
//!
//! let resolver = PathResolver::new(namespaces, vec![PathBuf::from("/srv/theme/hypermedia")]);
//! let resolved = resolver.resolve("acme:cards/list", ".hm.php")?;
//! println!("{}", resolved.absolute_path.display());
//! # Ok(())
//! # }
//! ```

mod cache;
mod namespace;
pub mod sanitize;

pub use cache::ResolutionCache;
pub use namespace::NamespaceRegistry;

use crate::error::ResolveError;
use sanitize::{sanitize_file_name, sanitize_key};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Separator between namespace and relative path
pub const NAMESPACE_SEPARATOR: char = ':';

/// A parsed, not yet sanitized, template identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    /// Identifier as received
    pub raw_identifier: String,
    /// Namespace, when the identifier had a non-empty `ns:` prefix
    pub namespace: Option<String>,
    /// `/`-separated segments of the path part
    pub relative_segments: Vec<String>,
}

impl TemplateRequest {
    /// Split an identifier into namespace and path segments
    ///
    /// The identifier is split once on `:`. Only when both sides are
    /// non-empty is it namespaced; otherwise the whole identifier is the path.
    #[must_use]
    pub fn parse(raw_identifier: &str) -> Self {
        let (namespace, path) = match raw_identifier.split_once(NAMESPACE_SEPARATOR) {
            Some((ns, rest)) if !ns.is_empty() && !rest.is_empty() => (Some(ns.to_string()), rest),
            _ => (None, raw_identifier),
        };

        Self {
            raw_identifier: raw_identifier.to_string(),
            namespace,
            relative_segments: path.split('/').map(ToString::to_string).collect(),
        }
    }

    /// Sanitize the path segments
    ///
    /// Segments that are exactly `.` or `..` are dropped. Any other segment
    /// containing `..` rejects the whole identifier. Segments that sanitize to
    /// nothing are dropped; the last surviving one becomes the file stem and
    /// the ones before it are directories in the key charset.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidIdentifier`] on a traversal sequence or
    /// when nothing survives sanitization.
    pub fn sanitized_path(&self) -> Result<SanitizedPath, ResolveError> {
        let invalid = || ResolveError::InvalidIdentifier(self.raw_identifier.clone());

        let segments: Vec<&str> = self
            .relative_segments
            .iter()
            .map(String::as_str)
            .filter(|segment| !matches!(*segment, "." | ".."))
            .collect();

        if segments.iter().any(|segment| segment.contains("..")) {
            tracing::warn!(identifier = %self.raw_identifier, "traversal sequence in template identifier");
            return Err(invalid());
        }

        let stem_at = segments
            .iter()
            .rposition(|segment| !sanitize_file_name(segment).is_empty())
            .ok_or_else(invalid)?;
        let stem = sanitize_file_name(segments[stem_at]);

        let directories = segments[..stem_at]
            .iter()
            .map(|segment| sanitize_key(segment))
            .filter(|segment| !segment.is_empty())
            .collect();

        Ok(SanitizedPath { directories, stem })
    }
}

/// Sanitized relative path: directories plus file stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedPath {
    /// Directory segments, key charset only
    pub directories: Vec<String>,
    /// File stem, without extension
    pub stem: String,
}

impl SanitizedPath {
    /// Relative file path with `extension` appended to the stem
    #[must_use]
    pub fn to_relative(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.directories.iter().collect();
        path.push(format!("{}{extension}", self.stem));
        path
    }
}

/// A template file proven to live inside `base_dir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    /// Canonical path of the template file
    pub absolute_path: PathBuf,
    /// Canonical base directory the file was resolved against
    pub base_dir: PathBuf,
}

/// Resolves template identifiers against namespaces and default directories
#[derive(Debug, Clone)]
pub struct PathResolver {
    namespaces: Arc<NamespaceRegistry>,
    default_dirs: Vec<PathBuf>,
    cache: Option<Arc<ResolutionCache>>,
}

impl PathResolver {
    /// Create a resolver
    ///
    /// `default_dirs` are tried in order for un-namespaced identifiers.
    #[must_use]
    pub fn new(namespaces: NamespaceRegistry, default_dirs: Vec<PathBuf>) -> Self {
        Self {
            namespaces: Arc::new(namespaces),
            default_dirs,
            cache: None,
        }
    }

    /// Cache successful resolutions for the process lifetime
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Registered namespaces
    #[must_use]
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Default directories, in lookup order
    #[must_use]
    pub fn default_dirs(&self) -> &[PathBuf] {
        &self.default_dirs
    }

    /// Attached cache, if any
    #[must_use]
    pub fn cache(&self) -> Option<&ResolutionCache> {
        self.cache.as_deref()
    }

    /// Resolve an identifier to a template file
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the identifier is malformed, names an
    /// unknown namespace, or no contained file exists.
    pub fn resolve(
        &self,
        raw_identifier: &str,
        extension: &str,
    ) -> Result<ResolvedTemplate, ResolveError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(extension, raw_identifier) {
                if hit.absolute_path.is_file() {
                    return Ok(hit);
                }
                tracing::debug!(
                    identifier = raw_identifier,
                    path = %hit.absolute_path.display(),
                    "cached template disappeared"
                );
                cache.remove(extension, raw_identifier);
            }
        }

        let resolved = self.resolve_uncached(raw_identifier, extension)?;

        if let Some(cache) = &self.cache {
            cache.insert(extension, raw_identifier, resolved.clone());
        }

        Ok(resolved)
    }

    fn resolve_uncached(
        &self,
        raw_identifier: &str,
        extension: &str,
    ) -> Result<ResolvedTemplate, ResolveError> {
        if raw_identifier.trim().is_empty() {
            return Err(ResolveError::InvalidIdentifier(raw_identifier.to_string()));
        }

        let request = TemplateRequest::parse(raw_identifier);
        let relative = request.sanitized_path()?.to_relative(extension);

        match &request.namespace {
            Some(namespace) => {
                let key = sanitize_key(namespace);
                let base_dir = self
                    .namespaces
                    .get(&key)
                    .ok_or_else(|| ResolveError::UnknownNamespace(key.clone()))?;
                resolve_within(base_dir, &relative)
            }
            None => {
                let mut last_error = ResolveError::NotFound(raw_identifier.to_string());
                for base_dir in &self.default_dirs {
                    match resolve_within(base_dir, &relative) {
                        Ok(resolved) => return Ok(resolved),
                        Err(err) => last_error = err,
                    }
                }
                Err(last_error)
            }
        }
    }
}

/// Join `relative` onto `base_dir` and prove the result stays inside it
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] if the base directory or the file does
/// not exist, and [`ResolveError::Containment`] if the canonical file path is
/// not a descendant of the canonical base directory.
pub fn resolve_within(base_dir: &Path, relative: &Path) -> Result<ResolvedTemplate, ResolveError> {
    let not_found = || ResolveError::NotFound(relative.display().to_string());

    let canonical_base = base_dir.canonicalize().map_err(|_| not_found())?;
    let candidate = canonical_base.join(relative);
    let canonical = candidate.canonicalize().map_err(|_| not_found())?;

    if !canonical.starts_with(&canonical_base) {
        tracing::warn!(
            base = %canonical_base.display(),
            candidate = %canonical.display(),
            "template path escaped its base directory"
        );
        return Err(ResolveError::Containment(canonical));
    }

    if !canonical.is_file() {
        return Err(not_found());
    }

    Ok(ResolvedTemplate {
        absolute_path: canonical,
        base_dir: canonical_base,
    })
}
