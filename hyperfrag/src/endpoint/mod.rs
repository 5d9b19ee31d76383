//! Endpoint registration and request matching
//!
//! Two endpoint generations are served side by side during a deprecation
//! window. They share every line of dispatch logic and differ only in the
//! string constants carried by their [`EndpointProfile`].
//!
//! ```text
//! /wp-html/v1/{identifier}    current
//! /hxwp/v1/{identifier}       legacy
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which endpoint generation matched the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// Primary endpoint
    Current,
    /// Deprecated alias kept for older front ends
    Legacy,
}

impl CompatibilityMode {
    /// Lowercase name, as exposed to templates
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String constants for one endpoint generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointProfile {
    /// Root path segment and query variable name (e.g. `wp-html`)
    pub endpoint: String,

    /// Fixed version segment (e.g. `v1`)
    pub version: String,

    /// Extension appended to the sanitized template stem
    pub template_extension: String,

    /// Nonce action this generation's tokens are issued for
    pub nonce_action: String,

    /// Request parameter carrying the nonce
    pub nonce_param: String,

    /// Request header carrying the nonce
    pub nonce_header: String,

    /// Wrapper key of the out-of-band response payload
    pub response_key: String,

    /// Variable name the sanitized parameters are exposed under in templates
    pub params_var: String,
}

impl EndpointProfile {
    /// Profile of the primary endpoint
    #[must_use]
    pub fn current() -> Self {
        Self {
            endpoint: "wp-html".to_string(),
            version: "v1".to_string(),
            template_extension: ".hm.php".to_string(),
            nonce_action: "hyperpress_nonce".to_string(),
            nonce_param: "_token".to_string(),
            nonce_header: "X-Request-Nonce".to_string(),
            response_key: "hmResponse".to_string(),
            params_var: "hmvals".to_string(),
        }
    }

    /// Profile of the deprecated alias
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            endpoint: "hxwp".to_string(),
            version: "v1".to_string(),
            template_extension: ".htmx.php".to_string(),
            nonce_action: "hxwp_nonce".to_string(),
            nonce_param: "_wpnonce".to_string(),
            nonce_header: "X-WP-Nonce".to_string(),
            response_key: "hxwpResponse".to_string(),
            params_var: "hxvals".to_string(),
        }
    }

    /// Route prefix, e.g. `/wp-html/v1`
    #[must_use]
    pub fn route_prefix(&self) -> String {
        format!("/{}/{}", self.endpoint, self.version)
    }
}

/// A single rewrite rule known to the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Query variable the rule populates
    pub query_var: String,
    /// Literal route prefix
    pub prefix: String,
    /// Generation this rule belongs to
    pub mode: CompatibilityMode,
}

/// The host router's view of registered endpoints
///
/// Registration consults [`RouteTable::contains`] first, which makes it the
/// authority on whether a rule already exists.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Create an empty route table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a rule with this prefix is already registered
    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.rules.iter().any(|rule| rule.prefix == prefix)
    }

    /// Registered rules in registration order
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    fn insert(&mut self, rule: RouteRule) -> bool {
        if self.contains(&rule.prefix) {
            return false;
        }
        self.rules.push(rule);
        true
    }
}

/// Result of matching a request path against the registered endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMatch<'a> {
    /// Matched generation
    pub mode: CompatibilityMode,
    /// Constants of the matched generation
    pub profile: &'a EndpointProfile,
    /// Raw template identifier (everything after the version segment)
    pub identifier: String,
}

/// Registers the fragment endpoints and recognizes them on inbound paths
#[derive(Debug, Clone)]
pub struct EndpointRegistrar {
    current: EndpointProfile,
    legacy: EndpointProfile,
    legacy_enabled: bool,
    table: RouteTable,
}

impl EndpointRegistrar {
    /// Create a registrar for the given generations
    #[must_use]
    pub fn new(current: EndpointProfile, legacy: EndpointProfile) -> Self {
        Self {
            current,
            legacy,
            legacy_enabled: true,
            table: RouteTable::new(),
        }
    }

    /// Stop serving the legacy alias
    #[must_use]
    pub const fn without_legacy(mut self) -> Self {
        self.legacy_enabled = false;
        self
    }

    /// Register the primary and legacy endpoints
    ///
    /// Returns the number of rules added by this call. A second call adds
    /// nothing.
    pub fn register_endpoints(&mut self) -> usize {
        let mut added = 0;

        for (mode, profile) in self.profiles() {
            let rule = RouteRule {
                query_var: profile.endpoint.clone(),
                prefix: profile.route_prefix(),
                mode,
            };
            if self.table.insert(rule) {
                tracing::debug!(prefix = %profile.route_prefix(), %mode, "registered fragment endpoint");
                added += 1;
            }
        }

        added
    }

    /// Variable names the dispatcher watches for
    #[must_use]
    pub fn query_variable_names(&self) -> Vec<&str> {
        self.table
            .rules()
            .iter()
            .map(|rule| rule.query_var.as_str())
            .collect()
    }

    /// Registered route table
    #[must_use]
    pub const fn route_table(&self) -> &RouteTable {
        &self.table
    }

    /// Profile for a generation
    #[must_use]
    pub const fn profile(&self, mode: CompatibilityMode) -> &EndpointProfile {
        match mode {
            CompatibilityMode::Current => &self.current,
            CompatibilityMode::Legacy => &self.legacy,
        }
    }

    /// Every profile, current first; the legacy one only while enabled
    #[must_use]
    pub fn profiles(&self) -> Vec<(CompatibilityMode, EndpointProfile)> {
        let mut profiles = vec![(CompatibilityMode::Current, self.current.clone())];
        if self.legacy_enabled {
            profiles.push((CompatibilityMode::Legacy, self.legacy.clone()));
        }
        profiles
    }

    /// Match a request path against registered rules
    ///
    /// Expects `/{endpoint}/{version}/{identifier}`. A trailing slash is
    /// ignored. Paths without an identifier do not match.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<EndpointMatch<'_>> {
        self.table.rules().iter().find_map(|rule| {
            let rest = path.strip_prefix(rule.prefix.as_str())?.strip_prefix('/')?;
            let identifier = rest.strip_suffix('/').unwrap_or(rest);
            if identifier.is_empty() {
                return None;
            }
            Some(EndpointMatch {
                mode: rule.mode,
                profile: self.profile(rule.mode),
                identifier: identifier.to_string(),
            })
        })
    }
}

impl Default for EndpointRegistrar {
    fn default() -> Self {
        Self::new(EndpointProfile::current(), EndpointProfile::legacy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> EndpointRegistrar {
        let mut registrar = EndpointRegistrar::default();
        registrar.register_endpoints();
        registrar
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registrar = EndpointRegistrar::default();
        assert_eq!(registrar.register_endpoints(), 2);
        assert_eq!(registrar.register_endpoints(), 0);
        assert_eq!(registrar.route_table().rules().len(), 2);
    }

    #[test]
    fn test_query_variable_names() {
        let registrar = registered();
        assert_eq!(registrar.query_variable_names(), vec!["wp-html", "hxwp"]);
    }

    #[test]
    fn test_without_legacy_registers_only_current() {
        let mut registrar = EndpointRegistrar::default().without_legacy();
        assert_eq!(registrar.register_endpoints(), 1);
        assert!(registrar.match_path("/hxwp/v1/demo").is_none());
    }

    #[test]
    fn test_match_current_endpoint() {
        let registrar = registered();
        let matched = registrar.match_path("/wp-html/v1/datastar-demo").unwrap();
        assert_eq!(matched.mode, CompatibilityMode::Current);
        assert_eq!(matched.identifier, "datastar-demo");
        assert_eq!(matched.profile.template_extension, ".hm.php");
    }

    #[test]
    fn test_match_legacy_endpoint_with_namespace() {
        let registrar = registered();
        let matched = registrar.match_path("/hxwp/v1/ns:foo/bar/").unwrap();
        assert_eq!(matched.mode, CompatibilityMode::Legacy);
        assert_eq!(matched.identifier, "ns:foo/bar");
        assert_eq!(matched.profile.response_key, "hxwpResponse");
    }

    #[test]
    fn test_no_match() {
        let registrar = registered();
        assert!(registrar.match_path("/").is_none());
        assert!(registrar.match_path("/wp-html/v1").is_none());
        assert!(registrar.match_path("/wp-html/v1/").is_none());
        assert!(registrar.match_path("/wp-html/v2/demo").is_none());
        assert!(registrar.match_path("/wp-htmlx/v1/demo").is_none());
    }

    #[test]
    fn test_unregistered_registrar_matches_nothing() {
        let registrar = EndpointRegistrar::default();
        assert!(registrar.match_path("/wp-html/v1/demo").is_none());
    }
}
