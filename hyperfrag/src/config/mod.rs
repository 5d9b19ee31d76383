//! Configuration management
//!
//! Configuration is loaded from multiple sources, later sources winning:
//!
//! 1. Hardcoded defaults
//! 2. `/etc/hyperfrag/{service}/config.toml` (system config)
//! 3. `~/.config/hyperfrag/{service}/config.toml` (user config, XDG)
//! 4. `./config.toml` (development)
//! 5. Environment variables (`HYPERFRAG_` prefix, `__` for nesting)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//! request_timeout_ms = 5000
//!
//! [endpoints]
//! legacy_enabled = false
//!
//! [templates]
//! default_dirs = ["./theme/hypermedia", "./hypermedia"]
//! cache_enabled = true
//!
//! [templates.namespaces]
//! acme = "/srv/acme/hypermedia"
//!
//! [security]
//! nonce_secret = "change-me"
//! nonce_lifetime_secs = 86400
//! reveal_errors = false
//! ```
//!
//! `HYPERFRAG_SECURITY__NONCE_SECRET=...` overrides `security.nonce_secret`.

use crate::endpoint::{EndpointProfile, EndpointRegistrar};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "HYPERFRAG_";

/// Placeholder printed instead of secrets
pub const REDACTED: &str = "<redacted>";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Add `Vary` headers for htmx requests
    pub auto_vary: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            request_timeout_ms: 5000,
            auto_vary: true,
        }
    }
}

/// Endpoint generations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Serve the legacy alias
    pub legacy_enabled: bool,

    /// Primary endpoint constants
    pub current: EndpointProfile,

    /// Legacy endpoint constants
    pub legacy: EndpointProfile,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            legacy_enabled: true,
            current: EndpointProfile::current(),
            legacy: EndpointProfile::legacy(),
        }
    }
}

impl EndpointSettings {
    /// Registrar for the configured generations
    #[must_use]
    pub fn registrar(&self) -> EndpointRegistrar {
        let registrar = EndpointRegistrar::new(self.current.clone(), self.legacy.clone());
        if self.legacy_enabled {
            registrar
        } else {
            registrar.without_legacy()
        }
    }
}

/// Template lookup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Directories searched, in order, for un-namespaced identifiers
    pub default_dirs: Vec<PathBuf>,

    /// Cache identifier resolutions for the process lifetime
    pub cache_enabled: bool,

    /// Namespace key to base directory
    pub namespaces: BTreeMap<String, PathBuf>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            default_dirs: vec![PathBuf::from("./hypermedia")],
            cache_enabled: !cfg!(debug_assertions),
            namespaces: BTreeMap::new(),
        }
    }
}

/// Security settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Secret nonces are keyed with; a random one is generated per process
    /// when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce_secret: Option<String>,

    /// Nonce lifetime in seconds
    pub nonce_lifetime_secs: u64,

    /// Put failure messages in 403/404 response bodies
    pub reveal_errors: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            nonce_secret: None,
            nonce_lifetime_secs: 86400, // 24 hours
            reveal_errors: false,
        }
    }
}

/// Complete hyperfrag configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HyperfragConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Endpoint generations
    #[serde(default)]
    pub endpoints: EndpointSettings,

    /// Template lookup settings
    #[serde(default)]
    pub templates: TemplateSettings,

    /// Security settings
    #[serde(default)]
    pub security: SecuritySettings,
}

impl HyperfragConfig {
    /// Load configuration for a specific service
    ///
    /// # Errors
    ///
    /// Returns an error if the defaults cannot be serialized, a config file
    /// cannot be parsed, or a value has the wrong type.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use hyperfrag::config::HyperfragConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = HyperfragConfig::load_for_service("my-site")?;
    /// println!("listening on {}", config.server.bind_addr);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Self::defaults()?;

        let system_config = PathBuf::from("/etc/hyperfrag")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        let config = figment.merge(Self::env()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields the defaults (plus environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value has the wrong
    /// type.
    pub fn load_from(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let config = Self::defaults()?
            .merge(Toml::file(path.into()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    /// Recommended XDG config path for a service
    ///
    /// ```rust
    /// use hyperfrag::config::HyperfragConfig;
    ///
    /// let path = HyperfragConfig::recommended_path("my-site");
    /// assert!(path.ends_with("hyperfrag/my-site/config.toml"));
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("hyperfrag")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// Effective configuration as TOML, for display
    ///
    /// A configured nonce secret is replaced with [`REDACTED`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.security.nonce_secret.is_some() {
            shown.security.nonce_secret = Some(REDACTED.to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    fn defaults() -> anyhow::Result<Figment> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__").lowercase(true)
    }
}
