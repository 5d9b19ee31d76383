//! Application state
//!
//! Everything built at bootstrap and shared read-only by every request: the
//! configuration, the dispatcher (with its namespace registry and resolution
//! cache) and the nonce issuer.

use crate::config::HyperfragConfig;
use crate::dispatch::RequestDispatcher;
use crate::endpoint::CompatibilityMode;
use crate::error::HyperfragError;
use crate::nonce::{KeyedNonceVerifier, NonceIssuer, NonceValidator, NonceVerifier};
use crate::resolver::{NamespaceRegistry, PathResolver, ResolutionCache};
use crate::template::MiniJinjaEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared state for the fragment endpoint
///
/// # Example
///
/// ```rust,no_run
/// use hyperfrag::{config::HyperfragConfig, state::AppState};
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::from_config(HyperfragConfig::load_for_service("my-site")?)?;
/// let app = hyperfrag::server::router(state);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<HyperfragConfig>,
    dispatcher: Arc<RequestDispatcher>,
    nonces: Arc<KeyedNonceVerifier>,
}

impl AppState {
    /// Build state from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configured namespace is invalid or a relative
    /// directory cannot be made absolute.
    pub fn from_config(config: HyperfragConfig) -> Result<Self, HyperfragError> {
        Self::with_namespaces(config, NamespaceRegistry::new())
    }

    /// Build state from configuration plus namespaces registered in code
    ///
    /// Configured namespaces are registered after `namespaces`, so a
    /// configured key replaces a programmatic one.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured namespace is invalid or a relative
    /// directory cannot be made absolute.
    pub fn with_namespaces(
        config: HyperfragConfig,
        mut namespaces: NamespaceRegistry,
    ) -> Result<Self, HyperfragError> {
        for (name, dir) in &config.templates.namespaces {
            namespaces.register(name.clone(), absolute(dir)?)?;
        }

        let nonces = Arc::new(match &config.security.nonce_secret {
            Some(secret) => KeyedNonceVerifier::new(secret, config.security.nonce_lifetime_secs),
            None => {
                tracing::warn!("no nonce secret configured, tokens will not survive a restart");
                KeyedNonceVerifier::random(config.security.nonce_lifetime_secs)
            }
        });

        let registrar = config.endpoints.registrar();
        let profiles = registrar.profiles();
        let verifier: Arc<dyn NonceVerifier> = nonces.clone();
        let validator = NonceValidator::new(verifier, profiles.iter().map(|(_, profile)| profile));

        let mut resolver = PathResolver::new(namespaces, config.templates.default_dirs.clone());
        if config.templates.cache_enabled {
            resolver = resolver.with_cache(Arc::new(ResolutionCache::new()));
        }

        let issuer: Arc<dyn NonceIssuer> = nonces.clone();
        let engine = MiniJinjaEngine::new()
            .with_reveal_errors(config.security.reveal_errors)
            .with_nonce_issuer(issuer);
        let dispatcher = RequestDispatcher::new(registrar, validator, resolver, Arc::new(engine))
            .with_reveal_errors(config.security.reveal_errors);

        tracing::info!(
            endpoints = ?dispatcher.registrar().query_variable_names(),
            namespaces = ?dispatcher.resolver().namespaces().names(),
            default_dirs = ?dispatcher.resolver().default_dirs(),
            "fragment endpoint ready"
        );

        Ok(Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            nonces,
        })
    }

    /// Configuration reference
    #[must_use]
    pub fn config(&self) -> &HyperfragConfig {
        &self.config
    }

    /// Request dispatcher
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    /// Issue a nonce for an endpoint generation's action
    #[must_use]
    pub fn issue_nonce(&self, mode: CompatibilityMode) -> String {
        let action = &self.dispatcher.registrar().profile(mode).nonce_action;
        self.nonces.issue(action)
    }
}

fn absolute(dir: &Path) -> Result<PathBuf, HyperfragError> {
    std::path::absolute(dir).map_err(|err| {
        HyperfragError::Config(format!("cannot resolve directory {}: {err}", dir.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NamespaceError;

    fn config() -> HyperfragConfig {
        let mut config = HyperfragConfig::default();
        config.security.nonce_secret = Some("test-secret".to_string());
        config
    }

    #[test]
    fn test_from_config() {
        let state = AppState::from_config(config()).unwrap();
        assert_eq!(state.config().server.request_timeout_ms, 5000);
        assert_eq!(
            state.dispatcher().registrar().query_variable_names(),
            vec!["wp-html", "hxwp"]
        );
    }

    #[test]
    fn test_configured_namespaces_registered() {
        let mut config = config();
        config
            .templates
            .namespaces
            .insert("acme".to_string(), PathBuf::from("/srv/acme"));

        let state = AppState::from_config(config).unwrap();
        assert_eq!(
            state.dispatcher().resolver().namespaces().get("acme"),
            Some(Path::new("/srv/acme"))
        );
    }

    #[test]
    fn test_relative_namespace_made_absolute() {
        let mut config = config();
        config
            .templates
            .namespaces
            .insert("local".to_string(), PathBuf::from("local/templates"));

        let state = AppState::from_config(config).unwrap();
        let dir = state.dispatcher().resolver().namespaces().get("local").unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("local/templates"));
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let mut config = config();
        config
            .templates
            .namespaces
            .insert("Bad Name".to_string(), PathBuf::from("/srv"));

        let err = AppState::from_config(config).unwrap_err();
        assert!(matches!(
            err,
            HyperfragError::Namespace(NamespaceError::InvalidName(_))
        ));
    }

    #[test]
    fn test_configured_namespace_overrides_programmatic() {
        let mut programmatic = NamespaceRegistry::new();
        programmatic.register("acme", "/from/code").unwrap();

        let mut config = config();
        config
            .templates
            .namespaces
            .insert("acme".to_string(), PathBuf::from("/from/config"));

        let state = AppState::with_namespaces(config, programmatic).unwrap();
        assert_eq!(
            state.dispatcher().resolver().namespaces().get("acme"),
            Some(Path::new("/from/config"))
        );
    }

    #[test]
    fn test_issued_nonce_has_expected_shape() {
        let state = AppState::from_config(config()).unwrap();
        let token = state.issue_nonce(CompatibilityMode::Current);
        assert_eq!(token.len(), 20);
        assert_ne!(token, state.issue_nonce(CompatibilityMode::Legacy));
    }

    #[test]
    fn test_clone_shares_dispatcher() {
        let state = AppState::from_config(config()).unwrap();
        let cloned = state.clone();
        assert!(Arc::ptr_eq(state.dispatcher(), cloned.dispatcher()));
    }
}
