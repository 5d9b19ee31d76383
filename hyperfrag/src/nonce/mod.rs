//! Anti-forgery nonce validation
//!
//! Nonces are issued by the host. This module only decides whether a request
//! carries one that the host accepts, for either the current or the legacy
//! action name. Validation is required for state-changing requests only.
//!
//! # Token sources
//!
//! 1. Request parameter (`_token`, or the legacy `_wpnonce`)
//! 2. Request header (`X-Request-Nonce`, or the legacy `X-WP-Nonce`), consulted
//!    only when no parameter carries a token

use crate::endpoint::EndpointProfile;
use crate::params::RawParams;
use axum::http::{HeaderMap, Method};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Host capability that verifies a token for one action name
#[cfg_attr(test, mockall::automock)]
pub trait NonceVerifier: Send + Sync {
    /// Whether `token` was issued for `action` and is still valid
    fn verify(&self, token: &str, action: &str) -> bool;
}

/// Mints tokens that a matching [`NonceVerifier`] accepts
///
/// Templates use it to embed a token in follow-up requests.
pub trait NonceIssuer: Send + Sync + std::fmt::Debug {
    /// Token for `action`, valid as of now
    fn issue(&self, action: &str) -> String;
}

/// Keyed-digest nonce provider
///
/// A token is the first 20 hex characters of
/// `SHA-256(secret | tick | action)`, where a tick is half the configured
/// lifetime. Tokens from the current and the previous tick are accepted.
#[derive(Clone)]
pub struct KeyedNonceVerifier {
    secret: Arc<[u8]>,
    lifetime_secs: i64,
}

impl std::fmt::Debug for KeyedNonceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedNonceVerifier")
            .field("secret", &"<redacted>")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

const TOKEN_LEN: usize = 20;

impl KeyedNonceVerifier {
    /// Create a verifier from a shared secret
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, lifetime_secs: u64) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            lifetime_secs: i64::try_from(lifetime_secs.max(2)).unwrap_or(i64::MAX),
        }
    }

    /// Create a verifier with a random per-process secret
    ///
    /// Tokens issued by one process are rejected by every other process.
    #[must_use]
    pub fn random(lifetime_secs: u64) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret, lifetime_secs)
    }

    /// Issue a token for `action` valid as of now
    #[must_use]
    pub fn issue(&self, action: &str) -> String {
        self.issue_at(action, chrono::Utc::now().timestamp())
    }

    /// Issue a token for `action` as of `unix_secs`
    #[must_use]
    pub fn issue_at(&self, action: &str, unix_secs: i64) -> String {
        self.token_for_tick(action, self.tick(unix_secs))
    }

    /// Verify a token against `action` as of `unix_secs`
    #[must_use]
    pub fn verify_at(&self, token: &str, action: &str, unix_secs: i64) -> bool {
        if token.is_empty() {
            return false;
        }
        let tick = self.tick(unix_secs);
        [tick, tick - 1]
            .iter()
            .any(|&t| constant_time_eq(token.as_bytes(), self.token_for_tick(action, t).as_bytes()))
    }

    fn tick(&self, unix_secs: i64) -> i64 {
        let half = self.lifetime_secs / 2;
        unix_secs.div_euclid(half) + 1
    }

    fn token_for_tick(&self, action: &str, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b"|");
        hasher.update(tick.to_be_bytes());
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        let mut token = hex::encode(hasher.finalize());
        token.truncate(TOKEN_LEN);
        token
    }
}

impl NonceVerifier for KeyedNonceVerifier {
    fn verify(&self, token: &str, action: &str) -> bool {
        self.verify_at(token, action, chrono::Utc::now().timestamp())
    }
}

impl NonceIssuer for KeyedNonceVerifier {
    fn issue(&self, action: &str) -> String {
        self.issue_at(action, chrono::Utc::now().timestamp())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check if HTTP method requires a nonce (i.e. may change state)
#[must_use]
pub const fn requires_nonce(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Validates request nonces against the current and legacy action names
#[derive(Clone)]
pub struct NonceValidator {
    verifier: Arc<dyn NonceVerifier>,
    param_names: Vec<String>,
    header_names: Vec<String>,
    actions: Vec<String>,
}

impl std::fmt::Debug for NonceValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceValidator")
            .field("verifier", &"dyn NonceVerifier")
            .field("param_names", &self.param_names)
            .field("header_names", &self.header_names)
            .field("actions", &self.actions)
            .finish()
    }
}

impl NonceValidator {
    /// Build a validator that accepts tokens of any of the given profiles
    #[must_use]
    pub fn new<'a>(
        verifier: Arc<dyn NonceVerifier>,
        profiles: impl IntoIterator<Item = &'a EndpointProfile>,
    ) -> Self {
        let mut param_names = Vec::new();
        let mut header_names = Vec::new();
        let mut actions = Vec::new();

        for profile in profiles {
            push_unique(&mut param_names, &profile.nonce_param);
            push_unique(&mut header_names, &profile.nonce_header);
            push_unique(&mut actions, &profile.nonce_action);
        }

        Self {
            verifier,
            param_names,
            header_names,
            actions,
        }
    }

    /// Parameter names that carry a token
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Action names a token may have been issued for
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Pull the token out of a request
    ///
    /// Parameters win over headers; a header is only consulted when no
    /// parameter carries a token.
    #[must_use]
    pub fn extract_token(&self, params: &RawParams, headers: &HeaderMap) -> Option<String> {
        let from_param = self.param_names.iter().find_map(|name| {
            params
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, value)| value.first())
                .filter(|token| !token.is_empty())
        });

        if let Some(token) = from_param {
            return Some(token.to_string());
        }

        self.header_names.iter().find_map(|name| {
            headers
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(ToString::to_string)
        })
    }

    /// Whether `token` is valid for any of `expected_actions`
    ///
    /// Never fails: a missing or empty token is simply invalid.
    #[must_use]
    pub fn is_valid<S: AsRef<str>>(&self, token: Option<&str>, expected_actions: &[S]) -> bool {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return false;
        };

        expected_actions
            .iter()
            .any(|action| self.verifier.verify(token, action.as_ref()))
    }

    /// Validate a request against every configured action
    #[must_use]
    pub fn validate_request(&self, params: &RawParams, headers: &HeaderMap) -> bool {
        let token = self.extract_token(params, headers);
        self.is_valid(token.as_deref(), &self.actions)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}
