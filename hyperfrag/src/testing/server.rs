//! Test server utilities using axum-test

use crate::state::AppState;
use axum::Router;

/// Test server wrapper for endpoint tests
pub struct TestServer {
    inner: axum_test::TestServer,
}

impl TestServer {
    /// Create a test server from an Axum router
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be started
    pub fn new(app: Router) -> anyhow::Result<Self> {
        let inner = axum_test::TestServer::new(app)?;
        Ok(Self { inner })
    }

    /// Create a test server serving the fragment router for `state`
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be started
    pub fn for_state(state: AppState) -> anyhow::Result<Self> {
        Self::new(crate::server::router(state))
    }

    /// Make a GET request to the server
    pub fn get(&self, path: &str) -> axum_test::TestRequest {
        self.inner.get(path)
    }

    /// Make a POST request to the server
    pub fn post(&self, path: &str) -> axum_test::TestRequest {
        self.inner.post(path)
    }

    /// Get the inner `axum_test::TestServer` for advanced usage
    #[must_use]
    pub fn inner(&self) -> &axum_test::TestServer {
        &self.inner
    }
}
