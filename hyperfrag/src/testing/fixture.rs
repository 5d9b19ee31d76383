//! Temporary template directories with matching state

use crate::config::HyperfragConfig;
use crate::endpoint::CompatibilityMode;
use crate::state::AppState;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Secret the fixture keys its nonces with
pub const TEST_SECRET: &str = "fixture-secret";

/// A default template directory and any number of namespace directories
pub struct FragmentFixture {
    defaults: TempDir,
    namespaces: Vec<(String, TempDir)>,
    reveal_errors: bool,
}

impl FragmentFixture {
    /// Empty fixture with one default directory
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created
    #[must_use]
    pub fn new() -> Self {
        Self {
            defaults: TempDir::new().expect("create default template dir"),
            namespaces: Vec::new(),
            reveal_errors: false,
        }
    }

    /// Register a namespace backed by a fresh directory
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created
    #[must_use]
    pub fn with_namespace(mut self, name: &str) -> Self {
        let dir = TempDir::new().expect("create namespace dir");
        self.namespaces.push((name.to_string(), dir));
        self
    }

    /// Reveal failure messages in response bodies
    #[must_use]
    pub const fn with_reveal_errors(mut self) -> Self {
        self.reveal_errors = true;
        self
    }

    /// Write a template into the default directory
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written
    pub fn write(&self, relative: &str, body: &str) -> PathBuf {
        write_file(self.defaults.path(), relative, body)
    }

    /// Write a template into a namespace directory
    ///
    /// # Panics
    ///
    /// Panics if the namespace was not added or the file cannot be written
    pub fn write_in(&self, namespace: &str, relative: &str, body: &str) -> PathBuf {
        let dir = self
            .namespaces
            .iter()
            .find(|(name, _)| name == namespace)
            .map(|(_, dir)| dir.path())
            .expect("namespace not added to fixture");
        write_file(dir, relative, body)
    }

    /// Default template directory
    #[must_use]
    pub fn default_dir(&self) -> &Path {
        self.defaults.path()
    }

    /// Configuration pointing at the fixture directories
    #[must_use]
    pub fn config(&self) -> HyperfragConfig {
        let mut config = HyperfragConfig::default();
        config.templates.default_dirs = vec![self.defaults.path().to_path_buf()];
        config.templates.cache_enabled = false;
        for (name, dir) in &self.namespaces {
            config
                .templates
                .namespaces
                .insert(name.clone(), dir.path().to_path_buf());
        }
        config.security.nonce_secret = Some(TEST_SECRET.to_string());
        config.security.reveal_errors = self.reveal_errors;
        config
    }

    /// State built from [`Self::config`]
    ///
    /// # Panics
    ///
    /// Panics if the state cannot be built
    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::from_config(self.config()).expect("build fixture state")
    }

    /// A valid nonce for a generation
    #[must_use]
    pub fn nonce(&self, mode: CompatibilityMode) -> String {
        self.state().issue_nonce(mode)
    }
}

impl Default for FragmentFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(dir: &Path, relative: &str, body: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create template parent dir");
    }
    fs::write(&path, body).expect("write template");
    path
}
