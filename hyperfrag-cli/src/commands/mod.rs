//! CLI command implementations

pub mod config;
pub mod nonce;
pub mod resolve;
pub mod serve;

pub use config::ConfigCommand;
pub use nonce::NonceCommand;
pub use resolve::ResolveCommand;
pub use serve::ServeCommand;

use anyhow::{Context, Result};
use hyperfrag::config::HyperfragConfig;
use std::path::PathBuf;

/// Where configuration comes from
#[derive(Debug, Clone)]
pub struct ConfigSource {
    service: String,
    file: Option<PathBuf>,
}

impl ConfigSource {
    /// Standard locations for `service`, or `file` when given
    pub const fn new(service: String, file: Option<PathBuf>) -> Self {
        Self { service, file }
    }

    /// Service name
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Load the effective configuration
    pub fn load(&self) -> Result<HyperfragConfig> {
        match &self.file {
            Some(file) => HyperfragConfig::load_from(file)
                .with_context(|| format!("Failed to load configuration from {}", file.display())),
            None => HyperfragConfig::load_for_service(&self.service)
                .with_context(|| format!("Failed to load configuration for '{}'", self.service)),
        }
    }
}
