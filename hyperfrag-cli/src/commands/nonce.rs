//! Nonce issuing command

use super::ConfigSource;
use anyhow::{bail, Context, Result};
use hyperfrag::{endpoint::CompatibilityMode, state::AppState};

/// Issue a nonce for the current or legacy action
pub struct NonceCommand {
    source: ConfigSource,
    legacy: bool,
}

impl NonceCommand {
    /// Create a new command instance
    pub const fn new(source: ConfigSource, legacy: bool) -> Self {
        Self { source, legacy }
    }

    /// Execute the command, failing when no secret is configured
    pub fn execute(&self) -> Result<()> {
        let config = self.source.load()?;
        if config.security.nonce_secret.is_none() {
            bail!(
                "No nonce secret configured; set security.nonce_secret or HYPERFRAG_SECURITY__NONCE_SECRET"
            );
        }

        let mode = if self.legacy {
            CompatibilityMode::Legacy
        } else {
            CompatibilityMode::Current
        };

        let state = AppState::from_config(config).context("Failed to build fragment endpoint")?;
        println!("{}", state.issue_nonce(mode));
        Ok(())
    }
}
