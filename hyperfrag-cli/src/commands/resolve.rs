//! Template resolution command

use super::ConfigSource;
use anyhow::{Context, Result};
use console::style;
use hyperfrag::{endpoint::CompatibilityMode, state::AppState};

/// Print the file an identifier would be served from
pub struct ResolveCommand {
    source: ConfigSource,
    identifier: String,
    legacy: bool,
}

impl ResolveCommand {
    /// Create a new command instance
    pub const fn new(source: ConfigSource, identifier: String, legacy: bool) -> Self {
        Self {
            source,
            identifier,
            legacy,
        }
    }

    const fn mode(&self) -> CompatibilityMode {
        if self.legacy {
            CompatibilityMode::Legacy
        } else {
            CompatibilityMode::Current
        }
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        let state = AppState::from_config(self.source.load()?)
            .context("Failed to build fragment endpoint")?;
        let dispatcher = state.dispatcher();
        let extension = &dispatcher.registrar().profile(self.mode()).template_extension;

        match dispatcher.resolver().resolve(&self.identifier, extension) {
            Ok(resolved) => {
                println!("{}", resolved.absolute_path.display());
                println!(
                    "  {} {}",
                    style("base").dim(),
                    style(resolved.base_dir.display()).cyan()
                );
                Ok(())
            }
            Err(err) => {
                eprintln!("{} {err}", style("✗").red().bold());
                Err(err).with_context(|| format!("Cannot resolve '{}'", self.identifier))
            }
        }
    }
}
