//! Effective configuration command

use super::ConfigSource;
use anyhow::Result;
use console::style;
use hyperfrag::config::HyperfragConfig;

/// Print the merged configuration or where to put one
pub struct ConfigCommand {
    source: ConfigSource,
    path_only: bool,
}

impl ConfigCommand {
    /// Create a new command instance
    pub const fn new(source: ConfigSource, path_only: bool) -> Self {
        Self { source, path_only }
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        if self.path_only {
            println!(
                "{}",
                HyperfragConfig::recommended_path(self.source.service()).display()
            );
            return Ok(());
        }

        println!("{}", style("# effective configuration").dim());
        print!("{}", self.render()?);
        Ok(())
    }

    /// Effective configuration with secrets redacted
    fn render(&self) -> Result<String> {
        self.source.load()?.to_toml()
    }
}
