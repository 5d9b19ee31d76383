//! hyperfrag CLI tool

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ConfigCommand, ConfigSource, NonceCommand, ResolveCommand, ServeCommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hyperfrag")]
#[command(version)]
#[command(about = "Serve and inspect hypermedia fragment endpoints", long_about = None)]
struct Cli {
    /// Service name used to locate configuration files
    #[arg(long, global = true, default_value = "hyperfrag")]
    service: String,

    /// Load configuration from this file instead of the standard locations
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fragment endpoint
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Show which file an identifier resolves to
    Resolve {
        /// Template identifier, e.g. `cards/list` or `acme:cards/list`
        identifier: String,
        /// Use the legacy endpoint's template extension
        #[arg(long)]
        legacy: bool,
    },
    /// Issue a nonce with the configured secret
    Nonce {
        /// Issue for the legacy action instead of the current one
        #[arg(long)]
        legacy: bool,
    },
    /// Print the effective configuration
    Config {
        /// Print the recommended user config path instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = ConfigSource::new(cli.service, cli.config);

    match cli.command {
        Commands::Serve { bind } => {
            ServeCommand::new(source, bind).execute().await?;
        }
        Commands::Resolve { identifier, legacy } => {
            ResolveCommand::new(source, identifier, legacy).execute()?;
        }
        Commands::Nonce { legacy } => {
            NonceCommand::new(source, legacy).execute()?;
        }
        Commands::Config { path } => {
            ConfigCommand::new(source, path).execute()?;
        }
    }

    Ok(())
}
