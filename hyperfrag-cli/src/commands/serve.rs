//! Fragment server command

use super::ConfigSource;
use anyhow::{Context, Result};
use console::style;
use hyperfrag::{observability, server, state::AppState};

/// Run the fragment endpoint until Ctrl-C
pub struct ServeCommand {
    source: ConfigSource,
    bind: Option<String>,
}

impl ServeCommand {
    /// Create a new command instance
    pub const fn new(source: ConfigSource, bind: Option<String>) -> Self {
        Self { source, bind }
    }

    /// Execute the command
    pub async fn execute(self) -> Result<()> {
        observability::init()?;

        let config = self.source.load()?;
        let bind = self.bind.unwrap_or_else(|| config.server.bind_addr.clone());

        let endpoints: Vec<String> = {
            let mut registrar = config.endpoints.registrar();
            registrar.register_endpoints();
            registrar
                .route_table()
                .rules()
                .iter()
                .map(|rule| rule.prefix.clone())
                .collect()
        };

        let state = AppState::from_config(config).context("Failed to build fragment endpoint")?;
        let app = server::router(state);

        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;

        println!(
            "{} {}",
            style("Serving").green().bold(),
            style(format!("http://{bind}")).cyan()
        );
        for prefix in &endpoints {
            println!("  {} {prefix}/{{identifier}}", style("→").dim());
        }
        println!();

        tracing::info!(%bind, service = self.source.service(), "fragment server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        println!("{}", style("Stopped").yellow());
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
