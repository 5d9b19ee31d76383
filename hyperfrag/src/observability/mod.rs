//! Logging and tracing setup
//!
//! Pretty output in debug builds, JSON lines in release builds. `RUST_LOG`
//! overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber with the default filter
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use hyperfrag::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("fragment server starting");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    init_with_filter(default_directive())
}

/// Initialize the global subscriber, falling back to `directive` when
/// `RUST_LOG` is unset
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_with_filter(directive: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

/// Filter used when `RUST_LOG` is unset
#[must_use]
pub const fn default_directive() -> &'static str {
    if cfg!(debug_assertions) {
        "info,hyperfrag=debug,tower_http=debug"
    } else {
        "info"
    }
}
