//! hyperfrag: hypermedia fragment endpoint
//!
//! A single route accepts a template identifier, resolves it to a file on
//! disk, checks the request's anti-forgery token, renders the file with the
//! sanitized request parameters in scope and answers with the fragment or an
//! out-of-band signal for HTMX/Datastar-style clients.
//!
//! ```text
//! GET  /wp-html/v1/datastar-demo          default template directories
//! POST /wp-html/v1/acme:cards/list        namespace "acme" only, nonce required
//! GET  /hxwp/v1/old-fragment              legacy alias, legacy constants
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hyperfrag::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     hyperfrag::observability::init()?;
//!
//!     let config = HyperfragConfig::load_for_service("my-site")?;
//!     let bind = config.server.bind_addr.clone();
//!
//!     let mut namespaces = NamespaceRegistry::new();
//!     namespaces.register("acme", "/srv/acme/hypermedia")?;
//!     let state = AppState::with_namespaces(config, namespaces)?;
//!
//!     let app = axum::Router::new().merge(hyperfrag::server::router(state));
//!     let listener = tokio::net::TcpListener::bind(&bind).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! The core (`endpoint`, `nonce`, `params`, `resolver`, `response`,
//! `template`, `dispatch`) is synchronous and framework-agnostic. `server`
//! adapts it to axum; `config`, `observability` and `state` wire it up.

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod nonce;
pub mod observability;
pub mod params;
pub mod resolver;
pub mod response;
pub mod server;
pub mod state;
pub mod template;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use hyperfrag::prelude::*;
    //! ```

    pub use crate::config::HyperfragConfig;
    pub use crate::dispatch::{IncomingRequest, RequestDispatcher};
    pub use crate::endpoint::{CompatibilityMode, EndpointProfile, EndpointRegistrar};
    pub use crate::error::{HyperfragError, ResolveError, SignalError, TemplateError};
    pub use crate::nonce::{KeyedNonceVerifier, NonceIssuer, NonceValidator, NonceVerifier};
    pub use crate::params::{ParamBag, ParamFilter, ParamSanitizer, ParamValue};
    pub use crate::resolver::{NamespaceRegistry, PathResolver, ResolvedTemplate};
    pub use crate::response::{
        PayloadStatus, ResponsePayload, ResponseSignaler, ResponseSink, TerminalResponse,
    };
    pub use crate::state::AppState;
    pub use crate::template::{MiniJinjaEngine, TemplateContext, TemplateEngine};

    pub use axum_htmx::{AutoVaryLayer, HxRequest};
}
