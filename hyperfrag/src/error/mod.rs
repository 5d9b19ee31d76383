//! Error types and error handling
//!
//! Each concern has its own error enum; [`HyperfragError`] folds them together
//! for the host-facing adapter, where it becomes an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Framework error type
#[derive(Debug, Error)]
pub enum HyperfragError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Namespace registration error
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    /// Response signaling error (host invariant violation)
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// Error raised while executing a template
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IntoResponse for HyperfragError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "fragment request failed");

        let body = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            "Internal Server Error".to_string()
        };

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Why a template identifier could not be turned into a file
///
/// The variants only matter to server logs. Every one of them is reported to
/// the client as the same 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The identifier was empty, contained a traversal sequence, or
    /// sanitized down to nothing
    #[error("invalid template name: {0}")]
    InvalidIdentifier(String),

    /// An explicit namespace was requested that nobody registered
    #[error("unknown template namespace: {0}")]
    UnknownNamespace(String),

    /// No candidate file exists under any allowed base directory
    #[error("template not found: {0}")]
    NotFound(String),

    /// The candidate canonicalized to a location outside its base directory
    #[error("template path escapes its base directory: {}", .0.display())]
    Containment(PathBuf),
}

impl ResolveError {
    /// True when the identifier itself was malformed (as opposed to valid but
    /// unresolvable)
    #[must_use]
    pub const fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }
}

/// Errors from registering template namespaces
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    /// Namespace name is empty or outside the key charset
    #[error("invalid namespace name '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidName(String),

    /// Base directory must be absolute
    #[error("namespace '{name}' base directory must be absolute: {}", .path.display())]
    RelativeBaseDir {
        /// Namespace being registered
        name: String,
        /// Offending path
        path: PathBuf,
    },
}

/// Errors raised while emitting the terminal response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Something already committed the response for this request
    #[error("headers already sent: the response for this request was already committed")]
    HeadersAlreadySent,

    /// The payload could not be encoded as a header value
    #[error("response payload could not be encoded: {0}")]
    Encode(String),
}

/// Errors raised by the template engine
///
/// These are deliberately not translated into protocol responses. They reach
/// the host's error handling untouched.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template file could not be read
    #[error("failed to read template '{}': {source}", .path.display())]
    Read {
        /// Template path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Template rendering failed
    #[error("template render error: {0}")]
    Render(#[from] minijinja::Error),

    /// The template tried to signal twice or write after signaling
    #[error(transparent)]
    Signal(#[from] SignalError),
}
