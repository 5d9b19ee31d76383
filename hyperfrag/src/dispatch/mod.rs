//! Request dispatch
//!
//! One synchronous call chain per request:
//!
//! ```text
//! Idle ─match─▶ Matched ─nonce─▶ Validated ─resolve─▶ Resolved ─▶ Executing ─▶ Terminated
//!                  │                 │
//!                  └──── Error ◀─────┘   (403 bad nonce, 404 unresolved)
//! ```
//!
//! Requests that match no endpoint are left to the host (`Ok(None)`).
//! Every matched request ends with exactly one [`TerminalResponse`].

use crate::endpoint::EndpointRegistrar;
use crate::error::TemplateError;
use crate::nonce::{requires_nonce, NonceValidator};
use crate::params::{ParamFilter, ParamSanitizer, RawParams};
use crate::resolver::PathResolver;
use crate::response::{ResponseSignaler, ResponseSink, SinkOutcome, TerminalResponse};
use crate::template::{TemplateContext, TemplateEngine};
use axum::http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Message sent when the nonce check fails
pub const NONCE_FAILED: &str = "Nonce verification failed";

/// Message sent for malformed identifiers
pub const INVALID_TEMPLATE: &str = "Invalid template name";

/// Message sent when no template could be resolved
pub const TEMPLATE_NOT_FOUND: &str = "Template not found";

/// Immutable view of an inbound request
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// HTTP method
    pub method: Method,
    /// Decoded request path
    pub path: String,
    /// Query and form parameters
    pub params: RawParams,
    /// Request headers
    pub headers: HeaderMap,
}

impl IncomingRequest {
    /// Request with no parameters or headers
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: RawParams::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Replace the parameters
    #[must_use]
    pub fn with_params(mut self, params: RawParams) -> Self {
        self.params = params;
        self
    }

    /// Replace the headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Lifecycle of a dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing matched yet
    Idle,
    /// An endpoint matched
    Matched,
    /// Nonce accepted or not required
    Validated,
    /// Template file found
    Resolved,
    /// Template running
    Executing,
    /// Terminal response produced
    Terminated,
    /// Failed before execution
    Error,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Matched => "matched",
            Self::Validated => "validated",
            Self::Resolved => "resolved",
            Self::Executing => "executing",
            Self::Terminated => "terminated",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Drives a request from endpoint match to terminal response
#[derive(Clone)]
pub struct RequestDispatcher {
    registrar: EndpointRegistrar,
    validator: NonceValidator,
    sanitizer: ParamSanitizer,
    resolver: PathResolver,
    engine: Arc<dyn TemplateEngine>,
    reveal_errors: bool,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("registrar", &self.registrar)
            .field("validator", &self.validator)
            .field("sanitizer", &self.sanitizer)
            .field("resolver", &self.resolver)
            .field("engine", &"dyn TemplateEngine")
            .field("reveal_errors", &self.reveal_errors)
            .finish()
    }
}

impl RequestDispatcher {
    /// Create a dispatcher
    ///
    /// Endpoints are registered here, so `registrar` may be fresh. Nonce
    /// fields known to `validator` are stripped from template parameters.
    #[must_use]
    pub fn new(
        mut registrar: EndpointRegistrar,
        validator: NonceValidator,
        resolver: PathResolver,
        engine: Arc<dyn TemplateEngine>,
    ) -> Self {
        registrar.register_endpoints();
        let sanitizer = ParamSanitizer::new(validator.param_names());

        Self {
            registrar,
            validator,
            sanitizer,
            resolver,
            engine,
            reveal_errors: false,
        }
    }

    /// Put failure messages in the body of 403/404 responses
    #[must_use]
    pub const fn with_reveal_errors(mut self, reveal: bool) -> Self {
        self.reveal_errors = reveal;
        self
    }

    /// Install a host parameter filter
    #[must_use]
    pub fn with_param_filter(mut self, filter: Arc<dyn ParamFilter>) -> Self {
        self.sanitizer = self.sanitizer.with_filter(filter);
        self
    }

    /// Registered endpoints
    #[must_use]
    pub const fn registrar(&self) -> &EndpointRegistrar {
        &self.registrar
    }

    /// Template resolver
    #[must_use]
    pub const fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Dispatch one request
    ///
    /// Returns `Ok(None)` when no endpoint matched, leaving the request to
    /// the host.
    ///
    /// # Errors
    ///
    /// Template execution errors and signaling invariant violations are
    /// returned unchanged rather than turned into protocol responses.
    pub fn dispatch(
        &self,
        request: &IncomingRequest,
    ) -> Result<Option<TerminalResponse>, TemplateError> {
        let mut state = DispatchState::Idle;

        let Some(matched) = self.registrar.match_path(&request.path) else {
            return Ok(None);
        };
        advance(&mut state, DispatchState::Matched, &matched.identifier);

        let signaler = ResponseSignaler::for_profile(matched.profile);

        if requires_nonce(&request.method)
            && !self
                .validator
                .validate_request(&request.params, &request.headers)
        {
            tracing::warn!(
                method = %request.method,
                identifier = %matched.identifier,
                mode = %matched.mode,
                "rejected request with missing or invalid nonce"
            );
            advance(&mut state, DispatchState::Error, &matched.identifier);
            return signaler
                .error_response_with_status(StatusCode::FORBIDDEN, NONCE_FAILED, self.reveal_errors)
                .map(Some)
                .map_err(TemplateError::from);
        }
        advance(&mut state, DispatchState::Validated, &matched.identifier);

        let params = self.sanitizer.sanitize(&request.params);

        let resolved = match self
            .resolver
            .resolve(&matched.identifier, &matched.profile.template_extension)
        {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::debug!(identifier = %matched.identifier, error = %err, "template resolution failed");
                advance(&mut state, DispatchState::Error, &matched.identifier);
                let message = if err.is_invalid_identifier() {
                    INVALID_TEMPLATE
                } else {
                    TEMPLATE_NOT_FOUND
                };
                return signaler
                    .error_response_with_status(StatusCode::NOT_FOUND, message, self.reveal_errors)
                    .map(Some)
                    .map_err(TemplateError::from);
            }
        };
        advance(&mut state, DispatchState::Resolved, &matched.identifier);

        let context = TemplateContext {
            mode: matched.mode,
            profile: matched.profile.clone(),
            identifier: matched.identifier.clone(),
            method: request.method.to_string(),
            params,
        };

        let sink = ResponseSink::new();
        advance(&mut state, DispatchState::Executing, &matched.identifier);
        self.engine.execute(&resolved, &context, &sink)?;

        let response = match sink.finish() {
            SinkOutcome::Signaled(response) => response,
            SinkOutcome::Written(body) => TerminalResponse::rendered(body),
        };
        advance(&mut state, DispatchState::Terminated, &matched.identifier);

        Ok(Some(response))
    }
}

fn advance(state: &mut DispatchState, next: DispatchState, identifier: &str) {
    tracing::debug!(from = %state, to = %next, identifier, "dispatch state");
    *state = next;
}
