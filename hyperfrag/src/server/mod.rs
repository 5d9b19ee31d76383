//! axum adapter
//!
//! Mounts one catch-all route per registered endpoint and runs the
//! synchronous dispatch chain on the blocking pool.
//!
//! ```rust,no_run
//! use hyperfrag::{config::HyperfragConfig, server, state::AppState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = HyperfragConfig::load_for_service("my-site")?;
//! let state = AppState::from_config(config)?;
//!
//! let app = axum::Router::new()
//!     .route("/", axum::routing::get(|| async { "host page" }))
//!     .merge(server::router(state));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Merge the router at the root rather than nesting it: the dispatcher
//! matches the full request path.

use crate::dispatch::IncomingRequest;
use crate::error::HyperfragError;
use crate::params::{collect_pairs, RawParams};
use crate::state::AppState;
use axum::{
    extract::{rejection::FormRejection, MatchedPath, Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Form, Router,
};
use axum_htmx::{AutoVaryLayer, HxRequest};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

const IDENTIFIER_SEGMENT: &str = "/{*identifier}";

/// Router serving every registered endpoint, with tracing, timeout and
/// (when configured) `Vary` layers applied
pub fn router(state: AppState) -> Router {
    let server = &state.config().server;
    let timeout = Duration::from_millis(server.request_timeout_ms);
    let auto_vary = server.auto_vary;

    let mut router = routes(&state)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http());

    if auto_vary {
        router = router.layer(AutoVaryLayer);
    }

    router
}

/// Bare endpoint routes, for hosts that bring their own layers
pub fn routes(state: &AppState) -> Router<AppState> {
    state
        .dispatcher()
        .registrar()
        .route_table()
        .rules()
        .iter()
        .fold(Router::new(), |router, rule| {
            router.route(&format!("{}{IDENTIFIER_SEGMENT}", rule.prefix), any(fragment))
        })
}

/// Fragment endpoint handler
///
/// Query parameters are always read; an urlencoded body is merged in for
/// methods other than GET and HEAD.
async fn fragment(
    State(state): State<AppState>,
    HxRequest(is_htmx): HxRequest,
    matched: MatchedPath,
    Path(identifier): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Response, HyperfragError> {
    let prefix = matched
        .as_str()
        .strip_suffix(IDENTIFIER_SEGMENT)
        .unwrap_or_default();

    let params = request_params(&method, query, form);
    let request = IncomingRequest {
        method,
        path: format!("{prefix}/{identifier}"),
        params,
        headers,
    };

    tracing::debug!(path = %request.path, is_htmx, "fragment request");

    let dispatcher = state.dispatcher().clone();
    let outcome = tokio::task::spawn_blocking(move || dispatcher.dispatch(&request))
        .await
        .map_err(|err| HyperfragError::ServerError(err.to_string()))??;

    Ok(outcome.map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        IntoResponse::into_response,
    ))
}

fn request_params(
    method: &Method,
    query: Vec<(String, String)>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> RawParams {
    let body = match form {
        Ok(Form(pairs)) if !matches!(*method, Method::GET | Method::HEAD) => pairs,
        Ok(_) => Vec::new(),
        Err(rejection) => {
            tracing::debug!(%rejection, "request body ignored");
            Vec::new()
        }
    };

    collect_pairs(query.into_iter().chain(body))
}
