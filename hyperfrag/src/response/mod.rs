//! Out-of-band response signaling
//!
//! Hypermedia clients read a JSON payload from a response header, independent
//! of the HTML body. Two header shapes exist:
//!
//! ```text
//! HX-Trigger:          {"hmResponse":{"action":"save","status":"success","data":{...}}}
//! X-Hypermedia-Error:  {"status":"error","data":{"message":"Invalid nonce"}}
//! ```
//!
//! A request terminates exactly once. Templates and the dispatcher commit
//! their [`TerminalResponse`] through a per-request [`ResponseSink`], which
//! rejects a second commit and any output written after the first.

use crate::endpoint::EndpointProfile;
use crate::error::SignalError;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_htmx::{HxEvent, HxResponseTrigger};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;

pub use axum_htmx::HX_TRIGGER;

/// Header carrying pre-payload error signals
pub static HYPERMEDIA_ERROR: HeaderName = HeaderName::from_static("x-hypermedia-error");

const NO_CACHE: &str = "no-cache, must-revalidate, max-age=0, no-store, private";

/// Outcome reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadStatus {
    /// Action succeeded, client may react visibly
    Success,
    /// Action failed
    Error,
    /// Action succeeded, client should stay quiet
    SilentSuccess,
}

impl PayloadStatus {
    /// HTTP status for a payload with this outcome
    #[must_use]
    pub const fn http_status(self) -> StatusCode {
        match self {
            Self::Error => StatusCode::BAD_REQUEST,
            Self::Success | Self::SilentSuccess => StatusCode::OK,
        }
    }
}

/// Structured payload a handler reports back to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Action name the client dispatches on
    pub action: String,
    /// Outcome
    pub status: PayloadStatus,
    /// Arbitrary structured data
    #[serde(default)]
    pub data: Value,
}

impl ResponsePayload {
    /// Create a payload with no data
    #[must_use]
    pub fn new(action: impl Into<String>, status: PayloadStatus) -> Self {
        Self {
            action: action.into(),
            status,
            data: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach data
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// The one response a request ends with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: String,
}

impl TerminalResponse {
    /// Plain rendered fragment
    #[must_use]
    pub fn rendered(body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Self {
            status: StatusCode::OK,
            headers,
            body,
        }
    }

    /// Decode a JSON header, if present
    #[must_use]
    pub fn header_json(&self, name: &HeaderName) -> Option<Value> {
        let value = self.headers.get(name)?.to_str().ok()?;
        serde_json::from_str(value).ok()
    }
}

impl IntoResponse for TerminalResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// Composes terminal responses for one endpoint generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSignaler {
    response_key: String,
}

impl ResponseSignaler {
    /// Signaler wrapping payloads under `response_key`
    #[must_use]
    pub fn new(response_key: impl Into<String>) -> Self {
        Self {
            response_key: response_key.into(),
        }
    }

    /// Signaler for a profile's response key
    #[must_use]
    pub fn for_profile(profile: &EndpointProfile) -> Self {
        Self::new(profile.response_key.clone())
    }

    /// Wrapper key used in the success header
    #[must_use]
    pub fn response_key(&self) -> &str {
        &self.response_key
    }

    /// Terminal response for a handler payload
    ///
    /// `error` payloads answer 400, everything else 200. The body is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Encode`] if the payload cannot be serialized
    /// into a header value.
    pub fn payload_response(&self, payload: &ResponsePayload) -> Result<TerminalResponse, SignalError> {
        let event = HxEvent::new_with_data(&self.response_key, payload)
            .map_err(|err| SignalError::Encode(err.to_string()))?;

        let mut headers = no_cache_headers();
        headers.insert(HX_TRIGGER, trigger_header_value(event)?);

        tracing::debug!(
            action = %payload.action,
            status = ?payload.status,
            "signaling payload response"
        );

        Ok(TerminalResponse {
            status: payload.status.http_status(),
            headers,
            body: String::new(),
        })
    }

    /// Terminal response for a failure raised before any payload exists
    ///
    /// Always answers 200 so hypermedia clients still swap the body. The
    /// message is only placed in the body when `reveal` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Encode`] if the message cannot be encoded.
    pub fn error_response(&self, message: &str, reveal: bool) -> Result<TerminalResponse, SignalError> {
        self.error_response_with_status(StatusCode::OK, message, reveal)
    }

    /// Error signal with an explicit status, used by the dispatcher for 403/404
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::Encode`] if the message cannot be encoded.
    pub fn error_response_with_status(
        &self,
        status: StatusCode,
        message: &str,
        reveal: bool,
    ) -> Result<TerminalResponse, SignalError> {
        let signal = json!({
            "status": "error",
            "data": { "message": message },
        });

        let mut headers = no_cache_headers();
        headers.insert(HYPERMEDIA_ERROR.clone(), json_header_value(&signal)?);

        let body = if reveal {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            message.to_string()
        } else {
            String::new()
        };

        Ok(TerminalResponse {
            status,
            headers,
            body,
        })
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers
}

/// `HX-Trigger` value for a single event, as composed by axum-htmx
fn trigger_header_value(event: HxEvent) -> Result<HeaderValue, SignalError> {
    let response = (HxResponseTrigger::normal([event]), ()).into_response();
    let value = response
        .headers()
        .get(HX_TRIGGER)
        .ok_or_else(|| SignalError::Encode("trigger event could not be encoded".to_string()))?;

    let encoded = std::str::from_utf8(value.as_bytes())
        .map_err(|err| SignalError::Encode(err.to_string()))?;
    ascii_header_value(encoded)
}

fn json_header_value(value: &Value) -> Result<HeaderValue, SignalError> {
    let encoded =
        serde_json::to_string(value).map_err(|err| SignalError::Encode(err.to_string()))?;
    ascii_header_value(&encoded)
}

/// Header values must be visible ASCII, so anything else in the JSON text is
/// emitted as a `\uXXXX` escape, which JSON parsers read back unchanged.
fn ascii_header_value(encoded: &str) -> Result<HeaderValue, SignalError> {
    let mut ascii = String::with_capacity(encoded.len());
    for c in encoded.chars() {
        if c.is_ascii() {
            ascii.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(ascii, "\\u{unit:04x}");
            }
        }
    }

    HeaderValue::from_str(&ascii).map_err(|err| SignalError::Encode(err.to_string()))
}

/// What a request produced once execution finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// A terminal response was committed
    Signaled(TerminalResponse),
    /// Only output was written
    Written(String),
}

#[derive(Debug, Default)]
struct SinkState {
    output: String,
    committed: Option<TerminalResponse>,
}

/// Per-request one-shot output guard
///
/// Cloning shares the same state, so a template and the dispatcher can hold
/// the sink at the same time.
#[derive(Debug, Clone, Default)]
pub struct ResponseSink {
    state: Arc<Mutex<SinkState>>,
}

impl ResponseSink {
    /// Create a fresh, uncommitted sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::HeadersAlreadySent`] after a commit.
    pub fn write(&self, chunk: &str) -> Result<(), SignalError> {
        let mut state = self.state.lock();
        if state.committed.is_some() {
            tracing::error!("output written after the response was committed");
            return Err(SignalError::HeadersAlreadySent);
        }
        state.output.push_str(chunk);
        Ok(())
    }

    /// Commit the terminal response
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::HeadersAlreadySent`] if a response was already
    /// committed.
    pub fn commit(&self, response: TerminalResponse) -> Result<(), SignalError> {
        let mut state = self.state.lock();
        if state.committed.is_some() {
            tracing::error!(status = %response.status, "response committed twice");
            return Err(SignalError::HeadersAlreadySent);
        }
        state.committed = Some(response);
        Ok(())
    }

    /// Whether a terminal response was committed
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state.lock().committed.is_some()
    }

    /// Drain the sink
    ///
    /// A committed response wins over written output, which is discarded.
    #[must_use]
    pub fn finish(&self) -> SinkOutcome {
        let mut state = self.state.lock();
        match state.committed.take() {
            Some(response) => SinkOutcome::Signaled(response),
            None => SinkOutcome::Written(std::mem::take(&mut state.output)),
        }
    }
}
