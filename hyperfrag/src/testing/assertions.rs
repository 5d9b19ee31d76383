//! Assertion helpers for the signaling headers

use axum_test::TestResponse;
use serde_json::Value;

fn header_json(response: &TestResponse, name: &str) -> Option<Value> {
    let value = response.headers().get(name)?;
    let text = value.to_str().expect("header value is not visible ASCII");
    Some(serde_json::from_str(text).expect("header value is not JSON"))
}

/// Assert the success header carries `action` with `status` under `response_key`
///
/// # Panics
///
/// Panics if the header is missing or carries something else
pub fn assert_payload(response: &TestResponse, response_key: &str, action: &str, status: &str) {
    let header = header_json(response, "HX-Trigger").expect("HX-Trigger header not found");
    let payload = &header[response_key];
    assert_eq!(
        payload["action"], action,
        "Expected action '{action}' under '{response_key}', got {header}"
    );
    assert_eq!(
        payload["status"], status,
        "Expected status '{status}' under '{response_key}', got {header}"
    );
}

/// Assert the error header carries `message`
///
/// # Panics
///
/// Panics if the header is missing or carries another message
pub fn assert_error_signal(response: &TestResponse, message: &str) {
    let header =
        header_json(response, "X-Hypermedia-Error").expect("X-Hypermedia-Error header not found");
    assert_eq!(header["status"], "error", "Unexpected error signal {header}");
    assert_eq!(
        header["data"]["message"], message,
        "Expected error message '{message}', got {header}"
    );
}

/// Assert no error header was sent
///
/// # Panics
///
/// Panics if the error header is present
pub fn assert_no_error_signal(response: &TestResponse) {
    assert!(
        response.headers().get("X-Hypermedia-Error").is_none(),
        "Unexpected X-Hypermedia-Error header"
    );
}

/// Assert the response forbids caching
///
/// # Panics
///
/// Panics if `Cache-Control` is missing or allows caching
pub fn assert_no_cache(response: &TestResponse) {
    let header = response
        .headers()
        .get("Cache-Control")
        .expect("Cache-Control header not found");
    let actual = header.to_str().expect("Invalid Cache-Control header value");
    assert!(
        actual.contains("no-store"),
        "Expected Cache-Control to forbid caching, got '{actual}'"
    );
}
