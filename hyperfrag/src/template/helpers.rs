//! Attribute helpers for fragment templates
//!
//! Build endpoint URLs and the `hx-*` attributes that call them, with the
//! anti-forgery token attached the way the endpoint expects it.
//!
//! ```rust
//! use hyperfrag::endpoint::EndpointProfile;
//! use hyperfrag::template::helpers::*;
//!
//! let profile = EndpointProfile::current();
//! let url = endpoint_url(&profile, "cards/list");
//! assert_eq!(url, "/wp-html/v1/cards/list");
//!
//! let attrs = hx_post(&url, "#cards", "innerHTML");
//! assert!(attrs.contains(r#"hx-post="/wp-html/v1/cards/list""#));
//! ```

use crate::endpoint::EndpointProfile;
use serde_json::json;

/// URL of a fragment on the given endpoint
#[must_use]
pub fn endpoint_url(profile: &EndpointProfile, identifier: &str) -> String {
    format!(
        "{}/{}",
        profile.route_prefix(),
        identifier.trim_start_matches('/')
    )
}

/// `hx-get` with target and swap
#[must_use]
pub fn hx_get(url: &str, target: &str, swap: &str) -> String {
    format!(
        r#"hx-get="{}" hx-target="{}" hx-swap="{}""#,
        escape_attr(url),
        escape_attr(target),
        escape_attr(swap)
    )
}

/// `hx-post` with target and swap
#[must_use]
pub fn hx_post(url: &str, target: &str, swap: &str) -> String {
    format!(
        r#"hx-post="{}" hx-target="{}" hx-swap="{}""#,
        escape_attr(url),
        escape_attr(target),
        escape_attr(swap)
    )
}

/// `hx-vals` carrying the nonce under the profile's parameter name
///
/// # Examples
///
/// ```rust
/// use hyperfrag::endpoint::EndpointProfile;
/// use hyperfrag::template::helpers::hx_vals_with_nonce;
///
/// let attr = hx_vals_with_nonce(&EndpointProfile::current(), "abc123");
/// assert_eq!(attr, r#"hx-vals='{"_token":"abc123"}'"#);
/// ```
#[must_use]
pub fn hx_vals_with_nonce(profile: &EndpointProfile, token: &str) -> String {
    let vals = json!({ profile.nonce_param.as_str(): token });
    format!("hx-vals='{}'", vals.to_string().replace('\'', "&#39;"))
}

/// `hx-headers` carrying the nonce under the profile's header name
#[must_use]
pub fn hx_headers_with_nonce(profile: &EndpointProfile, token: &str) -> String {
    let headers = json!({ profile.nonce_header.as_str(): token });
    format!("hx-headers='{}'", headers.to_string().replace('\'', "&#39;"))
}

/// Hidden input carrying the nonce, for plain forms
#[must_use]
pub fn nonce_field(profile: &EndpointProfile, token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        escape_attr(&profile.nonce_param),
        escape_attr(token)
    )
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
