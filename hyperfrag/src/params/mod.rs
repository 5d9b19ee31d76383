//! Request parameter sanitization
//!
//! Everything a template sees arrives through [`ParamSanitizer::sanitize`].
//! Keys are folded to `[a-z0-9_]`, values are reduced to plain text, and nonce
//! fields never reach the bag.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A raw request value before sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Single value
    Scalar(String),
    /// Multi-value form field (`name[]=a&name[]=b`)
    List(Vec<String>),
}

impl RawValue {
    /// First value, if any
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value.as_str()),
            Self::List(values) => values.first().map(String::as_str),
        }
    }
}

/// Raw request parameters keyed by their original name
pub type RawParams = BTreeMap<String, RawValue>;

/// Collect decoded `key=value` pairs into [`RawParams`]
///
/// Keys ending in `[]` and keys that repeat become lists, in arrival order.
#[must_use]
pub fn collect_pairs<I>(pairs: I) -> RawParams
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut params = RawParams::new();

    for (key, value) in pairs {
        let is_list = key.ends_with("[]");
        match params.remove(&key) {
            None if is_list => {
                params.insert(key, RawValue::List(vec![value]));
            }
            None => {
                params.insert(key, RawValue::Scalar(value));
            }
            Some(RawValue::Scalar(previous)) => {
                params.insert(key, RawValue::List(vec![previous, value]));
            }
            Some(RawValue::List(mut values)) => {
                values.push(value);
                params.insert(key, RawValue::List(values));
            }
        }
    }

    params
}

/// A sanitized parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Single value
    Text(String),
    /// Multi-value field
    List(Vec<String>),
}

/// Sanitized parameters handed to a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParamBag(BTreeMap<String, ParamValue>);

impl ParamBag {
    /// Look up a sanitized key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Convenience accessor for single values
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ParamValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Whether the key is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }
}

/// Host override point for parameter sanitization
///
/// Every key and every value passes through the filter after the default
/// sanitization, so a host can loosen or tighten the rules per key.
pub trait ParamFilter: Send + Sync {
    /// Final say on a sanitized key. Returning an empty string drops the entry.
    fn filter_key(&self, raw_key: &str, sanitized: String) -> String {
        let _ = raw_key;
        sanitized
    }

    /// Final say on a sanitized value
    fn filter_value(&self, key: &str, raw_value: &str, sanitized: String) -> String {
        let _ = (key, raw_value);
        sanitized
    }
}

/// Filter that keeps the default sanitization
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParamFilter;

impl ParamFilter for DefaultParamFilter {}

/// Sanitizes raw request parameters into a [`ParamBag`]
#[derive(Clone)]
pub struct ParamSanitizer {
    token_fields: Vec<String>,
    filter: Arc<dyn ParamFilter>,
}

impl std::fmt::Debug for ParamSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSanitizer")
            .field("token_fields", &self.token_fields)
            .field("filter", &"dyn ParamFilter")
            .finish()
    }
}

impl ParamSanitizer {
    /// Create a sanitizer that strips the given nonce field names
    #[must_use]
    pub fn new<I, S>(token_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            token_fields: token_fields
                .into_iter()
                .map(|field| field.as_ref().to_ascii_lowercase())
                .collect(),
            filter: Arc::new(DefaultParamFilter),
        }
    }

    /// Install a host filter
    #[must_use]
    pub fn with_filter(mut self, filter: Arc<dyn ParamFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Sanitize raw parameters
    ///
    /// Returns `None` when there was nothing to sanitize, which is different
    /// from `Some` of an empty bag (every key was dropped).
    #[must_use]
    pub fn sanitize(&self, raw: &RawParams) -> Option<ParamBag> {
        if raw.is_empty() {
            return None;
        }

        let mut bag = BTreeMap::new();

        for (raw_key, raw_value) in raw {
            if self.is_token_field(raw_key) {
                continue;
            }

            let key = self.filter.filter_key(raw_key, sanitize_param_key(raw_key));
            if key.is_empty() || self.is_token_field(&key) {
                continue;
            }

            let value = match raw_value {
                RawValue::Scalar(value) => ParamValue::Text(self.clean_value(&key, value)),
                RawValue::List(values) => ParamValue::List(
                    values
                        .iter()
                        .map(|value| self.clean_value(&key, value))
                        .collect(),
                ),
            };

            bag.insert(key, value);
        }

        Some(ParamBag(bag))
    }

    fn clean_value(&self, key: &str, raw: &str) -> String {
        self.filter
            .filter_value(key, raw, sanitize_text_field(raw))
    }

    fn is_token_field(&self, key: &str) -> bool {
        let stripped = key.strip_suffix("[]").unwrap_or(key);
        self.token_fields
            .iter()
            .any(|field| field.eq_ignore_ascii_case(stripped))
    }
}

/// Fold a parameter key to lowercase `[a-z0-9_]`
#[must_use]
pub fn sanitize_param_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>").expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n\t ]+").expect("valid regex"));
static OCTET: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("valid regex"));

/// Reduce a value to single-line plain text
///
/// Strips tags (and the bodies of `script`/`style`), drops control characters
/// and percent-encoded octets, collapses whitespace runs and trims.
#[must_use]
pub fn sanitize_text_field(value: &str) -> String {
    let mut text = if value.contains('<') {
        let without_blocks = SCRIPT_STYLE.replace_all(value, "");
        TAG.replace_all(&without_blocks, "").into_owned()
    } else {
        value.to_string()
    };

    text.retain(|c| !c.is_control() || matches!(c, '\r' | '\n' | '\t'));
    text = WHITESPACE.replace_all(&text, " ").trim().to_string();

    while OCTET.is_match(&text) {
        text = OCTET.replace_all(&text, "").into_owned();
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, RawValue)]) -> RawParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn sanitizer() -> ParamSanitizer {
        ParamSanitizer::new(["_token", "_wpnonce"])
    }

    #[test]
    fn test_empty_input_is_none() {
        assert_eq!(sanitizer().sanitize(&RawParams::new()), None);
    }

    #[test]
    fn test_only_token_yields_empty_bag() {
        let bag = sanitizer()
            .sanitize(&raw(&[("_token", RawValue::Scalar("abc".into()))]))
            .unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_scalar_and_list_values() {
        let bag = sanitizer()
            .sanitize(&raw(&[
                ("a", RawValue::Scalar("ok".into())),
                ("b[]", RawValue::List(vec!["<x>".into(), "y".into()])),
            ]))
            .unwrap();

        assert_eq!(bag.text("a"), Some("ok"));
        assert_eq!(
            bag.get("b"),
            Some(&ParamValue::List(vec![String::new(), "y".to_string()]))
        );
    }

    #[test]
    fn test_token_removed_regardless_of_case() {
        let bag = sanitizer()
            .sanitize(&raw(&[
                ("_TOKEN", RawValue::Scalar("abc".into())),
                ("_WpNonce", RawValue::Scalar("def".into())),
                ("keep", RawValue::Scalar("1".into())),
            ]))
            .unwrap();

        assert_eq!(bag.len(), 1);
        assert!(!bag.contains_key("_token"));
        assert!(!bag.contains_key("_wpnonce"));
        assert_eq!(bag.text("keep"), Some("1"));
    }

    #[test]
    fn test_key_sanitization() {
        assert_eq!(sanitize_param_key("First-Name"), "firstname");
        assert_eq!(sanitize_param_key("b[]"), "b");
        assert_eq!(sanitize_param_key("user_id"), "user_id");
        assert_eq!(sanitize_param_key("<>"), "");
    }

    #[test]
    fn test_text_field_sanitization() {
        assert_eq!(sanitize_text_field("  hello \n\t world  "), "hello world");
        assert_eq!(sanitize_text_field("<b>bold</b> text"), "bold text");
        assert_eq!(sanitize_text_field("<script>alert(1)</script>safe"), "safe");
        assert_eq!(sanitize_text_field("100%25 sure"), "100 sure");
        assert_eq!(sanitize_text_field("a\u{0}b"), "ab");
        assert_eq!(sanitize_text_field("café"), "café");
    }

    #[test]
    fn test_collect_pairs_builds_lists() {
        let params = collect_pairs(vec![
            ("a".to_string(), "1".to_string()),
            ("b[]".to_string(), "x".to_string()),
            ("b[]".to_string(), "y".to_string()),
            ("a".to_string(), "2".to_string()),
        ]);

        assert_eq!(
            params.get("a"),
            Some(&RawValue::List(vec!["1".into(), "2".into()]))
        );
        assert_eq!(
            params.get("b[]"),
            Some(&RawValue::List(vec!["x".into(), "y".into()]))
        );
    }

    struct UppercaseTitle;

    impl ParamFilter for UppercaseTitle {
        fn filter_value(&self, key: &str, _raw: &str, sanitized: String) -> String {
            if key == "title" {
                sanitized.to_uppercase()
            } else {
                sanitized
            }
        }

        fn filter_key(&self, raw_key: &str, sanitized: String) -> String {
            if raw_key == "drop_me" {
                String::new()
            } else {
                sanitized
            }
        }
    }

    #[test]
    fn test_filter_hook_overrides_defaults() {
        let bag = sanitizer()
            .with_filter(Arc::new(UppercaseTitle))
            .sanitize(&raw(&[
                ("title", RawValue::Scalar("hello".into())),
                ("body", RawValue::Scalar("hello".into())),
                ("drop_me", RawValue::Scalar("x".into())),
            ]))
            .unwrap();

        assert_eq!(bag.text("title"), Some("HELLO"));
        assert_eq!(bag.text("body"), Some("hello"));
        assert!(!bag.contains_key("drop_me"));
    }

    #[test]
    fn test_bag_serializes_as_map() {
        let bag = sanitizer()
            .sanitize(&raw(&[
                ("a", RawValue::Scalar("ok".into())),
                ("b[]", RawValue::List(vec!["y".into()])),
            ]))
            .unwrap();

        let json = serde_json::to_value(&bag).unwrap();
        assert_eq!(json, serde_json::json!({"a": "ok", "b": ["y"]}));
    }
}
