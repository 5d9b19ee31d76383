//! Template execution
//!
//! A resolved template is executed with the sanitized parameters in scope.
//! The [`TemplateEngine`] trait is the seam; [`MiniJinjaEngine`] is the
//! bundled implementation.
//!
//! # Signaling from templates
//!
//! Two functions are bound to the request's [`ResponseSink`]:
//!
//! - `hm_response(action, status="success", data=none)` ends the request with
//!   an out-of-band payload header
//! - `hm_die(message="", reveal=false)` ends the request with an error header
//!
//! Both stop rendering immediately. Output produced before the call is
//! discarded.
//!
//! ```jinja
//! {% if not hmvals %}{{ hm_die("Nothing to save") }}{% endif %}
//! {{ hm_response("save", "success", {"id": hmvals.id}) }}
//! ```
//!
//! # Follow-up requests
//!
//! URLs and attributes are built for the endpoint generation that matched.
//! The nonce functions need an issuer ([`MiniJinjaEngine::with_nonce_issuer`]).
//!
//! | Function | Output |
//! |---|---|
//! | `endpoint_url(id)` | `/wp-html/v1/{id}` |
//! | `hx_get(id, target="this", swap="innerHTML")` | `hx-get` attributes |
//! | `hx_post(id, target="this", swap="innerHTML")` | `hx-post` attributes plus `hx-vals` with a nonce |
//! | `nonce()` | bare token |
//! | `nonce_field()` | hidden form input |
//! | `hx_vals_with_nonce()` / `hx_headers_with_nonce()` | nonce as `hx-vals` / `hx-headers` |
//!
//! ```jinja
//! <form {{ hx_post("cards/save", "#cards") }}>...</form>
//! <form method="post" action="{{ endpoint_url('cards/save') }}">{{ nonce_field() }}</form>
//! ```

pub mod helpers;

use crate::endpoint::{CompatibilityMode, EndpointProfile};
use crate::error::{SignalError, TemplateError};
use crate::nonce::NonceIssuer;
use crate::params::ParamBag;
use crate::resolver::ResolvedTemplate;
use crate::response::{PayloadStatus, ResponsePayload, ResponseSignaler, ResponseSink};
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, ErrorKind};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::Arc;

/// Everything a template sees besides the file itself
#[derive(Debug, Clone)]
pub struct TemplateContext {
    /// Endpoint generation that matched
    pub mode: CompatibilityMode,
    /// Constants of that generation
    pub profile: EndpointProfile,
    /// Raw identifier from the URL
    pub identifier: String,
    /// HTTP method, uppercase
    pub method: String,
    /// Sanitized parameters, `None` when the request carried none
    pub params: Option<ParamBag>,
}

impl TemplateContext {
    /// Variables exposed to the template
    ///
    /// Parameters live under the profile's params variable and are `false`
    /// when the request carried none.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, Value> {
        let params = self
            .params
            .as_ref()
            .map_or(Value::from(false), Value::from_serialize);

        let mut vars = BTreeMap::new();
        vars.insert(self.profile.params_var.clone(), params);
        vars.insert("compat_mode".to_string(), Value::from(self.mode.as_str()));
        vars.insert("template_name".to_string(), Value::from(self.identifier.clone()));
        vars.insert("request_method".to_string(), Value::from(self.method.clone()));
        vars
    }
}

/// Executes a resolved template
///
/// Implementations either write rendered output to the sink or commit a
/// terminal response to it. Execution errors are returned unchanged.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateEngine: Send + Sync {
    /// Execute `template` for one request
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the file cannot be read, fails to
    /// render, or violates the one-shot signaling rule.
    fn execute(
        &self,
        template: &ResolvedTemplate,
        context: &TemplateContext,
        sink: &ResponseSink,
    ) -> Result<(), TemplateError>;
}

/// Runtime templates rendered with `minijinja`
///
/// Includes and imports resolve relative to the base directory the template
/// was found in, so a namespaced template only sees its own namespace.
#[derive(Debug, Clone, Default)]
pub struct MiniJinjaEngine {
    reveal_errors: bool,
    nonces: Option<Arc<dyn NonceIssuer>>,
}

const SIGNALED: &str = "response signaled";
const DEFAULT_TARGET: &str = "this";
const DEFAULT_SWAP: &str = "innerHTML";

impl MiniJinjaEngine {
    /// Create an engine
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reveal_errors: false,
            nonces: None,
        }
    }

    /// Issuer behind the `nonce*` and `hx_post` template functions
    #[must_use]
    pub fn with_nonce_issuer(mut self, issuer: Arc<dyn NonceIssuer>) -> Self {
        self.nonces = Some(issuer);
        self
    }

    /// Default `reveal` for `hm_die` when the template does not pass one
    #[must_use]
    pub const fn with_reveal_errors(mut self, reveal: bool) -> Self {
        self.reveal_errors = reveal;
        self
    }

    fn environment(
        &self,
        template: &ResolvedTemplate,
        context: &TemplateContext,
        sink: &ResponseSink,
    ) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&template.base_dir));
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let signaler = ResponseSignaler::for_profile(&context.profile);

        let (response_signaler, response_sink) = (signaler.clone(), sink.clone());
        env.add_function(
            "hm_response",
            move |action: String, status: Option<String>, data: Option<Value>| {
                let status = parse_status(status.as_deref().unwrap_or("success"))?;
                let data = data
                    .map(|value| serde_json::to_value(&value))
                    .transpose()
                    .map_err(|err| {
                        minijinja::Error::new(ErrorKind::BadSerialization, err.to_string())
                    })?
                    .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

                let payload = ResponsePayload::new(action, status).with_data(data);
                let response = response_signaler
                    .payload_response(&payload)
                    .map_err(signal_error)?;
                response_sink.commit(response).map_err(signal_error)?;
                Err::<Value, _>(signaled())
            },
        );

        let default_reveal = self.reveal_errors;
        let die_sink = sink.clone();
        env.add_function(
            "hm_die",
            move |message: Option<String>, reveal: Option<bool>| {
                let response = signaler
                    .error_response(
                        message.as_deref().unwrap_or_default(),
                        reveal.unwrap_or(default_reveal),
                    )
                    .map_err(signal_error)?;
                die_sink.commit(response).map_err(signal_error)?;
                Err::<Value, _>(signaled())
            },
        );

        let profile = context.profile.clone();
        env.add_function("endpoint_url", move |identifier: String| {
            Value::from_safe_string(helpers::endpoint_url(&profile, &identifier))
        });

        self.add_request_functions(&mut env, &context.profile);
        env
    }

    fn add_request_functions(&self, env: &mut Environment<'static>, profile: &EndpointProfile) {
        let binding = NonceBinding {
            issuer: self.nonces.clone(),
            profile: profile.clone(),
        };

        let b = binding.clone();
        env.add_function("nonce", move || b.token().map(Value::from));

        let b = binding.clone();
        env.add_function("nonce_field", move || {
            let token = b.token()?;
            Ok::<_, minijinja::Error>(Value::from_safe_string(helpers::nonce_field(
                &b.profile, &token,
            )))
        });

        let b = binding.clone();
        env.add_function("hx_vals_with_nonce", move || {
            let token = b.token()?;
            Ok::<_, minijinja::Error>(Value::from_safe_string(helpers::hx_vals_with_nonce(
                &b.profile, &token,
            )))
        });

        let b = binding.clone();
        env.add_function("hx_headers_with_nonce", move || {
            let token = b.token()?;
            Ok::<_, minijinja::Error>(Value::from_safe_string(helpers::hx_headers_with_nonce(
                &b.profile, &token,
            )))
        });

        let b = binding.clone();
        env.add_function(
            "hx_get",
            move |identifier: String, target: Option<String>, swap: Option<String>| {
                Value::from_safe_string(helpers::hx_get(
                    &helpers::endpoint_url(&b.profile, &identifier),
                    target.as_deref().unwrap_or(DEFAULT_TARGET),
                    swap.as_deref().unwrap_or(DEFAULT_SWAP),
                ))
            },
        );

        let b = binding;
        env.add_function(
            "hx_post",
            move |identifier: String, target: Option<String>, swap: Option<String>| {
                let token = b.token()?;
                let attrs = helpers::hx_post(
                    &helpers::endpoint_url(&b.profile, &identifier),
                    target.as_deref().unwrap_or(DEFAULT_TARGET),
                    swap.as_deref().unwrap_or(DEFAULT_SWAP),
                );
                Ok::<_, minijinja::Error>(Value::from_safe_string(format!(
                    "{attrs} {}",
                    helpers::hx_vals_with_nonce(&b.profile, &token)
                )))
            },
        );
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn execute(
        &self,
        template: &ResolvedTemplate,
        context: &TemplateContext,
        sink: &ResponseSink,
    ) -> Result<(), TemplateError> {
        let source = std::fs::read_to_string(&template.absolute_path).map_err(|source| {
            TemplateError::Read {
                path: template.absolute_path.clone(),
                source,
            }
        })?;

        let name = template_name(template);
        let mut env = self.environment(template, context, sink);
        env.add_template_owned(name.clone(), source)?;

        tracing::debug!(template = %name, mode = %context.mode, "executing template");

        let rendered = env
            .get_template(&name)
            .and_then(|tmpl| tmpl.render(context.variables()));

        match rendered {
            Ok(body) => {
                sink.write(&body)?;
                Ok(())
            }
            Err(_) if sink.is_committed() => {
                tracing::debug!(template = %name, "template signaled a terminal response");
                Ok(())
            }
            Err(err) => match err.source().and_then(|s| s.downcast_ref::<SignalError>()) {
                Some(signal) => Err(TemplateError::Signal(signal.clone())),
                None => Err(TemplateError::Render(err)),
            },
        }
    }
}

/// Nonce issuer bound to the matched endpoint generation
#[derive(Debug, Clone)]
struct NonceBinding {
    issuer: Option<Arc<dyn NonceIssuer>>,
    profile: EndpointProfile,
}

impl NonceBinding {
    fn token(&self) -> Result<String, minijinja::Error> {
        self.issuer
            .as_ref()
            .map(|issuer| issuer.issue(&self.profile.nonce_action))
            .ok_or_else(|| {
                minijinja::Error::new(ErrorKind::InvalidOperation, "no nonce issuer configured")
            })
    }
}

fn template_name(template: &ResolvedTemplate) -> String {
    template
        .absolute_path
        .strip_prefix(&template.base_dir)
        .unwrap_or(&template.absolute_path)
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_status(status: &str) -> Result<PayloadStatus, minijinja::Error> {
    serde_json::from_value(serde_json::Value::String(status.to_string())).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("unknown response status '{status}'"),
        )
    })
}

fn signal_error(err: SignalError) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

fn signaled() -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, SIGNALED)
}
