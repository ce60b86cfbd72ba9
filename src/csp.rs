// Content Security Policy header assembly.
// Handlers return their PolicyAccumulator as a response part; this middleware
// turns it into the header once the body has been rendered.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, Response},
    middleware::Next,
};

use crate::config::Config;
use crate::policy::{Directive, PolicyAccumulator};
use crate::AppState;

/// Sent when the assembled policy is not a valid header value; blocks everything.
pub const FALLBACK_POLICY: &str = "default-src 'none'";

/// CSP middleware that adds the policy header to every response
pub async fn csp_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let mut response = next.run(request).await;

    let name = if state.config.report_only {
        header::CONTENT_SECURITY_POLICY_REPORT_ONLY
    } else {
        header::CONTENT_SECURITY_POLICY
    };

    if response.headers().contains_key(&name) {
        return response;
    }

    let value = header_value(&state.config, response.extensions().get::<PolicyAccumulator>());
    response.headers_mut().insert(name, value);

    response
}

/// The policy as a header value, or [`FALLBACK_POLICY`] if it cannot be encoded.
pub fn header_value(config: &Config, policy: Option<&PolicyAccumulator>) -> HeaderValue {
    let csp_value = build_policy(config, policy);
    match HeaderValue::from_str(&csp_value) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Invalid CSP header value {:?}: {}", csp_value, e);
            HeaderValue::from_static(FALLBACK_POLICY)
        }
    }
}

/// Build the header value.
/// - script-src / style-src: 'self' plus this request's nonce and inline hashes
/// - object-src: block plugins
/// - base-uri: prevent base tag injection
/// - frame-ancestors: prevent clickjacking
/// - form-action: only same-origin form posts
pub fn build_policy(config: &Config, policy: Option<&PolicyAccumulator>) -> String {
    format!(
        "default-src 'self'; \
         script-src {}; \
         style-src {}; \
         object-src 'none'; \
         base-uri 'self'; \
         frame-ancestors 'none'; \
         form-action 'self'; \
         report-uri {}",
        source_list(Directive::Script, policy),
        source_list(Directive::Style, policy),
        config.report_uri
    )
}

fn source_list(directive: Directive, policy: Option<&PolicyAccumulator>) -> String {
    let mut sources = vec!["'self'".to_string()];

    if let Some(policy) = policy {
        if let Some(nonce) = policy.nonce_value() {
            if policy.nonce_usages().contains(&directive) {
                sources.push(format!("'nonce-{}'", nonce));
            }
        }
        sources.extend(policy.hashes(directive).iter().map(|h| format!("'{}'", h)));
    }

    sources.join(" ")
}
