// CSP content digests for inline <script>/<style> bodies.
// Both entry points hash the same way; they exist so call sites name their directive.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

use crate::policy::Directive;

/// Digest an inline script body, e.g. `sha256-CihokcEcBW4atb/CW/XWsvWwbTjqwQlE9nj9ii5ww5M=`.
pub fn compute_for_script(text: &str) -> String {
    compute(text)
}

/// Digest an inline style body.
pub fn compute_for_style(text: &str) -> String {
    compute(text)
}

pub fn compute_for(directive: Directive, text: &str) -> String {
    match directive {
        Directive::Script => compute_for_script(text),
        Directive::Style => compute_for_style(text),
    }
}

fn compute(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    format!("sha256-{}", STANDARD.encode(hash))
}
