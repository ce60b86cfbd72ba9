//! Per-request collection of the nonce and inline content hashes that end up in
//! the `script-src` and `style-src` directives.
//!
//! A [`PolicyAccumulator`] is created for one request, written to while the page
//! renders, and handed to the response as a response part. The CSP middleware
//! ([`crate::csp`]) reads it back from the response extensions once rendering is done.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use axum::response::{IntoResponseParts, ResponseParts};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

use crate::digest;

/// Nonce size in bytes before encoding.
const NONCE_BYTES: usize = 16;

/// The fetch directives inline content can be allowlisted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Directive {
    Script,
    Style,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Script => "script-src",
            Directive::Style => "style-src",
        }
    }

    /// Template tag that produces an inline block for this directive.
    pub fn tag(&self) -> &'static str {
        match self {
            Directive::Script => "script",
            Directive::Style => "style",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directive {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "script" | "script-src" => Ok(Directive::Script),
            "style" | "style-src" => Ok(Directive::Style),
            other => Err(PolicyError::UnknownDirective(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("CSP nonce requested but nonce generation is disabled")]
    NonceDisabled,
    #[error("unsupported CSP directive `{0}`")]
    UnknownDirective(String),
}

#[derive(Debug, Clone, Default)]
pub struct PolicyAccumulator {
    nonce_enabled: bool,
    nonce: Option<String>,
    nonce_usages: Vec<Directive>,
    script_hashes: Vec<String>,
    style_hashes: Vec<String>,
}

impl PolicyAccumulator {
    pub fn new(nonce_enabled: bool) -> Self {
        Self {
            nonce_enabled,
            ..Self::default()
        }
    }

    /// Returns this request's nonce, generating it on first use.
    ///
    /// Every call returns the same token whatever `usage` is; the usage is only
    /// remembered so the header carries the nonce in the directives that need it.
    pub fn nonce(&mut self, usage: Directive) -> Result<String, PolicyError> {
        if !self.nonce_enabled {
            return Err(PolicyError::NonceDisabled);
        }

        if !self.nonce_usages.contains(&usage) {
            self.nonce_usages.push(usage);
        }

        let nonce = self.nonce.get_or_insert_with(generate_nonce);
        Ok(nonce.clone())
    }

    pub fn add_script(&mut self, content: &str) {
        self.script_hashes.push(digest::compute_for_script(content));
    }

    pub fn add_style(&mut self, content: &str) {
        self.style_hashes.push(digest::compute_for_style(content));
    }

    pub fn add(&mut self, directive: Directive, content: &str) {
        match directive {
            Directive::Script => self.add_script(content),
            Directive::Style => self.add_style(content),
        }
    }

    /// Append an already computed digest (`sha256-...`).
    pub fn add_sha(&mut self, directive: Directive, digest: impl Into<String>) {
        let digest = digest.into();
        match directive {
            Directive::Script => self.script_hashes.push(digest),
            Directive::Style => self.style_hashes.push(digest),
        }
    }

    pub fn nonce_value(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    pub fn nonce_usages(&self) -> &[Directive] {
        &self.nonce_usages
    }

    pub fn script_hashes(&self) -> &[String] {
        &self.script_hashes
    }

    pub fn style_hashes(&self) -> &[String] {
        &self.style_hashes
    }

    pub fn hashes(&self, directive: Directive) -> &[String] {
        match directive {
            Directive::Script => &self.script_hashes,
            Directive::Style => &self.style_hashes,
        }
    }
}

impl IntoResponseParts for PolicyAccumulator {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
