//! Inline-block templates with CSP hash binding.
//!
//! Page sources are plain HTML with three constructs:
//!
//! ```text
//! {{ name }}                         interpolation, HTML-escaped
//! {% script %} ... {% endscript %}   inline script block
//! {% style %} ... {% endstyle %}     inline style block
//! {% nonce script %}                 the request's nonce, for `script-src`
//! {% nonce style %}                  the request's nonce, for `style-src`
//! ```
//!
//! [`Template::compile`] looks at every inline block once. A block without
//! interpolation is hashed right there and rendering only registers the
//! precomputed digest. A block that interpolates is rendered into a buffer on
//! every request, hashed from that buffer, then written out, so the digest
//! always covers the bytes the client receives.

use std::collections::HashMap;

use crate::digest;
use crate::policy::{Directive, PolicyAccumulator, PolicyError};

pub type Vars = HashMap<String, String>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unsupported template directive `{0}`")]
    UnsupportedDirective(String),
    #[error("unterminated `{delimiter}` at byte {offset}")]
    Unterminated { delimiter: &'static str, offset: usize },
    #[error("empty or invalid expression `{0}`")]
    InvalidExpression(String),
    #[error("`{{% {0} %}}` block is never closed")]
    UnclosedBlock(&'static str),
    #[error("`{{% {0} %}}` cannot appear inside an inline block")]
    NestedBlock(String),
    #[error("`{{% {0} %}}` without a matching opening block")]
    UnexpectedEnd(String),
    #[error("undefined template variable `{0}`")]
    UndefinedVariable(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

/// How a block's digest reaches the accumulator, decided at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashBinding {
    Static { body: String, digest: String },
    Dynamic { segments: Vec<Segment> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineBlock {
    pub directive: Directive,
    pub binding: HashBinding,
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable(String),
    Inline(InlineBlock),
    Nonce(Directive),
}

#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

enum Token<'a> {
    Text(&'a str),
    Expr(&'a str),
    Tag(&'a str),
}

impl Template {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut open: Option<(Directive, Vec<Segment>)> = None;

        for token in tokenize(source)? {
            match token {
                Token::Text(text) => match open.as_mut() {
                    Some((_, segments)) => segments.push(Segment::Literal(text.to_string())),
                    None => nodes.push(Node::Text(text.to_string())),
                },
                Token::Expr(name) => match open.as_mut() {
                    Some((_, segments)) => segments.push(Segment::Variable(name.to_string())),
                    None => nodes.push(Node::Variable(name.to_string())),
                },
                Token::Tag(name) => match (open.take(), name) {
                    (None, "script") => open = Some((Directive::Script, Vec::new())),
                    (None, "style") => open = Some((Directive::Style, Vec::new())),
                    (None, "endscript" | "endstyle") => {
                        return Err(TemplateError::UnexpectedEnd(name.to_string()))
                    }
                    (Some((directive, segments)), end)
                        if end.strip_prefix("end") == Some(directive.tag()) =>
                    {
                        nodes.push(Node::Inline(InlineBlock::bind(directive, segments)));
                    }
                    (Some(_), "script" | "style" | "endscript" | "endstyle") => {
                        return Err(TemplateError::NestedBlock(name.to_string()))
                    }
                    (Some(_), other) => {
                        parse_nonce_tag(other)?;
                        return Err(TemplateError::NestedBlock(other.to_string()));
                    }
                    (None, other) => nodes.push(Node::Nonce(parse_nonce_tag(other)?)),
                },
            }
        }

        if let Some((directive, _)) = open {
            return Err(TemplateError::UnclosedBlock(directive.tag()));
        }

        Ok(Self { nodes })
    }

    pub fn inline_blocks(&self) -> impl Iterator<Item = &InlineBlock> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Inline(block) => Some(block),
            _ => None,
        })
    }

    pub fn render(&self, vars: &Vars, policy: &mut PolicyAccumulator) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Variable(name) => out.push_str(&escape_html(lookup(vars, name)?)),
                Node::Inline(block) => block.render_into(&mut out, vars, policy)?,
                Node::Nonce(usage) => out.push_str(&policy.nonce(*usage)?),
            }
        }
        Ok(out)
    }
}

impl InlineBlock {
    fn bind(directive: Directive, segments: Vec<Segment>) -> Self {
        let is_static = segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)));

        let binding = if is_static {
            let body: String = segments
                .into_iter()
                .filter_map(|segment| match segment {
                    Segment::Literal(text) => Some(text),
                    Segment::Variable(_) => None,
                })
                .collect();
            let digest = digest::compute_for(directive, &body);
            HashBinding::Static { body, digest }
        } else {
            HashBinding::Dynamic { segments }
        };

        Self { directive, binding }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.binding, HashBinding::Static { .. })
    }

    fn render_into(
        &self,
        out: &mut String,
        vars: &Vars,
        policy: &mut PolicyAccumulator,
    ) -> Result<(), TemplateError> {
        let tag = self.directive.tag();
        match &self.binding {
            HashBinding::Static { body, digest } => {
                policy.add_sha(self.directive, digest.clone());
                push_element(out, tag, body);
            }
            HashBinding::Dynamic { segments } => {
                let mut buffer = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => buffer.push_str(text),
                        Segment::Variable(name) => {
                            buffer.push_str(&escape_inline(lookup(vars, name)?))
                        }
                    }
                }
                policy.add(self.directive, &buffer);
                push_element(out, tag, &buffer);
            }
        }
        Ok(())
    }
}

fn push_element(out: &mut String, tag: &str, body: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(body);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// `nonce <usage>`, where usage names a directive (`script`, `style-src`, ...).
fn parse_nonce_tag(tag: &str) -> Result<Directive, TemplateError> {
    let unsupported = || TemplateError::UnsupportedDirective(tag.to_string());
    let mut words = tag.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("nonce"), Some(usage), None) => usage.parse().map_err(|_| unsupported()),
        _ => Err(unsupported()),
    }
}

fn lookup<'v>(vars: &'v Vars, name: &str) -> Result<&'v str, TemplateError> {
    vars.get(name)
        .map(String::as_str)
        .ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    loop {
        let next = [("{{", "}}"), ("{%", "%}")]
            .into_iter()
            .filter_map(|(open, close)| rest.find(open).map(|at| (at, open, close)))
            .min_by_key(|(at, _, _)| *at);

        let Some((at, open, close)) = next else {
            if !rest.is_empty() {
                tokens.push(Token::Text(rest));
            }
            return Ok(tokens);
        };

        if at > 0 {
            tokens.push(Token::Text(&rest[..at]));
        }

        let inner_start = at + open.len();
        let inner_len = rest[inner_start..]
            .find(close)
            .ok_or(TemplateError::Unterminated {
                delimiter: open,
                offset: offset + at,
            })?;
        let inner = rest[inner_start..inner_start + inner_len].trim();

        if open == "{%" && inner.is_empty() {
            return Err(TemplateError::UnsupportedDirective(String::new()));
        }
        if open == "{{" && (inner.is_empty() || inner.contains(char::is_whitespace)) {
            return Err(TemplateError::InvalidExpression(inner.to_string()));
        }

        tokens.push(if open == "{{" {
            Token::Expr(inner)
        } else {
            Token::Tag(inner)
        });

        let consumed = inner_start + inner_len + close.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

// Raw text elements end at the first `</`, and `<!--` switches <script> into its
// escaped state where the closing tag may no longer match.
fn escape_inline(value: &str) -> String {
    value.replace("<!--", "<\\!--").replace("</", "<\\/")
}
