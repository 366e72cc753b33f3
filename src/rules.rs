//! Access Rules
//!
//! Declarative allow/block rules, their compiled matchers, and the
//! authorization check every request goes through before it reaches
//! the protocol engine.

use axum::http::Method;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Reserved pattern alias for "any path segment starting with a dot"
pub const DOTFILES: &str = "dotfiles";

/// Pattern the dotfiles alias expands to (substring search, not anchored)
const DOTFILES_PATTERN: &str = r"/\..+";

/// What a rule is keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// Request path equals this path or lies beneath it
    Literal(String),
    /// Regular expression searched anywhere in the request path
    Pattern(String),
}

/// A single declarative allow/block rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub allow: bool,
    pub target: RuleTarget,
}

impl RuleSpec {
    pub fn literal(allow: bool, path: impl Into<String>) -> Self {
        Self {
            allow,
            target: RuleTarget::Literal(path.into()),
        }
    }

    pub fn pattern(allow: bool, source: impl Into<String>) -> Self {
        Self {
            allow,
            target: RuleTarget::Pattern(source.into()),
        }
    }

    /// Compile into an executable matcher
    pub fn compile(&self) -> Result<CompiledMatcher> {
        let predicate = match &self.target {
            RuleTarget::Literal(path) => Predicate::Literal(path.clone()),
            RuleTarget::Pattern(source) => Predicate::Pattern(compile_pattern(source)?),
        };

        Ok(CompiledMatcher {
            allow: self.allow,
            predicate,
        })
    }
}

/// Compile a pattern source, expanding the dotfiles alias
pub fn compile_pattern(source: &str) -> Result<Regex> {
    let expr = if source == DOTFILES { DOTFILES_PATTERN } else { source };

    Regex::new(expr).map_err(|e| Error::Pattern {
        pattern: source.to_string(),
        source: e,
    })
}

#[derive(Debug, Clone)]
enum Predicate {
    Literal(String),
    Pattern(Regex),
}

/// A rule ready to be evaluated against request paths
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    allow: bool,
    predicate: Predicate,
}

impl CompiledMatcher {
    pub fn is_allow(&self) -> bool {
        self.allow
    }

    /// Check whether this rule applies to the request path
    pub fn matches(&self, path: &str) -> bool {
        match &self.predicate {
            Predicate::Literal(prefix) => path.starts_with(prefix.as_str()),
            Predicate::Pattern(re) => re.is_match(path),
        }
    }
}

/// Whether a request only reads or may change the served tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// Classify a request method.
    ///
    /// Only GET, HEAD, OPTIONS and PROPFIND leave the tree untouched;
    /// everything else counts as a modification.
    pub fn from_method(method: &Method) -> Self {
        match method.as_str() {
            "GET" | "HEAD" | "OPTIONS" | "PROPFIND" => Access::Read,
            _ => Access::Write,
        }
    }
}

/// Decide whether `path` may be accessed.
///
/// Writes are refused outright when `allow_modify` is off, whatever the
/// rules say. Otherwise the last matching rule wins and an unmatched path
/// is allowed.
pub fn authorize(
    matchers: &[CompiledMatcher],
    allow_modify: bool,
    path: &str,
    access: Access,
) -> bool {
    if access == Access::Write && !allow_modify {
        return false;
    }

    matchers
        .iter()
        .rev()
        .find(|m| m.matches(path))
        .map(|m| m.allow)
        .unwrap_or(true)
}
