//! User Contexts
//!
//! A [`UserSpec`] is what the Davfile declares for one principal (or for
//! the mount's default user). Provisioning turns it into a
//! [`CompiledUser`]: rules compiled, scope checked, engine bound.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::engine::{Engine, EngineFactory};
use crate::error::{Error, Result};
use crate::rules::{authorize, Access, CompiledMatcher, RuleSpec};
use crate::uri::request_path;

/// Declared settings for one user context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    /// Root directory this user is confined to
    pub scope: String,

    /// Whether path-changing methods are permitted at all
    pub allow_modify: bool,

    /// Rules in declaration order
    pub rules: Vec<RuleSpec>,
}

impl Default for UserSpec {
    fn default() -> Self {
        Self {
            scope: ".".to_string(),
            allow_modify: true,
            rules: Vec::new(),
        }
    }
}

impl UserSpec {
    /// Compile rules, validate the scope and bind an engine mounted at `base_prefix`
    pub fn compile(&self, base_prefix: &str, factory: &dyn EngineFactory) -> Result<CompiledUser> {
        let scope = resolve_scope(&self.scope)?;

        let matchers = self
            .rules
            .iter()
            .map(RuleSpec::compile)
            .collect::<Result<Vec<_>>>()?;

        let delegate = factory.bind(&scope, base_prefix);

        Ok(CompiledUser {
            scope,
            allow_modify: self.allow_modify,
            matchers,
            delegate,
        })
    }
}

fn resolve_scope(scope: &str) -> Result<PathBuf> {
    let scope_err = |reason: String| Error::Scope {
        scope: scope.to_string(),
        reason,
    };

    if scope.trim().is_empty() {
        return Err(scope_err("scope cannot be empty".into()));
    }

    let path = Path::new(scope);
    let meta = std::fs::metadata(path).map_err(|e| scope_err(e.to_string()))?;
    if !meta.is_dir() {
        return Err(scope_err("not a directory".into()));
    }

    path.canonicalize().map_err(|e| scope_err(e.to_string()))
}

/// A provisioned user: immutable and shared by every request it serves
#[derive(Clone)]
pub struct CompiledUser {
    scope: PathBuf,
    allow_modify: bool,
    matchers: Vec<CompiledMatcher>,
    delegate: Arc<dyn Engine>,
}

impl fmt::Debug for CompiledUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUser")
            .field("scope", &self.scope)
            .field("allow_modify", &self.allow_modify)
            .field("matchers", &self.matchers.len())
            .finish_non_exhaustive()
    }
}

impl CompiledUser {
    pub fn scope(&self) -> &Path {
        &self.scope
    }

    pub fn allow_modify(&self) -> bool {
        self.allow_modify
    }

    pub fn matchers(&self) -> &[CompiledMatcher] {
        &self.matchers
    }

    /// Check whether this user may perform `access` on `path`
    pub fn allows(&self, path: &str, access: Access) -> bool {
        authorize(&self.matchers, self.allow_modify, path, access)
    }

    /// Authorize the request and hand it to the bound engine
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let access = Access::from_method(request.method());
        let path = request_path(&request);

        if !self.allows(&path, access) {
            tracing::debug!(
                "Denied {} {} ({:?}) for scope {:?}",
                request.method(),
                path,
                access,
                self.scope
            );
            return StatusCode::FORBIDDEN.into_response();
        }

        self.delegate.handle(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FsEngineFactory;
    use axum::http::Method;
    use tempfile::tempdir;

    fn spec(scope: &Path, allow_modify: bool, rules: Vec<RuleSpec>) -> UserSpec {
        UserSpec {
            scope: scope.to_string_lossy().to_string(),
            allow_modify,
            rules,
        }
    }

    #[test]
    fn test_defaults() {
        let user = UserSpec::default();
        assert_eq!(user.scope, ".");
        assert!(user.allow_modify);
        assert!(user.rules.is_empty());
    }

    #[test]
    fn test_compile_keeps_rule_order() {
        let dir = tempdir().unwrap();
        let user = spec(
            dir.path(),
            true,
            vec![
                RuleSpec::pattern(false, ".*"),
                RuleSpec::literal(true, "/public"),
            ],
        )
        .compile("/dav", &FsEngineFactory)
        .unwrap();

        assert_eq!(user.matchers().len(), 2);
        assert!(!user.matchers()[0].is_allow());
        assert!(user.matchers()[1].is_allow());
        assert_eq!(user.scope(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_empty_scope_rejected() {
        let user = UserSpec {
            scope: String::new(),
            ..UserSpec::default()
        };
        let err = user.compile("", &FsEngineFactory).unwrap_err();
        assert!(matches!(err, Error::Scope { .. }));
    }

    #[test]
    fn test_missing_or_file_scope_rejected() {
        let dir = tempdir().unwrap();
        let missing = spec(&dir.path().join("nope"), true, vec![]);
        assert!(matches!(
            missing.compile("", &FsEngineFactory).unwrap_err(),
            Error::Scope { .. }
        ));

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();
        let not_dir = spec(&file, true, vec![]);
        assert!(matches!(
            not_dir.compile("", &FsEngineFactory).unwrap_err(),
            Error::Scope { .. }
        ));
    }

    #[test]
    fn test_bad_pattern_aborts_compile() {
        let dir = tempdir().unwrap();
        let user = spec(dir.path(), true, vec![RuleSpec::pattern(true, "[")]);
        assert!(matches!(
            user.compile("", &FsEngineFactory).unwrap_err(),
            Error::Pattern { .. }
        ));
    }

    #[tokio::test]
    async fn test_handle_denies_before_delegating() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"top secret").unwrap();
        let user = spec(dir.path(), false, vec![RuleSpec::literal(false, "/secret.txt")])
            .compile("", &FsEngineFactory)
            .unwrap();

        let req = Request::builder()
            .method(Method::GET)
            .uri("/secret.txt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(user.handle(req).await.status(), StatusCode::FORBIDDEN);

        for uri in ["//secret.txt", "/./secret.txt", "/%2fsecret.txt"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            assert_eq!(user.handle(req).await.status(), StatusCode::FORBIDDEN, "{}", uri);
        }

        let req = Request::builder()
            .method(Method::PUT)
            .uri("/new.txt")
            .body(Body::from("data"))
            .unwrap();
        assert_eq!(user.handle(req).await.status(), StatusCode::FORBIDDEN);
        assert!(!dir.path().join("new.txt").exists());
    }
}
