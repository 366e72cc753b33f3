//! Mount Router
//!
//! Holds the provisioned mounts in declaration order and routes each request
//! to the first mount whose prefix matches, then to the principal's user
//! context within that mount.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::{body::Body, http::Request, response::Response};
use serde::Serialize;

use crate::engine::EngineFactory;
use crate::error::Result;
use crate::mount::MountSpec;
use crate::rules::Access;
use crate::user::CompiledUser;
use crate::uri::{canonical_path, CanonicalPath};

/// A provisioned mount
#[derive(Debug, Clone)]
pub struct Mount {
    base_prefix: String,
    default_user: CompiledUser,
    named_users: HashMap<String, CompiledUser>,
}

impl Mount {
    /// Compile every user of a declared mount
    pub fn provision(spec: &MountSpec, factory: &dyn EngineFactory) -> Result<Self> {
        let default_user = spec.default_user.compile(&spec.base_prefix, factory)?;

        let mut named_users = HashMap::with_capacity(spec.named_users.len());
        for (name, user) in &spec.named_users {
            named_users.insert(name.clone(), user.compile(&spec.base_prefix, factory)?);
        }

        Ok(Self {
            base_prefix: spec.base_prefix.clone(),
            default_user,
            named_users,
        })
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    pub fn default_user(&self) -> &CompiledUser {
        &self.default_user
    }

    /// Names of principals with their own settings, sorted
    pub fn user_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.named_users.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether this mount serves `path`. The root mount serves everything.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(self.base_prefix.as_str())
    }

    /// The principal's own user context, falling back to the default user
    pub fn user_for(&self, principal: Option<&str>) -> &CompiledUser {
        principal
            .and_then(|name| self.named_users.get(name))
            .unwrap_or(&self.default_user)
    }

    fn is_named(&self, principal: Option<&str>) -> bool {
        principal.is_some_and(|name| self.named_users.contains_key(name))
    }
}

/// Outcome of offering a request to the router
#[derive(Debug)]
pub enum Routed {
    /// A mount served the request
    Handled(Response),
    /// No mount matched; the request goes on to the next stage unchanged
    Pass(Request<Body>),
}

/// Where a request would go and whether it would be allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Canonical path the decision was made for
    pub path: String,
    /// Position of the mount in declaration order
    pub mount_index: usize,
    pub base_prefix: String,
    /// Named user that matched, `None` for the default user
    pub user: Option<String>,
    pub scope: PathBuf,
    pub access: Access,
    pub allowed: bool,
}

/// Ordered set of provisioned mounts
#[derive(Debug, Clone, Default)]
pub struct MountRouter {
    mounts: Vec<Mount>,
}

impl MountRouter {
    /// Compile every declared mount. One failure rejects the whole set.
    pub fn provision(specs: &[MountSpec], factory: &dyn EngineFactory) -> Result<Self> {
        let mut mounts = Vec::with_capacity(specs.len());

        for spec in specs {
            let mount = Mount::provision(spec, factory)?;
            tracing::info!(
                "Mount {:?} -> {:?} ({} named user(s))",
                display_prefix(mount.base_prefix()),
                mount.default_user().scope(),
                mount.named_users.len()
            );
            mounts.push(mount);
        }

        Ok(Self { mounts })
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// First mount in declaration order whose prefix matches `path`
    pub fn find(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.matches(path))
    }

    /// User context that would serve `path` for `principal`
    pub fn resolve(&self, path: &str, principal: Option<&str>) -> Option<&CompiledUser> {
        self.find(path).map(|m| m.user_for(anonymous_if_empty(principal)))
    }

    /// Route a request, delegating it to the selected user's engine.
    ///
    /// The canonical path used for mount selection is attached to the
    /// request so the user and engine act on the same path.
    pub async fn serve(&self, principal: Option<&str>, mut request: Request<Body>) -> Routed {
        let path = canonical_path(request.uri().path());

        match self.resolve(&path, principal) {
            Some(user) => {
                request.extensions_mut().insert(CanonicalPath(path));
                Routed::Handled(user.handle(request).await)
            }
            None => {
                tracing::trace!("No mount for {}", path);
                Routed::Pass(request)
            }
        }
    }

    /// Describe the routing and authorization decision for a raw request path
    pub fn explain(&self, raw_path: &str, principal: Option<&str>, access: Access) -> Option<Decision> {
        let path = canonical_path(raw_path);
        let principal = anonymous_if_empty(principal);
        let (index, mount) = self.mounts.iter().enumerate().find(|(_, m)| m.matches(&path))?;
        let user = mount.user_for(principal);

        let allowed = user.allows(&path, access);

        Some(Decision {
            path,
            mount_index: index,
            base_prefix: mount.base_prefix().to_string(),
            user: principal
                .filter(|_| mount.is_named(principal))
                .map(str::to_string),
            scope: user.scope().to_path_buf(),
            access,
            allowed,
        })
    }
}

fn anonymous_if_empty(principal: Option<&str>) -> Option<&str> {
    principal.filter(|p| !p.is_empty())
}

/// Prefix as shown to operators (`/` for the root mount)
pub fn display_prefix(prefix: &str) -> &str {
    if prefix.is_empty() {
        "/"
    } else {
        prefix
    }
}
