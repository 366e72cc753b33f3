//! WolfDAV - Multi-tenant WebDAV Access Control
//!
//! WolfDAV sits in front of a WebDAV file engine and decides, for every
//! request, which mount serves it, which user context applies, and whether
//! the request is allowed at all.
//!
//! # Architecture
//!
//! Mounts are declared in a Davfile. Parsing produces plain [`MountSpec`]
//! values; provisioning compiles them into a [`MountRouter`] that is never
//! modified afterwards and is shared by every request task.
//!
//! # Features
//!
//! - Several mounts per server, matched by URL prefix in declaration order
//! - Per-principal scope, modify flag and allow/block rules
//! - Literal path rules, regular expression rules and a `dotfiles` shorthand
//! - Pluggable protocol engine with a built-in local filesystem engine

pub mod config;
pub mod error;
pub mod rules;
pub mod user;
pub mod mount;
pub mod directive;
pub mod engine;
pub mod router;
pub mod uri;
pub mod api;

pub use config::WolfDavConfig;
pub use error::{Error, Result};
pub use mount::MountSpec;
pub use router::{MountRouter, Routed};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfDavConfig;
    pub use crate::error::{Error, Result};
    pub use crate::directive::parse_davfile;
    pub use crate::engine::{Engine, EngineFactory, FsEngineFactory};
    pub use crate::mount::MountSpec;
    pub use crate::router::{Decision, MountRouter, Routed};
    pub use crate::rules::{Access, RuleSpec};
    pub use crate::user::{CompiledUser, UserSpec};
}
