//! Protocol Engine
//!
//! The file-serving engine a user's requests are delegated to once they
//! have been routed and authorized. One engine instance is bound per user
//! at provisioning time and shared by every request for that user.

mod fs;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};

pub use fs::{FsEngine, FsEngineFactory};

/// A handler serving a filesystem rooted at a scope directory
#[async_trait]
pub trait Engine: Send + Sync {
    /// Serve one request. Authorization has already been checked against
    /// [`request_path`](crate::uri::request_path), which is the path to serve.
    async fn handle(&self, request: Request<Body>) -> Response;
}

/// Builds engines bound to a scope and mounted at a URL prefix
pub trait EngineFactory: Send + Sync {
    fn bind(&self, scope: &Path, url_prefix: &str) -> Arc<dyn Engine>;
}
