//! HTTP Server
//!
//! Every request goes through one fallback handler: pick up the upstream
//! principal, offer the request to the mount router, and answer 404 when no
//! mount claims it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::router::{MountRouter, Routed};

/// Shared application state
pub struct AppState {
    /// Provisioned mounts, read-only for the server's lifetime
    pub router: Arc<MountRouter>,
    /// Header carrying the authenticated principal
    pub principal_header: HeaderName,
}

/// WolfDAV HTTP server
pub struct DavServer {
    bind_address: String,
    state: Arc<AppState>,
}

impl DavServer {
    /// Create a new server over already provisioned mounts
    pub fn new(bind_address: String, principal_header: HeaderName, router: Arc<MountRouter>) -> Self {
        let state = Arc::new(AppState {
            router,
            principal_header,
        });

        Self {
            bind_address,
            state,
        }
    }

    /// Create the axum router
    pub fn create_router(state: Arc<AppState>) -> Router {
        Router::new()
            .fallback(handle_request)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server and run until Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let app = Self::create_router(Arc::clone(&self.state));

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!("WebDAV listening on {}", self.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn handle_request(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let principal = principal_from(request.headers(), &state.principal_header);

    match state.router.serve(principal.as_deref(), request).await {
        Routed::Handled(response) => response,
        Routed::Pass(request) => next_stage(request),
    }
}

/// Read the principal name set by the authenticating proxy
fn principal_from(headers: &HeaderMap, header: &HeaderName) -> Option<String> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// What runs after the router declines a request
fn next_stage(request: Request<Body>) -> Response {
    tracing::debug!("No mount for {} {}", request.method(), request.uri().path());
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::parse_davfile;
    use crate::engine::FsEngineFactory;
    use axum::http::Method;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct Fixture {
        _root: TempDir,
        app: Router,
    }

    /// Shared tree for everyone, a private tree for alice
    fn fixture() -> Fixture {
        let root = tempdir().unwrap();
        let shared = root.path().join("shared");
        let alice = root.path().join("alice");
        std::fs::create_dir_all(shared.join("public")).unwrap();
        std::fs::create_dir(shared.join("private")).unwrap();
        std::fs::write(shared.join("private/x"), b"pv").unwrap();
        std::fs::create_dir(&alice).unwrap();
        std::fs::write(shared.join("public/readme.txt"), b"hello").unwrap();
        std::fs::write(shared.join("secret.txt"), b"classified").unwrap();
        std::fs::write(shared.join(".env"), b"TOKEN=1").unwrap();

        let davfile = format!(
            "webdav /dav {{\n\
             \x20 scope {shared}\n\
             \x20 modify false\n\
             \x20 block dotfiles\n\
             \x20 block /dav/secret.txt\n\
             \x20 block_r ^/dav/private\n\
             \x20 alice:\n\
             \x20 scope {alice}\n\
             \x20 modify\n\
             }}\n\
             webdav \"/my files\" {{\n\
             \x20 scope {shared}\n\
             }}\n",
            shared = shared.display(),
            alice = alice.display()
        );
        let specs = parse_davfile(&davfile).unwrap();
        let router = MountRouter::provision(&specs, &FsEngineFactory).unwrap();

        let state = Arc::new(AppState {
            router: Arc::new(router),
            principal_header: HeaderName::from_static("x-remote-user"),
        });

        Fixture {
            _root: root,
            app: DavServer::create_router(state),
        }
    }

    fn request(method: Method, uri: &str, user: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-Remote-User", user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn status(app: &Router, req: Request<Body>) -> StatusCode {
        app.clone().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_not_found() {
        let f = fixture();
        let req = request(Method::GET, "/other/file", None, "");
        assert_eq!(status(&f.app, req).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_read_rules() {
        let f = fixture();

        let resp = f
            .app
            .clone()
            .oneshot(request(Method::GET, "/dav/public/readme.txt", None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let req = request(Method::GET, "/dav/secret.txt", None, "");
        assert_eq!(status(&f.app, req).await, StatusCode::FORBIDDEN);

        let req = request(Method::GET, "/dav/.env", None, "");
        assert_eq!(status(&f.app, req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rules_see_the_served_path() {
        let f = fixture();

        for uri in [
            "/dav//secret.txt",
            "/dav/./secret.txt",
            "/dav/public/../secret.txt",
            "/dav/%73ecret.txt",
            "/dav/private/x",
            "/dav//private/x",
            "/dav/%2fprivate/x",
            "/dav/.//private/x",
            "/dav/%2e%2fenv/../.env",
        ] {
            let req = request(Method::GET, uri, None, "");
            assert_eq!(status(&f.app, req).await, StatusCode::FORBIDDEN, "{}", uri);
        }

        let req = request(Method::GET, "/dav//public/./readme.txt", None, "");
        assert_eq!(status(&f.app, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_encoded_mount_prefix() {
        let f = fixture();

        let resp = f
            .app
            .clone()
            .oneshot(request(Method::GET, "/my%20files/public/readme.txt", None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let req = request(Method::GET, "/my%20files/private/x", None, "");
        assert_eq!(status(&f.app, req).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_anonymous_cannot_write() {
        let f = fixture();
        let req = request(Method::PUT, "/dav/public/new.txt", None, "data");
        assert_eq!(status(&f.app, req).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_named_user_gets_own_scope() {
        let f = fixture();

        let req = request(Method::PUT, "/dav/notes.txt", Some("alice"), "mine");
        assert_eq!(status(&f.app, req).await, StatusCode::CREATED);
        assert_eq!(
            std::fs::read(f._root.path().join("alice/notes.txt")).unwrap(),
            b"mine"
        );

        // alice does not see the shared tree
        let req = request(Method::GET, "/dav/public/readme.txt", Some("alice"), "");
        assert_eq!(status(&f.app, req).await, StatusCode::NOT_FOUND);

        // an unknown principal falls back to the default user
        let req = request(Method::GET, "/dav/public/readme.txt", Some("eve"), "");
        assert_eq!(status(&f.app, req).await, StatusCode::OK);
    }

    #[test]
    fn test_principal_from_headers() {
        let name = HeaderName::from_static("x-remote-user");
        let mut headers = HeaderMap::new();
        assert_eq!(principal_from(&headers, &name), None);

        headers.insert(name.clone(), "  ".parse().unwrap());
        assert_eq!(principal_from(&headers, &name), None);

        headers.insert(name.clone(), "alice".parse().unwrap());
        assert_eq!(principal_from(&headers, &name).as_deref(), Some("alice"));
    }
}
