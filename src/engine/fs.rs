//! Local filesystem engine
//!
//! A small WebDAV-class handler that serves one scope directory under a
//! URL prefix. Supports OPTIONS, GET, HEAD, PUT, DELETE, MKCOL and
//! PROPFIND (depth 0 and 1). Locking, COPY and MOVE are not implemented.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::{Engine, EngineFactory};
use crate::uri::request_path;

/// Largest request body accepted by PUT (512MB)
const MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, PUT, DELETE, MKCOL, PROPFIND";

/// Characters escaped inside a single href path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Builds [`FsEngine`]s for the built-in server
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEngineFactory;

impl EngineFactory for FsEngineFactory {
    fn bind(&self, scope: &Path, url_prefix: &str) -> Arc<dyn Engine> {
        Arc::new(FsEngine::new(scope.to_path_buf(), url_prefix.to_string()))
    }
}

/// Serves a directory tree rooted at `root`, mounted at `prefix`
#[derive(Debug, Clone)]
pub struct FsEngine {
    root: PathBuf,
    prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Zero,
    One,
}

impl FsEngine {
    pub fn new(root: PathBuf, prefix: String) -> Self {
        Self { root, prefix }
    }

    /// Map a canonical request path onto the scope directory
    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, StatusCode> {
        let relative = path
            .strip_prefix(self.prefix.as_str())
            .ok_or(StatusCode::NOT_FOUND)?;

        let mut target = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => target.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StatusCode::BAD_REQUEST);
                }
            }
        }

        Ok(target)
    }
}

#[async_trait]
impl Engine for FsEngine {
    async fn handle(&self, request: Request<Body>) -> Response {
        let path = request_path(&request);
        let target = match self.resolve(&path) {
            Ok(p) => p,
            Err(status) => return status.into_response(),
        };

        let method = request.method().clone();
        debug!("{} {} -> {:?}", method, path, target);

        match method.as_str() {
            "OPTIONS" => options(),
            "GET" => get_file(&target, true).await,
            "HEAD" => get_file(&target, false).await,
            "PUT" => put_file(&target, request.into_body()).await,
            "DELETE" => {
                if target == self.root {
                    return StatusCode::FORBIDDEN.into_response();
                }
                delete(&target).await
            }
            "MKCOL" => mkcol(&target).await,
            "PROPFIND" => {
                let depth = parse_depth(request.headers().get("Depth").and_then(|v| v.to_str().ok()));
                propfind(&target, &encode_href(&path), depth).await
            }
            _ => StatusCode::NOT_IMPLEMENTED.into_response(),
        }
    }
}

// ─── Methods ─────────────────────────────────────────────────────────────────

fn options() -> Response {
    (
        StatusCode::OK,
        [
            (header::ALLOW, ALLOWED_METHODS.to_string()),
            (header::HeaderName::from_static("dav"), "1".to_string()),
        ],
    )
        .into_response()
}

/// GET / HEAD on a file
async fn get_file(target: &Path, with_body: bool) -> Response {
    let meta = match tokio::fs::metadata(target).await {
        Ok(m) => m,
        Err(e) => return io_status(&e).into_response(),
    };

    if meta.is_dir() {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut headers = vec![(header::CONTENT_LENGTH, meta.len().to_string())];
    if let Ok(modified) = meta.modified() {
        headers.push((header::LAST_MODIFIED, http_date(modified)));
    }

    let body = if with_body {
        match tokio::fs::File::open(target).await {
            Ok(file) => Body::from_stream(ReaderStream::new(file)),
            Err(e) => return io_status(&e).into_response(),
        }
    } else {
        Body::empty()
    };

    let mut response = Response::new(body);
    for (name, value) in headers {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

async fn put_file(target: &Path, body: Body) -> Response {
    if !parent_exists(target).await {
        return StatusCode::CONFLICT.into_response();
    }

    let existed = match tokio::fs::metadata(target).await {
        Ok(m) if m.is_dir() => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
        Ok(_) => true,
        Err(_) => false,
    };

    let bytes = match axum::body::to_bytes(body, MAX_UPLOAD_SIZE).await {
        Ok(b) => b,
        Err(e) => {
            warn!("Failed to read upload body for {:?}: {}", target, e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let Err(e) = tokio::fs::write(target, &bytes).await {
        warn!("Failed to write {:?}: {}", target, e);
        return io_status(&e).into_response();
    }

    if existed {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

async fn delete(target: &Path) -> Response {
    let meta = match tokio::fs::metadata(target).await {
        Ok(m) => m,
        Err(e) => return io_status(&e).into_response(),
    };

    let result = if meta.is_dir() {
        tokio::fs::remove_dir_all(target).await
    } else {
        tokio::fs::remove_file(target).await
    };

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!("Failed to delete {:?}: {}", target, e);
            io_status(&e).into_response()
        }
    }
}

async fn mkcol(target: &Path) -> Response {
    if tokio::fs::metadata(target).await.is_ok() {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if !parent_exists(target).await {
        return StatusCode::CONFLICT.into_response();
    }

    match tokio::fs::create_dir(target).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => io_status(&e).into_response(),
    }
}

async fn propfind(target: &Path, href: &str, depth: Depth) -> Response {
    let meta = match tokio::fs::metadata(target).await {
        Ok(m) => m,
        Err(e) => return io_status(&e).into_response(),
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<D:multistatus xmlns:D=\"DAV:\">\n");

    let self_href = if meta.is_dir() && !href.ends_with('/') {
        format!("{}/", href)
    } else {
        href.to_string()
    };
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    push_response(&mut xml, &self_href, &name, &meta);

    if meta.is_dir() && depth == Depth::One {
        let mut entries = match tokio::fs::read_dir(target).await {
            Ok(rd) => rd,
            Err(e) => return io_status(&e).into_response(),
        };

        let mut children = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let child_name = entry.file_name().to_string_lossy().to_string();
                    match entry.metadata().await {
                        Ok(child_meta) => children.push((child_name, child_meta)),
                        Err(e) => debug!("Skipping {:?}: {}", entry.path(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => return io_status(&e).into_response(),
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        for (child_name, child_meta) in &children {
            let mut child_href = format!(
                "{}{}",
                self_href,
                utf8_percent_encode(child_name, SEGMENT)
            );
            if child_meta.is_dir() {
                child_href.push('/');
            }
            push_response(&mut xml, &child_href, child_name, child_meta);
        }
    }

    xml.push_str("</D:multistatus>");

    (
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml,
    )
        .into_response()
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn push_response(xml: &mut String, href: &str, name: &str, meta: &std::fs::Metadata) {
    xml.push_str("  <D:response>\n");
    xml.push_str(&format!("    <D:href>{}</D:href>\n", xml_escape(href)));
    xml.push_str("    <D:propstat>\n");
    xml.push_str("      <D:prop>\n");
    xml.push_str(&format!("        <D:displayname>{}</D:displayname>\n", xml_escape(name)));
    if meta.is_dir() {
        xml.push_str("        <D:resourcetype><D:collection/></D:resourcetype>\n");
    } else {
        xml.push_str("        <D:resourcetype/>\n");
        xml.push_str(&format!(
            "        <D:getcontentlength>{}</D:getcontentlength>\n",
            meta.len()
        ));
    }
    if let Ok(modified) = meta.modified() {
        xml.push_str(&format!(
            "        <D:getlastmodified>{}</D:getlastmodified>\n",
            http_date(modified)
        ));
    }
    xml.push_str("      </D:prop>\n");
    xml.push_str("      <D:status>HTTP/1.1 200 OK</D:status>\n");
    xml.push_str("    </D:propstat>\n");
    xml.push_str("  </D:response>\n");
}

/// Percent-encode each segment of a canonical path for use as an href
fn encode_href(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_depth(value: Option<&str>) -> Depth {
    match value.map(str::trim) {
        Some("0") => Depth::Zero,
        _ => Depth::One,
    }
}

async fn parent_exists(target: &Path) -> bool {
    match target.parent() {
        Some(parent) => tokio::fs::metadata(parent)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false),
        None => false,
    }
}

fn io_status(err: &std::io::Error) -> StatusCode {
    match err.kind() {
        std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate)
fn http_date(time: SystemTime) -> String {
    let dt: DateTime<Utc> = time.into();
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
