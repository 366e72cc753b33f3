//! Request path canonicalization
//!
//! Mount selection, rule evaluation and the engine must all look at the
//! same path. The router computes it once with [`canonical_path`] and
//! attaches it to the request as a [`CanonicalPath`] extension.

use axum::{body::Body, http::Request};
use percent_encoding::percent_decode_str;

/// Decoded, cleaned request path carried in the request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath(pub String);

/// Percent-decode `raw` and clean it lexically.
///
/// Empty and `.` segments are dropped and `..` removes the segment before
/// it, never climbing above `/`. Decoding happens first, so an encoded
/// `%2f` or `%2e%2e` is treated like its literal form. A trailing slash
/// is kept.
pub fn canonical_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut path = String::with_capacity(decoded.len() + 1);
    for segment in &segments {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() || decoded.ends_with('/') {
        path.push('/');
    }
    path
}

/// The canonical path of a request, as attached by the router or computed
/// from the URI when the request did not come through it
pub fn request_path(request: &Request<Body>) -> String {
    match request.extensions().get::<CanonicalPath>() {
        Some(CanonicalPath(path)) => path.clone(),
        None => canonical_path(request.uri().path()),
    }
}
