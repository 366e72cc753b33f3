//! HTTP API Module
//!
//! Serves the provisioned mounts over HTTP.

mod http;

pub use http::{AppState, DavServer};
