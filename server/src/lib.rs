//! REST to SFTP gateway.
//!
//! HTTP verbs on URL paths become remote directory and file operations.
//! A trailing `/` selects the directory operations; everything else is a
//! file. See [`handler::serve`] for the request flow.

pub mod config;
pub mod errors;
pub mod handler;
pub mod response;
pub mod routing;
pub mod sniff;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use rest2sftp_core::session::SessionProvider;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler::directory::Timestamps;
use crate::response::ErrorMode;
use crate::routing::PathResolver;

/// Shared, read-only state behind every request.
pub struct Gateway {
    pub sessions: Arc<dyn SessionProvider>,
    pub resolver: PathResolver,
    pub error_mode: ErrorMode,
    pub timestamps: Timestamps,
}

impl Gateway {
    pub fn new(sessions: Arc<dyn SessionProvider>, config: &ServerConfig) -> Self {
        Self {
            sessions,
            resolver: PathResolver::new(config.base_path.clone(), config.prefix_match),
            error_mode: config.error_mode,
            timestamps: config.timestamps(),
        }
    }
}

/// Upload body limit layer; `0` lifts the limit entirely.
fn body_limit(max_upload_bytes: u64) -> DefaultBodyLimit {
    if max_upload_bytes == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(usize::try_from(max_upload_bytes).unwrap_or(usize::MAX))
    }
}

/// Build the router: one fallback handler for every path and method.
pub fn build_router(gateway: Arc<Gateway>, max_upload_bytes: u64) -> Router {
    Router::new()
        .fallback(handler::serve)
        .with_state(gateway)
        .layer(body_limit(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
