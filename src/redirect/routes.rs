use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::analytics::ScanRecorder;
use crate::config::{ProxyConfig, RedirectMode};
use crate::storage::Storage;

use super::handlers::{health_check, redirect_scan, RedirectState};
use super::middleware::log_latency;

/// Public short-code router. Must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_redirect_router(
    storage: Arc<dyn Storage>,
    recorder: ScanRecorder,
    proxy: ProxyConfig,
    mode: RedirectMode,
) -> Router {
    let state = Arc::new(RedirectState {
        storage,
        recorder,
        proxy,
        mode,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/{code}", get(redirect_scan))
        .layer(middleware::from_fn(log_latency))
        .with_state(state)
}
