use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::storage::Storage;

use super::analytics::{export_csv, get_analytics, get_overview};
use super::handlers::{
    create_qr_code, delete_qr_code, get_qr_code, health_check, list_qr_codes, qr_code_image,
    update_qr_code, AppState,
};

/// Management and analytics API, mounted under `/api`
pub fn create_api_router(storage: Arc<dyn Storage>, config: &Config) -> Router {
    let state = Arc::new(AppState {
        storage,
        redirect_base_url: config.redirect_base_url.trim_end_matches('/').to_string(),
        short_code_length: config.short_code_length,
    });

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/qr", post(create_qr_code).get(list_qr_codes))
        .route(
            "/qr/{id}",
            get(get_qr_code).put(update_qr_code).delete(delete_qr_code),
        )
        .route("/qr/{id}/image.svg", get(qr_code_image))
        .route("/analytics/overview", get(get_overview))
        .route("/analytics/{id}", get(get_analytics))
        .route("/analytics/{id}/export", get(export_csv))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}
