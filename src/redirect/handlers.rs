use axum::{
    extract::{ConnectInfo, Path, State},
    http::{
        header::{self, HeaderMap},
        StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{extract_client_ip, ScanContext, ScanRecorder};
use crate::config::{ProxyConfig, RedirectMode};
use crate::error::ErrorResponse;
use crate::storage::Storage;

pub struct RedirectState {
    pub storage: Arc<dyn Storage>,
    pub recorder: ScanRecorder,
    pub proxy: ProxyConfig,
    pub mode: RedirectMode,
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
        }),
    )
        .into_response()
}

/// Resolve a short code, record the scan and redirect to the destination.
///
/// Unknown and inactive codes get the same 404 and record nothing.
pub async fn redirect_scan(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let code = code.to_lowercase();

    let qr = match state.storage.get_qr_code_by_short_code(&code).await {
        Ok(Some(qr)) if qr.is_active => qr,
        Ok(_) => return not_found(),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "short code lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
                .into_response();
        }
    };

    let ctx = ScanContext {
        timestamp: None,
        ip: Some(extract_client_ip(&headers, addr.ip(), &state.proxy)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        // No visitor dedup yet: every scan counts as unique.
        is_unique: true,
    };

    if let Err(err) = state.recorder.record_scan(qr.id, ctx).await {
        tracing::warn!(
            qr_code_id = qr.id,
            short_code = %code,
            error = %err,
            "failed to record scan"
        );
    }

    let status = match state.mode {
        RedirectMode::Found => StatusCode::FOUND,
        RedirectMode::Temporary => StatusCode::TEMPORARY_REDIRECT,
    };
    (status, [(header::LOCATION, qr.original_url)]).into_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
