use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use qrcode::render::svg;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{CreateQrCodeRequest, QrCode, UpdateQrCodeRequest};
use crate::storage::{Storage, StorageError};

const SHORT_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_GENERATION_ATTEMPTS: usize = 10;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    /// Prefix for full short URLs, without trailing slash
    pub redirect_base_url: String,
    pub short_code_length: usize,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// A QR code as returned by the API, with its full short URL.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    #[serde(flatten)]
    pub qr_code: QrCode,
    pub short_url_full: String,
}

impl QrCodeResponse {
    fn new(qr_code: QrCode, base_url: &str) -> Self {
        let short_url_full = qr_code.short_url(base_url);
        Self {
            qr_code,
            short_url_full,
        }
    }
}

fn generate_short_code(length: usize) -> String {
    std::iter::repeat_with(|| {
        SHORT_CODE_ALPHABET[rand::random_range(0..SHORT_CODE_ALPHABET.len())] as char
    })
    .take(length)
    .collect()
}

async fn unused_short_code(state: &AppState) -> AppResult<String> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = generate_short_code(state.short_code_length);
        if !state.storage.short_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(AppError::Conflict(
        "Failed to generate unique short code".to_string(),
    ))
}

async fn load(state: &AppState, id: i64) -> AppResult<QrCode> {
    state
        .storage
        .get_qr_code(id)
        .await?
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))
}

/// Create a QR code with a freshly generated short code
pub async fn create_qr_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateQrCodeRequest>,
) -> AppResult<(StatusCode, Json<QrCodeResponse>)> {
    payload.validate().map_err(AppError::Validation)?;

    let short_code = unused_short_code(&state).await?;
    let new = payload
        .into_new(short_code)
        .ok_or_else(|| AppError::Validation("Original URL is required".to_string()))?;

    let created = state.storage.create_qr_code(&new).await?;
    info!(
        qr_code_id = created.id,
        short_code = %created.short_code,
        "created QR code"
    );

    Ok((
        StatusCode::CREATED,
        Json(QrCodeResponse::new(created, &state.redirect_base_url)),
    ))
}

pub async fn list_qr_codes(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<QrCodeResponse>>> {
    let codes = state.storage.list_qr_codes().await?;
    Ok(Json(
        codes
            .into_iter()
            .map(|qr| QrCodeResponse::new(qr, &state.redirect_base_url))
            .collect(),
    ))
}

pub async fn get_qr_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<QrCodeResponse>> {
    let qr = load(&state, id).await?;
    Ok(Json(QrCodeResponse::new(qr, &state.redirect_base_url)))
}

/// Partially update a QR code. Scan counters cannot be changed here.
pub async fn update_qr_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQrCodeRequest>,
) -> AppResult<Json<QrCodeResponse>> {
    let mut qr = load(&state, id).await?;
    payload.apply_to(&mut qr).map_err(AppError::Validation)?;

    let updated = match state.storage.update_qr_code(&qr).await {
        Ok(Some(updated)) => updated,
        Ok(None) => return Err(AppError::NotFound("QR code not found".to_string())),
        Err(StorageError::Conflict) => {
            return Err(AppError::Conflict("Short code already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(QrCodeResponse::new(updated, &state.redirect_base_url)))
}

/// Delete a QR code together with its scans and analytics
pub async fn delete_qr_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    if !state.storage.delete_qr_code(id).await? {
        return Err(AppError::NotFound("QR code not found".to_string()));
    }
    info!(qr_code_id = id, "deleted QR code");
    Ok(Json(SuccessResponse {
        message: "QR code deleted successfully".to_string(),
    }))
}

/// Render the code's full short URL as an SVG image
pub async fn qr_code_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let qr = load(&state, id).await?;
    let url = qr.short_url(&state.redirect_base_url);

    let code = qrcode::QrCode::new(url.as_bytes())
        .map_err(|e| anyhow::anyhow!("QR code generation error: {e}"))?;
    let size = qr.customization.size;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .dark_color(svg::Color(&qr.customization.foreground_color))
        .light_color(svg::Color(&qr.customization.background_color))
        .quiet_zone(true)
        .build();

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], image))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
