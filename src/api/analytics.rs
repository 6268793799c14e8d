//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::AppState;
use crate::analytics::export::{csv_filename, to_csv};
use crate::analytics::overview::recent_window;
use crate::analytics::{overview, process, AnalyticsRollup, DateRange, GroupBy, Overview, ProcessedAnalytics};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQueryParams {
    /// `1d`, `7d`, `30d` or `90d`; anything else means `7d`
    pub date_range: Option<String>,
    /// `hour` or `day`
    pub group_by: Option<String>,
}

/// Rollup totals merged with the windowed view
#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    #[serde(flatten)]
    pub rollup: AnalyticsRollup,
    #[serde(flatten)]
    pub processed: ProcessedAnalytics,
}

/// Dashboard summary across every QR code
pub async fn get_overview(State(state): State<Arc<AppState>>) -> AppResult<Json<Overview>> {
    let since = (Utc::now() - recent_window()).timestamp();

    let qr_codes = state.storage.list_qr_codes().await?;
    let rollups = state.storage.list_rollups().await?;
    let recent = state.storage.list_recent_scan_events(since).await?;

    Ok(Json(overview(&qr_codes, &rollups, &recent)))
}

/// Analytics for one QR code.
///
/// A code without a rollup (never scanned, deleted, or unknown) yields the
/// all-zero shape rather than an error.
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<AnalyticsQueryParams>,
) -> AppResult<Json<AnalyticsResponse>> {
    let range = DateRange::parse(params.date_range.as_deref());
    let group_by = GroupBy::parse(params.group_by.as_deref());

    let rollup = state
        .storage
        .get_rollup(id)
        .await?
        .unwrap_or_else(|| AnalyticsRollup::empty(id));

    let since = range.start(Utc::now()).timestamp();
    let events = state.storage.list_scan_events(id, Some(since)).await?;

    Ok(Json(AnalyticsResponse {
        rollup,
        processed: process(&events, range, group_by),
    }))
}

/// Every recorded scan of one code as a CSV download
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let qr = state
        .storage
        .get_qr_code(id)
        .await?
        .ok_or_else(|| AppError::NotFound("QR code not found".to_string()))?;

    let events = state.storage.list_scan_events(id, None).await?;
    let body = to_csv(&events, qr.display_title());
    let disposition = format!("attachment; filename=\"{}\"", csv_filename(&qr.short_code));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
