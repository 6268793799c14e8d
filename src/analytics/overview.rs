//! Cross-QR-code summary for the dashboard

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::models::AnalyticsRollup;
use crate::models::qr_code::display_title;
use crate::models::{QrCode, ScanEvent};

pub const TOP_QR_CODES: usize = 5;

/// "Recent activity" is always the last seven days, whatever range the UI shows.
pub fn recent_window() -> TimeDelta {
    TimeDelta::days(7)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopQrCode {
    pub id: i64,
    pub title: String,
    pub total_scans: i64,
    pub unique_scans: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    #[serde(rename = "totalQRCodes")]
    pub total_qr_codes: usize,
    #[serde(rename = "activeQRCodes")]
    pub active_qr_codes: usize,
    #[serde(rename = "totalScans")]
    pub total_scans: i64,
    #[serde(rename = "totalUniqueScans")]
    pub total_unique_scans: i64,
    #[serde(rename = "recentScansCount")]
    pub recent_scans_count: usize,
    #[serde(rename = "topQRCodes")]
    pub top_qr_codes: Vec<TopQrCode>,
}

pub fn overview(qr_codes: &[QrCode], rollups: &[AnalyticsRollup], recent_events: &[ScanEvent]) -> Overview {
    overview_at(qr_codes, rollups, recent_events, Utc::now())
}

pub fn overview_at(
    qr_codes: &[QrCode],
    rollups: &[AnalyticsRollup],
    recent_events: &[ScanEvent],
    now: DateTime<Utc>,
) -> Overview {
    let since = (now - recent_window()).timestamp();
    let by_id: HashMap<i64, &QrCode> = qr_codes.iter().map(|qr| (qr.id, qr)).collect();

    let mut ranked: Vec<&AnalyticsRollup> = rollups.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_scans
            .cmp(&a.total_scans)
            .then_with(|| a.qr_code_id.cmp(&b.qr_code_id))
    });

    let top_qr_codes = ranked
        .into_iter()
        .take(TOP_QR_CODES)
        .map(|rollup| {
            let qr = by_id.get(&rollup.qr_code_id);
            TopQrCode {
                id: rollup.qr_code_id,
                title: display_title(
                    qr.and_then(|q| q.title.as_deref()),
                    qr.map(|q| q.original_url.as_str()),
                )
                .to_string(),
                total_scans: rollup.total_scans,
                unique_scans: rollup.unique_scans,
            }
        })
        .collect();

    Overview {
        total_qr_codes: qr_codes.len(),
        active_qr_codes: qr_codes.iter().filter(|qr| qr.is_active).count(),
        total_scans: rollups.iter().map(|r| r.total_scans).sum(),
        total_unique_scans: rollups.iter().map(|r| r.unique_scans).sum(),
        recent_scans_count: recent_events.iter().filter(|e| e.timestamp > since).count(),
        top_qr_codes,
    }
}
