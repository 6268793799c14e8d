//! Row shapes shared by the SQL backends and their mapping into domain types

use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::analytics::models::{AnalyticsRollup, Facet};
use crate::models::qr_code::DEFAULT_QR_SIZE;
use crate::models::{Campaign, Customization, DeviceInfo, DeviceType, Location, QrCode, ScanEvent};

macro_rules! qr_columns {
    () => {
        "id, original_url, short_code, title, description, size, foreground_color, \
         background_color, campaign_name, campaign_medium, campaign_start, campaign_end, \
         is_active, scans, created_at, updated_at"
    };
}

macro_rules! scan_columns {
    () => {
        "id, qr_code_id, scanned_at, is_unique, country, city, device_type, os, browser, \
         ip_address, user_agent"
    };
}

#[derive(Debug, FromRow)]
pub(crate) struct QrCodeRow {
    pub id: i64,
    pub original_url: String,
    pub short_code: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub size: i64,
    pub foreground_color: String,
    pub background_color: String,
    pub campaign_name: Option<String>,
    pub campaign_medium: Option<String>,
    pub campaign_start: Option<i64>,
    pub campaign_end: Option<i64>,
    pub is_active: bool,
    pub scans: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<QrCodeRow> for QrCode {
    fn from(row: QrCodeRow) -> Self {
        let campaign = Campaign {
            name: row.campaign_name,
            medium: row.campaign_medium,
            start_date: row.campaign_start,
            end_date: row.campaign_end,
        };
        QrCode {
            id: row.id,
            original_url: row.original_url,
            short_code: row.short_code,
            title: row.title,
            description: row.description,
            customization: Customization {
                size: u32::try_from(row.size).unwrap_or(DEFAULT_QR_SIZE),
                foreground_color: row.foreground_color,
                background_color: row.background_color,
            },
            campaign: Some(campaign).filter(|c| !c.is_empty()),
            is_active: row.is_active,
            scans: row.scans,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Campaign columns in insert/update order.
pub(crate) fn campaign_columns(
    campaign: Option<&Campaign>,
) -> (Option<&str>, Option<&str>, Option<i64>, Option<i64>) {
    match campaign {
        Some(c) => (
            c.name.as_deref(),
            c.medium.as_deref(),
            c.start_date,
            c.end_date,
        ),
        None => (None, None, None, None),
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ScanEventRow {
    pub id: i64,
    pub qr_code_id: i64,
    pub scanned_at: i64,
    pub is_unique: bool,
    pub country: String,
    pub city: String,
    pub device_type: String,
    pub os: String,
    pub browser: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<ScanEventRow> for ScanEvent {
    fn from(row: ScanEventRow) -> Self {
        ScanEvent {
            id: row.id,
            qr_code_id: row.qr_code_id,
            timestamp: row.scanned_at,
            is_unique: row.is_unique,
            location: Location {
                country: row.country,
                city: row.city,
            },
            device: DeviceInfo {
                device_type: row.device_type.parse().unwrap_or(DeviceType::Desktop),
                os: row.os,
                browser: row.browser,
            },
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RollupRow {
    pub qr_code_id: i64,
    pub total_scans: i64,
    pub unique_scans: i64,
    pub last_scan: Option<i64>,
}

#[derive(Debug, FromRow)]
pub(crate) struct FacetRow {
    pub qr_code_id: i64,
    pub facet: String,
    pub facet_key: String,
    pub scans: i64,
}

/// Join totals rows with their facet counters.
pub(crate) fn assemble_rollups(rows: Vec<RollupRow>, facets: Vec<FacetRow>) -> Vec<AnalyticsRollup> {
    let mut rollups: BTreeMap<i64, AnalyticsRollup> = rows
        .into_iter()
        .map(|row| {
            let mut rollup = AnalyticsRollup::empty(row.qr_code_id);
            rollup.total_scans = row.total_scans;
            rollup.unique_scans = row.unique_scans;
            rollup.last_scan = row.last_scan;
            (row.qr_code_id, rollup)
        })
        .collect();

    for row in facets {
        let (Some(rollup), Some(facet)) = (rollups.get_mut(&row.qr_code_id), Facet::from_name(&row.facet))
        else {
            continue;
        };
        rollup.facet_mut(facet).increment_by(&row.facet_key, row.scans);
    }

    rollups.into_values().collect()
}
