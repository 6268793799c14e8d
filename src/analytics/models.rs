//! Rollup document maintained incrementally per QR code

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{NewScanEvent, ScanEvent};

/// Day bucket key used by the rollup and by day-grouped charts.
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
/// Hour bucket key used by hour-grouped charts.
pub const HOUR_KEY_FORMAT: &str = "%Y-%m-%dT%H";

/// Convert a stored Unix timestamp into a UTC datetime. Out-of-range values
/// collapse to the epoch.
pub fn to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_default()
}

pub fn day_key(timestamp: i64) -> String {
    to_datetime(timestamp).format(DAY_KEY_FORMAT).to_string()
}

/// A rollup dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    Date,
    Country,
    City,
    Device,
    Os,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::Date,
        Facet::Country,
        Facet::City,
        Facet::Device,
        Facet::Os,
    ];

    /// Stable name used as the persisted discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Date => "date",
            Facet::Country => "country",
            Facet::City => "city",
            Facet::Device => "device",
            Facet::Os => "os",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Facet::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

/// Facet keys an event contributes to, one per dimension.
pub fn facet_keys(event: &NewScanEvent) -> [(Facet, String); 5] {
    [
        (Facet::Date, day_key(event.timestamp)),
        (Facet::Country, event.location.country.clone()),
        (Facet::City, event.location.city.clone()),
        (Facet::Device, event.device.device_type.as_str().to_string()),
        (Facet::Os, event.device.os.clone()),
    ]
}

/// String-keyed counters. Missing keys read as zero; the only mutation is
/// incrementing a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetCounts(BTreeMap<String, i64>);

impl FacetCounts {
    pub fn get(&self, key: &str) -> i64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, key: &str) {
        self.increment_by(key, 1);
    }

    pub fn increment_by(&mut self, key: &str, by: i64) {
        *self.0.entry(key.to_string()).or_insert(0) += by;
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Denormalized running totals for one QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRollup {
    pub qr_code_id: i64,
    pub total_scans: i64,
    pub unique_scans: i64,
    pub scans_by_date: FacetCounts,
    pub scans_by_country: FacetCounts,
    pub scans_by_city: FacetCounts,
    pub scans_by_device: FacetCounts,
    #[serde(rename = "scansByOS")]
    pub scans_by_os: FacetCounts,
    pub last_scan: Option<i64>,
}

impl AnalyticsRollup {
    /// The all-zero shape reported for codes that were never scanned.
    pub fn empty(qr_code_id: i64) -> Self {
        Self {
            qr_code_id,
            total_scans: 0,
            unique_scans: 0,
            scans_by_date: FacetCounts::default(),
            scans_by_country: FacetCounts::default(),
            scans_by_city: FacetCounts::default(),
            scans_by_device: FacetCounts::default(),
            scans_by_os: FacetCounts::default(),
            last_scan: None,
        }
    }

    pub fn facet(&self, facet: Facet) -> &FacetCounts {
        match facet {
            Facet::Date => &self.scans_by_date,
            Facet::Country => &self.scans_by_country,
            Facet::City => &self.scans_by_city,
            Facet::Device => &self.scans_by_device,
            Facet::Os => &self.scans_by_os,
        }
    }

    pub fn facet_mut(&mut self, facet: Facet) -> &mut FacetCounts {
        match facet {
            Facet::Date => &mut self.scans_by_date,
            Facet::Country => &mut self.scans_by_country,
            Facet::City => &mut self.scans_by_city,
            Facet::Device => &mut self.scans_by_device,
            Facet::Os => &mut self.scans_by_os,
        }
    }

    /// Fold one event into the totals, mirroring what the stores do atomically.
    pub fn apply(&mut self, event: &NewScanEvent) {
        self.total_scans += 1;
        if event.is_unique {
            self.unique_scans += 1;
        }
        for (facet, key) in facet_keys(event) {
            self.facet_mut(facet).increment(&key);
        }
        self.last_scan = Some(
            self.last_scan
                .map_or(event.timestamp, |last| last.max(event.timestamp)),
        );
    }

    /// Rebuild a rollup from the raw event log.
    pub fn from_events<'a>(qr_code_id: i64, events: impl IntoIterator<Item = &'a ScanEvent>) -> Self {
        let mut rollup = Self::empty(qr_code_id);
        for event in events {
            rollup.apply(&NewScanEvent {
                qr_code_id: event.qr_code_id,
                timestamp: event.timestamp,
                is_unique: event.is_unique,
                location: event.location.clone(),
                device: event.device.clone(),
                ip_address: None,
                user_agent: None,
            });
        }
        rollup
    }

    /// `total == sum(date buckets)` and `unique <= total`
    pub fn is_consistent(&self) -> bool {
        self.total_scans == self.scans_by_date.total() && self.unique_scans <= self.total_scans
    }
}
