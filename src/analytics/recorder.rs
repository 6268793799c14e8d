//! Scan recording
//!
//! A scan is persisted as three writes against the store: the raw event,
//! the QR code's scan counter, and the rollup. Each write is atomic on its
//! own; there is no transaction spanning all three.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use super::device::classify;
use super::location::{LocationResolver, UnknownLocation};
use crate::error::{AppError, AppResult};
use crate::models::{NewScanEvent, ScanEvent};
use crate::storage::Storage;

/// Request-derived facts about one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    /// Unix seconds; `None` means now
    pub timestamp: Option<i64>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub is_unique: bool,
}

#[derive(Clone)]
pub struct ScanRecorder {
    storage: Arc<dyn Storage>,
    locations: Arc<dyn LocationResolver>,
}

impl ScanRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_resolver(storage, Arc::new(UnknownLocation))
    }

    pub fn with_resolver(storage: Arc<dyn Storage>, locations: Arc<dyn LocationResolver>) -> Self {
        Self { storage, locations }
    }

    /// Record one scan of `qr_code_id`.
    ///
    /// Fails with `NotFound` if the code does not exist. Whether the code is
    /// active is the caller's concern.
    pub async fn record_scan(&self, qr_code_id: i64, ctx: ScanContext) -> AppResult<ScanEvent> {
        if self.storage.get_qr_code(qr_code_id).await?.is_none() {
            return Err(AppError::NotFound(format!("QR code {qr_code_id} not found")));
        }

        let event = NewScanEvent {
            qr_code_id,
            timestamp: ctx.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
            is_unique: ctx.is_unique,
            location: self.locations.resolve(ctx.ip),
            device: classify(ctx.user_agent.as_deref().unwrap_or_default()),
            ip_address: ctx.ip.map(|ip| ip.to_string()),
            user_agent: ctx.user_agent,
        };

        let stored = self.storage.insert_scan_event(&event).await?;
        self.storage.increment_scan_count(qr_code_id).await?;
        self.storage.apply_scan_to_rollup(&event).await?;

        debug!(
            qr_code_id,
            event_id = stored.id,
            device = %stored.device.device_type,
            os = %stored.device.os,
            "recorded scan"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customization, DeviceType, Location, NewQrCode};
    use crate::storage::SqliteStorage;

    struct FixedLocation;

    impl LocationResolver for FixedLocation {
        fn resolve(&self, _ip: Option<IpAddr>) -> Location {
            Location::new(Some("FR"), Some("Paris"))
        }
    }

    async fn storage_with_code() -> (Arc<dyn Storage>, i64) {
        let storage: Arc<dyn Storage> = Arc::new(
            SqliteStorage::new("sqlite::memory:", 1)
                .await
                .expect("sqlite pool"),
        );
        storage.init().await.expect("schema");
        let qr = storage
            .create_qr_code(&NewQrCode {
                original_url: "https://example.com".to_string(),
                short_code: "rec0001".to_string(),
                title: Some("Poster".to_string()),
                description: None,
                customization: Customization::default(),
                campaign: None,
            })
            .await
            .expect("create");
        (storage, qr.id)
    }

    #[tokio::test]
    async fn test_record_scan_updates_all_three_stores() {
        let (storage, id) = storage_with_code().await;
        let recorder = ScanRecorder::with_resolver(Arc::clone(&storage), Arc::new(FixedLocation));

        let ctx = ScanContext {
            timestamp: Some(1_760_000_000),
            ip: Some("198.51.100.4".parse().unwrap()),
            user_agent: Some(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
                    .to_string(),
            ),
            is_unique: true,
        };
        let event = recorder.record_scan(id, ctx).await.unwrap();
        assert_eq!(event.device.device_type, DeviceType::Mobile);
        assert_eq!(event.location.city, "Paris");
        assert_eq!(event.ip_address.as_deref(), Some("198.51.100.4"));

        let qr = storage.get_qr_code(id).await.unwrap().unwrap();
        assert_eq!(qr.scans, 1);

        let events = storage.list_scan_events(id, None).await.unwrap();
        assert_eq!(events.len(), 1);

        let rollup = storage.get_rollup(id).await.unwrap().unwrap();
        assert_eq!(rollup.total_scans, 1);
        assert_eq!(rollup.unique_scans, 1);
        assert_eq!(rollup.scans_by_country.get("FR"), 1);
        assert_eq!(rollup.scans_by_os.get("iOS"), 1);
        assert_eq!(rollup.last_scan, Some(1_760_000_000));
        assert!(rollup.is_consistent());
    }

    #[tokio::test]
    async fn test_missing_user_agent_falls_back_to_unknown() {
        let (storage, id) = storage_with_code().await;
        let recorder = ScanRecorder::new(Arc::clone(&storage));

        let event = recorder.record_scan(id, ScanContext::default()).await.unwrap();
        assert_eq!(event.device.device_type, DeviceType::Desktop);
        assert_eq!(event.device.os, "Unknown");
        assert_eq!(event.location, Location::default());
        assert!(!event.is_unique);
    }

    #[tokio::test]
    async fn test_unknown_code_is_rejected_without_writes() {
        let (storage, _) = storage_with_code().await;
        let recorder = ScanRecorder::new(Arc::clone(&storage));

        let err = recorder.record_scan(404, ScanContext::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(storage.list_scan_events(404, None).await.unwrap().is_empty());
        assert!(storage.get_rollup(404).await.unwrap().is_none());
    }
}
