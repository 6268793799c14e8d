use crate::analytics::models::AnalyticsRollup;
use crate::models::{NewQrCode, NewScanEvent, QrCode, ScanEvent};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if unique_violation {
            StorageError::Conflict
        } else {
            StorageError::Other(err.into())
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for QR codes, their scan log and their analytics rollups.
///
/// Counter mutations are atomic increments in the store; implementations
/// never read-modify-write counters in application code.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a QR code. Fails with `Conflict` if the short code is taken.
    async fn create_qr_code(&self, new: &NewQrCode) -> StorageResult<QrCode>;

    async fn short_code_exists(&self, short_code: &str) -> StorageResult<bool>;

    async fn get_qr_code(&self, id: i64) -> StorageResult<Option<QrCode>>;

    /// Case-insensitive lookup
    async fn get_qr_code_by_short_code(&self, short_code: &str) -> StorageResult<Option<QrCode>>;

    /// All QR codes, newest first
    async fn list_qr_codes(&self) -> StorageResult<Vec<QrCode>>;

    /// Overwrite the editable fields of an existing code. The scan counter is
    /// left alone. Returns `None` when the id is unknown.
    async fn update_qr_code(&self, qr: &QrCode) -> StorageResult<Option<QrCode>>;

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<bool>;

    /// Delete a code together with its scan events and rollup
    async fn delete_qr_code(&self, id: i64) -> StorageResult<bool>;

    async fn insert_scan_event(&self, event: &NewScanEvent) -> StorageResult<ScanEvent>;

    /// `scans = scans + 1` and touch `updated_at`
    async fn increment_scan_count(&self, qr_code_id: i64) -> StorageResult<()>;

    /// Upsert the rollup for the event's code, incrementing totals and all
    /// five facet counters in one transaction
    async fn apply_scan_to_rollup(&self, event: &NewScanEvent) -> StorageResult<()>;

    async fn get_rollup(&self, qr_code_id: i64) -> StorageResult<Option<AnalyticsRollup>>;

    async fn list_rollups(&self) -> StorageResult<Vec<AnalyticsRollup>>;

    /// Events for one code at or after `since`, oldest first
    async fn list_scan_events(
        &self,
        qr_code_id: i64,
        since: Option<i64>,
    ) -> StorageResult<Vec<ScanEvent>>;

    /// Events for every code at or after `since`, oldest first
    async fn list_recent_scan_events(&self, since: i64) -> StorageResult<Vec<ScanEvent>>;
}

pub(crate) fn unix_now() -> StorageResult<i64> {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| StorageError::Other(e.into()))?
        .as_secs();
    Ok(secs as i64)
}
