use crate::analytics::models::AnalyticsRollup;
use crate::config::CacheConfig;
use crate::models::{NewQrCode, NewScanEvent, QrCode, ScanEvent};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache for short code lookups on the redirect path.
///
/// Entries are keyed by the lowercased short code and hold `None` for codes
/// that do not exist, so repeated misses do not reach the database. Any
/// write that can change what a lookup returns invalidates the entry.
/// Scan counters are not cached; the redirect only needs the destination
/// and the active flag.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    read_cache: Cache<String, Option<QrCode>>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, config: &CacheConfig) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();

        Self { inner, read_cache }
    }

    async fn invalidate(&self, short_code: &str) {
        self.read_cache.invalidate(&short_code.to_lowercase()).await;
    }

    /// Drop the cache entry of the code currently stored under `id`
    async fn invalidate_id(&self, id: i64) -> StorageResult<()> {
        if let Some(existing) = self.inner.get_qr_code(id).await? {
            self.invalidate(&existing.short_code).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_qr_code(&self, new: &NewQrCode) -> StorageResult<QrCode> {
        let created = self.inner.create_qr_code(new).await?;
        self.read_cache
            .insert(created.short_code.to_lowercase(), Some(created.clone()))
            .await;
        Ok(created)
    }

    async fn short_code_exists(&self, short_code: &str) -> StorageResult<bool> {
        self.inner.short_code_exists(short_code).await
    }

    async fn get_qr_code(&self, id: i64) -> StorageResult<Option<QrCode>> {
        self.inner.get_qr_code(id).await
    }

    async fn get_qr_code_by_short_code(&self, short_code: &str) -> StorageResult<Option<QrCode>> {
        let key = short_code.to_lowercase();
        if let Some(cached) = self.read_cache.get(&key).await {
            return Ok(cached);
        }

        let result = self.inner.get_qr_code_by_short_code(&key).await?;
        self.read_cache.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn list_qr_codes(&self) -> StorageResult<Vec<QrCode>> {
        self.inner.list_qr_codes().await
    }

    async fn update_qr_code(&self, qr: &QrCode) -> StorageResult<Option<QrCode>> {
        // The short code may change; drop both the old and the new key once
        // the write has landed, so a lookup in between cannot re-cache the old row.
        let previous = self.inner.get_qr_code(qr.id).await?;
        let updated = self.inner.update_qr_code(qr).await?;
        if let Some(previous) = previous {
            self.invalidate(&previous.short_code).await;
        }
        self.invalidate(&qr.short_code).await;
        Ok(updated)
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<bool> {
        let changed = self.inner.set_active(id, active).await?;
        if changed {
            self.invalidate_id(id).await?;
        }
        Ok(changed)
    }

    async fn delete_qr_code(&self, id: i64) -> StorageResult<bool> {
        let previous = self.inner.get_qr_code(id).await?;
        let deleted = self.inner.delete_qr_code(id).await?;
        if let Some(previous) = previous {
            self.invalidate(&previous.short_code).await;
        }
        Ok(deleted)
    }

    async fn insert_scan_event(&self, event: &NewScanEvent) -> StorageResult<ScanEvent> {
        self.inner.insert_scan_event(event).await
    }

    async fn increment_scan_count(&self, qr_code_id: i64) -> StorageResult<()> {
        self.inner.increment_scan_count(qr_code_id).await
    }

    async fn apply_scan_to_rollup(&self, event: &NewScanEvent) -> StorageResult<()> {
        self.inner.apply_scan_to_rollup(event).await
    }

    async fn get_rollup(&self, qr_code_id: i64) -> StorageResult<Option<AnalyticsRollup>> {
        self.inner.get_rollup(qr_code_id).await
    }

    async fn list_rollups(&self) -> StorageResult<Vec<AnalyticsRollup>> {
        self.inner.list_rollups().await
    }

    async fn list_scan_events(
        &self,
        qr_code_id: i64,
        since: Option<i64>,
    ) -> StorageResult<Vec<ScanEvent>> {
        self.inner.list_scan_events(qr_code_id, since).await
    }

    async fn list_recent_scan_events(&self, since: i64) -> StorageResult<Vec<ScanEvent>> {
        self.inner.list_recent_scan_events(since).await
    }
}
