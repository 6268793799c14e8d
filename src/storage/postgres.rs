use crate::analytics::models::{facet_keys, AnalyticsRollup};
use crate::models::{NewQrCode, NewScanEvent, QrCode, ScanEvent};
use crate::storage::rows::{
    assemble_rollups, campaign_columns, FacetRow, QrCodeRow, RollupRow, ScanEventRow,
};
use crate::storage::trait_def::unix_now;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_codes (
                id BIGSERIAL PRIMARY KEY,
                original_url TEXT NOT NULL,
                short_code TEXT NOT NULL UNIQUE,
                title TEXT,
                description TEXT,
                size BIGINT NOT NULL DEFAULT 256,
                foreground_color TEXT NOT NULL DEFAULT '#000000',
                background_color TEXT NOT NULL DEFAULT '#ffffff',
                campaign_name TEXT,
                campaign_medium TEXT,
                campaign_start BIGINT,
                campaign_end BIGINT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                scans BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scan_events (
                id BIGSERIAL PRIMARY KEY,
                qr_code_id BIGINT NOT NULL,
                scanned_at BIGINT NOT NULL,
                is_unique BOOLEAN NOT NULL DEFAULT FALSE,
                country TEXT NOT NULL,
                city TEXT NOT NULL,
                device_type TEXT NOT NULL,
                os TEXT NOT NULL,
                browser TEXT NOT NULL,
                ip_address TEXT,
                user_agent TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scan_events_code_time ON scan_events(qr_code_id, scanned_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_scan_events_time ON scan_events(scanned_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                qr_code_id BIGINT PRIMARY KEY,
                total_scans BIGINT NOT NULL DEFAULT 0,
                unique_scans BIGINT NOT NULL DEFAULT 0,
                last_scan BIGINT,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_facets (
                qr_code_id BIGINT NOT NULL,
                facet TEXT NOT NULL,
                facet_key TEXT NOT NULL,
                scans BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (qr_code_id, facet, facet_key)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_qr_code(&self, new: &NewQrCode) -> StorageResult<QrCode> {
        let now = unix_now()?;
        let (campaign_name, campaign_medium, campaign_start, campaign_end) =
            campaign_columns(new.campaign.as_ref());

        let row = sqlx::query_as::<_, QrCodeRow>(concat!(
            r#"
            INSERT INTO qr_codes (
                original_url, short_code, title, description, size, foreground_color,
                background_color, campaign_name, campaign_medium, campaign_start, campaign_end,
                is_active, scans, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, 0, $12, $12)
            RETURNING "#,
            qr_columns!()
        ))
        .bind(&new.original_url)
        .bind(new.short_code.to_lowercase())
        .bind(&new.title)
        .bind(&new.description)
        .bind(i64::from(new.customization.size))
        .bind(&new.customization.foreground_color)
        .bind(&new.customization.background_color)
        .bind(campaign_name)
        .bind(campaign_medium)
        .bind(campaign_start)
        .bind(campaign_end)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn short_code_exists(&self, short_code: &str) -> StorageResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM qr_codes WHERE short_code = $1)",
        )
        .bind(short_code.to_lowercase())
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(exists)
    }

    async fn get_qr_code(&self, id: i64) -> StorageResult<Option<QrCode>> {
        let row = sqlx::query_as::<_, QrCodeRow>(concat!(
            "SELECT ",
            qr_columns!(),
            " FROM qr_codes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(QrCode::from))
    }

    async fn get_qr_code_by_short_code(&self, short_code: &str) -> StorageResult<Option<QrCode>> {
        let row = sqlx::query_as::<_, QrCodeRow>(concat!(
            "SELECT ",
            qr_columns!(),
            " FROM qr_codes WHERE short_code = $1"
        ))
        .bind(short_code.to_lowercase())
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.map(QrCode::from))
    }

    async fn list_qr_codes(&self) -> StorageResult<Vec<QrCode>> {
        let rows = sqlx::query_as::<_, QrCodeRow>(concat!(
            "SELECT ",
            qr_columns!(),
            " FROM qr_codes ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(QrCode::from).collect())
    }

    async fn update_qr_code(&self, qr: &QrCode) -> StorageResult<Option<QrCode>> {
        let now = unix_now()?;
        let (campaign_name, campaign_medium, campaign_start, campaign_end) =
            campaign_columns(qr.campaign.as_ref());

        let row = sqlx::query_as::<_, QrCodeRow>(concat!(
            r#"
            UPDATE qr_codes
            SET original_url = $1, short_code = $2, title = $3, description = $4, size = $5,
                foreground_color = $6, background_color = $7, campaign_name = $8,
                campaign_medium = $9, campaign_start = $10, campaign_end = $11,
                is_active = $12, updated_at = $13
            WHERE id = $14
            RETURNING "#,
            qr_columns!()
        ))
        .bind(&qr.original_url)
        .bind(qr.short_code.to_lowercase())
        .bind(&qr.title)
        .bind(&qr.description)
        .bind(i64::from(qr.customization.size))
        .bind(&qr.customization.foreground_color)
        .bind(&qr.customization.background_color)
        .bind(campaign_name)
        .bind(campaign_medium)
        .bind(campaign_start)
        .bind(campaign_end)
        .bind(qr.is_active)
        .bind(now)
        .bind(qr.id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(QrCode::from))
    }

    async fn set_active(&self, id: i64, active: bool) -> StorageResult<bool> {
        let now = unix_now()?;
        let result = sqlx::query("UPDATE qr_codes SET is_active = $1, updated_at = $2 WHERE id = $3")
            .bind(active)
            .bind(now)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_qr_code(&self, id: i64) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM scan_events WHERE qr_code_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM analytics_facets WHERE qr_code_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM analytics WHERE qr_code_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM qr_codes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_scan_event(&self, event: &NewScanEvent) -> StorageResult<ScanEvent> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO scan_events (
                qr_code_id, scanned_at, is_unique, country, city, device_type, os, browser,
                ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(event.qr_code_id)
        .bind(event.timestamp)
        .bind(event.is_unique)
        .bind(&event.location.country)
        .bind(&event.location.city)
        .bind(event.device.device_type.as_str())
        .bind(&event.device.os)
        .bind(&event.device.browser)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(event.clone().with_id(id))
    }

    async fn increment_scan_count(&self, qr_code_id: i64) -> StorageResult<()> {
        let now = unix_now()?;
        let result =
            sqlx::query("UPDATE qr_codes SET scans = scans + 1, updated_at = $1 WHERE id = $2")
                .bind(now)
                .bind(qr_code_id)
                .execute(self.pool.as_ref())
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn apply_scan_to_rollup(&self, event: &NewScanEvent) -> StorageResult<()> {
        let now = unix_now()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO analytics (qr_code_id, total_scans, unique_scans, last_scan, updated_at)
            VALUES ($1, 1, $2, $3, $4)
            ON CONFLICT (qr_code_id) DO UPDATE SET
                total_scans = analytics.total_scans + 1,
                unique_scans = analytics.unique_scans + EXCLUDED.unique_scans,
                last_scan = GREATEST(analytics.last_scan, EXCLUDED.last_scan),
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(event.qr_code_id)
        .bind(i64::from(event.is_unique))
        .bind(event.timestamp)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (facet, key) in facet_keys(event) {
            sqlx::query(
                r#"
                INSERT INTO analytics_facets (qr_code_id, facet, facet_key, scans)
                VALUES ($1, $2, $3, 1)
                ON CONFLICT (qr_code_id, facet, facet_key) DO UPDATE SET
                    scans = analytics_facets.scans + 1
                "#,
            )
            .bind(event.qr_code_id)
            .bind(facet.as_str())
            .bind(key)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_rollup(&self, qr_code_id: i64) -> StorageResult<Option<AnalyticsRollup>> {
        let Some(row) = sqlx::query_as::<_, RollupRow>(
            "SELECT qr_code_id, total_scans, unique_scans, last_scan FROM analytics WHERE qr_code_id = $1",
        )
        .bind(qr_code_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        else {
            return Ok(None);
        };

        let facets = sqlx::query_as::<_, FacetRow>(
            "SELECT qr_code_id, facet, facet_key, scans FROM analytics_facets WHERE qr_code_id = $1",
        )
        .bind(qr_code_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(assemble_rollups(vec![row], facets).into_iter().next())
    }

    async fn list_rollups(&self) -> StorageResult<Vec<AnalyticsRollup>> {
        let rows = sqlx::query_as::<_, RollupRow>(
            "SELECT qr_code_id, total_scans, unique_scans, last_scan FROM analytics",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        let facets = sqlx::query_as::<_, FacetRow>(
            "SELECT qr_code_id, facet, facet_key, scans FROM analytics_facets",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(assemble_rollups(rows, facets))
    }

    async fn list_scan_events(
        &self,
        qr_code_id: i64,
        since: Option<i64>,
    ) -> StorageResult<Vec<ScanEvent>> {
        let rows = sqlx::query_as::<_, ScanEventRow>(concat!(
            "SELECT ",
            scan_columns!(),
            " FROM scan_events WHERE qr_code_id = $1 AND scanned_at >= $2 ORDER BY scanned_at, id"
        ))
        .bind(qr_code_id)
        .bind(since.unwrap_or(i64::MIN))
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(ScanEvent::from).collect())
    }

    async fn list_recent_scan_events(&self, since: i64) -> StorageResult<Vec<ScanEvent>> {
        let rows = sqlx::query_as::<_, ScanEventRow>(concat!(
            "SELECT ",
            scan_columns!(),
            " FROM scan_events WHERE scanned_at >= $1 ORDER BY scanned_at, id"
        ))
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(ScanEvent::from).collect())
    }
}
