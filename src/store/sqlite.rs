//! SQLite-backed [`ConfigStore`] / [`ReportArchive`].
//!
//! Every collection is a single JSON document in the `kv` table, keyed by
//! [`CONFIGS_KEY`], [`REPORTS_KEY`] and [`ACTIVE_CONFIG_KEY`]. A save is one
//! upsert statement, so a failed write leaves the previous snapshot intact.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::models::{IntelConfig, Report};
use crate::{db, migrate};

use super::{ConfigStore, ReportArchive, ACTIVE_CONFIG_KEY, CONFIGS_KEY, REPORTS_KEY};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Stored value for '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(key, &raw).await
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn load(&self) -> Result<Vec<IntelConfig>> {
        Ok(self.get_json(CONFIGS_KEY).await?.unwrap_or_default())
    }

    async fn save(&self, configs: &[IntelConfig]) -> Result<()> {
        self.put_json(CONFIGS_KEY, configs).await
    }

    async fn active_id(&self) -> Result<Option<String>> {
        self.get_raw(ACTIVE_CONFIG_KEY).await
    }

    async fn set_active_id(&self, id: &str) -> Result<()> {
        self.put_raw(ACTIVE_CONFIG_KEY, id).await
    }
}

#[async_trait]
impl ReportArchive for SqliteStore {
    async fn load(&self) -> Result<Vec<Report>> {
        Ok(self.get_json(REPORTS_KEY).await?.unwrap_or_default())
    }

    async fn save(&self, reports: &[Report]) -> Result<()> {
        self.put_json(REPORTS_KEY, reports).await
    }
}
