//! Rollup Registry Module
//!
//! This module implements a database registry for published rollups.
//! The registry allows querying rollup history without keeping proofs around.
//!
//! # Storage
//! Stores lightweight metadata for each rollup:
//! - Rollup ID, transaction and inner rollup counts
//! - Number of bridge calls used
//! - Proof digest and publish time

use crate::AggregatedProof;
use anyhow::Context;
use chrono::{DateTime, Utc};
use ethers::types::H256;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

/// Metadata of one published rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupRecord {
    pub rollup_id: u64,
    pub tx_count: usize,
    pub group_count: usize,
    /// Bridge call slots actually used (non-zero entries)
    pub bridge_call_count: usize,
    pub digest: H256,
    pub published_at: DateTime<Utc>,
}

impl RollupRecord {
    pub fn from_proof(proof: &AggregatedProof, published_at: DateTime<Utc>) -> Self {
        Self {
            rollup_id: proof.rollup_id,
            tx_count: proof.tx_count(),
            group_count: proof.groups.len(),
            bridge_call_count: proof
                .bridge_call_datas
                .iter()
                .filter(|b| !b.is_zero())
                .count(),
            digest: proof.digest,
            published_at,
        }
    }
}

/// Rollup registry
///
/// Stores rollup metadata in SQLite for querying and auditing.
pub struct RollupRegistry {
    pool: SqlitePool,
}

impl RollupRegistry {
    /// Connect to the database and create the schema if needed
    ///
    /// # Arguments
    /// * `url` - SQLite URL, e.g. `sqlite://registry.db?mode=rwc` or `sqlite::memory:`
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // A single connection keeps an in-memory database alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .with_context(|| format!("Failed to open rollup registry at {}", url))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rollups (
                rollup_id INTEGER PRIMARY KEY,
                tx_count INTEGER NOT NULL,
                group_count INTEGER NOT NULL,
                bridge_call_count INTEGER NOT NULL,
                digest TEXT NOT NULL,
                published_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Store rollup metadata
    ///
    /// # Returns
    /// `Ok(())` if the record was stored; a duplicate rollup id is an error
    pub async fn store(&self, record: &RollupRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO rollups (rollup_id, tx_count, group_count, bridge_call_count, digest, published_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(i64::try_from(record.rollup_id)?)
        .bind(i64::try_from(record.tx_count)?)
        .bind(i64::try_from(record.group_count)?)
        .bind(i64::try_from(record.bridge_call_count)?)
        .bind(format!("{:x}", record.digest))
        .bind(record.published_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store rollup #{}", record.rollup_id))?;

        debug!("Stored rollup #{} in registry", record.rollup_id);
        Ok(())
    }

    pub async fn count(&self) -> anyhow::Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) FROM rollups")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(row.try_get::<i64, _>(0)?)?)
    }

    /// Most recently published rollup, by id
    pub async fn latest(&self) -> anyhow::Result<Option<RollupRecord>> {
        let row = sqlx::query(
            "SELECT rollup_id, tx_count, group_count, bridge_call_count, digest, published_at
             FROM rollups ORDER BY rollup_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    /// Highest stored rollup id, 0 when empty
    pub async fn last_rollup_id(&self) -> anyhow::Result<u64> {
        Ok(self.latest().await?.map_or(0, |record| record.rollup_id))
    }
}

fn record_from_row(row: &SqliteRow) -> anyhow::Result<RollupRecord> {
    Ok(RollupRecord {
        rollup_id: u64::try_from(row.try_get::<i64, _>("rollup_id")?)?,
        tx_count: usize::try_from(row.try_get::<i64, _>("tx_count")?)?,
        group_count: usize::try_from(row.try_get::<i64, _>("group_count")?)?,
        bridge_call_count: usize::try_from(row.try_get::<i64, _>("bridge_call_count")?)?,
        digest: H256::from_str(&row.try_get::<String, _>("digest")?)
            .map_err(|e| anyhow::anyhow!("Invalid rollup digest: {:?}", e))?,
        published_at: DateTime::parse_from_rfc3339(&row.try_get::<String, _>("published_at")?)?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(rollup_id: u64) -> RollupRecord {
        RollupRecord {
            rollup_id,
            tx_count: 12,
            group_count: 2,
            bridge_call_count: 1,
            digest: H256::repeat_byte(rollup_id as u8),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, rollup_id as u32).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_store_and_query() {
        let registry = RollupRegistry::connect("sqlite::memory:").await.unwrap();
        assert_eq!(registry.count().await.unwrap(), 0);
        assert_eq!(registry.latest().await.unwrap(), None);

        registry.store(&record(1)).await.unwrap();
        registry.store(&record(2)).await.unwrap();

        assert_eq!(registry.count().await.unwrap(), 2);
        assert_eq!(registry.latest().await.unwrap(), Some(record(2)));
        assert_eq!(registry.last_rollup_id().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_rollup_id_fails() {
        let registry = RollupRegistry::connect("sqlite::memory:").await.unwrap();
        registry.store(&record(1)).await.unwrap();
        assert!(registry.store(&record(1)).await.is_err());
    }
}
