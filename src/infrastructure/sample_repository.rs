//! SQLite implementation of the sample history
//!
//! Timestamps are stored as Unix microseconds so ordering is numeric.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::repositories::{SampleRepository, StoreError};
use crate::domain::sample::Sample;

pub struct SqliteSampleRepository {
    pool: SqlitePool,
}

impl SqliteSampleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Helper method to convert database row to Sample entity
    fn row_to_sample(row: &sqlx::sqlite::SqliteRow) -> Result<Sample, StoreError> {
        let read = |e: sqlx::Error| StoreError::Read(e.to_string());

        let recorded_at: i64 = row.try_get("recorded_at").map_err(read)?;
        let timestamp = DateTime::<Utc>::from_timestamp_micros(recorded_at)
            .ok_or_else(|| StoreError::Read(format!("invalid recorded_at value {recorded_at}")))?;

        Ok(Sample {
            primary_count: row.try_get("primary_count").map_err(read)?,
            suspects: row.try_get("suspects").map_err(read)?,
            recovered: row.try_get("recovered").map_err(read)?,
            deaths: row.try_get("deaths").map_err(read)?,
            timestamp,
            country: row.try_get("country").map_err(read)?,
        })
    }
}

fn write_error(e: sqlx::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

#[async_trait]
impl SampleRepository for SqliteSampleRepository {
    async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let recorded_at = sample.timestamp.timestamp_micros();
        let mut tx = self.pool.begin().await.map_err(write_error)?;

        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(recorded_at) FROM samples WHERE country = $1")
            .bind(&sample.country)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error)?;

        if let Some(latest) = latest {
            if recorded_at <= latest {
                let latest = DateTime::<Utc>::from_timestamp_micros(latest)
                    .map_or_else(|| latest.to_string(), |t| t.to_rfc3339());
                return Err(StoreError::OutOfOrder {
                    country: sample.country.clone(),
                    attempted: sample.timestamp.to_rfc3339(),
                    latest,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT INTO samples (country, primary_count, suspects, recovered, deaths, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&sample.country)
        .bind(sample.primary_count)
        .bind(sample.suspects)
        .bind(sample.recovered)
        .bind(sample.deaths)
        .bind(recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await.map_err(write_error)?;
        Ok(())
    }

    async fn latest(&self, country: &str) -> Result<Option<Sample>, StoreError> {
        let row = sqlx::query(
            "SELECT country, primary_count, suspects, recovered, deaths, recorded_at FROM samples WHERE country = $1 ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(country)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        row.as_ref().map(Self::row_to_sample).transpose()
    }

    async fn all(&self, country: &str) -> Result<Vec<Sample>, StoreError> {
        let rows = sqlx::query(
            "SELECT country, primary_count, suspects, recovered, deaths, recorded_at FROM samples WHERE country = $1 ORDER BY recorded_at ASC, id ASC",
        )
        .bind(country)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        rows.iter().map(Self::row_to_sample).collect()
    }
}
