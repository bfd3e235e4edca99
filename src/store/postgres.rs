//! Measurement documents kept in Postgres.
//!
//! Layout:
//!
//! ```sql
//! CREATE TABLE measurements (
//!     id          bigserial   PRIMARY KEY,
//!     sensor_id   text        NOT NULL,
//!     measured_at timestamptz NOT NULL,
//!     doc         jsonb       NOT NULL
//! );
//! CREATE INDEX ON measurements (measured_at);
//! ```
//!
//! `doc` holds the device document. `sensor_id` and `measured_at` are the
//! indexed copies the range and distinct queries run against, so they replace
//! whatever the document itself says before it is handed to the pipeline.

use super::{MeasurementStore, TimeBounds};
use crate::measurement::{RawRecord, MEASURED_AT, SENSOR_ID};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct DocRow {
    sensor_id: String,
    measured_at: DateTime<Utc>,
    doc: Json<RawRecord>,
}

impl DocRow {
    fn into_record(self) -> RawRecord {
        let mut record = self.doc.0;
        record.insert(
            MEASURED_AT.to_string(),
            Value::String(self.measured_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        record.insert(SENSOR_ID.to_string(), Value::String(self.sensor_id));
        record
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MeasurementStore for PgStore {
    async fn time_bounds(&self) -> Result<Option<TimeBounds>> {
        let (first, last): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            sqlx::query_as("SELECT MIN(measured_at), MAX(measured_at) FROM measurements")
                .fetch_one(&self.pool)
                .await
                .context("failed to query measurement time bounds")?;
        Ok(first.zip(last).map(|(first, last)| TimeBounds { first, last }))
    }

    async fn distinct_sensor_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT sensor_id FROM measurements WHERE btrim(sensor_id) <> '' ORDER BY sensor_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to query sensor ids")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn fetch_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>> {
        let rows: Vec<DocRow> = sqlx::query_as(
            r#"
            SELECT sensor_id, measured_at, doc
            FROM measurements
            WHERE measured_at >= $1 AND measured_at <= $2
            ORDER BY measured_at, id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to fetch measurements {start}..{end}"))?;
        Ok(rows.into_iter().map(DocRow::into_record).collect())
    }
}
