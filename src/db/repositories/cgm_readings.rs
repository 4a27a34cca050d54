use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::collector::{ReadingBatch, ReadingSink};
use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_reading_type},
    models::{CgmReading, CgmStatistics, NewCgmReading, ReadingType, UserId},
};

/// Storage-level plausibility window in mg/dL. Wider than the collector's
/// bounds; only catches values that bypassed validation entirely.
const STORABLE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1000.0;

fn row_to_reading(row: &Row) -> Result<CgmReading> {
    let user_id: i64 = row.get("user_id")?;
    let reading_type: String = row.get("reading_type")?;
    let timestamp: String = row.get("timestamp")?;

    Ok(CgmReading {
        id: row.get("id")?,
        user_id: UserId::new(user_id)
            .ok_or_else(|| anyhow!("reading references invalid user id {user_id}"))?,
        reading: row.get("reading")?,
        reading_type: parse_reading_type(&reading_type)?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Database {
    /// Store a batch of readings for one user in a single transaction.
    /// Nothing is written if the user is unknown or any value is implausible.
    pub async fn insert_cgm_readings(
        &self,
        user_id: UserId,
        values: Vec<f64>,
        reading_type: ReadingType,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        if let Some(bad) = values
            .iter()
            .find(|value| !value.is_finite() || !STORABLE_RANGE.contains(*value))
        {
            bail!(
                "Invalid reading value {bad}. Must be a number between {} and {}.",
                STORABLE_RANGE.start(),
                STORABLE_RANGE.end()
            );
        }

        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open reading transaction")?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM users WHERE id = ?1",
                    params![user_id.get()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                bail!("User with ID {user_id} does not exist");
            }

            let timestamp = format_datetime(&timestamp);
            let mut ids = Vec::with_capacity(values.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO cgm_readings (user_id, reading, reading_type, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for value in &values {
                    stmt.execute(params![user_id.get(), value, reading_type.as_str(), timestamp])
                        .with_context(|| format!("failed to insert reading {value}"))?;
                    ids.push(tx.last_insert_rowid());
                }
            }

            tx.commit().context("failed to commit readings")?;
            Ok(ids)
        })
        .await
    }

    /// Load many readings in one transaction; returns how many were written.
    pub async fn bulk_insert_cgm_readings(&self, readings: Vec<NewCgmReading>) -> Result<usize> {
        if let Some(bad) = readings
            .iter()
            .find(|row| !row.reading.is_finite() || !STORABLE_RANGE.contains(&row.reading))
        {
            bail!("Invalid reading value {} for user #{}", bad.reading, bad.user_id);
        }

        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open bulk reading transaction")?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO cgm_readings (user_id, reading, reading_type, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in &readings {
                    stmt.execute(params![
                        row.user_id.get(),
                        row.reading,
                        row.reading_type.as_str(),
                        format_datetime(&row.timestamp),
                    ])?;
                }
            }
            tx.commit().context("failed to commit bulk readings")?;
            Ok(readings.len())
        })
        .await
    }

    /// Newest readings first, optionally restricted to the last `since_days` days.
    pub async fn recent_cgm_readings(
        &self,
        user_id: UserId,
        limit: u32,
        since_days: Option<u32>,
    ) -> Result<Vec<CgmReading>> {
        let cutoff = since_days
            .map(|days| format_datetime(&(Utc::now() - Duration::days(i64::from(days)))));

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, reading, reading_type, timestamp
                 FROM cgm_readings
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR timestamp >= ?2)
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?3",
            )?;

            let mut rows = stmt.query(params![user_id.get(), cutoff, i64::from(limit)])?;
            let mut readings = Vec::new();
            while let Some(row) = rows.next()? {
                readings.push(row_to_reading(row)?);
            }

            Ok(readings)
        })
        .await
    }

    /// Count, average, min and max over the last `days` days.
    pub async fn cgm_statistics(&self, user_id: UserId, days: u32) -> Result<CgmStatistics> {
        let cutoff = format_datetime(&(Utc::now() - Duration::days(i64::from(days))));

        self.execute(move |conn| {
            let (count, average, min, max) = conn.query_row(
                "SELECT COUNT(*), AVG(reading), MIN(reading), MAX(reading)
                 FROM cgm_readings
                 WHERE user_id = ?1 AND timestamp >= ?2",
                params![user_id.get(), cutoff],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                    ))
                },
            )?;

            Ok(CgmStatistics {
                count: u64::try_from(count).map_err(|_| anyhow!("negative reading count"))?,
                average: round_one_decimal(average.unwrap_or(0.0)),
                min: round_one_decimal(min.unwrap_or(0.0)),
                max: round_one_decimal(max.unwrap_or(0.0)),
                period_days: days,
            })
        })
        .await
    }
}

#[async_trait]
impl ReadingSink for Database {
    async fn store_batch(
        &self,
        batch: &ReadingBatch,
        reading_type: ReadingType,
        taken_at: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        self.insert_cgm_readings(batch.user_id(), batch.values().to_vec(), reading_type, taken_at)
            .await
    }
}
