use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ReadingBatch;
use crate::db::models::ReadingType;

/// Durable destination for validated readings.
///
/// Implementations assign their own ids and must store the whole batch or
/// nothing; the owning user has to exist.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn store_batch(
        &self,
        batch: &ReadingBatch,
        reading_type: ReadingType,
        taken_at: DateTime<Utc>,
    ) -> Result<Vec<i64>>;
}
