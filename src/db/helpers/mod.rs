use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::db::models::{DietaryPreference, ReadingType};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("failed to parse {field} '{value}' (expected YYYY-MM-DD)"))
}

pub fn parse_optional_dietary_preference(
    value: Option<String>,
) -> Result<Option<DietaryPreference>> {
    value.map(|raw| raw.parse()).transpose()
}

pub fn parse_reading_type(value: &str) -> Result<ReadingType> {
    value
        .parse()
        .map_err(|_| anyhow!("unknown reading type {value}"))
}
