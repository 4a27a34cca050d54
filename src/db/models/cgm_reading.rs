//! CGM reading data models.

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Meal context a reading was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingType {
    Breakfast,
    Lunch,
    Dinner,
}

impl ReadingType {
    pub const ALL: [ReadingType; 3] = [
        ReadingType::Breakfast,
        ReadingType::Lunch,
        ReadingType::Dinner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::Breakfast => "breakfast",
            ReadingType::Lunch => "lunch",
            ReadingType::Dinner => "dinner",
        }
    }

    /// Suggested classification for a local hour of day (0-23).
    ///
    /// Late night and early morning fold into dinner since the set is closed.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => ReadingType::Breakfast,
            11..=15 => ReadingType::Lunch,
            _ => ReadingType::Dinner,
        }
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(ReadingType::Breakfast),
            "lunch" => Ok(ReadingType::Lunch),
            "dinner" => Ok(ReadingType::Dinner),
            other => bail!("unknown reading type '{other}' (expected breakfast, lunch or dinner)"),
        }
    }
}

/// A stored glucose reading. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CgmReading {
    pub id: i64,
    pub user_id: UserId,
    /// mg/dL
    pub reading: f64,
    pub reading_type: ReadingType,
    pub timestamp: DateTime<Utc>,
}

/// Input row for bulk loading, e.g. generated sample data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCgmReading {
    pub user_id: UserId,
    pub reading: f64,
    pub reading_type: ReadingType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CgmStatistics {
    pub count: u64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub period_days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hour_covers_whole_day() {
        assert_eq!(ReadingType::from_hour(7), ReadingType::Breakfast);
        assert_eq!(ReadingType::from_hour(11), ReadingType::Lunch);
        assert_eq!(ReadingType::from_hour(15), ReadingType::Lunch);
        assert_eq!(ReadingType::from_hour(18), ReadingType::Dinner);
        assert_eq!(ReadingType::from_hour(2), ReadingType::Dinner);
    }

    #[test]
    fn test_reading_type_parse_is_case_insensitive() {
        assert_eq!(" Dinner ".parse::<ReadingType>().unwrap(), ReadingType::Dinner);
        assert!("brunch".parse::<ReadingType>().is_err());
    }
}
