//! User profile data models.
//!
//! Users are created by the profile flow (`add-user`, the menu, or the
//! seeder); the reading collector only ever sees their [`UserId`].

use std::{fmt, str::FromStr, sync::OnceLock};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
/// Shortest accepted first name, last name or city.
const MIN_TEXT_LEN: usize = 2;

fn email_regex() -> Result<&'static Regex> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    if let Some(regex) = EMAIL.get() {
        return Ok(regex);
    }
    let regex = Regex::new(EMAIL_PATTERN).context("invalid email pattern")?;
    Ok(EMAIL.get_or_init(|| regex))
}

/// Check one required profile field (`first_name`, `last_name`, `city` or
/// `email`). Values are judged after trimming, as they are stored.
pub fn validate_required_field(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() {
        bail!("{field} cannot be empty");
    }

    if field == "email" {
        if !email_regex()?.is_match(value) {
            bail!("Invalid email format: '{value}'");
        }
    } else if value.chars().count() < MIN_TEXT_LEN {
        bail!("{field} must be at least {MIN_TEXT_LEN} characters");
    }
    Ok(())
}

/// Identifier of a stored user. Always strictly positive, matching SQLite
/// `AUTOINCREMENT` row ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| anyhow!("user id must be a whole number, got '{s}'"))?;
        Self::new(raw).ok_or_else(|| anyhow!("user id must be positive, got {raw}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryPreference {
    Vegetarian,
    NonVegetarian,
    Vegan,
}

impl DietaryPreference {
    pub const ALL: [DietaryPreference; 3] = [
        DietaryPreference::Vegetarian,
        DietaryPreference::NonVegetarian,
        DietaryPreference::Vegan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryPreference::Vegetarian => "vegetarian",
            DietaryPreference::NonVegetarian => "non-vegetarian",
            DietaryPreference::Vegan => "vegan",
        }
    }
}

impl fmt::Display for DietaryPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietaryPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vegetarian" => Ok(DietaryPreference::Vegetarian),
            "non-vegetarian" | "non_vegetarian" | "nonvegetarian" => {
                Ok(DietaryPreference::NonVegetarian)
            }
            "vegan" => Ok(DietaryPreference::Vegan),
            other => bail!(
                "unknown dietary preference '{other}' (expected vegetarian, non-vegetarian or vegan)"
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub dietary_preference: Option<DietaryPreference>,
    pub medical_conditions: Option<String>,
    pub physical_limitations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input data for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub dietary_preference: Option<DietaryPreference>,
    pub medical_conditions: Option<String>,
    pub physical_limitations: Option<String>,
}

impl NewUser {
    /// Names of required text fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("city", &self.city),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// All required fields present and well-formed.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            bail!("Missing required fields: {}", missing.join(", "));
        }
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("city", &self.city),
            ("email", &self.email),
        ] {
            validate_required_field(field, value)?;
        }
        Ok(())
    }
}

/// Partial profile update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub city: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub dietary_preference: Option<DietaryPreference>,
    pub medical_conditions: Option<String>,
    pub physical_limitations: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.city.is_none()
            && self.email.is_none()
            && self.date_of_birth.is_none()
            && self.dietary_preference.is_none()
            && self.medical_conditions.is_none()
            && self.physical_limitations.is_none()
    }

    /// Required fields being changed must stay valid; they cannot be blanked.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("city", &self.city),
            ("email", &self.email),
        ] {
            if let Some(value) = value {
                validate_required_field(field, value)?;
            }
        }
        Ok(())
    }
}
