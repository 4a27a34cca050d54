//! Sample data for demos: random user profiles plus a month of
//! breakfast/lunch/dinner readings each.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use log::info;
use rand::{seq::SliceRandom, Rng};

use crate::db::{Database, DietaryPreference, NewCgmReading, NewUser, ReadingType, UserId};

const FIRST_NAMES: &[&str] = &[
    "Amara", "Ben", "Chen", "Dalia", "Emil", "Farah", "Goran", "Hana", "Ivan", "Jonas", "Keiko",
    "Luis", "Mira", "Noah", "Olga", "Priya", "Rafael", "Sara", "Tariq", "Yara",
];

const LAST_NAMES: &[&str] = &[
    "Adeyemi", "Bauer", "Costa", "Dubois", "Eriksen", "Fischer", "Garcia", "Haddad", "Ivanova",
    "Jensen", "Kowalski", "Larsen", "Moreau", "Nakamura", "Okafor", "Patel", "Rossi", "Silva",
];

const CITIES: &[&str] = &[
    "Austin", "Bergen", "Cork", "Denver", "Graz", "Lyon", "Nairobi", "Osaka", "Porto", "Quito",
];

const MEDICAL_CONDITIONS: &[&str] = &[
    "Type 2 diabetes",
    "Hypertension",
    "High cholesterol",
    "Heart disease",
    "Asthma",
    "Arthritis",
];

const PHYSICAL_LIMITATIONS: &[&str] = &[
    "Mobility issues",
    "Visual impairment",
    "Hearing impairment",
    "Limited dexterity",
];

/// Hour of day each meal reading is taken at.
const MEAL_HOURS: [(ReadingType, u32); 3] = [
    (ReadingType::Breakfast, 8),
    (ReadingType::Lunch, 13),
    (ReadingType::Dinner, 18),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub readings: usize,
}

/// Zero to two entries joined with ", ", or "None".
fn pick_some<R: Rng + ?Sized>(rng: &mut R, options: &[&str]) -> String {
    let count = rng.gen_range(0..=2);
    let picked: Vec<&str> = options.choose_multiple(rng, count).copied().collect();
    if picked.is_empty() {
        "None".to_string()
    } else {
        picked.join(", ")
    }
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

pub fn generate_users<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<NewUser> {
    (0..count)
        .map(|index| {
            let first_name = pick(rng, FIRST_NAMES);
            let last_name = pick(rng, LAST_NAMES);
            let age_days = rng.gen_range(18 * 365..90 * 365);
            let date_of_birth = Utc::now().date_naive() - Duration::days(age_days);

            NewUser {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                city: pick(rng, CITIES).to_string(),
                // index keeps emails unique when names repeat
                email: format!(
                    "{}.{}{}@example.com",
                    first_name.to_lowercase(),
                    last_name.to_lowercase(),
                    index + 1
                ),
                date_of_birth,
                dietary_preference: DietaryPreference::ALL.choose(rng).copied(),
                medical_conditions: Some(pick_some(rng, MEDICAL_CONDITIONS)),
                physical_limitations: Some(pick_some(rng, PHYSICAL_LIMITATIONS)),
            }
        })
        .collect()
}

fn meal_reading<R: Rng + ?Sized>(rng: &mut R, reading_type: ReadingType) -> f64 {
    let base: f64 = rng.gen_range(80.0..160.0);
    let adjusted = match reading_type {
        ReadingType::Breakfast => base + rng.gen_range(0.0..20.0),
        ReadingType::Lunch => base + rng.gen_range(-10.0..10.0),
        ReadingType::Dinner => base + rng.gen_range(-20.0..0.0),
    };
    (adjusted.clamp(70.0, 200.0) * 10.0).round() / 10.0
}

/// Three readings per user per day for `days_back` days ending on `today`.
pub fn generate_readings<R: Rng + ?Sized>(
    rng: &mut R,
    user_ids: &[UserId],
    days_back: u32,
    today: NaiveDate,
) -> Vec<NewCgmReading> {
    let mut readings = Vec::with_capacity(user_ids.len() * days_back as usize * MEAL_HOURS.len());

    for &user_id in user_ids {
        for day in 0..days_back {
            let date = today - Duration::days(i64::from(day));
            for (reading_type, hour) in MEAL_HOURS {
                let Some(naive) = date.and_hms_opt(hour, rng.gen_range(0..60), 0) else {
                    continue;
                };
                let timestamp: DateTime<Utc> = Utc.from_utc_datetime(&naive);
                readings.push(NewCgmReading {
                    user_id,
                    reading: meal_reading(rng, reading_type),
                    reading_type,
                    timestamp,
                });
            }
        }
    }

    readings
}

/// Create `user_count` users and `days_back` days of readings for each.
pub async fn populate<R: Rng + ?Sized>(
    db: &Database,
    rng: &mut R,
    user_count: usize,
    days_back: u32,
) -> Result<SeedSummary> {
    let mut user_ids = Vec::with_capacity(user_count);
    for user in generate_users(rng, user_count) {
        let email = user.email.clone();
        let created = db
            .create_user(user)
            .await
            .with_context(|| format!("failed to create sample user {email}"))?;
        user_ids.push(created.id);
    }
    info!("Inserted {} sample users", user_ids.len());

    let readings = generate_readings(rng, &user_ids, days_back, Utc::now().date_naive());
    let written = db
        .bulk_insert_cgm_readings(readings)
        .await
        .context("failed to insert sample readings")?;
    info!("Inserted {written} sample CGM readings");

    Ok(SeedSummary {
        users: user_ids.len(),
        readings: written,
    })
}
