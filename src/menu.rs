//! Numbered terminal menu: the default front end when no subcommand is given.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{error, info};

use crate::{
    collector::CollectionSession,
    commands::{context_for, current_meal, write_readings, write_statistics, write_users},
    conversation::{run_collection, CollectionOutcome},
    db::{Database, DietaryPreference, NewUser, ReadingType, UserId, UserUpdate},
    settings::Settings,
};

const MENU: &str = "\
=== CGM Assistant ===
1. Record CGM readings
2. Show recent readings
3. Show statistics
4. Create user
5. Update profile
6. List users
7. Quit";

const RECENT_LIMIT: u32 = 10;
const DEFAULT_STATS_DAYS: u32 = 30;
const LIST_LIMIT: u32 = 20;

enum Flow {
    Continue,
    Exit,
}

/// Print `question`, read one line. `None` once input is exhausted.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<Option<String>> {
    write!(output, "{question}: ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line).context("failed to read input")? == 0 {
        writeln!(output)?;
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn blank_to_none(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

enum Answer<T> {
    Value(T),
    Invalid,
    Eof,
}

fn ask_user_id<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Answer<UserId>> {
    let Some(raw) = ask(input, output, "User ID")? else {
        return Ok(Answer::Eof);
    };
    match raw.parse::<UserId>() {
        Ok(id) => Ok(Answer::Value(id)),
        Err(err) => {
            writeln!(output, "{err}")?;
            Ok(Answer::Invalid)
        }
    }
}

pub async fn run_menu<R: BufRead, W: Write>(
    db: &Database,
    settings: &Settings,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    loop {
        writeln!(output, "\n{MENU}")?;
        let Some(choice) = ask(input, output, "Choose an option")? else {
            return Ok(());
        };

        let result = match choice.to_ascii_lowercase().as_str() {
            "1" => record_readings(db, settings, input, output).await,
            "2" => recent_readings(db, input, output).await,
            "3" => statistics(db, input, output).await,
            "4" => create_user(db, input, output).await,
            "5" => update_profile(db, input, output).await,
            "6" => list_users(db, output).await,
            "7" | "q" | "quit" | "exit" => Ok(Flow::Exit),
            "" => Ok(Flow::Continue),
            other => {
                writeln!(output, "Unknown option '{other}'. Pick 1-7.")?;
                Ok(Flow::Continue)
            }
        };

        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => {
                writeln!(output, "Goodbye!")?;
                return Ok(());
            }
            Err(err) => {
                error!("Menu action failed: {err:#}");
                writeln!(output, "Error: {err:#}")?;
            }
        }
    }
}

async fn record_readings<R: BufRead, W: Write>(
    db: &Database,
    settings: &Settings,
    input: &mut R,
    output: &mut W,
) -> Result<Flow> {
    let user_id = match ask_user_id(input, output)? {
        Answer::Value(id) => id,
        Answer::Invalid => return Ok(Flow::Continue),
        Answer::Eof => return Ok(Flow::Exit),
    };

    let suggested = current_meal();
    let question = format!("Meal (breakfast/lunch/dinner) [{suggested}]");
    let Some(meal) = ask(input, output, &question)? else {
        return Ok(Flow::Exit);
    };
    let reading_type = if meal.is_empty() {
        suggested
    } else {
        match meal.parse::<ReadingType>() {
            Ok(reading_type) => reading_type,
            Err(err) => {
                writeln!(output, "{err}")?;
                return Ok(Flow::Continue);
            }
        }
    };

    let context = context_for(db, user_id).await?;
    let mut session = CollectionSession::new(settings.collector.clone());
    let outcome = run_collection(&mut session, &context, reading_type, input, output, db).await?;

    if outcome == CollectionOutcome::Unauthenticated {
        writeln!(output, "No profile found for user #{user_id}. Create one with option 4.")?;
    }
    Ok(Flow::Continue)
}

async fn recent_readings<R: BufRead, W: Write>(
    db: &Database,
    input: &mut R,
    output: &mut W,
) -> Result<Flow> {
    Ok(match ask_user_id(input, output)? {
        Answer::Value(user_id) => {
            let readings = db.recent_cgm_readings(user_id, RECENT_LIMIT, None).await?;
            write_readings(output, user_id, &readings)?;
            Flow::Continue
        }
        Answer::Invalid => Flow::Continue,
        Answer::Eof => Flow::Exit,
    })
}

async fn statistics<R: BufRead, W: Write>(
    db: &Database,
    input: &mut R,
    output: &mut W,
) -> Result<Flow> {
    let user_id = match ask_user_id(input, output)? {
        Answer::Value(id) => id,
        Answer::Invalid => return Ok(Flow::Continue),
        Answer::Eof => return Ok(Flow::Exit),
    };

    let Some(days) = ask(input, output, &format!("Days [{DEFAULT_STATS_DAYS}]"))? else {
        return Ok(Flow::Exit);
    };
    let days = if days.is_empty() {
        DEFAULT_STATS_DAYS
    } else {
        match days.parse::<u32>() {
            Ok(days) if days > 0 => days,
            _ => {
                writeln!(output, "Days must be a positive whole number.")?;
                return Ok(Flow::Continue);
            }
        }
    };

    let stats = db.cgm_statistics(user_id, days).await?;
    write_statistics(output, user_id, &stats)?;
    Ok(Flow::Continue)
}

async fn list_users<W: Write>(db: &Database, output: &mut W) -> Result<Flow> {
    let users = db.list_users(LIST_LIMIT).await?;
    write_users(output, &users)?;
    Ok(Flow::Continue)
}

fn parse_diet(raw: &str) -> Result<Option<DietaryPreference>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        raw.parse().map(Some)
    }
}

async fn create_user<R: BufRead, W: Write>(
    db: &Database,
    input: &mut R,
    output: &mut W,
) -> Result<Flow> {
    let mut answers = Vec::with_capacity(8);
    for question in [
        "First name",
        "Last name",
        "City",
        "Email",
        "Date of birth (YYYY-MM-DD)",
        "Dietary preference (vegetarian/non-vegetarian/vegan, optional)",
        "Medical conditions (optional)",
        "Physical limitations (optional)",
    ] {
        let Some(answer) = ask(input, output, question)? else {
            return Ok(Flow::Exit);
        };
        answers.push(answer);
    }
    let [first_name, last_name, city, email, dob, diet, conditions, limitations]: [String; 8] =
        match answers.try_into() {
            Ok(answers) => answers,
            Err(_) => return Ok(Flow::Continue),
        };

    let Ok(date_of_birth) = NaiveDate::parse_from_str(&dob, "%Y-%m-%d") else {
        writeln!(output, "Dates look like 1990-04-01.")?;
        return Ok(Flow::Continue);
    };
    let dietary_preference = match parse_diet(&diet) {
        Ok(pref) => pref,
        Err(err) => {
            writeln!(output, "{err}")?;
            return Ok(Flow::Continue);
        }
    };

    let user = db
        .create_user(NewUser {
            first_name,
            last_name,
            city,
            email,
            date_of_birth,
            dietary_preference,
            medical_conditions: blank_to_none(conditions),
            physical_limitations: blank_to_none(limitations),
        })
        .await?;
    info!("Created user #{} from the menu", user.id);
    writeln!(output, "Created user #{} ({}).", user.id, user.full_name())?;
    Ok(Flow::Continue)
}

async fn update_profile<R: BufRead, W: Write>(
    db: &Database,
    input: &mut R,
    output: &mut W,
) -> Result<Flow> {
    let user_id = match ask_user_id(input, output)? {
        Answer::Value(id) => id,
        Answer::Invalid => return Ok(Flow::Continue),
        Answer::Eof => return Ok(Flow::Exit),
    };

    let Some(missing) = db.missing_profile_fields(user_id).await? else {
        writeln!(output, "User #{user_id} not found.")?;
        return Ok(Flow::Continue);
    };
    if missing.is_empty() {
        writeln!(output, "Profile is complete. Leave an answer blank to keep it.")?;
    } else {
        writeln!(output, "Profile is missing: {}", missing.join(", "))?;
    }

    let mut answers = Vec::with_capacity(4);
    for question in [
        "City",
        "Dietary preference",
        "Medical conditions",
        "Physical limitations",
    ] {
        let Some(answer) = ask(input, output, question)? else {
            return Ok(Flow::Exit);
        };
        answers.push(answer);
    }
    let [city, diet, conditions, limitations]: [String; 4] = match answers.try_into() {
        Ok(answers) => answers,
        Err(_) => return Ok(Flow::Continue),
    };

    let dietary_preference = match parse_diet(&diet) {
        Ok(pref) => pref,
        Err(err) => {
            writeln!(output, "{err}")?;
            return Ok(Flow::Continue);
        }
    };
    let update = UserUpdate {
        city: blank_to_none(city),
        dietary_preference,
        medical_conditions: blank_to_none(conditions),
        physical_limitations: blank_to_none(limitations),
        ..UserUpdate::default()
    };
    if update.is_empty() {
        writeln!(output, "Nothing to update.")?;
        return Ok(Flow::Continue);
    }

    let user = db.update_user(user_id, update).await?;
    writeln!(output, "Updated profile for {}.", user.full_name())?;
    Ok(Flow::Continue)
}
