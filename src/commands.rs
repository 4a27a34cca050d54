use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{Local, Timelike};
use log::{info, warn};

use crate::{
    cli::Command,
    collector::{CollectionSession, CollectorContext},
    conversation::{run_collection, CollectionOutcome},
    db::{CgmReading, CgmStatistics, Database, NewUser, ReadingType, User, UserId},
    menu, seed,
    settings::Settings,
};

pub async fn execute(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::InitDb { users, days, reset } => init_db(&settings, users, days, reset).await,
        Command::AddUser(args) => add_user(&settings, args.into()).await,
        Command::Users { limit } => list_users(&settings, limit).await,
        Command::Collect { user_id, meal } => collect(&settings, user_id, meal).await,
        Command::Readings {
            user_id,
            limit,
            days,
        } => readings(&settings, user_id, limit, days).await,
        Command::Stats { user_id, days } => stats(&settings, user_id, days).await,
        Command::Config { write } => show_config(&settings, write.as_deref()),
        Command::Menu => {
            let db = open(&settings)?;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout().lock();
            menu::run_menu(&db, &settings, &mut input, &mut output).await
        }
    }
}

fn open(settings: &Settings) -> Result<Database> {
    Database::new(settings.database_path.clone()).with_context(|| {
        format!(
            "failed to open database at {}",
            settings.database_path.display()
        )
    })
}

fn sidecar_paths(db_path: &Path) -> Vec<PathBuf> {
    ["-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = db_path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

async fn init_db(settings: &Settings, users: usize, days: u32, reset: bool) -> Result<()> {
    let path = &settings.database_path;
    if reset && path.exists() {
        println!("Deleting existing database at {}", path.display());
        fs::remove_file(path)
            .with_context(|| format!("failed to delete {}", path.display()))?;
        for sidecar in sidecar_paths(path) {
            if sidecar.exists() {
                fs::remove_file(&sidecar)
                    .with_context(|| format!("failed to delete {}", sidecar.display()))?;
            }
        }
    }

    let db = open(settings)?;
    if !reset && !db.list_users(1).await?.is_empty() {
        warn!("Database already contains users; sample data will be added alongside them");
    }

    let mut rng = rand::thread_rng();
    let summary = seed::populate(&db, &mut rng, users, days).await?;

    println!("Database ready at {}", db.path().display());
    println!("- Users: {}", summary.users);
    if summary.users > 0 {
        println!(
            "- CGM readings: {} (approx. {} per user)",
            summary.readings,
            summary.readings / summary.users
        );
    }
    Ok(())
}

async fn add_user(settings: &Settings, user: NewUser) -> Result<()> {
    let db = open(settings)?;
    let created = db.create_user(user).await?;
    info!("Created user #{}", created.id);
    println!("Created user #{} ({})", created.id, created.full_name());
    Ok(())
}

async fn list_users(settings: &Settings, limit: u32) -> Result<()> {
    let db = open(settings)?;
    let users = db.list_users(limit).await?;
    write_users(&mut io::stdout().lock(), &users)
}

/// Suggested meal for "now" in local time.
pub(crate) fn current_meal() -> ReadingType {
    ReadingType::from_hour(Local::now().hour())
}

/// Context for a collection run; unknown users get none, so the collector
/// reports an authentication error.
pub(crate) async fn context_for(db: &Database, user_id: UserId) -> Result<CollectorContext> {
    if db.user_exists(user_id).await? {
        Ok(CollectorContext::authenticated(user_id))
    } else {
        warn!("User #{user_id} does not exist; collecting without authentication");
        Ok(CollectorContext::anonymous())
    }
}

async fn collect(settings: &Settings, user_id: UserId, meal: Option<ReadingType>) -> Result<()> {
    let db = open(settings)?;
    let context = context_for(&db, user_id).await?;
    let mut session = CollectionSession::new(settings.collector.clone());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout().lock();
    let outcome = run_collection(
        &mut session,
        &context,
        meal.unwrap_or_else(current_meal),
        &mut input,
        &mut output,
        &db,
    )
    .await?;

    match outcome {
        CollectionOutcome::Saved { .. } | CollectionOutcome::Abandoned => Ok(()),
        CollectionOutcome::Aborted => bail!("reading collection aborted after too many invalid entries"),
        CollectionOutcome::Unauthenticated => bail!("user #{user_id} is not registered"),
    }
}

async fn readings(
    settings: &Settings,
    user_id: UserId,
    limit: u32,
    days: Option<u32>,
) -> Result<()> {
    let db = open(settings)?;
    let readings = db.recent_cgm_readings(user_id, limit, days).await?;
    write_readings(&mut io::stdout().lock(), user_id, &readings)
}

async fn stats(settings: &Settings, user_id: UserId, days: u32) -> Result<()> {
    let db = open(settings)?;
    let stats = db.cgm_statistics(user_id, days).await?;
    write_statistics(&mut io::stdout().lock(), user_id, &stats)
}

fn show_config(settings: &Settings, write: Option<&Path>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    if let Some(path) = write {
        settings.persist(path)?;
        println!("Settings written to {}", path.display());
    }
    Ok(())
}

pub(crate) fn write_users<W: Write>(output: &mut W, users: &[User]) -> Result<()> {
    if users.is_empty() {
        writeln!(output, "No users found.")?;
        return Ok(());
    }
    for user in users {
        writeln!(
            output,
            "#{:<5} {:<24} {:<28} {:<12} {}",
            user.id,
            user.full_name(),
            user.email,
            user.city,
            user.dietary_preference
                .map(|pref| pref.as_str())
                .unwrap_or("-")
        )?;
    }
    Ok(())
}

pub(crate) fn write_readings<W: Write>(
    output: &mut W,
    user_id: UserId,
    readings: &[CgmReading],
) -> Result<()> {
    if readings.is_empty() {
        writeln!(output, "No readings found for user #{user_id}.")?;
        return Ok(());
    }
    writeln!(output, "Recent readings for user #{user_id}:")?;
    for reading in readings {
        writeln!(
            output,
            "  {}  {:<9} {:>6.1} mg/dL",
            reading.timestamp.format("%Y-%m-%d %H:%M"),
            reading.reading_type.as_str(),
            reading.reading
        )?;
    }
    Ok(())
}

pub(crate) fn write_statistics<W: Write>(
    output: &mut W,
    user_id: UserId,
    stats: &CgmStatistics,
) -> Result<()> {
    if stats.count == 0 {
        writeln!(
            output,
            "No readings for user #{user_id} in the last {} days.",
            stats.period_days
        )?;
        return Ok(());
    }
    writeln!(
        output,
        "User #{user_id}, last {} days: {} readings, average {:.1} mg/dL (min {:.1}, max {:.1})",
        stats.period_days, stats.count, stats.average, stats.min, stats.max
    )?;
    Ok(())
}
