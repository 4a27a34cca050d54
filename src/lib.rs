pub mod cli;
pub mod collector;
pub mod commands;
pub mod conversation;
pub mod db;
pub mod menu;
pub mod seed;
pub mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use cli::{Args, Command};
use settings::Settings;

/// Info by default, Debug with `--debug`; `RUST_LOG` directives are
/// applied last so they win over both.
fn logger_builder(debug: bool, rust_log: Option<&str>) -> env_logger::Builder {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Some(filters) = rust_log {
        builder.parse_filters(filters);
    }
    builder
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    // .env first so RUST_LOG from it is honoured
    let dotenv = dotenvy::dotenv();

    logger_builder(args.debug, std::env::var("RUST_LOG").ok().as_deref()).init();

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => return Err(err).context("failed to load .env"),
    }

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        settings.database_path = db;
    }
    info!(
        "CGM assistant starting (database: {}, retries: {})",
        settings.database_path.display(),
        settings.collector.max_retries
    );

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(commands::execute(
        args.command.unwrap_or(Command::Menu),
        settings,
    ))
}
