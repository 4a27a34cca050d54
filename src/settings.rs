use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::collector::CollectorConfig;

pub const DEFAULT_DB_PATH: &str = "db/users.db";

const DB_PATH_VARS: [&str; 2] = ["CGM_DB_PATH", "DB_PATH"];
const MAX_RETRIES_VAR: &str = "CGM_MAX_RETRIES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub database_path: PathBuf,
    pub collector: CollectorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            collector: CollectorConfig::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional JSON file, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        settings
            .collector
            .validate()
            .context("invalid collector settings")?;
        Ok(settings)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!(
                "Settings file {} not found; using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = DB_PATH_VARS
            .iter()
            .find_map(|key| lookup(key).filter(|value| !value.trim().is_empty()))
        {
            self.database_path = PathBuf::from(db_path.trim());
        }

        if let Some(raw) = lookup(MAX_RETRIES_VAR) {
            self.collector.max_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{MAX_RETRIES_VAR} must be a whole number, got '{raw}'"))?;
        }

        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
