use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::db::{DietaryPreference, NewUser, ReadingType, UserId};

#[derive(Parser, Debug)]
#[command(name = "cgm-assistant")]
#[command(about = "Collect, validate and review CGM glucose readings from the terminal")]
pub struct Args {
    /// Path to a JSON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides settings and CGM_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the schema and fill it with sample users and readings
    InitDb {
        /// Number of sample users
        #[arg(long, default_value_t = 100)]
        users: usize,

        /// Days of readings per user (three per day)
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// Delete an existing database file first
        #[arg(long)]
        reset: bool,
    },

    /// Create a user profile
    AddUser(AddUserArgs),

    /// List users, newest first
    Users {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Enter CGM readings for a user interactively
    Collect {
        #[arg(long)]
        user_id: UserId,

        /// breakfast, lunch or dinner (defaults from the time of day)
        #[arg(long)]
        meal: Option<ReadingType>,
    },

    /// Show a user's most recent readings
    Readings {
        #[arg(long)]
        user_id: UserId,

        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// Only readings from the last N days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Summarise a user's readings
    Stats {
        #[arg(long)]
        user_id: UserId,

        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Print the effective settings as JSON
    Config {
        /// Also write them to this file
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Interactive menu (default)
    Menu,
}

#[derive(clap::Args, Debug)]
pub struct AddUserArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    #[arg(long)]
    pub city: String,

    #[arg(long)]
    pub email: String,

    /// Date of birth, YYYY-MM-DD
    #[arg(long)]
    pub dob: NaiveDate,

    /// vegetarian, non-vegetarian or vegan
    #[arg(long)]
    pub diet: Option<DietaryPreference>,

    #[arg(long)]
    pub conditions: Option<String>,

    #[arg(long)]
    pub limitations: Option<String>,
}

impl From<AddUserArgs> for NewUser {
    fn from(args: AddUserArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            city: args.city,
            email: args.email,
            date_of_birth: args.dob,
            dietary_preference: args.diet,
            medical_conditions: args.conditions,
            physical_limitations: args.limitations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_menu() {
        let args = Args::try_parse_from(["cgm-assistant"]).unwrap();
        assert!(args.command.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn test_collect_parses_typed_values() {
        let args = Args::try_parse_from([
            "cgm-assistant",
            "collect",
            "--user-id",
            "42",
            "--meal",
            "Lunch",
            "--db",
            "/tmp/x.db",
        ])
        .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("/tmp/x.db")));
        match args.command {
            Some(Command::Collect { user_id, meal }) => {
                assert_eq!(user_id.get(), 42);
                assert_eq!(meal, Some(ReadingType::Lunch));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Args::try_parse_from(["cgm-assistant", "collect", "--user-id", "0"]).is_err());
        assert!(Args::try_parse_from([
            "cgm-assistant",
            "collect",
            "--user-id",
            "1",
            "--meal",
            "snack"
        ])
        .is_err());
    }

    #[test]
    fn test_add_user_converts_to_new_user() {
        let args = Args::try_parse_from([
            "cgm-assistant",
            "add-user",
            "--first-name",
            "Lena",
            "--last-name",
            "Hart",
            "--city",
            "Bremen",
            "--email",
            "lena@example.com",
            "--dob",
            "1990-04-01",
            "--diet",
            "vegan",
        ])
        .unwrap();
        let Some(Command::AddUser(add)) = args.command else {
            panic!("expected add-user");
        };
        let user = NewUser::from(add);
        assert_eq!(user.dietary_preference, Some(DietaryPreference::Vegan));
        assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(1990, 4, 1).unwrap());
    }
}
