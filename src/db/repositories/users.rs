use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_date, parse_datetime, parse_optional_dietary_preference},
    models::{NewUser, User, UserId, UserUpdate},
};

const USER_COLUMNS: &str = "id, first_name, last_name, city, email, date_of_birth, dietary_preference,
     medical_conditions, physical_limitations, created_at, updated_at";

fn row_to_user(row: &Row) -> Result<User> {
    let id: i64 = row.get("id")?;
    let date_of_birth: String = row.get("date_of_birth")?;
    let dietary_preference: Option<String> = row.get("dietary_preference")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(User {
        id: UserId::new(id).ok_or_else(|| anyhow!("stored user has invalid id {id}"))?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        city: row.get("city")?,
        email: row.get("email")?,
        date_of_birth: parse_date(&date_of_birth, "date_of_birth")?,
        dietary_preference: parse_optional_dietary_preference(dietary_preference)?,
        medical_conditions: row.get("medical_conditions")?,
        physical_limitations: row.get("physical_limitations")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation && message.contains("users.email")
    )
}

fn select_user(conn: &rusqlite::Connection, user_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let mut rows = stmt.query(params![user_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_user(row)?)),
        None => Ok(None),
    }
}

impl Database {
    /// Create a user profile.
    /// Returns an error if a required field is blank or malformed, or the
    /// email is taken.
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;

        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            let inserted = conn.execute(
                "INSERT INTO users (
                    first_name, last_name, city, email, date_of_birth,
                    dietary_preference, medical_conditions, physical_limitations,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.first_name.trim(),
                    user.last_name.trim(),
                    user.city.trim(),
                    user.email.trim(),
                    user.date_of_birth.format("%Y-%m-%d").to_string(),
                    user.dietary_preference.map(|pref| pref.as_str()),
                    user.medical_conditions,
                    user.physical_limitations,
                    now,
                    now,
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    bail!("A user with email {} already exists", user.email.trim())
                }
                Err(err) => return Err(anyhow::Error::new(err).context("failed to insert user")),
            }

            let user_id = conn.last_insert_rowid();
            select_user(conn, user_id)?.ok_or_else(|| anyhow!("User not found after insert"))
        })
        .await
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.execute(move |conn| select_user(conn, user_id.get()))
            .await
    }

    pub async fn user_exists(&self, user_id: UserId) -> Result<bool> {
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM users WHERE id = ?1",
                    params![user_id.get()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    pub async fn find_user_id_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let email = email.trim().to_string();
        self.execute(move |conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    params![email],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id.and_then(UserId::new))
        })
        .await
    }

    /// Most recently created users first.
    pub async fn list_users(&self, limit: u32) -> Result<Vec<User>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY id DESC LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![i64::from(limit)])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(row_to_user(row)?);
            }

            Ok(users)
        })
        .await
    }

    /// Apply a partial profile update and return the stored user.
    pub async fn update_user(&self, user_id: UserId, update: UserUpdate) -> Result<User> {
        if update.is_empty() {
            bail!("No fields to update");
        }
        update.validate()?;

        self.execute(move |conn| {
            // Build update query dynamically based on what's being updated
            let mut updates = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            let text_fields = [
                ("first_name", update.first_name),
                ("last_name", update.last_name),
                ("city", update.city),
                ("email", update.email),
                ("medical_conditions", update.medical_conditions),
                ("physical_limitations", update.physical_limitations),
            ];
            for (column, value) in text_fields {
                if let Some(value) = value {
                    updates.push(format!("{column} = ?"));
                    params_vec.push(Box::new(value.trim().to_string()));
                }
            }
            if let Some(dob) = update.date_of_birth {
                updates.push("date_of_birth = ?".to_string());
                params_vec.push(Box::new(dob.format("%Y-%m-%d").to_string()));
            }
            if let Some(pref) = update.dietary_preference {
                updates.push("dietary_preference = ?".to_string());
                params_vec.push(Box::new(pref.as_str()));
            }

            updates.push("updated_at = ?".to_string());
            params_vec.push(Box::new(format_datetime(&Utc::now())));

            let query = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));
            params_vec.push(Box::new(user_id.get()));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let rows_affected = match conn.execute(&query, params_refs.as_slice()) {
                Ok(rows) => rows,
                Err(err) if is_unique_violation(&err) => {
                    bail!("Another user already uses that email")
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context("failed to update user"))
                }
            };

            if rows_affected == 0 {
                bail!("User #{user_id} not found");
            }

            select_user(conn, user_id.get())?
                .ok_or_else(|| anyhow!("User not found after update"))
        })
        .await
    }

    /// Required profile fields that are still blank, in the order the
    /// profile flow asks for them. `None` when the user does not exist.
    /// `date_of_birth` is never reported: the column is NOT NULL and
    /// `create_user` always sets it.
    pub async fn missing_profile_fields(&self, user_id: UserId) -> Result<Option<Vec<&'static str>>> {
        let user = self
            .get_user(user_id)
            .await
            .with_context(|| format!("failed to load user #{user_id}"))?;

        Ok(user.map(|user| {
            let mut missing = Vec::new();
            for (field, blank) in [
                ("first_name", user.first_name.trim().is_empty()),
                ("last_name", user.last_name.trim().is_empty()),
                ("email", user.email.trim().is_empty()),
                ("city", user.city.trim().is_empty()),
                ("dietary_preference", user.dietary_preference.is_none()),
            ] {
                if blank {
                    missing.push(field);
                }
            }
            missing
        }))
    }
}
