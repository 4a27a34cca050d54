use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use super::{parse_readings, CollectorConfig, CollectorError};
use crate::db::models::UserId;

/// Where a collection session stands.
///
/// `Validating` is only observable while `submit` runs. `FormatError(n)`
/// means `n` consecutive rejected submissions and waiting for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    AwaitingInput,
    Validating,
    Success,
    FormatError(u32),
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Success | SessionState::Aborted)
    }
}

/// Per-turn caller context. The user id is the only thing the collector
/// needs; without it every submission is an authentication error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorContext {
    pub user_id: Option<UserId>,
}

impl CollectorContext {
    pub fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds a context from an unchecked id; zero and negative ids count
    /// as missing.
    pub fn from_raw(user_id: Option<i64>) -> Self {
        Self {
            user_id: user_id.and_then(UserId::new),
        }
    }

    fn authenticate(&self) -> Result<UserId, CollectorError> {
        self.user_id.ok_or(CollectorError::Authentication)
    }
}

/// A fully validated submission, ready for a [`ReadingSink`](super::ReadingSink).
///
/// Only a [`CollectionSession`] can build one, so holding a batch proves the
/// values passed validation and an authenticated user owns them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingBatch {
    session_id: Uuid,
    user_id: UserId,
    values: Vec<f64>,
}

impl ReadingBatch {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// mg/dL, in submission order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One conversational attempt at collecting readings from a user.
///
/// Holds the retry counter; nothing is shared between sessions.
#[derive(Debug, Clone)]
pub struct CollectionSession {
    id: Uuid,
    config: CollectorConfig,
    state: SessionState,
    retries: u32,
}

impl CollectionSession {
    pub fn new(config: CollectorConfig) -> Self {
        let id = Uuid::new_v4();
        debug!("Collection session {id} started");
        Self {
            id,
            config,
            state: SessionState::AwaitingInput,
            retries: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retries
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.config.max_retries.saturating_sub(self.retries)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Opening prompt for the conversation.
    pub fn prompt(&self) -> String {
        format!(
            "Please enter your latest CGM readings in mg/dL as a comma-separated list (e.g. `95,110,102`). Accepted range: {}-{} mg/dL.",
            self.config.min_mg_dl, self.config.max_mg_dl
        )
    }

    /// Validate one submission.
    ///
    /// Authentication failures leave the retry counter alone. A rejected
    /// batch consumes one retry; the rejection that uses up the budget
    /// aborts the session instead of asking again.
    pub fn submit(
        &mut self,
        input: &str,
        context: &CollectorContext,
    ) -> Result<ReadingBatch, CollectorError> {
        if self.is_finished() {
            return Err(CollectorError::SessionFinished);
        }

        let user_id = match context.authenticate() {
            Ok(user_id) => user_id,
            Err(err) => {
                debug!("Session {}: submission without a user id", self.id);
                return Err(err);
            }
        };

        self.state = SessionState::Validating;

        match parse_readings(input, &self.config) {
            Ok(values) => {
                self.state = SessionState::Success;
                info!(
                    "Session {}: accepted {} readings for user #{user_id}",
                    self.id,
                    values.len()
                );
                Ok(ReadingBatch {
                    session_id: self.id,
                    user_id,
                    values,
                })
            }
            Err(problems) => {
                self.retries += 1;
                if self.retries >= self.config.max_retries {
                    self.state = SessionState::Aborted;
                    warn!(
                        "Session {}: aborted after {} invalid submissions",
                        self.id, self.retries
                    );
                    return Err(CollectorError::RetryBudgetExhausted {
                        attempts: self.retries,
                    });
                }

                self.state = SessionState::FormatError(self.retries);
                debug!(
                    "Session {}: rejected submission {} ({} problems)",
                    self.id,
                    self.retries,
                    problems.len()
                );
                Err(CollectorError::Format {
                    problems,
                    attempts_remaining: self.attempts_remaining(),
                })
            }
        }
    }
}
