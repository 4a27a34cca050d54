//! Error types for the reading collector.

use thiserror::Error;

use super::InvalidToken;

/// Why a submission was not accepted. Every variant renders as a message
/// that can be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectorError {
    /// No usable user id in the turn context. Does not consume a retry.
    #[error("Authentication required. Please provide a valid user id.")]
    Authentication,

    /// At least one token failed to parse or fell outside the bounds.
    #[error("{}", describe_rejection(.problems, *.attempts_remaining))]
    Format {
        problems: Vec<InvalidToken>,
        attempts_remaining: u32,
    },

    /// The retry budget ran out; the session is over.
    #[error("Maximum retry attempts reached after {attempts} invalid submissions. This session has ended; start a new one to try again.")]
    RetryBudgetExhausted { attempts: u32 },

    /// The session already reached a terminal state.
    #[error("This collection session has already finished. Start a new session to submit more readings.")]
    SessionFinished,
}

impl CollectorError {
    /// True when the session cannot accept further input.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            CollectorError::RetryBudgetExhausted { .. } | CollectorError::SessionFinished
        )
    }
}

/// Problems listed individually in a rejection message; the rest are counted.
const LISTED_PROBLEMS: usize = 3;

fn describe_rejection(problems: &[InvalidToken], attempts_remaining: u32) -> String {
    let mut details = problems
        .iter()
        .take(LISTED_PROBLEMS)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if problems.len() > LISTED_PROBLEMS {
        details.push_str(&format!(" and {} more", problems.len() - LISTED_PROBLEMS));
    }
    let attempts = if attempts_remaining == 1 {
        "1 attempt left".to_string()
    } else {
        format!("{attempts_remaining} attempts left")
    };
    format!(
        "I didn't understand that ({details}). Send readings in mg/dL like `95,110,102` ({attempts})."
    )
}
