//! Line-oriented driver for one collection session.
//!
//! Reads submissions from any `BufRead`, writes replies to any `Write`, and
//! hands an accepted batch to a [`ReadingSink`]. The terminal front end
//! uses stdin/stdout; tests use in-memory buffers.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error};

use crate::collector::{
    CollectionSession, CollectorContext, CollectorError, ReadingBatch, ReadingSink,
};
use crate::db::models::ReadingType;

const CANCEL_WORDS: [&str; 3] = ["cancel", "exit", "quit"];
/// Openers that ask for the prompt instead of submitting readings.
const GREETINGS: [&str; 3] = ["hi", "hello", "start"];

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    Saved { batch: ReadingBatch, ids: Vec<i64> },
    Aborted,
    Unauthenticated,
    /// Input ended or the user cancelled before a terminal state.
    Abandoned,
}

/// Run `session` until it succeeds, aborts, or input runs out.
///
/// Only a sink failure is returned as `Err`; every collector error is
/// shown to the user and reflected in the outcome.
pub async fn run_collection<R, W, S>(
    session: &mut CollectionSession,
    context: &CollectorContext,
    reading_type: ReadingType,
    input: &mut R,
    output: &mut W,
    sink: &S,
) -> Result<CollectionOutcome>
where
    R: BufRead,
    W: Write,
    S: ReadingSink + ?Sized,
{
    writeln!(output, "{}", session.prompt())?;
    writeln!(output, "Readings will be recorded as {reading_type}. Type `cancel` to stop.")?;

    let mut line = String::new();
    loop {
        write!(output, "> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line).context("failed to read input")? == 0 {
            debug!("Session {}: input closed", session.id());
            writeln!(output)?;
            return Ok(CollectionOutcome::Abandoned);
        }

        let submission = line.trim_end_matches(['\r', '\n']);
        let word = submission.trim().to_ascii_lowercase();
        if CANCEL_WORDS.contains(&word.as_str()) {
            writeln!(output, "Okay, nothing was recorded.")?;
            return Ok(CollectionOutcome::Abandoned);
        }

        // blank lines and an opening greeting re-prompt without costing a retry
        if word.is_empty() || (session.retry_count() == 0 && GREETINGS.contains(&word.as_str())) {
            debug!("Session {}: re-prompting", session.id());
            writeln!(output, "{}", session.prompt())?;
            continue;
        }

        match session.submit(submission, context) {
            Ok(batch) => {
                let ids = match sink.store_batch(&batch, reading_type, Utc::now()).await {
                    Ok(ids) => ids,
                    Err(err) => {
                        error!("Session {}: failed to store readings: {err:#}", session.id());
                        writeln!(output, "Sorry, I couldn't save your readings: {err:#}")?;
                        return Err(err.context("failed to store validated readings"));
                    }
                };
                writeln!(
                    output,
                    "✅ Saved {} readings for user #{}.",
                    batch.len(),
                    batch.user_id()
                )?;
                return Ok(CollectionOutcome::Saved { batch, ids });
            }
            Err(err @ CollectorError::Authentication) => {
                writeln!(output, "{err}")?;
                return Ok(CollectionOutcome::Unauthenticated);
            }
            Err(err) if err.ends_session() => {
                writeln!(output, "{err}")?;
                return Ok(CollectionOutcome::Aborted);
            }
            Err(err) => {
                writeln!(output, "{err}")?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorConfig;
    use crate::db::models::UserId;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        stored: Mutex<Vec<(Vec<f64>, ReadingType)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReadingSink for RecordingSink {
        async fn store_batch(
            &self,
            batch: &ReadingBatch,
            reading_type: ReadingType,
            _taken_at: DateTime<Utc>,
        ) -> Result<Vec<i64>> {
            if self.fail {
                return Err(anyhow!("disk full"));
            }
            let mut stored = self.stored.lock().unwrap();
            stored.push((batch.values().to_vec(), reading_type));
            Ok((1..=batch.len() as i64).collect())
        }
    }

    async fn converse(
        script: &str,
        context: CollectorContext,
        sink: &RecordingSink,
    ) -> (Result<CollectionOutcome>, String) {
        let mut session = CollectionSession::new(CollectorConfig::default());
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let outcome = run_collection(
            &mut session,
            &context,
            ReadingType::Breakfast,
            &mut input,
            &mut output,
            sink,
        )
        .await;
        (outcome, String::from_utf8(output).unwrap())
    }

    fn user() -> CollectorContext {
        CollectorContext::authenticated(UserId::new(123).unwrap())
    }

    #[tokio::test]
    async fn test_retry_then_save() {
        let sink = RecordingSink::default();
        let (outcome, transcript) = converse("95, abc, 102\n95,110,102\n", user(), &sink).await;

        match outcome.unwrap() {
            CollectionOutcome::Saved { batch, ids } => {
                assert_eq!(batch.values(), &[95.0, 110.0, 102.0]);
                assert_eq!(ids, vec![1, 2, 3]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(transcript.contains("'abc' is not a number"));
        assert!(transcript.contains("2 attempts left"));
        assert!(transcript.contains("✅ Saved 3 readings for user #123."));
        assert_eq!(
            *sink.stored.lock().unwrap(),
            vec![(vec![95.0, 110.0, 102.0], ReadingType::Breakfast)]
        );
    }

    #[tokio::test]
    async fn test_blank_lines_and_greeting_do_not_cost_retries() {
        let sink = RecordingSink::default();
        let mut session = CollectionSession::new(CollectorConfig::default());
        let mut input = Cursor::new(b"\n\nhi\n95\n".to_vec());
        let mut output = Vec::new();

        let outcome = run_collection(
            &mut session,
            &user(),
            ReadingType::Lunch,
            &mut input,
            &mut output,
            &sink,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CollectionOutcome::Saved { .. }));
        assert_eq!(session.retry_count(), 0);
        assert_eq!(*sink.stored.lock().unwrap(), vec![(vec![95.0], ReadingType::Lunch)]);
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Please enter your latest CGM readings").count(), 4);
    }

    #[tokio::test]
    async fn test_greeting_after_a_rejection_counts_as_input() {
        let sink = RecordingSink::default();
        let (outcome, transcript) = converse("abc\nhello\n\n100\n", user(), &sink).await;

        assert!(matches!(outcome.unwrap(), CollectionOutcome::Saved { .. }));
        assert!(transcript.contains("'hello' is not a number"));
        assert!(transcript.contains("1 attempt left"));
    }

    #[tokio::test]
    async fn test_abort_persists_nothing() {
        let sink = RecordingSink::default();
        let (outcome, transcript) = converse("abc\n999999\n-5\n100\n", user(), &sink).await;
        assert_eq!(outcome.unwrap(), CollectionOutcome::Aborted);
        assert!(transcript.contains("Maximum retry attempts reached"));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_context_stops_immediately() {
        let sink = RecordingSink::default();
        let (outcome, transcript) = converse("95\n", CollectorContext::anonymous(), &sink).await;
        assert_eq!(outcome.unwrap(), CollectionOutcome::Unauthenticated);
        assert!(transcript.contains("Authentication required"));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_eof_and_cancel_abandon() {
        let sink = RecordingSink::default();
        let (outcome, _) = converse("abc\n", user(), &sink).await;
        assert_eq!(outcome.unwrap(), CollectionOutcome::Abandoned);

        let (outcome, transcript) = converse(" Cancel \n", user(), &sink).await;
        assert_eq!(outcome.unwrap(), CollectionOutcome::Abandoned);
        assert!(transcript.contains("nothing was recorded"));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let (outcome, transcript) = converse("100\n", user(), &sink).await;
        assert!(outcome.is_err());
        assert!(transcript.contains("couldn't save your readings: disk full"));
    }
}
