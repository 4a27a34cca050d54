use cgm_assistant_lib::collector::{
    CollectionSession, CollectorConfig, CollectorContext, CollectorError, InvalidToken,
    ReadingSink, SessionState, TokenProblem,
};
use cgm_assistant_lib::db::{Database, NewUser, ReadingType, UserId};
use chrono::{NaiveDate, Utc};
use tempfile::tempdir;

fn user_123() -> CollectorContext {
    CollectorContext::from_raw(Some(123))
}

fn fresh_session() -> CollectionSession {
    CollectionSession::new(CollectorConfig::default())
}

#[test]
fn comma_separated_readings_are_accepted_in_order() {
    let mut session = fresh_session();
    let batch = session.submit("95,110,102", &user_123()).unwrap();

    assert_eq!(batch.values(), &[95.0, 110.0, 102.0]);
    assert_eq!(batch.user_id().get(), 123);
    assert_eq!(batch.session_id(), session.id());
    assert_eq!(session.state(), SessionState::Success);
}

#[test]
fn one_bad_token_rejects_the_whole_batch() {
    let mut session = fresh_session();
    let err = session.submit("95, abc, 102", &user_123()).unwrap_err();

    assert_eq!(
        err,
        CollectorError::Format {
            problems: vec![InvalidToken {
                position: 2,
                token: "abc".to_string(),
                problem: TokenProblem::NotNumeric,
            }],
            attempts_remaining: 2,
        }
    );
    assert_eq!(session.retry_count(), 1);
    assert_eq!(session.state(), SessionState::FormatError(1));
}

#[test]
fn missing_user_is_an_authentication_error_without_cost() {
    let mut session = fresh_session();
    let err = session
        .submit("95", &CollectorContext::from_raw(None))
        .unwrap_err();

    assert_eq!(err, CollectorError::Authentication);
    assert_eq!(session.retry_count(), 0);
    assert_eq!(session.state(), SessionState::AwaitingInput);
}

#[test]
fn third_invalid_submission_aborts() {
    let mut session = fresh_session();
    let context = user_123();

    assert!(matches!(
        session.submit("abc", &context),
        Err(CollectorError::Format { attempts_remaining: 2, .. })
    ));
    assert!(matches!(
        session.submit("999999", &context),
        Err(CollectorError::Format { attempts_remaining: 1, .. })
    ));
    let err = session.submit("-5", &context).unwrap_err();

    assert_eq!(err, CollectorError::RetryBudgetExhausted { attempts: 3 });
    assert!(err.ends_session());
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(
        session.submit("100", &context).unwrap_err(),
        CollectorError::SessionFinished
    );
}

#[test]
fn irregular_spacing_is_trimmed() {
    let mut session = fresh_session();
    let batch = session.submit("  95 , 110 ", &user_123()).unwrap();
    assert_eq!(batch.values(), &[95.0, 110.0]);
}

#[test]
fn independent_sessions_do_not_share_state() {
    let mut first = fresh_session();
    let mut second = fresh_session();
    let context = user_123();

    assert!(first.submit("abc", &context).is_err());
    let a = first.submit("101, 99", &context).unwrap();
    let b = second.submit("101, 99", &context).unwrap();

    assert_eq!(a.values(), b.values());
    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(second.retry_count(), 0);
}

#[tokio::test]
async fn accepted_batch_is_stored_through_the_database_sink() {
    let dir = tempdir().unwrap();
    let db = Database::new(dir.path().join("users.db")).unwrap();
    let user = db
        .create_user(NewUser {
            first_name: "Ines".into(),
            last_name: "Duarte".into(),
            city: "Porto".into(),
            email: "ines@example.com".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1982, 6, 15).unwrap(),
            dietary_preference: None,
            medical_conditions: Some("Type 2 diabetes".into()),
            physical_limitations: None,
        })
        .await
        .unwrap();

    let mut session = fresh_session();
    let batch = session
        .submit("95,110,102", &CollectorContext::authenticated(user.id))
        .unwrap();
    let ids = db
        .store_batch(&batch, ReadingType::Breakfast, Utc::now())
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);

    let stored = db.recent_cgm_readings(user.id, 10, None).await.unwrap();
    let mut values: Vec<f64> = stored.iter().map(|r| r.reading).collect();
    values.sort_by(f64::total_cmp);
    assert_eq!(values, vec![95.0, 102.0, 110.0]);

    let ghost = UserId::new(user.id.get() + 1).unwrap();
    let mut other = fresh_session();
    let orphan = other
        .submit("100", &CollectorContext::authenticated(ghost))
        .unwrap();
    assert!(db
        .store_batch(&orphan, ReadingType::Dinner, Utc::now())
        .await
        .is_err());
}
