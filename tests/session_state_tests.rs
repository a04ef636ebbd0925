use std::sync::{Arc, Mutex};

use lobby_client::{LobbyError, SessionChange, SessionSnapshot, SessionState};

type ChangeLog = Arc<Mutex<Vec<(&'static str, SessionChange)>>>;

fn recorder(session: &SessionState, tag: &'static str) -> ChangeLog {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    session.subscribe(move |change| sink.lock().unwrap().push((tag, change.clone())));
    log
}

#[test]
fn test_new_session_is_empty() {
    let session = SessionState::new();
    assert_eq!(session.snapshot(), SessionSnapshot::default());
    assert_eq!(session.player_name(), None);
    assert_eq!(session.current_game_id(), None);
}

#[test]
fn test_subscribers_notified_in_subscription_order() {
    let session = SessionState::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let sink = Arc::clone(&log);
        session.subscribe(move |_| sink.lock().unwrap().push(tag));
    }

    assert!(session.set_current_game("G1"));
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn test_no_notification_when_value_unchanged() -> anyhow::Result<()> {
    let session = SessionState::new();
    let log = recorder(&session, "sub");

    assert!(session.set_current_game("G1"));
    assert!(!session.set_current_game("G1"));
    assert!(session.set_player_name("Alice")?);
    assert!(!session.set_player_name("Alice")?);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            ("sub", SessionChange::CurrentGame(Some("G1".to_string()))),
            ("sub", SessionChange::PlayerName(Some("Alice".to_string()))),
        ]
    );
    Ok(())
}

#[test]
fn test_set_current_game_overwrites() {
    let session = SessionState::new();
    let log = recorder(&session, "sub");

    session.set_current_game("G1");
    session.set_current_game("G2");

    assert_eq!(session.current_game_id().as_deref(), Some("G2"));
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn test_empty_player_name_rejected() {
    let session = SessionState::new();
    let log = recorder(&session, "sub");

    assert_eq!(session.set_player_name(""), Err(LobbyError::InvalidPlayerName));
    assert_eq!(session.player_name(), None);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_player_name_stored_as_given() -> anyhow::Result<()> {
    let session = SessionState::new();
    assert!(session.set_player_name("  Alice ")?);
    assert_eq!(session.player_name().as_deref(), Some("  Alice "));
    // A different string, so this is a change.
    assert!(session.set_player_name("Alice")?);

    assert!(session.set_player_name("   ")?);
    assert_eq!(session.player_name().as_deref(), Some("   "));
    Ok(())
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let session = SessionState::new();
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    let id = session.subscribe(move |_| *sink.lock().unwrap() += 1);

    session.set_current_game("G1");
    assert!(session.unsubscribe(id));
    assert!(!session.unsubscribe(id));
    session.set_current_game("G2");

    assert_eq!(*count.lock().unwrap(), 1);
    assert_eq!(session.subscriber_count(), 0);
}

#[test]
fn test_subscriber_can_read_session() {
    let session = Arc::new(SessionState::new());
    let seen = Arc::new(Mutex::new(None));
    let reader = Arc::clone(&session);
    let sink = Arc::clone(&seen);
    session.subscribe(move |_| *sink.lock().unwrap() = reader.current_game_id());

    session.set_current_game("G9");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("G9"));
}

#[test]
fn test_clear_notifies_only_for_set_fields() -> anyhow::Result<()> {
    let session = SessionState::new();
    session.set_player_name("Alice")?;
    let log = recorder(&session, "sub");

    session.clear();
    session.clear();

    assert_eq!(
        *log.lock().unwrap(),
        vec![("sub", SessionChange::PlayerName(None))]
    );
    assert_eq!(session.snapshot(), SessionSnapshot::default());
    Ok(())
}
