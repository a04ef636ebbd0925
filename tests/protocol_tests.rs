use lobby_client::protocol::{decode_fields, is_player_name_field};
use lobby_client::{FormKind, InboundEvent, LobbyError, LobbyEvent, LobbySummary, OutboundRequest};

#[test]
fn test_create_request_encodes_as_ordered_pairs() -> anyhow::Result<()> {
    let request = OutboundRequest::new(
        FormKind::CreateGame,
        [("playername_create", "Alice"), ("playernumber", "4")],
    );
    assert_eq!(
        request.encode()?,
        r#"[["playername_create","Alice"],["playernumber","4"]]"#
    );
    Ok(())
}

#[test]
fn test_join_request_has_same_shape() -> anyhow::Result<()> {
    let request = OutboundRequest::new(
        FormKind::JoinGame,
        [("playername_join", "Bob"), ("gameid", "G42")],
    );
    let text = request.encode()?;
    assert_eq!(text, r#"[["playername_join","Bob"],["gameid","G42"]]"#);
    assert_eq!(decode_fields(&text)?, request.fields);
    Ok(())
}

#[test]
fn test_empty_form_encodes_as_empty_array() -> anyhow::Result<()> {
    let request = OutboundRequest::new(FormKind::CreateGame, Vec::<(String, String)>::new());
    assert_eq!(request.encode()?, "[]");
    Ok(())
}

#[test]
fn test_player_name_lookup() {
    let request = OutboundRequest::new(
        FormKind::JoinGame,
        [("gameid", "G1"), ("playername_join", "Carol")],
    );
    assert_eq!(request.player_name(), Some("Carol"));
    assert_eq!(request.field("gameid"), Some("G1"));
    assert_eq!(request.field("missing"), None);

    assert!(is_player_name_field("playername"));
    assert!(is_player_name_field("playername_create"));
    assert!(!is_player_name_field("playernumber"));
    assert!(!is_player_name_field("name"));
}

#[test]
fn test_decode_new_game_event() -> anyhow::Result<()> {
    let event = InboundEvent::decode(r#"{"type":"new_game","game_id":"G42"}"#)?;
    assert_eq!(event.event_type, "new_game");
    assert_eq!(event.str_field("game_id"), Some("G42"));
    assert_eq!(event, InboundEvent::new_game("G42"));

    let parsed = LobbyEvent::try_from(&event)?;
    assert_eq!(
        parsed,
        LobbyEvent::NewGame {
            game_id: "G42".to_string(),
            player_name: None
        }
    );
    assert_eq!(parsed.confirmed_game(), Some("G42"));
    Ok(())
}

#[test]
fn test_extra_fields_are_kept_in_payload() -> anyhow::Result<()> {
    let event = InboundEvent::decode(r#"{"type":"joined_game","game_id":"G7","seat":2}"#)?;
    assert_eq!(event.payload.get("seat"), Some(&serde_json::json!(2)));
    assert_eq!(
        LobbyEvent::try_from(&event)?,
        LobbyEvent::JoinedGame {
            game_id: "G7".to_string(),
            player_name: None
        }
    );
    Ok(())
}

#[test]
fn test_encoded_event_decodes_to_itself() -> anyhow::Result<()> {
    let event = InboundEvent::new_game("G1").with("player_name", "Dora");
    assert_eq!(InboundEvent::decode(&event.encode()?)?, event);
    Ok(())
}

#[test]
fn test_malformed_frames_are_decode_errors() {
    for text in [
        "",
        "not json",
        r#"{"game_id":"G1"}"#,
        r#"{"type":7}"#,
        r#"["type","new_game"]"#,
        r#""new_game""#,
        r#"{"type":"new_game""#,
    ] {
        assert!(
            matches!(InboundEvent::decode(text), Err(LobbyError::Decode(_))),
            "expected decode error for {:?}",
            text
        );
    }
}

#[test]
fn test_unknown_event_type() -> anyhow::Result<()> {
    let event = InboundEvent::decode(r#"{"type":"ping"}"#)?;
    assert_eq!(
        LobbyEvent::try_from(&event),
        Err(LobbyError::UnknownEventType("ping".to_string()))
    );
    Ok(())
}

#[test]
fn test_confirmation_without_string_game_id() -> anyhow::Result<()> {
    for text in [
        r#"{"type":"new_game"}"#,
        r#"{"type":"new_game","game_id":42}"#,
        r#"{"type":"joined_game","game_id":null}"#,
    ] {
        let event = InboundEvent::decode(text)?;
        assert!(
            matches!(LobbyEvent::try_from(&event), Err(LobbyError::Decode(_))),
            "expected decode error for {}",
            text
        );
    }
    Ok(())
}

#[test]
fn test_server_error_event() -> anyhow::Result<()> {
    let event = InboundEvent::decode(r#"{"type":"error","message":"Game is already full"}"#)?;
    let parsed = LobbyEvent::try_from(&event)?;
    assert_eq!(
        parsed,
        LobbyEvent::ServerError {
            message: "Game is already full".to_string()
        }
    );
    assert_eq!(parsed.confirmed_game(), None);
    Ok(())
}

#[test]
fn test_lobbies_event() -> anyhow::Result<()> {
    let event = InboundEvent::decode(
        r#"{"type":"lobbies","lobbies":[{"game_id":"abc","num_players_required":5,"current_player_count":2,"players":["A","B"]}]}"#,
    )?;
    let parsed = LobbyEvent::try_from(&event)?;
    let expected = LobbySummary {
        game_id: "abc".to_string(),
        num_players_required: 5,
        current_player_count: 2,
        players: vec!["A".to_string(), "B".to_string()],
    };
    assert_eq!(parsed, LobbyEvent::Lobbies(vec![expected.clone()]));
    assert_eq!(parsed.confirmed_game(), None);
    assert_eq!(expected.open_seats(), 3);
    assert!(!expected.is_full());

    let empty = InboundEvent::decode(r#"{"type":"lobbies","lobbies":[]}"#)?;
    assert_eq!(LobbyEvent::try_from(&empty)?, LobbyEvent::Lobbies(Vec::new()));
    Ok(())
}

#[test]
fn test_overfull_lobby_has_no_open_seats() {
    let lobby = LobbySummary {
        game_id: "G1".to_string(),
        num_players_required: 3,
        current_player_count: 4,
        players: Vec::new(),
    };
    assert_eq!(lobby.open_seats(), 0);
    assert!(lobby.is_full());
}
