//! Integration tests for the message router.
//!
//! These drive the router actor directly through its event queue, with
//! plain channels standing in for connection writer tasks — the same seam
//! the real reader/writer tasks use, minus the sockets.

use std::time::Duration;

use cardlink_protocol::{
    ClientMessage, CloseReason, JoinError, PlayerId, RoomCode, RoomStatus, ServerMessage,
};
use cardlink_server::{Router, RouterEvent};
use serde_json::json;
use tokio::sync::mpsc;

const LONG_TTL: Duration = Duration::from_secs(3600);

struct TestClient {
    id: PlayerId,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("outbound channel closed")
    }

    /// Polls without waiting, after giving the router a moment to run.
    async fn try_recv(&mut self) -> Option<ServerMessage> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.rx.try_recv().ok()
    }
}

/// Registers a connection with the router and consumes the `connected` ack.
async fn connect(events: &mpsc::UnboundedSender<RouterEvent>, id: u64) -> TestClient {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = PlayerId(id);
    events
        .send(RouterEvent::Connected {
            player_id: id,
            sender: tx,
        })
        .unwrap();

    let mut client = TestClient { id, rx };
    match client.recv().await {
        ServerMessage::Connected { player_id } => assert_eq!(player_id, id),
        other => panic!("expected connected ack, got {other:?}"),
    }
    client
}

fn send(events: &mpsc::UnboundedSender<RouterEvent>, client: &TestClient, message: ClientMessage) {
    events
        .send(RouterEvent::Inbound {
            player_id: client.id,
            message,
        })
        .unwrap();
}

/// Creates a room as `host` and returns its code.
async fn open_room(
    events: &mpsc::UnboundedSender<RouterEvent>,
    host: &mut TestClient,
) -> RoomCode {
    send(
        events,
        host,
        ClientMessage::CreateRoom {
            player_name: "Alice".into(),
            character_index: 2,
        },
    );
    match host.recv().await {
        ServerMessage::RoomCreated { room_code, room } => {
            assert_eq!(room.status, RoomStatus::Waiting);
            assert_eq!(room.host.id, host.id);
            assert!(room.guest.is_none());
            room_code
        }
        other => panic!("expected room_created, got {other:?}"),
    }
}

/// Joins `guest` into the room and drains both sides' join notifications.
async fn seat_guest(
    events: &mpsc::UnboundedSender<RouterEvent>,
    host: &mut TestClient,
    guest: &mut TestClient,
    code: &RoomCode,
) {
    send(
        events,
        guest,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Bob".into(),
            character_index: 5,
        },
    );
    match guest.recv().await {
        ServerMessage::RoomJoined { room, .. } => assert_eq!(room.status, RoomStatus::Ready),
        other => panic!("expected room_joined, got {other:?}"),
    }
    match host.recv().await {
        ServerMessage::PlayerJoined { guest: seated } => assert_eq!(seated.id, guest.id),
        other => panic!("expected player_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_carries_guest_payload_to_both_sides() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;

    send(
        &events,
        &bob,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Bob".into(),
            character_index: 5,
        },
    );

    match bob.recv().await {
        ServerMessage::RoomJoined { room_code, room } => {
            assert_eq!(room_code, code);
            assert_eq!(room.status, RoomStatus::Ready);
            let guest = room.guest.expect("guest seated");
            assert_eq!(guest.character_index, 5);
            assert!(!guest.ready);
        }
        other => panic!("expected room_joined, got {other:?}"),
    }
    match alice.recv().await {
        ServerMessage::PlayerJoined { guest } => {
            assert_eq!(guest.id, bob.id);
            assert_eq!(guest.character_index, 5);
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_is_case_insensitive() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;

    send(
        &events,
        &bob,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_ascii_lowercase(),
            player_name: "Bob".into(),
            character_index: 0,
        },
    );

    assert!(matches!(bob.recv().await, ServerMessage::RoomJoined { .. }));
}

#[tokio::test]
async fn test_join_unknown_code_reports_not_found() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut bob = connect(&events, 2).await;

    send(
        &events,
        &bob,
        ClientMessage::JoinRoom {
            room_code: "ZZZZZZ".into(),
            player_name: "Bob".into(),
            character_index: 0,
        },
    );

    assert_eq!(
        bob.recv().await,
        ServerMessage::JoinError {
            error: JoinError::RoomNotFound
        }
    );
}

#[tokio::test]
async fn test_join_occupied_room_reports_full() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let mut eve = connect(&events, 3).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(
        &events,
        &eve,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Eve".into(),
            character_index: 0,
        },
    );

    assert_eq!(
        eve.recv().await,
        ServerMessage::JoinError {
            error: JoinError::RoomFull
        }
    );
}

#[tokio::test]
async fn test_join_playing_room_reports_in_progress() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let mut eve = connect(&events, 3).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &alice, ClientMessage::StartGame);
    alice.recv().await; // game_started
    bob.recv().await;

    send(
        &events,
        &eve,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Eve".into(),
            character_index: 0,
        },
    );

    assert_eq!(
        eve.recv().await,
        ServerMessage::JoinError {
            error: JoinError::GameInProgress
        }
    );
}

#[tokio::test]
async fn test_update_character_reaches_peer_but_not_sender() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &alice, ClientMessage::UpdateCharacter { character_index: 7 });

    assert_eq!(
        bob.recv().await,
        ServerMessage::CharacterUpdated {
            player_id: alice.id,
            character_index: 7,
            is_host: true,
        }
    );
    assert_eq!(alice.try_recv().await, None, "sender must not see an echo");
}

#[tokio::test]
async fn test_set_ready_reaches_peer_but_not_sender() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &bob, ClientMessage::SetReady { ready: true });

    assert_eq!(
        alice.recv().await,
        ServerMessage::ReadyUpdated {
            player_id: bob.id,
            ready: true,
            is_host: false,
        }
    );
    assert_eq!(bob.try_recv().await, None, "sender must not see an echo");
}

#[tokio::test]
async fn test_start_game_broadcasts_to_both_including_initiator() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &alice, ClientMessage::StartGame);

    for client in [&mut alice, &mut bob] {
        match client.recv().await {
            ServerMessage::GameStarted { room } => {
                assert_eq!(room.status, RoomStatus::Playing);
                assert!(room.started_at.is_some());
            }
            other => panic!("expected game_started, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_start_game_from_guest_has_no_effect() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &bob, ClientMessage::StartGame);

    assert_eq!(alice.try_recv().await, None);
    assert_eq!(bob.try_recv().await, None);
}

#[tokio::test]
async fn test_start_game_without_guest_has_no_effect() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let _code = open_room(&events, &mut alice).await;

    send(&events, &alice, ClientMessage::StartGame);

    assert_eq!(alice.try_recv().await, None);
}

#[tokio::test]
async fn test_game_action_is_relayed_verbatim_to_peer_only() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    let payload = json!({"dice": [3, 5], "skill": "counter"});
    send(
        &events,
        &alice,
        ClientMessage::GameAction {
            action: "attack".into(),
            data: payload.clone(),
        },
    );

    assert_eq!(
        bob.recv().await,
        ServerMessage::GameAction {
            player_id: alice.id,
            action: "attack".into(),
            data: payload,
        }
    );
    assert_eq!(alice.try_recv().await, None, "sender must not see an echo");
}

#[tokio::test]
async fn test_host_disconnect_closes_room_for_guest() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    events
        .send(RouterEvent::Disconnected { player_id: alice.id })
        .unwrap();

    assert_eq!(
        bob.recv().await,
        ServerMessage::RoomClosed {
            reason: CloseReason::HostLeft
        }
    );

    // The room is gone from the registry.
    let mut eve = connect(&events, 3).await;
    send(
        &events,
        &eve,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Eve".into(),
            character_index: 0,
        },
    );
    assert_eq!(
        eve.recv().await,
        ServerMessage::JoinError {
            error: JoinError::RoomNotFound
        }
    );
}

#[tokio::test]
async fn test_guest_disconnect_reverts_room_to_waiting() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    events
        .send(RouterEvent::Disconnected { player_id: bob.id })
        .unwrap();

    assert_eq!(
        alice.recv().await,
        ServerMessage::PlayerLeft { player_id: bob.id }
    );

    // The slot is free again: a new guest can join.
    let mut eve = connect(&events, 3).await;
    send(
        &events,
        &eve,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Eve".into(),
            character_index: 0,
        },
    );
    assert!(matches!(eve.recv().await, ServerMessage::RoomJoined { .. }));
}

#[tokio::test]
async fn test_leave_room_message_behaves_like_disconnect_for_the_room() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    send(&events, &bob, ClientMessage::LeaveRoom);

    assert_eq!(
        alice.recv().await,
        ServerMessage::PlayerLeft { player_id: bob.id }
    );
}

#[tokio::test]
async fn test_create_while_hosting_closes_previous_room() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let first = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &first).await;

    // Creating a second room implicitly leaves (and thus closes) the
    // first one.
    let second = open_room(&events, &mut alice).await;
    assert_ne!(first, second);

    assert_eq!(
        bob.recv().await,
        ServerMessage::RoomClosed {
            reason: CloseReason::HostLeft
        }
    );
}

#[tokio::test]
async fn test_room_ops_outside_a_room_are_ignored() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut loner = connect(&events, 1).await;

    send(&events, &loner, ClientMessage::UpdateCharacter { character_index: 3 });
    send(&events, &loner, ClientMessage::SetReady { ready: true });
    send(&events, &loner, ClientMessage::LeaveRoom);
    send(
        &events,
        &loner,
        ClientMessage::GameAction {
            action: "attack".into(),
            data: serde_json::Value::Null,
        },
    );

    assert_eq!(loner.try_recv().await, None);
}

#[tokio::test]
async fn test_sweep_closes_expired_rooms_with_timeout_reason() {
    let (events, _router) = Router::spawn(Duration::ZERO);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    // Any nonzero age exceeds a zero TTL.
    tokio::time::sleep(Duration::from_millis(5)).await;
    events.send(RouterEvent::Sweep).unwrap();

    for client in [&mut alice, &mut bob] {
        assert_eq!(
            client.recv().await,
            ServerMessage::RoomClosed {
                reason: CloseReason::Timeout
            }
        );
    }

    // Deletion is visible: the code no longer resolves.
    let mut eve = connect(&events, 3).await;
    send(
        &events,
        &eve,
        ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: "Eve".into(),
            character_index: 0,
        },
    );
    assert_eq!(
        eve.recv().await,
        ServerMessage::JoinError {
            error: JoinError::RoomNotFound
        }
    );
}

#[tokio::test]
async fn test_sweep_spares_fresh_rooms() {
    let (events, _router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let _code = open_room(&events, &mut alice).await;

    events.send(RouterEvent::Sweep).unwrap();

    assert_eq!(alice.try_recv().await, None);
}

#[tokio::test]
async fn test_shutdown_notifies_occupants_and_stops_router() {
    let (events, router) = Router::spawn(LONG_TTL);
    let mut alice = connect(&events, 1).await;
    let mut bob = connect(&events, 2).await;
    let code = open_room(&events, &mut alice).await;
    seat_guest(&events, &mut alice, &mut bob, &code).await;

    events.send(RouterEvent::Shutdown).unwrap();

    assert_eq!(alice.recv().await, ServerMessage::ServerShutdown);
    assert_eq!(bob.recv().await, ServerMessage::ServerShutdown);

    tokio::time::timeout(Duration::from_secs(1), router)
        .await
        .expect("router should stop")
        .expect("router should not panic");
}
