//! Integration tests for rooms running as actors behind a registry.
//!
//! Every test runs on a paused clock: sleeping past a turn's countdown
//! lets the timer task tick, expire and be processed by the room actor
//! before the test looks at the events players received.

use std::time::Duration;

use quik_protocol::{PlayerId, ServerEvent};
use quik_room::{RoomConfig, RoomError, RoomHandle, RoomRegistry};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

fn pid(id: &str) -> PlayerId {
    PlayerId::from(id)
}

/// Joins `ids` in order and returns one inbox per player.
async fn join_all(registry: &RoomRegistry, room: &RoomHandle, ids: &[&str]) -> Vec<Inbox> {
    let mut inboxes = Vec::new();
    for id in ids {
        let (tx, rx) = mpsc::unbounded_channel();
        registry
            .join(room.room_id(), pid(id), id.to_uppercase(), tx)
            .await
            .unwrap();
        inboxes.push(rx);
    }
    inboxes
}

fn drain(inbox: &mut Inbox) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = inbox.try_recv() {
        events.push(event);
    }
    events
}

/// Drops tick events.
fn without_ticks(events: Vec<ServerEvent>) -> Vec<ServerEvent> {
    events
        .into_iter()
        .filter(|e| !matches!(e, ServerEvent::Tick { .. }))
        .collect()
}

fn ticks(events: &[ServerEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::Tick { countdown } => Some(*countdown),
            _ => None,
        })
        .collect()
}

/// Just past one full countdown with the default config.
async fn let_countdown_expire() {
    tokio::time::sleep(Duration::from_millis(10_500)).await;
}

// =========================================================================
// Joining and locking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_broadcasts_room_joined_to_everyone() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;

    let first = drain(&mut inboxes[0]);
    assert_eq!(first.len(), 2, "a sees its own join and b's");
    match &first[1] {
        ServerEvent::RoomJoined {
            players,
            player_count,
            current_player,
            ..
        } => {
            assert_eq!(*player_count, 2);
            assert_eq!(players[0].id, pid("a"));
            assert_eq!(players[1].id, pid("b"));
            assert!(current_player.is_none());
        }
        other => panic!("expected room-joined, got {other:?}"),
    }
    assert_eq!(drain(&mut inboxes[1]).len(), 1);
    assert_eq!(registry.room_of(&pid("b")).unwrap(), *room.room_id());
}

#[tokio::test(start_paused = true)]
async fn test_locked_room_refuses_new_players_but_not_reconnects() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b", "c"]).await;
    room.start_round().await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = registry
        .join(room.room_id(), pid("d"), "D", tx)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::RoomLocked(room.room_id().clone()));

    registry.disconnect(&pid("c")).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let info = registry
        .join(room.room_id(), pid("c"), "C", tx)
        .await
        .unwrap();
    assert!(info.locked);
    assert_eq!(info.player_count(), 3);
    let c = info.players.iter().find(|p| p.id == pid("c")).unwrap();
    assert!(c.connected);
    assert!(c.eliminated, "c sits out the rest of this round");
    assert!(matches!(rx.try_recv(), Ok(ServerEvent::RoomJoined { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_connected_player_cannot_join_twice() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a"]).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(matches!(
        registry.join(room.room_id(), pid("a"), "A", tx).await,
        Err(RoomError::AlreadyInRoom(..))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_player_cannot_join_a_second_room() {
    let registry = RoomRegistry::default();
    let first = registry.create_room();
    let second = registry.create_room();
    let _inboxes = join_all(&registry, &first, &["a"]).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(matches!(
        registry.join(second.room_id(), pid("a"), "A", tx).await,
        Err(RoomError::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_round_needs_two_players() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a"]).await;

    assert!(matches!(
        room.start_round().await,
        Err(RoomError::InsufficientPlayers { .. })
    ));
    assert!(!room.info().await.unwrap().locked);
}

// =========================================================================
// Turns and countdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_round_start_locks_and_counts_down() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b", "c"]).await;
    drain(&mut inboxes[0]);

    room.start_round().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let events = drain(&mut inboxes[0]);
    assert_eq!(events[0], ServerEvent::RoomLocked);
    match &events[1] {
        ServerEvent::RoundStarted {
            current_player,
            used_letters,
            ..
        } => {
            assert_eq!(current_player.as_ref().unwrap().id, pid("a"));
            assert!(used_letters.is_empty());
        }
        other => panic!("expected round-started, got {other:?}"),
    }
    assert_eq!(ticks(&events), vec![10, 9, 8, 7]);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_eliminates_holder_and_starts_next_turn() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b", "c"]).await;
    room.start_round().await.unwrap();
    drain(&mut inboxes[1]);
    tokio::time::sleep(Duration::from_millis(1)).await;
    drain(&mut inboxes[1]);

    let_countdown_expire().await;

    let events = drain(&mut inboxes[1]);
    assert_eq!(ticks(&events), vec![9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
    let events = without_ticks(events);
    match events.as_slice() {
        [
            ServerEvent::PlayerEliminated { eliminated_player },
            ServerEvent::StartTurn { current_player, .. },
        ] => {
            assert_eq!(eliminated_player.id, pid("a"));
            assert!(eliminated_player.eliminated);
            assert_eq!(current_player.as_ref().unwrap().id, pid("b"));
        }
        other => panic!("unexpected events {other:?}"),
    }

    // The next countdown is started by the clients.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(drain(&mut inboxes[1]).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_end_turn_beats_expiry() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b", "c"]).await;
    room.start_round().await.unwrap();

    tokio::time::sleep(Duration::from_millis(9_500)).await;
    room.end_turn(pid("a"), None).await.unwrap();
    drain(&mut inboxes[2]);

    let_countdown_expire().await;
    assert!(
        drain(&mut inboxes[2]).is_empty(),
        "cancelled countdown must neither tick nor eliminate"
    );
    let info = room.info().await.unwrap();
    assert!(info.players.iter().all(|p| !p.eliminated));
    assert_eq!(info.current_player.unwrap().id, pid("b"));

    // b's own countdown runs out: b is out, c is up.
    room.restart_timer().await.unwrap();
    let_countdown_expire().await;
    let events = without_ticks(drain(&mut inboxes[2]));
    match events.as_slice() {
        [
            ServerEvent::PlayerEliminated { eliminated_player },
            ServerEvent::StartTurn { current_player, .. },
        ] => {
            assert_eq!(eliminated_player.id, pid("b"));
            assert_eq!(current_player.as_ref().unwrap().id, pid("c"));
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_turn_from_wrong_player() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();

    assert_eq!(
        room.end_turn(pid("b"), None).await.unwrap_err(),
        RoomError::NotYourTurn(pid("b"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_timer_while_running_restarts_count() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    drain(&mut inboxes[0]);
    room.restart_timer().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(ticks(&drain(&mut inboxes[0])), vec![10, 9]);
}

#[tokio::test(start_paused = true)]
async fn test_select_letter_swaps_previous_choice() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;
    drain(&mut inboxes[1]);

    room.select_letter('A', None).await.unwrap();
    room.select_letter('B', Some('A')).await.unwrap();

    let events = drain(&mut inboxes[1]);
    match events.last() {
        Some(ServerEvent::LetterSelected { used_letters }) => {
            assert_eq!(used_letters.len(), 1);
            assert_eq!(used_letters.get(&'B'), Some(&true));
        }
        other => panic!("expected letter-selected, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_turn_marks_played_letter_unselectable() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();

    room.select_letter('M', None).await.unwrap();
    room.end_turn(pid("a"), Some('M')).await.unwrap();

    let info = room.info().await.unwrap();
    assert_eq!(info.used_letters.get(&'M'), Some(&false));
}

// =========================================================================
// Rounds and games
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_three_round_wins_end_the_game() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        room.start_round().await.unwrap();
        let_countdown_expire().await;
        outcomes.extend(
            without_ticks(drain(&mut inboxes[1]))
                .into_iter()
                .filter(|e| {
                    matches!(
                        e,
                        ServerEvent::RoundEnded { .. } | ServerEvent::GameEnded { .. }
                    )
                }),
        );
    }

    assert_eq!(outcomes.len(), 3);
    for (round, event) in outcomes[..2].iter().enumerate() {
        match event {
            ServerEvent::RoundEnded { winning_player } => {
                assert_eq!(winning_player.id, pid("b"));
                assert_eq!(winning_player.win_count, round as u32 + 1);
            }
            other => panic!("expected round-ended, got {other:?}"),
        }
    }
    match &outcomes[2] {
        ServerEvent::GameEnded {
            game_winner,
            player_count,
            used_letters,
            ..
        } => {
            assert_eq!(game_winner.id, pid("b"));
            assert_eq!(game_winner.win_count, 3);
            assert_eq!(*player_count, 2);
            assert!(used_letters.is_empty());
        }
        other => panic!("expected game-ended, got {other:?}"),
    }

    let info = room.info().await.unwrap();
    assert!(info.players.iter().all(|p| p.win_count == 0 && !p.eliminated));
    assert!(!info.round_active);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_of_holder_passes_turn() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b", "c"]).await;
    room.start_round().await.unwrap();
    drain(&mut inboxes[1]);

    registry.disconnect(&pid("a")).await.unwrap();
    let events = without_ticks(drain(&mut inboxes[1]));
    assert_eq!(events[0], ServerEvent::Disconnected { player_id: pid("a") });
    match &events[1] {
        ServerEvent::StartTurn { current_player, .. } => {
            assert_eq!(current_player.as_ref().unwrap().id, pid("b"));
        }
        other => panic!("expected start-turn, got {other:?}"),
    }

    // a's countdown was cancelled along with the turn.
    let_countdown_expire().await;
    assert!(drain(&mut inboxes[1]).is_empty());
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_leaving_down_to_one_unlocks_and_ends_round() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();
    drain(&mut inboxes[1]);

    assert_eq!(registry.leave(&pid("a")).await.unwrap(), 1);

    let events = without_ticks(drain(&mut inboxes[1]));
    assert_eq!(events[0], ServerEvent::PlayerLeft { player_id: pid("a") });
    assert!(matches!(
        &events[1],
        ServerEvent::RoundEnded { winning_player } if winning_player.id == pid("b")
    ));

    let info = room.info().await.unwrap();
    assert!(!info.locked);
    assert!(!info.round_active);
    assert!(registry.room_of(&pid("a")).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_last_player_leaving_removes_room() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b"]).await;

    registry.leave(&pid("a")).await.unwrap();
    assert_eq!(registry.room_count(), 1);
    assert_eq!(registry.leave(&pid("b")).await.unwrap(), 0);

    assert_eq!(registry.room_count(), 0);
    assert!(registry.get(room.room_id()).is_err());
    assert!(matches!(
        room.info().await,
        Err(RoomError::Unavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_remove_room_stops_running_countdown() {
    let registry = RoomRegistry::new(RoomConfig::default());
    let room = registry.create_room();
    let mut inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();

    registry.remove_room(room.room_id()).await.unwrap();
    assert!(registry.room_of(&pid("a")).is_err());
    drain(&mut inboxes[0]);

    let_countdown_expire().await;
    assert!(drain(&mut inboxes[0]).is_empty());
    assert!(registry.room_ids().is_empty());
}

// =========================================================================
// Room lifetime
// =========================================================================

fn short_idle() -> RoomConfig {
    RoomConfig {
        idle_timeout: Duration::from_secs(5),
        ..RoomConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_room_closes_after_everyone_disconnects() {
    let registry = RoomRegistry::new(short_idle());
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b"]).await;

    assert_eq!(registry.disconnect(&pid("a")).await.unwrap(), 1);
    assert_eq!(registry.disconnect(&pid("b")).await.unwrap(), 0);

    // Seats are kept for a while so players can come back.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(registry.room_count(), 1);
    assert_eq!(registry.room_of(&pid("a")).unwrap(), *room.room_id());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(registry.room_count(), 0);
    assert!(matches!(
        registry.room_of(&pid("a")),
        Err(RoomError::PlayerNotFound(_))
    ));
    assert!(matches!(
        room.info().await,
        Err(RoomError::Unavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_room_nobody_joins_is_closed() {
    let registry = RoomRegistry::new(short_idle());
    registry.create_room();
    assert_eq!(registry.room_count(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(registry.room_count(), 0);
    assert!(registry.room_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_idle_timeout_keeps_room() {
    let registry = RoomRegistry::new(short_idle());
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a"]).await;

    registry.disconnect(&pid("a")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    registry
        .join(room.room_id(), pid("a"), "A", tx)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(registry.room_count(), 1);
    let info = room.info().await.unwrap();
    assert!(info.players.iter().all(|p| p.connected));
}

#[tokio::test(start_paused = true)]
async fn test_join_racing_last_leave_is_refused() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a"]).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let leaver = pid("a");
    let (left, joined) = tokio::join!(
        registry.leave(&leaver),
        registry.join(room.room_id(), pid("b"), "B", tx),
    );

    assert_eq!(left.unwrap(), 0);
    assert_eq!(
        joined.unwrap_err(),
        RoomError::Unavailable(room.room_id().clone())
    );
    assert_eq!(registry.room_count(), 0);
    assert!(registry.room_of(&pid("b")).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_joins_into_two_rooms_admit_one() {
    let registry = RoomRegistry::default();
    let first = registry.create_room();
    let second = registry.create_room();

    let (tx1, _rx1) = mpsc::unbounded_channel();
    let (tx2, _rx2) = mpsc::unbounded_channel();
    let (one, two) = tokio::join!(
        registry.join(first.room_id(), pid("p"), "P", tx1),
        registry.join(second.room_id(), pid("p"), "P", tx2),
    );

    assert!(one.is_ok());
    assert!(matches!(two, Err(RoomError::InvalidState(_))));
    assert_eq!(registry.room_of(&pid("p")).unwrap(), *first.room_id());
    assert_eq!(second.info().await.unwrap().player_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refused_join_releases_player() {
    let registry = RoomRegistry::default();
    let room = registry.create_room();
    let _inboxes = join_all(&registry, &room, &["a", "b"]).await;
    room.start_round().await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(registry.join(room.room_id(), pid("c"), "C", tx).await.is_err());
    assert!(registry.room_of(&pid("c")).is_err());

    let other = registry.create_room();
    let (tx, _rx) = mpsc::unbounded_channel();
    registry.join(other.room_id(), pid("c"), "C", tx).await.unwrap();
}
