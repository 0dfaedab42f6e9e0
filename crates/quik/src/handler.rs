//! Per-connection handler: decode client events and route them to rooms.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The task waits on two things at once:
//!   1. the socket, for client events;
//!   2. its room inbox, for events the room broadcasts.
//!
//! A connection is not tied to a player until it sends `join-room`. When
//! the socket closes, the joined player is marked disconnected; their seat
//! stays in the room so the same player id can rejoin.

use std::sync::Arc;

use quik_protocol::{ClientEvent, Codec, PlayerId, ServerEvent};
use quik_room::{PlayerSender, RoomError, RoomHandle};
use quik_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::QuikError;
use crate::server::ServerState;

/// The player this connection speaks for, once joined.
struct Seat {
    player_id: PlayerId,
    room: RoomHandle,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), QuikError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (inbox_tx, mut inbox) = mpsc::unbounded_channel();
    let mut seat: Option<Seat> = None;

    let result: Result<(), QuikError> = loop {
        tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Some(data)) => {
                    if let Err(e) = handle_client_data(&conn, &state, &inbox_tx, &mut seat, &data).await {
                        break Err(e);
                    }
                }
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed cleanly");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            },
            // The handler keeps `inbox_tx` alive, so this never yields `None`.
            Some(event) = inbox.recv() => {
                if let Err(e) = send_event(&conn, &state.codec, &event).await {
                    break Err(e);
                }
            }
        }
    };

    if let Some(seat) = seat {
        match seat.room.disconnect(seat.player_id.clone()).await {
            Ok(connected) => tracing::info!(
                %conn_id,
                player_id = %seat.player_id,
                connected,
                "player disconnected"
            ),
            Err(e) => tracing::debug!(%conn_id, error = %e, "disconnect not delivered"),
        }
    }
    result
}

/// Decodes and dispatches one client message. Rejected requests are
/// answered with an `error` event; only socket failures end the loop.
async fn handle_client_data<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    inbox: &PlayerSender,
    seat: &mut Option<Seat>,
    data: &[u8],
) -> Result<(), QuikError> {
    let event = match state
        .codec
        .decode::<ClientEvent>(data)
        .and_then(ClientEvent::validated)
    {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(conn_id = %conn.id(), error = %e, "bad client event");
            return send_error(conn, &state.codec, e.to_string()).await;
        }
    };

    if let Err(e) = dispatch(conn, state, inbox, seat, event).await {
        match e {
            QuikError::Room(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "request rejected");
                return send_error(conn, &state.codec, e.to_string()).await;
            }
            other => return Err(other),
        }
    }
    Ok(())
}

async fn dispatch<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    inbox: &PlayerSender,
    seat: &mut Option<Seat>,
    event: ClientEvent,
) -> Result<(), QuikError> {
    let joined = |seat: &Option<Seat>| -> Result<(PlayerId, RoomHandle), QuikError> {
        seat.as_ref()
            .map(|s| (s.player_id.clone(), s.room.clone()))
            .ok_or_else(|| RoomError::InvalidState("join a room first".into()).into())
    };

    match event {
        ClientEvent::CreateRoom => {
            let room = state.registry.create_room();
            send_event(
                conn,
                &state.codec,
                &ServerEvent::RoomCreated {
                    room_id: room.room_id().clone(),
                },
            )
            .await?;
        }

        ClientEvent::JoinRoom {
            room_id,
            player_id,
            player_name,
        } => {
            if let Some(current) = seat.as_ref() {
                if current.player_id != player_id || current.room.room_id() != &room_id {
                    return Err(RoomError::InvalidState(format!(
                        "connection already plays as {} in room {}",
                        current.player_id,
                        current.room.room_id()
                    ))
                    .into());
                }
            }
            state
                .registry
                .join(&room_id, player_id.clone(), player_name, inbox.clone())
                .await?;
            let room = state.registry.get(&room_id)?;
            *seat = Some(Seat { player_id, room });
        }

        ClientEvent::CountdownStarted => {
            let (_, room) = joined(seat)?;
            room.start_round().await?;
        }

        ClientEvent::SelectLetter {
            letter,
            prev_letter,
        } => {
            let (_, room) = joined(seat)?;
            room.select_letter(letter, prev_letter).await?;
        }

        ClientEvent::EndTurn { selected_letter } => {
            let (player_id, room) = joined(seat)?;
            room.end_turn(player_id, selected_letter).await?;
        }

        ClientEvent::ResetTimer => {
            let (_, room) = joined(seat)?;
            room.restart_timer().await?;
        }

        ClientEvent::LeaveRoom => {
            let (player_id, _) = joined(seat)?;
            state.registry.leave(&player_id).await?;
            *seat = None;
        }
    }
    Ok(())
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), QuikError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    message: String,
) -> Result<(), QuikError> {
    send_event(conn, codec, &ServerEvent::Error { message }).await
}
