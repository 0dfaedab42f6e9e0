//! Client and server events.
//!
//! Every event travels as `{ "type": "<kebab-name>", "payload": {...} }`.
//! Events without data omit the payload. The names match what the web
//! client already listens for (`tick`, `round-started`, `game-ended`, ...).

use serde::{Deserialize, Serialize};

use crate::{PlayerId, PlayerView, ProtocolError, RoomId, UsedLetters};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client sends.
///
/// A connection must `create-room` or `join-room` before any of the
/// in-room events are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Ask the server for a fresh room. The reply is `room-created`; the
    /// client still has to join it.
    CreateRoom,

    /// Join a room, or rejoin it after a dropped connection when
    /// `player_id` is already known to the room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: RoomId,
        player_id: PlayerId,
        player_name: String,
    },

    /// Lock the room and start a round with its first countdown.
    CountdownStarted,

    /// Toggle a letter for the current turn. `prev_letter` is the letter
    /// this player had picked before changing their mind.
    #[serde(rename_all = "camelCase")]
    SelectLetter {
        letter: char,
        #[serde(default)]
        prev_letter: Option<char>,
    },

    /// The current player finished their word; pass the turn on.
    #[serde(rename_all = "camelCase")]
    EndTurn {
        #[serde(default)]
        selected_letter: Option<char>,
    },

    /// Restart the countdown for the current turn.
    ResetTimer,

    /// Leave the room for good.
    LeaveRoom,
}

impl ClientEvent {
    /// Normalizes letters to uppercase and rejects anything outside `A..=Z`.
    pub fn validated(self) -> Result<Self, ProtocolError> {
        match self {
            Self::SelectLetter {
                letter,
                prev_letter,
            } => Ok(Self::SelectLetter {
                letter: normalize_letter(letter)?,
                prev_letter: prev_letter.map(normalize_letter).transpose()?,
            }),
            Self::EndTurn { selected_letter } => Ok(Self::EndTurn {
                selected_letter: selected_letter.map(normalize_letter).transpose()?,
            }),
            Self::JoinRoom { player_name, .. } if player_name.trim().is_empty() => Err(
                ProtocolError::InvalidMessage("player name must not be empty".into()),
            ),
            other => Ok(other),
        }
    }
}

fn normalize_letter(letter: char) -> Result<char, ProtocolError> {
    if letter.is_ascii_alphabetic() {
        Ok(letter.to_ascii_uppercase())
    } else {
        Err(ProtocolError::InvalidMessage(format!(
            "'{letter}' is not a letter"
        )))
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the server sends, either to one connection or to a whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: RoomId },

    /// Full room snapshot, broadcast whenever someone joins or rejoins.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        players: Vec<PlayerView>,
        used_letters: UsedLetters,
        current_player: Option<PlayerView>,
        player_count: usize,
    },

    #[serde(rename_all = "camelCase")]
    Disconnected { player_id: PlayerId },

    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    RoomLocked,

    #[serde(rename_all = "camelCase")]
    RoundStarted {
        category: String,
        difficulty: String,
        used_letters: UsedLetters,
        current_player: Option<PlayerView>,
    },

    /// One countdown step; `countdown` reaches 0 right before expiry.
    Tick { countdown: u32 },

    #[serde(rename_all = "camelCase")]
    LetterSelected { used_letters: UsedLetters },

    #[serde(rename_all = "camelCase")]
    StartTurn {
        current_player: Option<PlayerView>,
        used_letters: UsedLetters,
    },

    #[serde(rename_all = "camelCase")]
    PlayerEliminated { eliminated_player: PlayerView },

    #[serde(rename_all = "camelCase")]
    RoundEnded { winning_player: PlayerView },

    #[serde(rename_all = "camelCase")]
    GameEnded {
        game_winner: PlayerView,
        used_letters: UsedLetters,
        current_player: Option<PlayerView>,
        player_count: usize,
    },

    /// A request from this connection was rejected.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_decodes_from_client_shape() {
        let raw = r#"{"type":"join-room","payload":{"roomId":"amber-falcon","playerId":"s1","playerName":"Ana"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: RoomId::from("amber-falcon"),
                player_id: PlayerId::from("s1"),
                player_name: "Ana".into(),
            }
        );
    }

    #[test]
    fn test_unit_event_needs_no_payload() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"countdown-started"}"#).unwrap();
        assert_eq!(event, ClientEvent::CountdownStarted);
    }

    #[test]
    fn test_select_letter_prev_letter_is_optional() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"select-letter","payload":{"letter":"q"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::SelectLetter {
                letter: 'q',
                prev_letter: None
            }
        );
    }

    #[test]
    fn test_validated_uppercases_letters() {
        let event = ClientEvent::SelectLetter {
            letter: 'q',
            prev_letter: Some('a'),
        }
        .validated()
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::SelectLetter {
                letter: 'Q',
                prev_letter: Some('A')
            }
        );
    }

    #[test]
    fn test_validated_rejects_non_letters() {
        let err = ClientEvent::EndTurn {
            selected_letter: Some('7'),
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_validated_rejects_blank_names() {
        let err = ClientEvent::JoinRoom {
            room_id: RoomId::from("r"),
            player_id: PlayerId::from("p"),
            player_name: "  ".into(),
        }
        .validated()
        .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_tick_event_shape() {
        let json = serde_json::to_value(ServerEvent::Tick { countdown: 7 }).unwrap();
        assert_eq!(json["type"], "tick");
        assert_eq!(json["payload"]["countdown"], 7);
    }

    #[test]
    fn test_round_ended_field_names() {
        let winner = PlayerView {
            id: PlayerId::from("c"),
            name: "Cy".into(),
            is_turn: false,
            eliminated: false,
            win_count: 1,
            connected: true,
        };
        let json = serde_json::to_value(ServerEvent::RoundEnded {
            winning_player: winner,
        })
        .unwrap();
        assert_eq!(json["type"], "round-ended");
        assert_eq!(json["payload"]["winningPlayer"]["winCount"], 1);
    }
}
