use std::fmt::Write as _;

use crate::protocol::error_codes::ErrorCode;

/// A description of a room for `ROOM_LIST`.
#[derive(Debug, Clone)]
pub struct RoomListEntry {
    pub room_id: u32,
    pub name: String,
    pub players: u8,
    pub max_players: u8,
    pub state: &'static str,
    pub board_size: u8,
}

/// A server-to-client line. `render` produces the exact wire text (without
/// the trailing `\n`, which the writer task appends).
#[derive(Debug, Clone)]
pub enum ServerResponse {
    Welcome { client_id: u32, message: Option<String> },
    RoomList { rooms: Vec<RoomListEntry> },
    RoomCreated { room_id: u32, name: String },
    RoomJoined { room_id: u32, name: String },
    LeftRoom,
    PlayerJoined { nickname: String },
    PlayerLeft { nickname: String },
    ReadyOk,
    PlayerReady { nickname: String },
    PlayerDisconnected { nickname: String, kind: &'static str, detail: String },
    PlayerReconnected { nickname: String },
    RoomOwnerChanged { nickname: String },
    RoomClosed { reason: String },
    GameCreated { board_size: u8, reminder: String },
    GameStart { board_size: u8, nicknames: Vec<String> },
    YourTurn,
    CardReveal { index: usize, value: u32, nickname: String },
    Match { nickname: String, score: u32 },
    Mismatch { next_nickname: String },
    GameEnd { scores: Vec<(String, u32)> },
    GameEndForfeit { scores: Vec<(String, u32)> },
    GameState {
        board_size: u8,
        current_nickname: String,
        scores: Vec<(String, u32)>,
        slots: Vec<u32>,
    },
    Ping,
    ServerShutdown { reason: String },
    Error { code: ErrorCode, detail: Option<String> },
}

impl ServerResponse {
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Welcome { client_id, message } => {
                write!(out, "WELCOME {client_id}").unwrap();
                if let Some(msg) = message {
                    write!(out, " {msg}").unwrap();
                }
            }
            Self::RoomList { rooms } => {
                write!(out, "ROOM_LIST {}", rooms.len()).unwrap();
                for r in rooms {
                    write!(
                        out,
                        " {} {} {} {} {} {}",
                        r.room_id, r.name, r.players, r.max_players, r.state, r.board_size
                    )
                    .unwrap();
                }
            }
            Self::RoomCreated { room_id, name } => {
                write!(out, "ROOM_CREATED {room_id} {name}").unwrap();
            }
            Self::RoomJoined { room_id, name } => {
                write!(out, "ROOM_JOINED {room_id} {name}").unwrap();
            }
            Self::LeftRoom => out.push_str("LEFT_ROOM"),
            Self::PlayerJoined { nickname } => write!(out, "PLAYER_JOINED {nickname}").unwrap(),
            Self::PlayerLeft { nickname } => write!(out, "PLAYER_LEFT {nickname}").unwrap(),
            Self::ReadyOk => out.push_str("READY_OK"),
            Self::PlayerReady { nickname } => write!(out, "PLAYER_READY {nickname}").unwrap(),
            Self::PlayerDisconnected { nickname, kind, detail } => {
                write!(out, "PLAYER_DISCONNECTED {nickname} {kind}").unwrap();
                if !detail.is_empty() {
                    write!(out, " {detail}").unwrap();
                }
            }
            Self::PlayerReconnected { nickname } => {
                write!(out, "PLAYER_RECONNECTED {nickname}").unwrap();
            }
            Self::RoomOwnerChanged { nickname } => {
                write!(out, "ROOM_OWNER_CHANGED {nickname}").unwrap();
            }
            Self::RoomClosed { reason } => write!(out, "ROOM_CLOSED {reason}").unwrap(),
            Self::GameCreated { board_size, reminder } => {
                write!(out, "GAME_CREATED {board_size} {reminder}").unwrap();
            }
            Self::GameStart { board_size, nicknames } => {
                write!(out, "GAME_START {board_size}").unwrap();
                for nick in nicknames {
                    write!(out, " {nick}").unwrap();
                }
            }
            Self::YourTurn => out.push_str("YOUR_TURN"),
            Self::CardReveal { index, value, nickname } => {
                write!(out, "CARD_REVEAL {index} {value} {nickname}").unwrap();
            }
            Self::Match { nickname, score } => write!(out, "MATCH {nickname} {score}").unwrap(),
            Self::Mismatch { next_nickname } => write!(out, "MISMATCH {next_nickname}").unwrap(),
            Self::GameEnd { scores } => {
                out.push_str("GAME_END");
                for (nick, score) in scores {
                    write!(out, " {nick} {score}").unwrap();
                }
            }
            Self::GameEndForfeit { scores } => {
                out.push_str("GAME_END_FORFEIT");
                for (nick, score) in scores {
                    write!(out, " {nick} {score}").unwrap();
                }
            }
            Self::GameState { board_size, current_nickname, scores, slots } => {
                write!(out, "GAME_STATE {board_size} {current_nickname}").unwrap();
                for (nick, score) in scores {
                    write!(out, " ({nick} {score})").unwrap();
                }
                for slot in slots {
                    write!(out, " ({slot})").unwrap();
                }
            }
            Self::Ping => out.push_str("PING"),
            Self::ServerShutdown { reason } => write!(out, "SERVER_SHUTDOWN {reason}").unwrap(),
            Self::Error { code, detail } => {
                write!(out, "ERROR {code}").unwrap();
                if let Some(detail) = detail {
                    write!(out, " {detail}").unwrap();
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_welcome_without_message() {
        let r = ServerResponse::Welcome { client_id: 7, message: None };
        assert_eq!(r.render(), "WELCOME 7");
    }

    #[test]
    fn renders_game_state_index_aligned() {
        let r = ServerResponse::GameState {
            board_size: 4,
            current_nickname: "bob".to_string(),
            scores: vec![("alice".to_string(), 2), ("bob".to_string(), 1)],
            slots: vec![0, 3, 0, 3],
        };
        assert_eq!(r.render(), "GAME_STATE 4 bob (alice 2) (bob 1) (0) (3) (0) (3)");
    }

    #[test]
    fn renders_player_disconnected_with_detail() {
        let r = ServerResponse::PlayerDisconnected {
            nickname: "alice".to_string(),
            kind: "SHORT",
            detail: "waiting for reconnect".to_string(),
        };
        assert_eq!(r.render(), "PLAYER_DISCONNECTED alice SHORT waiting for reconnect");
    }
}
