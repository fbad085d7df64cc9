use crate::error::{server_err, ServerError, ServerResult};
use crate::protocol::error_codes::ErrorCode;

/// A parsed client-to-server command, one per non-empty line received on the
/// wire. `parse` is the single entry point the session read loop calls;
/// everything downstream works with this enum rather than raw strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Hello { nickname: String },
    ListRooms,
    CreateRoom { name: String, max_players: u8, board_size: u8 },
    JoinRoom { room_id: u32 },
    LeaveRoom,
    StartGame,
    Ready,
    Flip { index: usize },
    Reconnect { old_client_id: u32 },
    Pong,
}

impl ClientCommand {
    /// Parse a single line (already stripped of its terminating `\n`/`\r\n`).
    ///
    /// Unknown first tokens map to `INVALID_COMMAND`; a known command with
    /// the wrong number/shape of arguments maps to `INVALID_SYNTAX`; a known
    /// command whose arguments parse but fail a value constraint maps to
    /// `INVALID_PARAMS`. This three-way split matches spec.md's error
    /// taxonomy for protocol-level rejections.
    pub fn parse(line: &str) -> ServerResult<Self> {
        let mut tokens = line.split_whitespace();
        let verb = tokens
            .next()
            .ok_or_else(|| server_err!(ErrorCode::InvalidCommand, "empty message"))?;

        match verb {
            "HELLO" => {
                let nickname = tokens
                    .next()
                    .ok_or_else(|| server_err!(ErrorCode::InvalidSyntax, "HELLO requires a nickname"))?;
                if tokens.next().is_some() {
                    return Err(server_err!(ErrorCode::InvalidSyntax, "HELLO takes exactly one argument"));
                }
                if nickname.is_empty() || nickname.len() > crate::protocol::constants::MAX_NICK_LENGTH {
                    return Err(server_err!(ErrorCode::InvalidParams, "nickname must be 1-31 bytes"));
                }
                Ok(Self::Hello { nickname: nickname.to_string() })
            }
            "LIST_ROOMS" => {
                if tokens.next().is_some() {
                    return Err(server_err!(ErrorCode::InvalidSyntax, "LIST_ROOMS takes no arguments"));
                }
                Ok(Self::ListRooms)
            }
            "CREATE_ROOM" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| server_err!(ErrorCode::InvalidSyntax, "CREATE_ROOM requires name, max_players, board_size"))?;
                let max_players = tokens
                    .next()
                    .ok_or_else(|| server_err!(ErrorCode::InvalidSyntax, "CREATE_ROOM requires max_players"))?;
                let board_size = tokens
                    .next()
                    .ok_or_else(|| server_err!(ErrorCode::InvalidSyntax, "CREATE_ROOM requires board_size"))?;
                if tokens.next().is_some() {
                    return Err(server_err!(ErrorCode::InvalidSyntax, "CREATE_ROOM takes exactly three arguments"));
                }
                let max_players: u8 = max_players
                    .parse()
                    .map_err(|_| server_err!(ErrorCode::InvalidParams, "max_players must be an integer"))?;
                let board_size: u8 = board_size
                    .parse()
                    .map_err(|_| server_err!(ErrorCode::InvalidParams, "board_size must be an integer"))?;
                if name.is_empty() || name.len() > crate::protocol::constants::MAX_ROOM_NAME_LENGTH {
                    return Err(server_err!(ErrorCode::InvalidParams, "room name must be 1-63 bytes"));
                }
                if !(crate::protocol::constants::MIN_PLAYERS_PER_ROOM..=crate::protocol::constants::MAX_PLAYERS_PER_ROOM)
                    .contains(&max_players)
                {
                    return Err(server_err!(ErrorCode::InvalidParams, "max_players must be in 2..=4"));
                }
                if !crate::protocol::constants::is_valid_board_size(board_size) {
                    return Err(server_err!(ErrorCode::InvalidParams, "board_size must be an even value in 4..=8"));
                }
                Ok(Self::CreateRoom { name: name.to_string(), max_players, board_size })
            }
            "JOIN_ROOM" => {
                let room_id = parse_required_u32(&mut tokens, "JOIN_ROOM requires room_id")?;
                ensure_no_more(&mut tokens, "JOIN_ROOM takes exactly one argument")?;
                Ok(Self::JoinRoom { room_id })
            }
            "LEAVE_ROOM" => {
                ensure_no_more(&mut tokens, "LEAVE_ROOM takes no arguments")?;
                Ok(Self::LeaveRoom)
            }
            "START_GAME" => {
                ensure_no_more(&mut tokens, "START_GAME takes no arguments")?;
                Ok(Self::StartGame)
            }
            "READY" => {
                ensure_no_more(&mut tokens, "READY takes no arguments")?;
                Ok(Self::Ready)
            }
            "FLIP" => {
                let index = parse_required_u32(&mut tokens, "FLIP requires a card index")?;
                ensure_no_more(&mut tokens, "FLIP takes exactly one argument")?;
                Ok(Self::Flip { index: index as usize })
            }
            "RECONNECT" => {
                let old_client_id = parse_required_u32(&mut tokens, "RECONNECT requires old_client_id")?;
                ensure_no_more(&mut tokens, "RECONNECT takes exactly one argument")?;
                Ok(Self::Reconnect { old_client_id })
            }
            "PONG" => {
                ensure_no_more(&mut tokens, "PONG takes no arguments")?;
                Ok(Self::Pong)
            }
            other => Err(server_err!(ErrorCode::InvalidCommand, "unknown command '{other}'")),
        }
    }
}

fn parse_required_u32<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    missing_msg: &'static str,
) -> ServerResult<u32> {
    let raw = tokens
        .next()
        .ok_or_else(|| server_err!(ErrorCode::InvalidSyntax, "{missing_msg}"))?;
    raw.parse()
        .map_err(|_| server_err!(ErrorCode::InvalidParams, "expected an integer, got '{raw}'"))
}

fn ensure_no_more<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    msg: &'static str,
) -> ServerResult<()> {
    if tokens.next().is_some() {
        Err(ServerError::new(ErrorCode::InvalidSyntax, msg))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello() {
        assert_eq!(
            ClientCommand::parse("HELLO alice").unwrap(),
            ClientCommand::Hello { nickname: "alice".to_string() }
        );
    }

    #[test]
    fn rejects_unknown_command() {
        let err = ClientCommand::parse("DANCE").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCommand);
    }

    #[test]
    fn rejects_missing_args_as_syntax_error() {
        let err = ClientCommand::parse("JOIN_ROOM").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSyntax);
    }

    #[test]
    fn rejects_bad_value_as_params_error() {
        let err = ClientCommand::parse("FLIP notanumber").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn rejects_odd_board_size() {
        let err = ClientCommand::parse("CREATE_ROOM lobby 2 5").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn parses_create_room() {
        assert_eq!(
            ClientCommand::parse("CREATE_ROOM lobby 4 6").unwrap(),
            ClientCommand::CreateRoom { name: "lobby".to_string(), max_players: 4, board_size: 6 }
        );
    }
}
