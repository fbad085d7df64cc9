use std::fmt;

/// Closed set of wire error codes a client can receive in an `ERROR` line.
///
/// Names and meanings are fixed by the wire protocol; do not reorder or
/// rename variants without updating clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidCommand,
    InvalidSyntax,
    InvalidParams,
    InvalidMove,
    InvalidCard,
    NotAuthenticated,
    AlreadyAuthenticated,
    RoomNotFound,
    RoomFull,
    NotInRoom,
    AlreadyInRoom,
    RoomLimit,
    NeedMorePlayers,
    NotRoomOwner,
    GameNotStarted,
    NotYourTurn,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::InvalidSyntax => "INVALID_SYNTAX",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::InvalidMove => "INVALID_MOVE",
            Self::InvalidCard => "INVALID_CARD",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::AlreadyAuthenticated => "ALREADY_AUTHENTICATED",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::AlreadyInRoom => "ALREADY_IN_ROOM",
            Self::RoomLimit => "ROOM_LIMIT",
            Self::NeedMorePlayers => "NEED_MORE_PLAYERS",
            Self::NotRoomOwner => "NOT_ROOM_OWNER",
            Self::GameNotStarted => "GAME_NOT_STARTED",
            Self::NotYourTurn => "NOT_YOUR_TURN",
        }
    }
}

impl ErrorCode {
    /// Whether a rejection with this code counts against a session's
    /// `invalid_message_count` (spec.md §4.5 point 6: protocol-level
    /// violations count; logical/resource/role rejections don't).
    pub const fn increments_error_counter(self) -> bool {
        matches!(
            self,
            Self::InvalidCommand
                | Self::InvalidSyntax
                | Self::InvalidParams
                | Self::InvalidMove
                | Self::NotInRoom
                | Self::GameNotStarted
                | Self::InvalidCard
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exact_wire_tokens() {
        assert_eq!(ErrorCode::NotYourTurn.as_str(), "NOT_YOUR_TURN");
        assert_eq!(ErrorCode::RoomNotFound.to_string(), "ROOM_NOT_FOUND");
    }

    #[test]
    fn only_protocol_violations_increment_the_error_counter() {
        assert!(ErrorCode::InvalidCommand.increments_error_counter());
        assert!(ErrorCode::NotInRoom.increments_error_counter());
        assert!(!ErrorCode::NotAuthenticated.increments_error_counter());
        assert!(!ErrorCode::AlreadyInRoom.increments_error_counter());
        assert!(!ErrorCode::RoomFull.increments_error_counter());
    }
}
