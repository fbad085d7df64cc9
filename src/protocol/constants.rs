use std::time::Duration;

/// Maximum length of a single wire message, in bytes, before it is rejected.
pub const MAX_MESSAGE_LENGTH: usize = 1024;

/// Maximum nickname length, in bytes (not counting a terminator).
pub const MAX_NICK_LENGTH: usize = 31;

/// Maximum room name length, in bytes.
pub const MAX_ROOM_NAME_LENGTH: usize = 63;

/// Minimum and maximum players allowed in a room.
pub const MIN_PLAYERS_PER_ROOM: u8 = 2;
pub const MAX_PLAYERS_PER_ROOM: u8 = 4;

/// Board size bounds: even values in `[4, 8]`.
pub const MIN_BOARD_SIZE: u8 = 4;
pub const MAX_BOARD_SIZE: u8 = 8;

/// Number of consecutive protocol violations tolerated before the transport
/// is closed.
pub const MAX_ERROR_COUNT: u8 = 3;

/// How often the heartbeat task wakes up to consider sending a `PING`.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum quiet time since the last `PONG` before the heartbeat task will
/// send another `PING` to a given client.
pub const PONG_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// How long the server waits for a `PONG` reply after sending `PING` before
/// treating the client as unresponsive.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a client may stay in `DisconnectedPending` before its room is
/// forfeited and the slot is reclaimed.
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(90);

/// How long a connected-but-silent client is tolerated before the transport
/// is closed outright (no reconnect window grace for inactivity, unlike the
/// pong-timeout path).
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// How often the reaper sweeps the client registry for timed-out sessions.
pub const REAPER_INTERVAL: Duration = Duration::from_secs(5);

pub const fn is_valid_board_size(board_size: u8) -> bool {
    board_size >= MIN_BOARD_SIZE
        && board_size <= MAX_BOARD_SIZE
        && board_size % 2 == 0
}
