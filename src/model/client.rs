use std::time::Instant;

use crate::broadcast::Transport;

/// Lifecycle state of a client session, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    InLobby,
    InRoom,
    InGame,
    DisconnectedPending,
}

/// A single client's session record, owned by the client registry.
///
/// Invariants: `client_id` is unique across the active registry at all
/// times; `nickname` is immutable once set at `HELLO`; when `state ==
/// DisconnectedPending` the transport is closed and no further send is
/// attempted against it.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub client_id: u32,
    pub nickname: Option<String>,
    pub transport: Transport,
    pub invalid_message_count: u8,
    pub state: ClientState,

    pub last_activity: Instant,
    pub last_ping_sent: Option<Instant>,
    pub last_pong_received: Instant,
    pub waiting_for_pong: bool,

    pub disconnect_time: Option<Instant>,

    pub room_id: Option<u32>,
}

impl ClientSession {
    pub fn new(client_id: u32, transport: Transport, now: Instant) -> Self {
        Self {
            client_id,
            nickname: None,
            transport,
            invalid_message_count: 0,
            state: ClientState::Connected,
            last_activity: now,
            last_ping_sent: None,
            last_pong_received: now,
            waiting_for_pong: false,
            disconnect_time: None,
            room_id: None,
        }
    }

    pub fn nickname_or_unknown(&self) -> &str {
        self.nickname.as_deref().unwrap_or("(unknown)")
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == ClientState::DisconnectedPending
    }

    pub fn touch_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Copy the identity fields a reconnecting session inherits from its
    /// predecessor: nickname, client_id, lifecycle state, and room
    /// back-reference. Liveness fields are reset to fresh values by the
    /// caller, not copied — see `server::session::handle_reconnect`.
    pub fn inherit_identity_from(&mut self, old: &ClientSession) {
        self.client_id = old.client_id;
        self.nickname = old.nickname.clone();
        self.state = old.state;
        self.room_id = old.room_id;
    }
}
