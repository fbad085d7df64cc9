//! In-memory server metrics.
//!
//! Grounded on the teacher's `metrics::ServerMetrics` (plain `AtomicU64`
//! counters, no external metrics backend): connected clients, active
//! rooms/games, and command-error counts. This is observability, not a
//! feature, so spec.md's Non-goals (no external services) don't exclude it
//! — see SPEC_FULL.md §2.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, queried by tests and logged periodically by the
/// reaper task. Every field is monotonically increasing except
/// `active_connections`, `active_rooms`, and `active_games`, which track a
/// current count (incremented/decremented around the corresponding
/// lifecycle events).
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,

    pub rooms_created: AtomicU64,
    pub active_rooms: AtomicU64,
    pub rooms_destroyed: AtomicU64,

    pub games_started: AtomicU64,
    pub active_games: AtomicU64,
    pub games_finished: AtomicU64,
    pub games_forfeited: AtomicU64,

    pub reconnections_succeeded: AtomicU64,
    pub reconnections_rejected: AtomicU64,

    pub command_errors: AtomicU64,
    pub sessions_closed_on_error_limit: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnection(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_room_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
        self.active_rooms.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_room_destroyed(&self) {
        self.rooms_destroyed.fetch_add(1, Ordering::Relaxed);
        self.active_rooms.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_game_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
        self.active_games.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_game_finished(&self) {
        self.games_finished.fetch_add(1, Ordering::Relaxed);
        self.active_games.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_game_forfeited(&self) {
        self.games_forfeited.fetch_add(1, Ordering::Relaxed);
        self.active_games.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_succeeded(&self) {
        self.reconnections_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_rejected(&self) {
        self.reconnections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command_error(&self, closed_session: bool) {
        self.command_errors.fetch_add(1, Ordering::Relaxed);
        if closed_session {
            self.sessions_closed_on_error_limit.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn active_rooms(&self) -> u64 {
        self.active_rooms.load(Ordering::Relaxed)
    }

    pub fn active_games(&self) -> u64 {
        self.active_games.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_counters_track_active_count() {
        let metrics = ServerMetrics::new();
        metrics.record_connection();
        metrics.record_connection();
        metrics.record_disconnection();
        assert_eq!(metrics.active_connections(), 1);
        assert_eq!(metrics.total_connections.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn room_and_game_counters_track_active_count() {
        let metrics = ServerMetrics::new();
        metrics.record_room_created();
        metrics.record_game_started();
        assert_eq!(metrics.active_rooms(), 1);
        assert_eq!(metrics.active_games(), 1);
        metrics.record_game_finished();
        metrics.record_room_destroyed();
        assert_eq!(metrics.active_rooms(), 0);
        assert_eq!(metrics.active_games(), 0);
    }

    #[test]
    fn command_error_tracks_session_closure_separately() {
        let metrics = ServerMetrics::new();
        metrics.record_command_error(false);
        metrics.record_command_error(true);
        assert_eq!(metrics.command_errors.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.sessions_closed_on_error_limit.load(Ordering::Relaxed), 1);
    }
}
