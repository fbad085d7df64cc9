//! The heartbeat/reaper supervisor pair from spec.md §4.7.
//!
//! Both tasks work off a snapshot copy of the client registry taken under
//! its mutex (`ClientRegistry::get_snapshot`) and never hold that lock
//! across a socket send or a room-registry call — the same
//! snapshot-then-mutate discipline the registries themselves use for
//! broadcast (see spec.md §5).
//!
//! One piece of the spec's "zombie sweep" bullet doesn't have separate code
//! here: `ClientRegistry::replace` overwrites (and so drops) the outgoing
//! record synchronously as part of `RECONNECT` handling, so there is no
//! deferred zombie list for the reaper to walk.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::model::client::ClientState;
use crate::protocol::constants::{
    HEARTBEAT_INTERVAL, INACTIVITY_TIMEOUT, PONG_TIMEOUT, PONG_WAIT_INTERVAL, REAPER_INTERVAL, RECONNECT_TIMEOUT,
};
use crate::protocol::response::ServerResponse;

use super::AppState;

/// Wake every [`HEARTBEAT_INTERVAL`] and `PING` any authenticated, live
/// client that hasn't been heard from (via `PONG`) in [`PONG_WAIT_INTERVAL`]
/// and isn't already waiting on one.
pub async fn heartbeat_task(state: Arc<AppState>) {
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                info!("heartbeat task shutting down");
                break;
            }
            () = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
        }

        let now = Instant::now();
        for client in state.clients.get_snapshot() {
            if client.state == ClientState::DisconnectedPending || client.state == ClientState::Connected {
                continue;
            }
            if client.transport.is_closed() || client.waiting_for_pong {
                continue;
            }
            if now.duration_since(client.last_pong_received) < PONG_WAIT_INTERVAL {
                continue;
            }

            client.transport.send(&ServerResponse::Ping);
            state.clients.mutate(client.client_id, |c| {
                c.waiting_for_pong = true;
                c.last_ping_sent = Some(now);
            });
        }
    }
}

/// Wake every [`REAPER_INTERVAL`] and enforce PONG/inactivity timeouts and
/// reconnect-window expiry (spec.md §4.7).
pub async fn reaper_task(state: Arc<AppState>) {
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                info!("reaper task shutting down");
                break;
            }
            () = tokio::time::sleep(REAPER_INTERVAL) => {}
        }

        let now = Instant::now();
        for client in state.clients.get_snapshot() {
            match client.state {
                ClientState::DisconnectedPending => {
                    reap_if_reconnect_window_expired(&client, now, &state);
                }
                ClientState::Connected => {
                    // Not yet authenticated; HELLO hasn't arrived, so there
                    // is no room/game membership to tear down, but the
                    // inactivity timeout still applies.
                    enforce_inactivity_timeout(&client, now, &state);
                }
                _ => {
                    enforce_pong_timeout(&client, now, &state);
                    enforce_inactivity_timeout(&client, now, &state);
                }
            }
        }
    }
}

fn enforce_pong_timeout(client: &crate::model::client::ClientSession, now: Instant, state: &Arc<AppState>) {
    if !client.waiting_for_pong {
        return;
    }
    let Some(last_ping_sent) = client.last_ping_sent else {
        return;
    };
    if now.duration_since(last_ping_sent) <= PONG_TIMEOUT {
        return;
    }

    warn!(client_id = client.client_id, "pong timeout, opening reconnect window");
    client.transport.close();
    state.clients.mutate(client.client_id, |c| {
        if c.state != ClientState::DisconnectedPending {
            c.state = ClientState::DisconnectedPending;
            c.disconnect_time = Some(now);
        }
    });
}

fn enforce_inactivity_timeout(client: &crate::model::client::ClientSession, now: Instant, state: &Arc<AppState>) {
    if client.transport.is_closed() {
        return;
    }
    if now.duration_since(client.last_activity) <= INACTIVITY_TIMEOUT {
        return;
    }

    warn!(client_id = client.client_id, "inactivity timeout, closing transport");
    // Closing the transport (not marking DisconnectedPending) lets the
    // session's own read loop exit and run the normal teardown cascade,
    // same as a genuine socket close — see spec.md §4.5.
    client.transport.close();
    let _ = state;
}

fn reap_if_reconnect_window_expired(client: &crate::model::client::ClientSession, now: Instant, state: &Arc<AppState>) {
    let Some(disconnect_time) = client.disconnect_time else {
        return;
    };
    if now.duration_since(disconnect_time) <= RECONNECT_TIMEOUT {
        return;
    }

    let client_id = client.client_id;
    info!(client_id, "reconnect window expired, reaping session");

    if let Some(room_id) = client.room_id {
        match state.rooms.remove_player(room_id, client_id) {
            Ok(effects) if effects.room_destroyed => {
                state.metrics.record_room_destroyed();
                if effects.forfeit_scores.is_some() {
                    state.metrics.record_game_forfeited();
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(client_id, room_id, error = %err, "failed to remove expired client from room");
            }
        }
    }

    state.clients.remove(client_id);
    state.metrics.record_disconnection();
}
