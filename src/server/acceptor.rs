//! Top-level server state and the connection-accept loop.
//!
//! Grounded on the teacher's `EnhancedGameServer`: one shared, cloneable
//! state struct handed to every connection task, plus a `CancellationToken`
//! that fans a shutdown signal out to every task that selects on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::metrics::ServerMetrics;
use crate::protocol::response::ServerResponse;
use crate::registry::client_registry::ClientRegistry;
use crate::registry::room_registry::RoomRegistry;

/// Shared server state: the two registries, metrics, and the shutdown
/// token every task (acceptor, session, heartbeat, reaper) selects on.
pub struct AppState {
    pub clients: Arc<ClientRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub metrics: Arc<ServerMetrics>,
    pub shutdown: CancellationToken,

    /// Deterministic board-shuffle seed, per spec.md §9's design note ("make
    /// the shuffle seedable... so the scenarios in §8 are reproducible").
    /// `None` in production, which draws from the thread RNG; integration
    /// tests that need a reproducible board use [`AppState::new_with_seed`].
    pub test_seed: Option<u64>,
}

impl AppState {
    pub fn new(max_rooms: usize, max_clients: usize) -> Arc<Self> {
        Self::new_inner(max_rooms, max_clients, None)
    }

    pub fn new_with_seed(max_rooms: usize, max_clients: usize, seed: u64) -> Arc<Self> {
        Self::new_inner(max_rooms, max_clients, Some(seed))
    }

    fn new_inner(max_rooms: usize, max_clients: usize, test_seed: Option<u64>) -> Arc<Self> {
        let clients = Arc::new(ClientRegistry::new(max_clients));
        let rooms = Arc::new(RoomRegistry::new(max_rooms, clients.clone()));
        Arc::new(Self {
            clients,
            rooms,
            metrics: Arc::new(ServerMetrics::new()),
            shutdown: CancellationToken::new(),
            test_seed,
        })
    }
}

/// Accept connections until `state.shutdown` fires, spawning one task per
/// connection.
pub async fn run(state: Arc<AppState>, listener: TcpListener) {
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                info!("acceptor shutting down, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            super::session::handle_connection(stream, addr, state).await;
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                    }
                }
            }
        }
    }
}

/// The graceful-shutdown sequence from spec.md §4.8: announce, give clients
/// a moment to see it, then force every transport closed. Registry teardown
/// (rooms/clients freed) happens in `main` after the supervisor tasks have
/// joined, so nothing is still touching the registries mid-destroy.
pub async fn shutdown(state: &Arc<AppState>, reason: &str) {
    info!(reason, "server shutdown initiated");
    state.shutdown.cancel();

    let snapshot = state.clients.get_snapshot();
    for client in &snapshot {
        let _ = client.transport.send(&ServerResponse::ServerShutdown { reason: reason.to_string() });
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    for client in &snapshot {
        client.transport.close();
    }
}
