//! Main server orchestration: acceptor/lifecycle, session handler, and the
//! liveness supervisor (heartbeat + reaper).
//!
//! Grounded on the teacher's `server/` module split — one file per
//! responsibility (`connection_manager.rs`, `heartbeat.rs`,
//! `maintenance.rs`, `reconnection_service.rs`) sharing one top-level
//! struct — adapted from the teacher's WebSocket signaling domain to this
//! spec's TCP session/game-room domain.

mod acceptor;
mod commands;
mod liveness;
mod session;

pub use acceptor::{run, shutdown, AppState};
pub use liveness::{heartbeat_task, reaper_task};
