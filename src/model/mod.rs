//! In-memory data model: client sessions, rooms, and the game engine.
//!
//! These types hold state only — registries in `crate::registry` own the
//! collections and enforce the locking/ownership discipline described in
//! spec.md §5.

pub mod client;
pub mod game;
pub mod room;

pub use client::{ClientSession, ClientState};
pub use game::{Card, CardState, Game, GameState, MatchOutcome};
pub use room::{Room, RoomState};
