//! Client and room registries: the only place structural mutation of
//! sessions, rooms, and games is allowed to happen (see spec.md §5).

pub mod client_registry;
pub mod room_registry;

pub use client_registry::ClientRegistry;
pub use room_registry::{RemovalEffects, RoomRegistry};
