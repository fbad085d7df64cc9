#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Pexeso Server
//!
//! A lightweight, in-memory TCP server for multiplayer Pexeso (memory /
//! pairs-matching) games.
//!
//! Zero external dependencies beyond the process itself — no database, no
//! cloud services. Run the binary, point a TCP client at it, and play.

/// Per-client outbound transport: channel + cancellation handle
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Typed error taxonomy shared across the crate
pub mod error;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// In-memory game/room/client model and registries
pub mod model;

/// Wire protocol: commands, responses, and error codes
pub mod protocol;

/// Client and room registries
pub mod registry;

/// Main server orchestration: acceptor, session handler, liveness supervisor
pub mod server;
