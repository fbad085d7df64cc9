//! Configuration module for the Pexeso server.
//!
//! Resolution order (lowest to highest precedence): built-in defaults, an
//! optional JSON config file, environment variables, then CLI arguments
//! (applied by `main.rs` after `load` returns, since `clap` owns argument
//! parsing and has the final say per spec.md §6).
//!
//! # Module structure
//! - [`types`]: the root `Config` struct.
//! - [`logging`]: logging configuration (console + optional rolling file).
//! - [`loader`]: file/env loading and precedence.
//! - [`defaults`]: default-value functions used by `#[serde(default = ...)]`.

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::Config;
