//! Wire protocol: line-delimited ASCII commands and responses.
//!
//! Framing (LF-delimited, CR tolerated, 1024-byte line cap) and raw socket
//! I/O live in `server::session`; this module only covers the vocabulary —
//! parsing a line into a [`command::ClientCommand`] and rendering a
//! [`response::ServerResponse`] back into a line.

pub mod command;
pub mod constants;
pub mod error_codes;
pub mod response;

pub use command::ClientCommand;
pub use error_codes::ErrorCode;
pub use response::{RoomListEntry, ServerResponse};
