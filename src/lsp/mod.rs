//! The editor-facing half of the bridge: handshake, request loop, and the
//! shared diagnostic/document state both halves read and write.

pub mod handshake;
pub mod server_loop;
pub mod state;
pub mod types;

pub use handshake::{try_initialize, InitOutcome};
pub use server_loop::{publish_all, publish_one, run, ExitReason};
pub use state::ServerState;
