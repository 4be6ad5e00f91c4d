//! Typed error variants shared across the bridge core.
//!
//! The binary entry point (`main.rs`) works in `anyhow::Result`; everything
//! below it is a typed error so call sites can match on specific failure
//! modes instead of string-matching a catch-all.

use thiserror::Error;

/// Errors arising from the editor-facing framed JSON-RPC codec.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors arising while parsing or dispatching JSON-RPC/LSP messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("malformed message envelope: {0}")]
    MalformedEnvelope(String),
}

/// Errors arising in the analyzer-bridge task: connecting to or spawning the
/// daemon, and the subscription read loop.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid subscription response: {0}")]
    InvalidSubscriptionResponse(String),

    #[error("failed to start analyzer daemon: {0}")]
    DaemonSpawn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
