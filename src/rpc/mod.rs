//! Framed JSON-RPC transport and message model for the editor-facing side
//! of the bridge.

pub mod codec;
pub mod message;
pub mod writer;

pub use codec::{read_message, write_message};
pub use message::{error_code, notification, ErrorObject, Id, Message, Notification, Request, Response};
pub use writer::Outbox;
