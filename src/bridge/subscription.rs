//! The newline-delimited JSON protocol spoken on the analyzer's socket,
//! layered on top of a type-error subscription: an initial snapshot
//! followed by an unbounded stream of named updates.

use serde_json::Value;

use crate::bridge::translate::AnalyzerError;
use crate::error::BridgeError;

/// This bridge's subscription name, echoed back by the analyzer on every
/// update so the bridge can recognize updates meant for it even if other
/// subscribers share the daemon. The name is chosen by the client, not
/// negotiated; the daemon never validates or rejects it.
pub fn subscription_name() -> String {
    format!("persistent_{}", std::process::id())
}

/// The `["SubscribeToTypeErrors", "<name>"]\n` command sent once right
/// after connecting.
pub fn subscribe_command(name: &str) -> String {
    format!("{}\n", serde_json::json!(["SubscribeToTypeErrors", name]))
}

#[derive(Debug, Clone)]
pub enum SubscriptionMessage {
    /// The `["TypeErrors", [...]]` snapshot sent immediately after
    /// subscribing.
    InitialSnapshot(Vec<AnalyzerError>),
    /// A later `{"name": ..., "body": ["TypeErrors", [...]]}` update. `name`
    /// is compared against this bridge's own subscription name by the
    /// caller; a mismatch means the line belongs to a different
    /// subscription sharing the same socket and should be ignored.
    Update {
        name: String,
        errors: Vec<AnalyzerError>,
    },
}

fn parse_type_errors_array(value: &Value) -> Result<Vec<AnalyzerError>, BridgeError> {
    let items = value
        .as_array()
        .ok_or_else(|| BridgeError::InvalidSubscriptionResponse("expected a 2-element array".to_string()))?;
    if items.len() != 2 || items[0].as_str() != Some("TypeErrors") {
        return Err(BridgeError::InvalidSubscriptionResponse(
            "expected [\"TypeErrors\", [...]]".to_string(),
        ));
    }
    serde_json::from_value(items[1].clone())
        .map_err(|e| BridgeError::InvalidSubscriptionResponse(format!("malformed error list: {e}")))
}

/// Parses one line read from the analyzer socket into either the initial
/// snapshot shape or a named update shape.
pub fn parse_line(line: &str) -> Result<SubscriptionMessage, BridgeError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| BridgeError::InvalidSubscriptionResponse(format!("not valid JSON: {e}")))?;

    if value.is_array() {
        return Ok(SubscriptionMessage::InitialSnapshot(parse_type_errors_array(&value)?));
    }

    let obj = value
        .as_object()
        .ok_or_else(|| BridgeError::InvalidSubscriptionResponse("expected an array or object".to_string()))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidSubscriptionResponse("update is missing `name`".to_string()))?
        .to_string();
    let body = obj
        .get("body")
        .ok_or_else(|| BridgeError::InvalidSubscriptionResponse("update is missing `body`".to_string()))?;
    let errors = parse_type_errors_array(body)?;

    Ok(SubscriptionMessage::Update { name, errors })
}
