//! The editor-facing JSON-RPC message model: request, notification, and
//! response envelopes, and the classification between them.
//!
//! Hand-rolled rather than delegated to a generic JSON-RPC crate: the
//! three-shape classification below (request / notification / response) is
//! the bespoke dispatch logic this bridge's protocol handling turns on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ProtocolError;

/// JSON-RPC 2.0 error codes used by this bridge. Values match the LSP
/// specification, which reserves the `-32002`/`-3280x` range beyond the
/// base JSON-RPC codes for server lifecycle errors.
pub mod error_code {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const SERVER_NOT_INITIALIZED: i64 = -32002;
    pub const REQUEST_CANCELLED: i64 = -32800;
}

/// A JSON-RPC request/response id. LSP permits string, integer, or null ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Number(i64),
    String(String),
    Null,
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{n}"),
            Id::String(s) => write!(f, "{s}"),
            Id::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: Id,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub id: Id,
    pub result: Option<Value>,
    pub error: Option<ErrorObject>,
}

impl Response {
    pub fn success(id: Id, result: Value) -> Response {
        Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Id, code: i64, message: impl Into<String>) -> Response {
        Response {
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    pub fn error_with_data(id: Id, code: i64, message: impl Into<String>, data: Value) -> Response {
        Response {
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

impl Message {
    /// Classify a raw JSON-RPC envelope:
    /// request (`id` + `method`), notification (`method`, no `id`),
    /// response (`id`, plus `result` or `error`).
    pub fn from_value(value: Value) -> Result<Message, ProtocolError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ProtocolError::MalformedEnvelope("message is not a JSON object".into()))?;

        let has_id = obj.contains_key("id");
        let method = obj.get("method").and_then(Value::as_str).map(str::to_string);

        if has_id {
            let id: Id = serde_json::from_value(obj["id"].clone())?;
            if let Some(method) = method {
                return Ok(Message::Request(Request {
                    id,
                    method,
                    params: obj.get("params").cloned(),
                }));
            }
            if obj.contains_key("result") || obj.contains_key("error") {
                let error = obj
                    .get("error")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()?;
                return Ok(Message::Response(Response {
                    id,
                    result: obj.get("result").cloned(),
                    error,
                }));
            }
            return Err(ProtocolError::MalformedEnvelope(
                "message has an id but neither a method nor a result/error".into(),
            ));
        }

        if let Some(method) = method {
            return Ok(Message::Notification(Notification {
                method,
                params: obj.get("params").cloned(),
            }));
        }

        Err(ProtocolError::MalformedEnvelope(
            "message matches neither request, notification, nor response shape".into(),
        ))
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("jsonrpc".to_string(), json!("2.0"));
        match self {
            Message::Request(req) => {
                map.insert("id".to_string(), serde_json::to_value(&req.id).unwrap_or(Value::Null));
                map.insert("method".to_string(), json!(req.method));
                if let Some(params) = &req.params {
                    map.insert("params".to_string(), params.clone());
                }
            }
            Message::Notification(note) => {
                map.insert("method".to_string(), json!(note.method));
                if let Some(params) = &note.params {
                    map.insert("params".to_string(), params.clone());
                }
            }
            Message::Response(resp) => {
                map.insert("id".to_string(), serde_json::to_value(&resp.id).unwrap_or(Value::Null));
                if let Some(error) = &resp.error {
                    map.insert("error".to_string(), serde_json::to_value(error).unwrap_or(Value::Null));
                } else {
                    map.insert("result".to_string(), resp.result.clone().unwrap_or(Value::Null));
                }
            }
        }
        Value::Object(map)
    }
}

/// Builds an outbound notification with by-name parameters, the shape used
/// by `textDocument/publishDiagnostics` and `window/showMessage`.
pub fn notification(method: impl Into<String>, params: Value) -> Message {
    Message::Notification(Notification {
        method: method.into(),
        params: Some(params),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_request() {
        let msg = Message::from_value(json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}})).unwrap();
        assert!(matches!(msg, Message::Request(Request { ref method, .. }) if method == "initialize"));
    }

    #[test]
    fn classifies_notification() {
        let msg = Message::from_value(json!({"jsonrpc":"2.0","method":"exit"})).unwrap();
        assert!(matches!(msg, Message::Notification(Notification { ref method, .. }) if method == "exit"));
    }

    #[test]
    fn classifies_response() {
        let msg = Message::from_value(json!({"jsonrpc":"2.0","id":"abc","result":{}})).unwrap();
        assert!(matches!(msg, Message::Response(Response { id: Id::String(ref s), .. }) if s == "abc"));
    }

    #[test]
    fn rejects_malformed_envelope() {
        let err = Message::from_value(json!({"jsonrpc":"2.0"})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEnvelope(_)));
    }

    #[test]
    fn response_error_round_trips_through_to_value() {
        let resp = Response::error(Id::Number(7), error_code::INVALID_REQUEST, "nope");
        let value = Message::Response(resp).to_value();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["error"]["code"], json!(error_code::INVALID_REQUEST));
        assert_eq!(value["error"]["message"], json!("nope"));
    }

    #[test]
    fn id_displays_without_quoting() {
        assert_eq!(Id::Number(3).to_string(), "3");
        assert_eq!(Id::String("x".into()).to_string(), "x");
        assert_eq!(Id::Null.to_string(), "null");
    }
}
