//! The editor-facing request loop once the handshake has completed: the
//! active/shutdown state machine that dispatches `didOpen`/`didClose`,
//! answers `shutdown`, and reacts to `exit`.

use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tokio::sync::Mutex;

use crate::error::{BridgeError, TransportError};
use crate::lsp::state::ServerState;
use crate::lsp::types::{DidCloseTextDocumentParams, DidOpenTextDocumentParams, PublishDiagnosticsParams};
use crate::rpc::{codec, error_code, notification, Message, Outbox, Response};

/// Where the loop currently is. `exit` is only a clean shutdown (exit code
/// 0) when it arrives after a `shutdown` request; arriving in `Active`
/// without one is treated as an unexpected termination (exit code 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Active,
    ShuttingDown,
}

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `shutdown` then `exit`: graceful.
    Clean,
    /// `exit` without a preceding `shutdown`, or the editor closed stdin.
    Abrupt,
}

impl ExitReason {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::Clean => 0,
            ExitReason::Abrupt => 1,
        }
    }
}

fn send(outbox: &Outbox, value: serde_json::Value) -> Result<(), BridgeError> {
    outbox
        .send(value)
        .map_err(|_| BridgeError::Transport(TransportError::ConnectionClosed))
}

/// Republishes every document the editor has open after a fresh analyzer
/// snapshot has landed in `state`: for each opened document, first an empty
/// `publishDiagnostics` (clearing whatever the editor currently shows),
/// then — only if the document now has diagnostics — a second publish
/// carrying them. The editor never sees a stale non-empty list survive an
/// update that dropped it, and never sees a clear followed by nothing.
pub async fn publish_all(outbox: &Outbox, state: &Mutex<ServerState>) -> Result<(), BridgeError> {
    let targets = state.lock().await.publish_targets();
    for (uri, diagnostics) in targets {
        publish_one(outbox, &uri, Vec::new())?;
        if !diagnostics.is_empty() {
            publish_one(outbox, &uri, diagnostics)?;
        }
    }
    Ok(())
}

pub fn publish_one(
    outbox: &Outbox,
    uri: &str,
    diagnostics: Vec<crate::lsp::types::Diagnostic>,
) -> Result<(), BridgeError> {
    let params = PublishDiagnosticsParams {
        uri: uri.to_string(),
        diagnostics,
    };
    let message = notification("textDocument/publishDiagnostics", serde_json::to_value(&params).unwrap());
    send(outbox, message.to_value())
}

/// Runs the editor request loop to completion, returning how it ended.
///
/// Only `shutdown`, `exit`, `textDocument/didOpen`, and
/// `textDocument/didClose` are meaningfully handled; any other request is
/// rejected with `RequestCancelled` and any other notification is silently
/// ignored, both staying in the current state.
pub async fn run<R>(reader: &mut R, outbox: Outbox, state: Arc<Mutex<ServerState>>) -> Result<ExitReason, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut loop_state = LoopState::Active;

    loop {
        let raw = match codec::read_message(reader).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(ExitReason::Abrupt),
            Err(err) => {
                tracing::warn!(error = %err, "malformed frame on editor channel, continuing");
                continue;
            }
        };

        let message = match Message::from_value(raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "malformed message, continuing");
                continue;
            }
        };

        match (loop_state, message) {
            (_, Message::Request(req)) if req.method == "shutdown" => {
                loop_state = LoopState::ShuttingDown;
                let response = Response::success(req.id, serde_json::Value::Null);
                send(&outbox, Message::Response(response).to_value())?;
            }
            (LoopState::ShuttingDown, Message::Notification(note)) if note.method == "exit" => {
                return Ok(ExitReason::Clean);
            }
            (LoopState::Active, Message::Notification(note)) if note.method == "exit" => {
                return Ok(ExitReason::Abrupt);
            }
            (_, Message::Notification(note)) if note.method == "textDocument/didOpen" => {
                let params: DidOpenTextDocumentParams = match note.params.map(serde_json::from_value) {
                    Some(Ok(params)) => params,
                    _ => {
                        tracing::warn!("malformed didOpen params, ignoring");
                        continue;
                    }
                };
                let uri = params.text_document.uri.to_string();
                let diagnostics = {
                    let mut guard = state.lock().await;
                    guard.open_document(uri.clone());
                    guard.diagnostics_for(&uri)
                };
                publish_one(&outbox, &uri, diagnostics)?;
            }
            (_, Message::Notification(note)) if note.method == "textDocument/didClose" => {
                let params: DidCloseTextDocumentParams = match note.params.map(serde_json::from_value) {
                    Some(Ok(params)) => params,
                    _ => {
                        tracing::warn!("malformed didClose params, ignoring");
                        continue;
                    }
                };
                state.lock().await.close_document(&params.text_document.uri.to_string());
            }
            (LoopState::ShuttingDown, Message::Request(req)) => {
                let response = Response::error(
                    req.id,
                    error_code::INVALID_REQUEST,
                    format!("server is shutting down, rejecting `{}`", req.method),
                );
                send(&outbox, Message::Response(response).to_value())?;
            }
            (_, Message::Request(req)) => {
                tracing::debug!(method = %req.method, "unsupported request, rejecting");
                let response = Response::error(
                    req.id,
                    error_code::REQUEST_CANCELLED,
                    format!("`{}` is not supported", req.method),
                );
                send(&outbox, Message::Response(response).to_value())?;
            }
            (_, Message::Notification(_)) => {
                // Unhandled notifications (e.g. $/setTrace, didChangeConfiguration)
                // have no effect on this bridge's state.
            }
            (_, Message::Response(resp)) => {
                tracing::debug!(id = %resp.id, "ignoring unsolicited response from editor");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt as _, BufReader};
    use tokio::sync::mpsc;

    async fn send_frame(client: &mut tokio::io::DuplexStream, value: &serde_json::Value) {
        let body = serde_json::to_vec(value).unwrap();
        client
            .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
            .await
            .unwrap();
        client.write_all(&body).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_then_exit_is_clean() {
        let (mut client, server) = duplex(8192);
        let mut server = BufReader::new(server);
        let state = Arc::new(Mutex::new(ServerState::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        send_frame(&mut client, &json!({"jsonrpc":"2.0","id":1,"method":"shutdown"})).await;
        send_frame(&mut client, &json!({"jsonrpc":"2.0","method":"exit"})).await;

        let reason = run(&mut server, tx, state).await.unwrap();
        assert_eq!(reason, ExitReason::Clean);
        assert_eq!(reason.exit_code(), 0);
    }

    #[tokio::test]
    async fn exit_without_shutdown_is_abrupt() {
        let (mut client, server) = duplex(8192);
        let mut server = BufReader::new(server);
        let state = Arc::new(Mutex::new(ServerState::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        send_frame(&mut client, &json!({"jsonrpc":"2.0","method":"exit"})).await;

        let reason = run(&mut server, tx, state).await.unwrap();
        assert_eq!(reason, ExitReason::Abrupt);
        assert_eq!(reason.exit_code(), 1);
    }

    #[tokio::test]
    async fn unsupported_request_is_rejected_with_request_cancelled() {
        let (mut client, server) = duplex(8192);
        let mut server = BufReader::new(server);
        let state = Arc::new(Mutex::new(ServerState::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        send_frame(
            &mut client,
            &json!({"jsonrpc":"2.0","id":5,"method":"textDocument/hover","params":{}}),
        )
        .await;
        send_frame(&mut client, &json!({"jsonrpc":"2.0","method":"exit"})).await;

        run(&mut server, tx, state).await.unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(response["error"]["code"], json!(error_code::REQUEST_CANCELLED));
    }

    #[tokio::test]
    async fn did_open_publishes_known_diagnostics() {
        let (mut client, server) = duplex(8192);
        let mut server = BufReader::new(server);
        let state = Arc::new(Mutex::new(ServerState::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        send_frame(
            &mut client,
            &json!({
                "jsonrpc":"2.0",
                "method":"textDocument/didOpen",
                "params":{"textDocument":{"uri":"file:///a.py","languageId":"python","version":1,"text":""}}
            }),
        )
        .await;
        send_frame(&mut client, &json!({"jsonrpc":"2.0","method":"exit"})).await;

        run(&mut server, tx, state).await.unwrap();

        let published = rx.recv().await.unwrap();
        assert_eq!(published["method"], json!("textDocument/publishDiagnostics"));
        assert_eq!(published["params"]["uri"], json!("file:///a.py"));
        assert_eq!(published["params"]["diagnostics"], json!([]));
    }
}
