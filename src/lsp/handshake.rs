//! The pre-initialize handshake: reading and responding to exactly one
//! editor message, deciding whether the server can move into its active
//! state, should exit immediately, or should be retried.

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::error::{BridgeError, ProtocolError};
use crate::lsp::types::{server_capabilities, InitializeParams, InitializeResult, ServerInfo};
use crate::rpc::{codec, error_code, Message, Response};

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of one handshake attempt. `run_persistent` (in `main`) loops,
/// calling `try_initialize` again on every `Failure`, until it sees
/// `Success` or `Exit` — a failed attempt never ends the process by itself.
#[derive(Debug)]
pub enum InitOutcome {
    Success(InitializeParams),
    Exit,
    Failure,
}

/// Reads one message from the editor and decides the handshake outcome.
///
/// - `initialize` request: responds with the server's capabilities, returns
///   `Success`.
/// - `exit` notification before any `initialize`: returns `Exit` with no
///   response (there is nothing to shut down yet).
/// - A non-`initialize` request, or an `initialize` request missing its
///   parameters: answered with a `ServerNotInitialized` error whose `data`
///   carries `{"retry": false}`, then `Failure`.
/// - Any other notification arriving before `initialize`: logged and
///   skipped, no response (there is no id to address one to), then
///   `Failure`.
/// - A frame or decode error means there is no reliable id to respond to,
///   so no response is attempted; `Failure` either way.
///
/// Every `Failure` is retried by the caller regardless of its cause — the
/// `data.retry` field above is purely informational payload echoed to the
/// client, not a signal this bridge itself obeys.
///
/// `analyzer_name` is reported back as `serverInfo.name` on success: the
/// editor is bridging to a specific configured analyzer, not to this
/// bridge binary itself.
pub async fn try_initialize<R, W>(reader: &mut R, writer: &mut W, analyzer_name: &str) -> Result<InitOutcome, BridgeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let raw = match codec::read_message(reader).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(InitOutcome::Exit),
        Err(err) => {
            tracing::warn!(error = %err, "malformed frame while waiting for initialize");
            return Ok(InitOutcome::Failure);
        }
    };

    let message = match Message::from_value(raw) {
        Ok(message) => message,
        Err(ProtocolError::InvalidJson(err)) => {
            tracing::warn!(error = %err, "could not decode message body while waiting for initialize");
            return Ok(InitOutcome::Failure);
        }
        Err(err) => {
            tracing::warn!(error = %err, "malformed message envelope while waiting for initialize");
            return Ok(InitOutcome::Failure);
        }
    };

    match message {
        Message::Request(req) if req.method == "initialize" => {
            let params: InitializeParams = match req.params {
                Some(value) => match serde_json::from_value(value) {
                    Ok(params) => params,
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed initialize parameters");
                        respond_not_initialized(writer, req.id, "initialize parameters are malformed").await?;
                        return Ok(InitOutcome::Failure);
                    }
                },
                None => {
                    tracing::warn!("initialize request is missing parameters");
                    respond_not_initialized(writer, req.id, "missing parameters for initialize request").await?;
                    return Ok(InitOutcome::Failure);
                }
            };

            let result = InitializeResult {
                capabilities: server_capabilities(),
                server_info: Some(ServerInfo {
                    name: analyzer_name.to_string(),
                    version: Some(SERVER_VERSION.to_string()),
                }),
            };
            let response = Response::success(req.id, serde_json::to_value(&result).unwrap());
            codec::write_message(writer, &Message::Response(response).to_value()).await?;

            Ok(InitOutcome::Success(params))
        }
        Message::Notification(note) if note.method == "exit" => Ok(InitOutcome::Exit),
        Message::Request(req) => {
            tracing::warn!(method = %req.method, "request received before initialize");
            let message = format!("expected `initialize`, got request `{}`", req.method);
            respond_not_initialized(writer, req.id, &message).await?;
            Ok(InitOutcome::Failure)
        }
        Message::Notification(note) => {
            tracing::debug!(method = %note.method, "notification ignored before initialize");
            Ok(InitOutcome::Failure)
        }
        Message::Response(resp) => {
            tracing::debug!(id = %resp.id, "unexpected response received before initialize");
            Ok(InitOutcome::Failure)
        }
    }
}

/// Writes a `ServerNotInitialized` error response carrying `data: {"retry":
/// false}`, matching the original implementation's uniform handling of
/// every pre-initialize protocol violation.
async fn respond_not_initialized<W>(
    writer: &mut W,
    id: crate::rpc::Id,
    message: &str,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    let response = Response::error_with_data(
        id,
        error_code::SERVER_NOT_INITIALIZED,
        message,
        json!({"retry": false}),
    );
    codec::write_message(writer, &Message::Response(response).to_value()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt as _, BufReader};

    async fn send(client: &mut tokio::io::DuplexStream, value: &serde_json::Value) {
        let body = serde_json::to_vec(value).unwrap();
        client
            .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
            .await
            .unwrap();
        client.write_all(&body).await.unwrap();
    }

    #[tokio::test]
    async fn initialize_request_succeeds_and_responds() {
        let (mut client, server) = duplex(8192);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        send(
            &mut client,
            &json!({
                "jsonrpc":"2.0","id":1,"method":"initialize",
                "params":{"processId":1,"rootUri":null,"capabilities":{"textDocument":{"hover":{}}}}
            }),
        )
        .await;

        let outcome = try_initialize(&mut server_read, &mut server_write, "pyre").await.unwrap();
        match outcome {
            InitOutcome::Success(params) => {
                assert!(params.capabilities.text_document.is_some());
            }
            other => panic!("expected Success, got {other:?}"),
        }

        let response = codec::read_message(&mut BufReader::new(&mut client)).await.unwrap().unwrap();
        assert_eq!(response["result"]["serverInfo"]["name"], json!("pyre"));
    }

    #[tokio::test]
    async fn exit_before_initialize_returns_exit() {
        let (mut client, server) = duplex(8192);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        send(&mut client, &json!({"jsonrpc":"2.0","method":"exit"})).await;

        let outcome = try_initialize(&mut server_read, &mut server_write, "pyre").await.unwrap();
        assert!(matches!(outcome, InitOutcome::Exit));
    }

    #[tokio::test]
    async fn other_request_before_initialize_is_retryable() {
        let (mut client, server) = duplex(8192);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        send(
            &mut client,
            &json!({"jsonrpc":"2.0","id":1,"method":"textDocument/hover","params":{}}),
        )
        .await;

        let outcome = try_initialize(&mut server_read, &mut server_write, "pyre").await.unwrap();
        assert!(matches!(outcome, InitOutcome::Failure));

        let response = codec::read_message(&mut BufReader::new(&mut client)).await.unwrap().unwrap();
        assert_eq!(response["error"]["code"], json!(error_code::SERVER_NOT_INITIALIZED));
        assert_eq!(response["error"]["data"], json!({"retry": false}));
    }

    #[tokio::test]
    async fn missing_initialize_params_is_retryable_with_retry_false_data() {
        let (mut client, server) = duplex(8192);
        let (server_read, mut server_write) = tokio::io::split(server);
        let mut server_read = BufReader::new(server_read);

        send(&mut client, &json!({"jsonrpc":"2.0","id":1,"method":"initialize"})).await;

        let outcome = try_initialize(&mut server_read, &mut server_write, "pyre").await.unwrap();
        assert!(matches!(outcome, InitOutcome::Failure));

        let response = codec::read_message(&mut BufReader::new(&mut client)).await.unwrap().unwrap();
        assert_eq!(response["error"]["code"], json!(error_code::SERVER_NOT_INITIALIZED));
        assert_eq!(response["error"]["data"], json!({"retry": false}));
    }
}
