//! Content-Length framed JSON-RPC transport, used on the editor-facing stdio
//! channel. Generic over `AsyncBufRead`/`AsyncWrite` so the same codec drives
//! both the real stdio transport and in-memory test pipes.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

const CONTENT_LENGTH_HEADER: &str = "Content-Length: ";

/// Reads one framed message. Returns `Ok(None)` on a clean EOF that occurs
/// before any header bytes arrive (the normal way an editor closes stdin);
/// an EOF in the middle of a frame is a `ConnectionClosed` error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Value>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut saw_any_header = false;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if saw_any_header {
                return Err(TransportError::ConnectionClosed);
            }
            return Ok(None);
        }
        saw_any_header = true;

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix(CONTENT_LENGTH_HEADER) {
            let parsed = value
                .trim()
                .parse()
                .map_err(|_| TransportError::MalformedFrame(format!("invalid Content-Length: {value}")))?;
            content_length = Some(parsed);
        }
        // Other headers (e.g. Content-Type) are read past and ignored.
    }

    let content_length = content_length
        .ok_or_else(|| TransportError::MalformedFrame("missing Content-Length header".to_string()))?;

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| TransportError::ConnectionClosed)?;

    let body = String::from_utf8(body)
        .map_err(|e| TransportError::MalformedFrame(format!("body is not valid UTF-8: {e}")))?;

    serde_json::from_str(&body).map(Some).map_err(|e| {
        TransportError::MalformedFrame(format!("body is not valid JSON: {e}"))
    })
}

/// Writes one framed message and flushes it immediately.
pub async fn write_message<W>(writer: &mut W, value: &Value) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_string(value)
        .map_err(|e| TransportError::MalformedFrame(format!("failed to serialize message: {e}")))?;
    let header = format!("{CONTENT_LENGTH_HEADER}{}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt as _, BufReader};

    #[tokio::test]
    async fn round_trips_a_message() {
        let (mut client, server) = duplex(4096);
        let mut server = BufReader::new(server);

        let msg = json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}});
        let body = serde_json::to_vec(&msg).unwrap();
        client
            .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
            .await
            .unwrap();
        client.write_all(&body).await.unwrap();

        let parsed = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(parsed, msg);
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (client, server) = duplex(4096);
        let mut client = client;
        let mut server = BufReader::new(server);

        let msg = json!({"jsonrpc":"2.0","method":"exit"});
        write_message(&mut client, &msg).await.unwrap();
        drop(client);

        let parsed = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(parsed, msg);
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_none() {
        let (client, server) = duplex(4096);
        drop(client);
        let mut server = BufReader::new(server);
        assert!(read_message(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_closed() {
        let (mut client, server) = duplex(4096);
        let mut server = BufReader::new(server);
        client.write_all(b"Content-Length: 50\r\n\r\n").await.unwrap();
        client.write_all(b"{\"incomplete\":").await.unwrap();
        drop(client);

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn missing_content_length_header_is_malformed() {
        let (mut client, server) = duplex(4096);
        let mut server = BufReader::new(server);
        client.write_all(b"Content-Type: application/json\r\n\r\n").await.unwrap();
        drop(client);

        let err = read_message(&mut server).await.unwrap_err();
        assert!(matches!(err, TransportError::MalformedFrame(_)));
    }
}
