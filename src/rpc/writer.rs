//! The single task that owns the editor's stdout once the handshake has
//! completed. Both the request loop and the analyzer-bridge task send
//! outbound messages through this channel rather than writing directly, so
//! the two logical tasks never interleave bytes mid-frame. Batches
//! everything pending into one write pass for pipe-buffer efficiency.

use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::rpc::codec;

pub type Outbox = mpsc::UnboundedSender<Value>;

/// Drains `rx` into `writer` until every sender has dropped, batching any
/// messages that arrived while the previous write was in flight into the
/// same write pass.
pub async fn run<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(first) = rx.recv().await {
        codec::write_message(&mut writer, &first).await?;
        while let Ok(next) = rx.try_recv() {
            codec::write_message(&mut writer, &next).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, BufReader};

    #[tokio::test]
    async fn forwards_every_sent_message_in_order() {
        let (client, server) = duplex(8192);
        let (tx, rx) = mpsc::unbounded_channel();

        let writer_handle = tokio::spawn(run(server, rx));

        tx.send(json!({"n": 1})).unwrap();
        tx.send(json!({"n": 2})).unwrap();
        drop(tx);
        writer_handle.await.unwrap().unwrap();

        let mut reader = BufReader::new(client);
        let first = codec::read_message(&mut reader).await.unwrap().unwrap();
        let second = codec::read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(first, json!({"n": 1}));
        assert_eq!(second, json!({"n": 2}));
    }
}
