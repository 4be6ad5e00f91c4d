//! The supervised analyzer-bridge task body: connect to (or start) the
//! analyzer daemon, subscribe to its type-error stream, and keep
//! republishing diagnostics for as long as the socket stays open.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::bridge::subscription::{self, SubscriptionMessage};
use crate::bridge::translate;
use crate::config::{self, AnalyzerLaunchConfig};
use crate::error::{BridgeError, TransportError};
use crate::lsp::server_loop;
use crate::lsp::state::ServerState;
use crate::lsp::types::{Diagnostic, MessageType, ShowMessageParams};
use crate::rpc::{notification, Outbox};

const SPAWN_CONNECT_ATTEMPTS: u32 = 20;
const SPAWN_CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The task body to hand to `bridge::task::BackgroundTaskManager`. Clears
/// `running` itself on the way out, however it ends, so the manager's
/// `is_running` stays accurate without anyone calling `ensure_stopped`.
pub async fn run(config: Arc<AnalyzerLaunchConfig>, state: Arc<Mutex<ServerState>>, outbox: Outbox, running: Arc<AtomicBool>) {
    if let Err(err) = run_inner(&config, &state, &outbox).await {
        tracing::error!(error = %err, "analyzer bridge task ending");
    }
    running.store(false, Ordering::SeqCst);
}

async fn run_inner(config: &AnalyzerLaunchConfig, state: &Mutex<ServerState>, outbox: &Outbox) -> Result<(), BridgeError> {
    let stream = match UnixStream::connect(config.socket_path()).await {
        Ok(stream) => {
            notify_and_log(outbox, MessageType::INFO, "connected to existing analyzer daemon")?;
            stream
        }
        Err(_) => {
            notify_and_log(outbox, MessageType::INFO, "starting new analyzer daemon")?;
            match spawn_and_connect(config).await {
                Ok(stream) => stream,
                Err(err) => {
                    notify_and_log(
                        outbox,
                        MessageType::ERROR,
                        &format!("failed to start analyzer daemon: {err}"),
                    )?;
                    return Err(err);
                }
            }
        }
    };

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let subscription_name = subscription::subscription_name();
    write_half
        .write_all(subscription::subscribe_command(&subscription_name).as_bytes())
        .await?;

    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Err(BridgeError::InvalidSubscriptionResponse(
            "daemon closed the socket before sending the initial snapshot".to_string(),
        ));
    }
    match subscription::parse_line(line.trim_end()) {
        Ok(message) => apply(message, &subscription_name, &config.analyzer_name, state, outbox).await?,
        Err(err) => tracing::warn!(error = %err, "malformed initial snapshot line from analyzer, skipping"),
    }

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            tracing::info!("analyzer socket closed, ending bridge task");
            return Ok(());
        }
        match subscription::parse_line(line.trim_end()) {
            Ok(message) => apply(message, &subscription_name, &config.analyzer_name, state, outbox).await?,
            Err(err) => tracing::warn!(error = %err, "malformed line from analyzer, skipping"),
        }
    }
}

async fn apply(
    message: SubscriptionMessage,
    own_subscription_name: &str,
    analyzer_name: &str,
    state: &Mutex<ServerState>,
    outbox: &Outbox,
) -> Result<(), BridgeError> {
    let errors = match message {
        SubscriptionMessage::InitialSnapshot(errors) => errors,
        SubscriptionMessage::Update { name, errors } => {
            if name != own_subscription_name {
                tracing::debug!(name, "ignoring update for a different subscription");
                return Ok(());
            }
            tracing::info!(count = errors.len(), "received analyzer type-error update");
            errors
        }
    };

    let grouped = translate::group_by_path(&errors, analyzer_name);
    republish(state, outbox, grouped).await
}

/// Installs a fresh diagnostics snapshot and republishes every opened
/// document (clear, then refill) via `server_loop::publish_all`.
async fn republish(
    state: &Mutex<ServerState>,
    outbox: &Outbox,
    grouped: HashMap<String, Vec<Diagnostic>>,
) -> Result<(), BridgeError> {
    state.lock().await.replace_diagnostics(grouped);
    server_loop::publish_all(outbox, state).await
}

/// Logs `message` at a level matching `typ`, then forwards it to the editor
/// as a `window/showMessage` notification.
fn notify_and_log(outbox: &Outbox, typ: MessageType, message: &str) -> Result<(), BridgeError> {
    if typ == MessageType::ERROR {
        tracing::error!("{message}");
    } else {
        tracing::info!("{message}");
    }
    let params = ShowMessageParams {
        typ,
        message: message.to_string(),
    };
    let note = notification("window/showMessage", serde_json::to_value(&params).unwrap());
    outbox
        .send(note.to_value())
        .map_err(|_| BridgeError::Transport(TransportError::ConnectionClosed))
}

async fn spawn_and_connect(config: &AnalyzerLaunchConfig) -> Result<UnixStream, BridgeError> {
    let mut spawned = config::spawn_daemon(config)?;
    let mut stdout = config::take_stdout(&mut spawned.child)
        .ok_or_else(|| BridgeError::DaemonSpawn("daemon did not inherit a stdout pipe".to_string()))?;
    {
        let mut reader = BufReader::new(&mut stdout);
        config::wait_for_readiness(&mut reader).await?;
    }
    drop(stdout);

    for attempt in 0..SPAWN_CONNECT_ATTEMPTS {
        match connect_socket(&config.socket_path()).await {
            Ok(stream) => return Ok(stream),
            Err(err) if attempt + 1 == SPAWN_CONNECT_ATTEMPTS => {
                return Err(BridgeError::DaemonSpawn(format!(
                    "daemon never accepted a connection after becoming ready: {err}"
                )))
            }
            Err(_) => tokio::time::sleep(SPAWN_CONNECT_RETRY_DELAY).await,
        }
    }
    unreachable!("loop above always returns on its last iteration")
}

async fn connect_socket(path: &Path) -> std::io::Result<UnixStream> {
    UnixStream::connect(path).await
}
