use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::EnvFilter;

use analyzer_lsp_bridge::bridge::{self, BackgroundTaskManager};
use analyzer_lsp_bridge::config::AnalyzerLaunchConfig;
use analyzer_lsp_bridge::lsp::{self, InitOutcome, ServerState};
use analyzer_lsp_bridge::rpc;

/// A persistent LSP bridge between an editor and a long-running analyzer
/// daemon. Reads and writes LSP over stdio; connects to (or starts) the
/// analyzer over a local Unix socket and republishes its diagnostics.
#[derive(Parser, Debug)]
#[command(name = "analyzer-lsp-bridge", version, about)]
struct Cli {
    /// Path to the analyzer binary to connect to or spawn.
    #[arg(long, env = "ANALYZER_BRIDGE_BINARY")]
    analyzer_binary: PathBuf,

    /// Workspace root passed through as the analyzer's working directory.
    #[arg(long, env = "ANALYZER_BRIDGE_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Name reported as the `source` of every published diagnostic.
    #[arg(long, env = "ANALYZER_BRIDGE_NAME", default_value = "analyzer")]
    analyzer_name: String,

    /// Where the analyzer daemon writes its own stderr; this bridge derives
    /// the daemon's control socket path from it.
    #[arg(long, env = "ANALYZER_BRIDGE_DAEMON_LOG")]
    daemon_log: PathBuf,

    /// Where this bridge writes its own structured logs. Defaults to
    /// stderr, never stdout: stdout carries the LSP wire protocol.
    #[arg(long, env = "ANALYZER_BRIDGE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Raise this bridge's own log verbosity to debug.
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Extra arguments forwarded to the analyzer when it needs spawning.
    #[arg(trailing_var_arg = true)]
    analyzer_args: Vec<String>,
}

fn setup_logging(log_file: Option<&PathBuf>, debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "info" })
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| panic!("failed to open log file {path:?}: {e}"));
            builder.with_writer(std::sync::Mutex::new(file)).init();
        }
        None => {
            // stdout is reserved for the LSP wire protocol.
            builder.with_writer(std::io::stderr).init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_file.as_ref(), cli.verbose);

    let config = Arc::new(AnalyzerLaunchConfig {
        binary_path: cli.analyzer_binary,
        workspace_root: cli.workspace,
        analyzer_name: cli.analyzer_name,
        log_path: cli.daemon_log,
        extra_args: cli.analyzer_args,
    });

    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    let exit_code = run_persistent(reader, writer, config).await?;
    std::process::exit(exit_code);
}

/// Drives one editor session end to end: the handshake retry loop, then the
/// active request loop running alongside the supervised analyzer-bridge
/// task, until the editor's `exit` notification (or a handshake failure)
/// ends the process.
async fn run_persistent<R, W>(mut reader: R, writer: W, config: Arc<AnalyzerLaunchConfig>) -> anyhow::Result<i32>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut writer = writer;
    let init_params = loop {
        match lsp::try_initialize(&mut reader, &mut writer, &config.analyzer_name).await? {
            InitOutcome::Success(params) => break params,
            InitOutcome::Exit => return Ok(0),
            InitOutcome::Failure => continue,
        }
    };
    tracing::info!(
        client = %init_params.client_info.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
        "editor initialized"
    );

    let state = Arc::new(Mutex::new(ServerState::new()));
    let (outbox, outbox_rx) = mpsc::unbounded_channel::<serde_json::Value>();
    let writer_task = tokio::spawn(rpc::writer::run(writer, outbox_rx));

    let bridge_manager = BackgroundTaskManager::new();
    {
        let config = Arc::clone(&config);
        let state = Arc::clone(&state);
        let bridge_outbox = outbox.clone();
        bridge_manager
            .ensure_running(move |running| bridge::daemon::run(config, state, bridge_outbox, running))
            .await;
    }

    let reason = lsp::run(&mut reader, outbox, state).await?;
    bridge_manager.ensure_stopped().await;
    let _ = writer_task.await;

    Ok(reason.exit_code())
}
