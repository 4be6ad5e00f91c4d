//! The concrete external-collaborator layer: where the analyzer binary
//! lives, how to derive its control socket path, and how to launch it.
//! Everything upstream of this module treats these as narrow functions, not
//! ambient globals, so the core stays testable without a real binary on
//! disk.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::process::{Child, ChildStdout, Command};

use crate::error::BridgeError;

/// Everything needed to connect to, or start, the analyzer daemon.
#[derive(Debug, Clone)]
pub struct AnalyzerLaunchConfig {
    pub binary_path: PathBuf,
    pub workspace_root: PathBuf,
    pub analyzer_name: String,
    pub log_path: PathBuf,
    pub extra_args: Vec<String>,
}

impl AnalyzerLaunchConfig {
    /// The daemon's control socket, derived from its log path by swapping
    /// the extension: a daemon logging to `/tmp/analyzer/foo.log` listens
    /// on `/tmp/analyzer/foo.sock`.
    pub fn socket_path(&self) -> PathBuf {
        self.log_path.with_extension("sock")
    }
}

/// A spawned daemon process together with the scoped temp file carrying its
/// launch arguments. The temp file must outlive the moment the daemon reads
/// it, so it is kept alive here rather than dropped right after `spawn`.
pub struct SpawnedDaemon {
    pub child: Child,
    _arg_file: NamedTempFile,
}

fn write_arg_file(args: &[String]) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    serde_json::to_writer(&mut file, args)?;
    file.flush()?;
    Ok(file)
}

/// Spawns the analyzer daemon as a detached subprocess: `TMPDIR` forced to
/// the system temp directory, stdout piped (for the readiness wait),
/// stderr redirected to the configured log file, and started in its own
/// session so it outlives this process's exit.
pub fn spawn_daemon(config: &AnalyzerLaunchConfig) -> Result<SpawnedDaemon, BridgeError> {
    if !analyzer_binary_exists(&config.binary_path) {
        return Err(BridgeError::DaemonSpawn(format!(
            "analyzer binary not found at {:?}",
            config.binary_path
        )));
    }

    let arg_file = write_arg_file(&config.extra_args).map_err(|e| BridgeError::DaemonSpawn(e.to_string()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .map_err(|e| BridgeError::DaemonSpawn(format!("opening log file {:?}: {e}", config.log_path)))?;

    let mut command = Command::new(&config.binary_path);
    command
        .arg("newserver")
        .arg(arg_file.path())
        .current_dir(&config.workspace_root)
        .env("TMPDIR", std::env::temp_dir())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::from(log_file));

    detach_into_new_session(&mut command);

    let child = command
        .spawn()
        .map_err(|e| BridgeError::DaemonSpawn(format!("spawning {:?}: {e}", config.binary_path)))?;

    Ok(SpawnedDaemon {
        child,
        _arg_file: arg_file,
    })
}

#[cfg(unix)]
fn detach_into_new_session(command: &mut Command) {
    // Safety: setsid() is async-signal-safe and only affects the child
    // after fork, before exec; it takes no arguments and cannot fail in a
    // way this process needs to observe.
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach_into_new_session(_command: &mut Command) {}

const READINESS_MARKER: &str = "initialization complete";

/// Blocks until the daemon's stdout prints its readiness marker, or returns
/// an error if the stream ends first (the daemon exited before becoming
/// ready).
pub async fn wait_for_readiness<R>(stdout: &mut R) -> Result<(), BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = stdout
            .read_line(&mut line)
            .await
            .map_err(|e| BridgeError::DaemonSpawn(e.to_string()))?;
        if bytes_read == 0 {
            return Err(BridgeError::DaemonSpawn(
                "daemon exited before signaling readiness".to_string(),
            ));
        }
        if line.contains(READINESS_MARKER) {
            return Ok(());
        }
    }
}

/// Takes ownership of the spawned child's stdout for the readiness wait.
/// Once this returns, nothing else reads from the child's stdout again —
/// closing the client's own stdin later can still raise `SIGPIPE` in the
/// daemon if it keeps writing to a now-unread pipe.
pub fn take_stdout(child: &mut Child) -> Option<ChildStdout> {
    child.stdout.take()
}

pub fn analyzer_binary_exists(path: &Path) -> bool {
    path.is_file()
}
