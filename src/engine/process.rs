//! Engine process supervision.
//!
//! # Responsibilities
//! - Spawn the engine with a synthesized config token
//! - Drain stdout/stderr concurrently from the moment of spawn
//! - End the process on the first of: natural exit, explicit terminate, hard cap
//! - Hand back both streams and the exit status once the process is gone
//! - Kill the engine's whole process group so wrapper scripts take their children along
//!
//! # Design Decisions
//! - One `CancellationToken` per attempt; `terminate()` only cancels it, so
//!   teardown is idempotent and can race the hard cap safely
//! - The supervisor task owns the `Child`; nobody else can signal it
//! - `kill_on_drop` backs up every other path
//! - Stream drains get a short grace period after the process is reaped; a
//!   descendant that left the group cannot hold the attempt open

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::synth::ConfigToken;

/// How long stream drains may run on after the engine process is reaped.
const STREAM_GRACE: Duration = Duration::from_millis(500);

/// Errors raised before an engine process exists.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine {}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("engine {0} stream was not captured")]
    Stdio(&'static str),

    #[error("cannot resolve engine working directory")]
    WorkingDir(#[source] io::Error),
}

/// What ended the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The process exited before anyone asked it to.
    Exited,
    /// The attempt requested termination.
    Terminated,
    /// The wall-clock cap fired first.
    HardCap,
}

/// Everything observable about a finished engine process.
#[derive(Debug)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<ExitStatus>,
    pub stop: StopReason,
    /// A stream was still open after the grace period; its tail may be missing.
    pub streams_abandoned: bool,
}

/// Spawns engine processes with a fixed binary, working directory and cap.
#[derive(Debug, Clone)]
pub struct EngineLauncher {
    binary: PathBuf,
    working_dir: PathBuf,
    hard_cap: Duration,
    safe_paths_env: String,
}

impl EngineLauncher {
    pub fn new(
        binary: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        hard_cap: Duration,
        safe_paths_env: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            working_dir: working_dir.into(),
            hard_cap,
            safe_paths_env: safe_paths_env.into(),
        }
    }

    /// Build a launcher from config, resolving the working directory to an absolute path.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let working_dir = if config.working_dir.is_absolute() {
            config.working_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(EngineError::WorkingDir)?
                .join(&config.working_dir)
        };

        Ok(Self::new(
            config.binary.clone(),
            working_dir,
            config.hard_cap(),
            config.safe_paths_env.clone(),
        ))
    }

    pub fn hard_cap(&self) -> Duration {
        self.hard_cap
    }

    /// Spawn `<binary> -config <token>`.
    ///
    /// `cancel` is the attempt's token: cancelling it ends the process.
    pub fn spawn(
        &self,
        token: &ConfigToken,
        cancel: CancellationToken,
    ) -> Result<RunningEngine, EngineError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-config")
            .arg(token.as_str())
            .current_dir(&self.working_dir)
            .env(&self.safe_paths_env, &self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        let pid = child.id();
        let stdout = child.stdout.take().ok_or(EngineError::Stdio("stdout"))?;
        let stderr = child.stderr.take().ok_or(EngineError::Stdio("stderr"))?;

        let drain_stop = CancellationToken::new();
        let stdout = tokio::spawn(drain(stdout, drain_stop.clone()));
        let stderr = tokio::spawn(drain(stderr, drain_stop.clone()));
        let supervisor = tokio::spawn(supervise(child, cancel.clone(), self.hard_cap));

        tracing::debug!(pid = ?pid, binary = %self.binary.display(), "Engine spawned");

        Ok(RunningEngine {
            pid,
            cancel,
            supervisor,
            drain_stop,
            stdout,
            stderr,
        })
    }
}

/// A live engine process owned by one attempt.
#[derive(Debug)]
pub struct RunningEngine {
    pid: Option<u32>,
    cancel: CancellationToken,
    supervisor: JoinHandle<(StopReason, io::Result<ExitStatus>)>,
    drain_stop: CancellationToken,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
}

impl RunningEngine {
    /// True once the process is gone, whatever ended it.
    pub fn has_exited(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Request termination. Safe to call any number of times.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    /// Wait for the process to end and both streams to close.
    ///
    /// Streams still open [`STREAM_GRACE`] after the process is reaped are cut
    /// off; whatever was read up to then is kept.
    pub async fn collect(self) -> EngineOutput {
        let RunningEngine {
            pid,
            supervisor,
            drain_stop,
            stdout,
            stderr,
            ..
        } = self;

        let (stop, status) = match supervisor.await {
            Ok((stop, Ok(status))) => (stop, Some(status)),
            Ok((stop, Err(e))) => {
                tracing::warn!(pid = ?pid, error = %e, "Failed to reap engine");
                (stop, None)
            }
            Err(e) => {
                tracing::error!(pid = ?pid, error = %e, "Engine supervisor task failed");
                (StopReason::Terminated, None)
            }
        };

        let streams = async move { (stdout.await, stderr.await) };
        tokio::pin!(streams);

        let within_grace = tokio::time::timeout(STREAM_GRACE, &mut streams).await;
        let streams_abandoned = within_grace.is_err();
        let (stdout, stderr) = match within_grace {
            Ok(streams) => streams,
            Err(_) => {
                tracing::warn!(pid = ?pid, "Engine streams still open after exit, abandoning");
                drain_stop.cancel();
                streams.await
            }
        };

        EngineOutput {
            stdout: String::from_utf8_lossy(&stdout.unwrap_or_default()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.unwrap_or_default()).into_owned(),
            status,
            stop,
            streams_abandoned,
        }
    }
}

async fn supervise(
    mut child: Child,
    cancel: CancellationToken,
    hard_cap: Duration,
) -> (StopReason, io::Result<ExitStatus>) {
    let pid = child.id();
    let (stop, exited) = tokio::select! {
        status = child.wait() => (StopReason::Exited, Some(status)),
        _ = cancel.cancelled() => (StopReason::Terminated, None),
        _ = tokio::time::sleep(hard_cap) => {
            tracing::warn!(pid = ?pid, cap_secs = hard_cap.as_secs_f64(), "Engine hit hard cap, killing");
            cancel.cancel();
            (StopReason::HardCap, None)
        }
    };

    // Descendants share the group and may still hold the output pipes.
    kill_group(pid);

    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                // Already exited between the select and the kill.
                tracing::debug!(error = %e, "Engine kill signal not delivered");
            }
            child.wait().await
        }
    };
    (stop, status)
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) only sends a signal; the negative pid addresses the
    // group the engine was spawned as leader of.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::trace!(pgid, error = %io::Error::last_os_error(), "Engine process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

async fn drain<R: AsyncRead + Unpin>(mut stream: R, stop: CancellationToken) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let read = tokio::select! {
            read = stream.read(&mut chunk) => read,
            _ = stop.cancelled() => break,
        };
        match read {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "Engine stream read ended with error");
                break;
            }
        }
    }
    buf
}
