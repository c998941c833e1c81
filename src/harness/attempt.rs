//! One artifact, one engine, one probe.
//!
//! # States
//! ```text
//! Spawning → Warming → Probing → Terminating → Collected
//! ```
//! Every transition happens regardless of earlier failure, except that a spawn
//! failure has no process to warm, probe or terminate. No retries.

use std::error::Error;
use std::fmt::Write as _;
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::HarnessConfig;
use crate::discovery::{Artifact, BehaviorKind};
use crate::engine::{synthesize, EngineError, EngineLauncher, EngineOutput, StopReason};
use crate::harness::probe::Probe;
use crate::harness::readiness::{Readiness, ReadyOutcome};
use crate::observability::metrics;

/// Outcome of one attempt. Produced exactly once per artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    pub artifact: PathBuf,
    pub behavior: BehaviorKind,
    pub port: u16,
    pub success: bool,
    /// Harness messages, then the engine's stdout and stderr blocks.
    pub log: String,
    pub elapsed_ms: u64,
}

/// Attempt lifecycle states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Spawning,
    Warming,
    Probing,
    Terminating,
    Collected,
}

/// Anything that can turn an artifact and a port into an [`AttemptResult`].
///
/// Implementations must never panic or leave a process behind; every failure
/// becomes a result with `success == false`.
pub trait AttemptRunner: Sync {
    fn run_one(&self, artifact: &Artifact, port: u16) -> impl Future<Output = AttemptResult> + Send;
}

/// The real runner: spawns the engine, waits, probes, tears down.
#[derive(Debug, Clone)]
pub struct Harness {
    launcher: EngineLauncher,
    readiness: Readiness,
    probe: Probe,
    shutdown: CancellationToken,
}

impl Harness {
    pub fn new(launcher: EngineLauncher, readiness: Readiness, probe: Probe) -> Self {
        Self {
            launcher,
            readiness,
            probe,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self, EngineError> {
        Ok(Self::new(
            EngineLauncher::from_config(&config.engine)?,
            Readiness::from_config(&config.readiness),
            Probe::from_config(&config.probe),
        ))
    }

    /// Tie every attempt's teardown to `token`; cancelling it ends all live engines.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run the full attempt lifecycle. Never fails; errors land in the log.
    pub async fn attempt(&self, artifact: &Artifact, port: u16) -> AttemptResult {
        let started = Instant::now();
        let mut log = AttemptLog::default();

        enter(AttemptState::Spawning);
        let token = synthesize(port, artifact.behavior, &artifact.path);
        let engine = match self.launcher.spawn(&token, self.shutdown.child_token()) {
            Ok(engine) => engine,
            Err(e) => {
                log.error(&e);
                return finish(artifact, port, false, log.render(None), started);
            }
        };

        enter(AttemptState::Warming);
        tokio::select! {
            outcome = self.readiness.wait(port, || engine.has_exited()) => match outcome {
                ReadyOutcome::EngineExited => tracing::debug!("Engine exited before accepting connections"),
                ReadyOutcome::TimedOut => tracing::debug!("Engine port never accepted, probing anyway"),
                outcome => tracing::trace!(?outcome, "Engine ready"),
            },
            _ = self.shutdown.cancelled() => tracing::debug!("Run interrupted while warming"),
        }

        enter(AttemptState::Probing);
        let success = if self.shutdown.is_cancelled() {
            log.note("run interrupted before probe");
            false
        } else {
            match self.probe.send(port).await {
                Ok(status) => {
                    tracing::trace!(%status, "Probe succeeded");
                    true
                }
                Err(e) => {
                    log.error(&e);
                    false
                }
            }
        };

        enter(AttemptState::Terminating);
        engine.terminate();

        enter(AttemptState::Collected);
        let output = engine.collect().await;
        if output.stop == StopReason::HardCap {
            log.note(&format!(
                "engine killed after hard cap of {}s",
                self.launcher.hard_cap().as_secs_f64()
            ));
        }
        if output.streams_abandoned {
            log.note("engine output still open after exit; later output was not captured");
        }

        finish(artifact, port, success, log.render(Some(&output)), started)
    }
}

impl AttemptRunner for Harness {
    fn run_one(&self, artifact: &Artifact, port: u16) -> impl Future<Output = AttemptResult> + Send {
        self.attempt(artifact, port)
    }
}

fn enter(state: AttemptState) {
    tracing::debug!(?state, "Attempt state");
}

fn finish(
    artifact: &Artifact,
    port: u16,
    success: bool,
    log: String,
    started: Instant,
) -> AttemptResult {
    let elapsed = started.elapsed();
    metrics::record_attempt(artifact.behavior, success, elapsed);

    AttemptResult {
        artifact: artifact.path.clone(),
        behavior: artifact.behavior,
        port,
        success,
        log,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

/// Render an error and its `source()` chain on one line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(message, ": {cause}");
        source = cause.source();
    }
    message
}

/// Harness-level messages recorded during an attempt.
#[derive(Debug, Default)]
struct AttemptLog {
    preamble: Vec<String>,
}

impl AttemptLog {
    fn error(&mut self, err: &dyn Error) {
        self.preamble.push(format!("error: {}", error_chain(err)));
    }

    fn note(&mut self, message: &str) {
        self.preamble.push(format!("note: {message}"));
    }

    fn render(self, output: Option<&EngineOutput>) -> String {
        let mut log = String::new();
        for line in &self.preamble {
            log.push_str(line);
            log.push('\n');
        }

        if let Some(output) = output {
            push_block(&mut log, "stdout", &output.stdout);
            push_block(&mut log, "stderr", &output.stderr);
        }
        log
    }
}

fn push_block(log: &mut String, name: &str, body: &str) {
    let _ = writeln!(log, "--- {name} ---");
    log.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        log.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::probe::ProbeError;

    #[test]
    fn test_render_orders_preamble_then_streams() {
        let mut log = AttemptLog::default();
        log.error(&ProbeError::Status(reqwest::StatusCode::BAD_GATEWAY));
        let output = EngineOutput {
            stdout: "level=info msg=started".into(),
            stderr: "warn\n".into(),
            status: None,
            stop: StopReason::Terminated,
            streams_abandoned: false,
        };

        let rendered = log.render(Some(&output));
        assert_eq!(
            rendered,
            "error: probe returned unexpected status 502 Bad Gateway\n\
             --- stdout ---\nlevel=info msg=started\n\
             --- stderr ---\nwarn\n"
        );
    }

    #[test]
    fn test_render_without_process_keeps_error() {
        let mut log = AttemptLog::default();
        log.error(&EngineError::Spawn {
            binary: PathBuf::from("/opt/engine"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
        let rendered = log.render(None);
        assert_eq!(rendered, "error: failed to spawn engine /opt/engine: no such file\n");
    }

    #[test]
    fn test_error_chain_walks_sources() {
        let err = EngineError::WorkingDir(std::io::Error::other("gone"));
        assert_eq!(error_chain(&err), "cannot resolve engine working directory: gone");
    }
}
