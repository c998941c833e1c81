//! Readiness wait between spawn and probe.
//!
//! # Design Decisions
//! - `Poll` connects to the lane port with jittered exponential backoff until it
//!   accepts, the engine exits, or the overall timeout passes
//! - `Fixed` sleeps a grace period and never looks at the engine
//! - Neither strategy fails an attempt; the probe is the only judge

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{self, Instant};

use crate::config::{ReadinessConfig, ReadinessMode};
use crate::resilience::backoff::calculate_backoff;

/// Upper bound on a single connect attempt while polling.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Fixed(Duration),
    Poll {
        timeout: Duration,
        base_delay_ms: u64,
        max_delay_ms: u64,
    },
}

/// How the readiness wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Fixed grace period elapsed.
    Elapsed,
    /// The port accepted a connection after `polls` attempts.
    Accepting { polls: u32 },
    /// The engine process ended while we were waiting.
    EngineExited,
    /// The port never accepted within the timeout.
    TimedOut,
}

impl Readiness {
    pub fn from_config(config: &ReadinessConfig) -> Self {
        match config.strategy {
            ReadinessMode::Fixed => Readiness::Fixed(Duration::from_millis(config.fixed_delay_ms)),
            ReadinessMode::Poll => Readiness::Poll {
                timeout: Duration::from_millis(config.timeout_ms),
                base_delay_ms: config.base_delay_ms,
                max_delay_ms: config.max_delay_ms,
            },
        }
    }

    /// Wait until `127.0.0.1:port` is worth probing.
    ///
    /// `exited` is polled between connect attempts so a crashed engine is not
    /// waited on for the full timeout.
    pub async fn wait<F>(&self, port: u16, exited: F) -> ReadyOutcome
    where
        F: Fn() -> bool,
    {
        match *self {
            Readiness::Fixed(delay) => {
                time::sleep(delay).await;
                ReadyOutcome::Elapsed
            }
            Readiness::Poll {
                timeout,
                base_delay_ms,
                max_delay_ms,
            } => poll_until_accepting(port, timeout, base_delay_ms, max_delay_ms, exited).await,
        }
    }
}

async fn poll_until_accepting<F>(
    port: u16,
    timeout: Duration,
    base_delay_ms: u64,
    max_delay_ms: u64,
    exited: F,
) -> ReadyOutcome
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut polls = 0u32;

    loop {
        if exited() {
            return ReadyOutcome::EngineExited;
        }

        polls += 1;
        let connect = TcpStream::connect(("127.0.0.1", port));
        if let Ok(Ok(_stream)) = time::timeout(CONNECT_TIMEOUT, connect).await {
            return ReadyOutcome::Accepting { polls };
        }

        let now = Instant::now();
        if now >= deadline {
            return ReadyOutcome::TimedOut;
        }
        let delay = calculate_backoff(polls, base_delay_ms, max_delay_ms);
        time::sleep(delay.min(deadline - now)).await;
    }
}
