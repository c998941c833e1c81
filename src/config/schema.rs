//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::BehaviorKind;

/// Root configuration for a validation run.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Proxy engine executable and process limits.
    pub engine: EngineConfig,

    /// Where rule-set artifacts are discovered.
    pub discovery: DiscoveryConfig,

    /// Lane count and port allocation.
    pub pool: PoolConfig,

    /// The request sent through each engine.
    pub probe: ProbeConfig,

    /// How the harness waits for an engine to accept connections.
    pub readiness: ReadinessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Engine process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path (or `$PATH` name) of the engine executable.
    pub binary: PathBuf,

    /// Working directory of the engine; also the only tree it may read.
    pub working_dir: PathBuf,

    /// Wall-clock cap after which the engine is killed regardless of state.
    pub hard_cap_secs: u64,

    /// Environment variable the engine reads its file-access allowlist from.
    pub safe_paths_env: String,
}

impl EngineConfig {
    pub fn hard_cap(&self) -> Duration {
        Duration::from_secs(self.hard_cap_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mihomo"),
            working_dir: PathBuf::from("."),
            hard_cap_secs: 10,
            safe_paths_env: "SAFE_PATHS".to_string(),
        }
    }
}

/// Artifact discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories scanned for artifacts, each tagged with its behavior kind.
    pub roots: Vec<RootConfig>,

    /// File extension of compiled artifacts (without the dot).
    pub extension: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            roots: vec![
                RootConfig {
                    path: PathBuf::from("geo/geosite"),
                    behavior: BehaviorKind::Domain,
                },
                RootConfig {
                    path: PathBuf::from("geo/geoip"),
                    behavior: BehaviorKind::IpCidr,
                },
            ],
            extension: "mrs".to_string(),
        }
    }
}

/// A single discovery root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RootConfig {
    /// Directory to scan recursively.
    pub path: PathBuf,

    /// Behavior kind of every artifact found under `path`.
    pub behavior: BehaviorKind,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent lanes.
    pub concurrency: usize,

    /// Port of lane 0; lane `i` listens on `start_port + i`.
    pub start_port: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 20,
            start_port: 20_000,
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Well-known endpoint reachable only through the engine under test.
    pub url: String,

    /// Statuses counted as success.
    pub success_statuses: Vec<u16>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: "http://www.gstatic.com/generate_204".to_string(),
            success_statuses: vec![200, 204],
            timeout_secs: 5,
        }
    }
}

/// Readiness strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Poll the lane port with backoff until it accepts a connection.
    Poll,
    /// Sleep a fixed grace period.
    Fixed,
}

/// Readiness wait configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub strategy: ReadinessMode,

    /// Grace period for the `fixed` strategy.
    pub fixed_delay_ms: u64,

    /// Overall bound for the `poll` strategy.
    pub timeout_ms: u64,

    /// Base delay for exponential backoff between polls.
    pub base_delay_ms: u64,

    /// Maximum delay between polls.
    pub max_delay_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            strategy: ReadinessMode::Poll,
            fixed_delay_ms: 2000,
            timeout_ms: 4000,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint for the duration of the run.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
