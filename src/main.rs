//! Rule-set artifact validation harness.
//!
//! Loads every compiled rule-set artifact into its own proxy engine instance and
//! checks that traffic routed through the engine reaches a known endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────┐    ┌──────────────────────────────────────────────┐    ┌──────────┐
//!   │ discovery  │───▶│ pool: N lanes, lane i ↔ port start_port + i  │───▶│  report  │
//!   │  (lister)  │    │                                              │    │ summary  │
//!   └────────────┘    │  lane ──▶ harness::run_one                   │    └──────────┘
//!                     │            ├─ engine::synth   (config token) │
//!                     │            ├─ engine::process (spawn, cap)   │
//!                     │            ├─ readiness       (poll port)    │
//!                     │            ├─ probe           (GET via port) │
//!                     │            └─ terminate + collect logs       │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use ruleset_probe::config::{
    load_config, validate_config, ConfigError, HarnessConfig, LogFormat, ReadinessMode, RootConfig,
};
use ruleset_probe::discovery::{list_artifacts, BehaviorKind};
use ruleset_probe::harness::Harness;
use ruleset_probe::lifecycle::signals::cancel_on_signal;
use ruleset_probe::observability::{logging, metrics};
use ruleset_probe::pool::{LanePlan, WorkerPool};
use ruleset_probe::report::RunSummary;

#[derive(Parser)]
#[command(name = "ruleset-probe", version)]
#[command(about = "Validate compiled rule-set artifacts by routing traffic through a proxy engine", long_about = None)]
struct Cli {
    /// TOML configuration file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine executable.
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Discovery root as KIND=PATH (KIND is `domain` or `ipcidr`). Repeatable;
    /// replaces the configured roots.
    #[arg(long = "root", value_name = "KIND=PATH", value_parser = parse_root)]
    roots: Vec<RootConfig>,

    /// Artifact file extension.
    #[arg(long)]
    extension: Option<String>,

    /// Number of concurrent lanes.
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Port of lane 0.
    #[arg(long)]
    start_port: Option<u16>,

    /// URL requested through each engine.
    #[arg(long)]
    probe_url: Option<String>,

    /// How to wait for an engine before probing.
    #[arg(long, value_enum)]
    readiness: Option<ReadinessArg>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Serve Prometheus metrics on this address during the run.
    #[arg(long)]
    metrics_address: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReadinessArg {
    Poll,
    Fixed,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

fn parse_root(raw: &str) -> Result<RootConfig, String> {
    let (kind, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=PATH, got {raw:?}"))?;
    let behavior = match kind {
        "domain" => BehaviorKind::Domain,
        "ipcidr" => BehaviorKind::IpCidr,
        other => return Err(format!("unknown behavior {other:?}, expected domain or ipcidr")),
    };
    if path.is_empty() {
        return Err("root path must not be empty".to_string());
    }
    Ok(RootConfig {
        path: PathBuf::from(path),
        behavior,
    })
}

impl Cli {
    fn apply(self, config: &mut HarnessConfig) {
        if let Some(engine) = self.engine {
            config.engine.binary = engine;
        }
        if !self.roots.is_empty() {
            config.discovery.roots = self.roots;
        }
        if let Some(extension) = self.extension {
            config.discovery.extension = extension;
        }
        if let Some(concurrency) = self.concurrency {
            config.pool.concurrency = concurrency;
        }
        if let Some(port) = self.start_port {
            config.pool.start_port = port;
        }
        if let Some(url) = self.probe_url {
            config.probe.url = url;
        }
        if let Some(readiness) = self.readiness {
            config.readiness.strategy = match readiness {
                ReadinessArg::Poll => ReadinessMode::Poll,
                ReadinessArg::Fixed => ReadinessMode::Fixed,
            };
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = match format {
                LogFormatArg::Pretty => LogFormat::Pretty,
                LogFormatArg::Json => LogFormat::Json,
            };
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    let run_id = Uuid::new_v4();
    tracing::info!(
        %run_id,
        engine = %config.engine.binary.display(),
        concurrency = config.pool.concurrency,
        start_port = config.pool.start_port,
        probe_url = %config.probe.url,
        readiness = ?config.readiness.strategy,
        "ruleset-probe v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let artifacts = list_artifacts(&config.discovery)?;

    if artifacts.is_empty() {
        tracing::error!(roots = ?config.discovery.roots, "No artifacts found");
        let summary = RunSummary::no_artifacts();
        summary.write_report(&mut io::stdout().lock())?;
        return Ok(summary.exit_code());
    }
    tracing::info!(count = artifacts.len(), "Artifacts discovered");

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let harness = Harness::from_config(&config)?.with_shutdown(shutdown.clone());
    let pool = WorkerPool::new(LanePlan::from_config(&config.pool)?).with_shutdown(shutdown.clone());

    let results = pool
        .run_all(&harness, &artifacts)
        .instrument(tracing::info_span!("run", %run_id))
        .await;

    let mut summary = RunSummary::new(results);
    if shutdown.is_cancelled() {
        let skipped = artifacts.len().saturating_sub(summary.total());
        summary = summary.interrupted(skipped);
    }
    shutdown.cancel();

    let mut stdout = io::stdout().lock();
    summary.write_report(&mut stdout)?;
    stdout.flush()?;

    tracing::info!(
        %run_id,
        verdict = ?summary.verdict(),
        passed = summary.passed(),
        total = summary.total(),
        "Run complete"
    );
    Ok(summary.exit_code())
}
