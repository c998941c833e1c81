//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that every lane port fits in the port space
//! - Check that readiness plus probe fit inside the engine hard cap
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HarnessConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{HarnessConfig, ReadinessMode};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pool.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("pool.start_port must be at least 1")]
    ZeroStartPort,

    #[error("lane ports {start}..={start}+{concurrency}-1 exceed 65535")]
    PortRangeOverflow { start: u16, concurrency: usize },

    #[error("probe.url {url:?} is invalid: {reason}")]
    InvalidProbeUrl { url: String, reason: String },

    #[error("probe.success_statuses must not be empty")]
    NoSuccessStatuses,

    #[error("probe.success_statuses contains invalid HTTP status {0}")]
    InvalidStatus(u16),

    #[error("probe.timeout_secs must be greater than 0")]
    ZeroProbeTimeout,

    #[error("discovery.roots must name at least one directory")]
    NoRoots,

    #[error("discovery.extension must not be empty")]
    EmptyExtension,

    #[error("engine.hard_cap_secs must be greater than 0")]
    ZeroHardCap,

    #[error("readiness.{0} must be greater than 0")]
    ZeroReadinessTiming(&'static str),

    #[error("readiness wait plus probe timeout ({needed_ms}ms) must stay below engine.hard_cap_secs ({hard_cap_secs}s)")]
    HardCapTooShort { needed_ms: u64, hard_cap_secs: u64 },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let pool = &config.pool;
    if pool.concurrency == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }
    if pool.start_port == 0 {
        errors.push(ValidationError::ZeroStartPort);
    }
    let last_port = (pool.start_port as usize).saturating_add(pool.concurrency.saturating_sub(1));
    if last_port > u16::MAX as usize {
        errors.push(ValidationError::PortRangeOverflow {
            start: pool.start_port,
            concurrency: pool.concurrency,
        });
    }

    let probe = &config.probe;
    match Url::parse(&probe.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidProbeUrl {
            url: probe.url.clone(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidProbeUrl {
            url: probe.url.clone(),
            reason: e.to_string(),
        }),
    }
    if probe.success_statuses.is_empty() {
        errors.push(ValidationError::NoSuccessStatuses);
    }
    for &status in &probe.success_statuses {
        if reqwest::StatusCode::from_u16(status).is_err() {
            errors.push(ValidationError::InvalidStatus(status));
        }
    }
    if probe.timeout_secs == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    if config.discovery.roots.is_empty() {
        errors.push(ValidationError::NoRoots);
    }
    if config.discovery.extension.trim_start_matches('.').is_empty() {
        errors.push(ValidationError::EmptyExtension);
    }

    if config.engine.hard_cap_secs == 0 {
        errors.push(ValidationError::ZeroHardCap);
    }

    let readiness = &config.readiness;
    for (name, value) in [
        ("fixed_delay_ms", readiness.fixed_delay_ms),
        ("timeout_ms", readiness.timeout_ms),
        ("base_delay_ms", readiness.base_delay_ms),
        ("max_delay_ms", readiness.max_delay_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroReadinessTiming(name));
        }
    }

    let readiness_ms = match readiness.strategy {
        ReadinessMode::Poll => readiness.timeout_ms,
        ReadinessMode::Fixed => readiness.fixed_delay_ms,
    };
    let needed_ms = readiness_ms.saturating_add(probe.timeout_secs.saturating_mul(1000));
    if config.engine.hard_cap_secs > 0 && needed_ms >= config.engine.hard_cap_secs.saturating_mul(1000) {
        errors.push(ValidationError::HardCapTooShort {
            needed_ms,
            hard_cap_secs: config.engine.hard_cap_secs,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
