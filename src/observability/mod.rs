//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool + harness produce:
//!     → logging.rs (structured events, one span per attempt)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Logs go to stderr; stdout carries only the final report
//! - Every attempt event carries lane, port and artifact via its span

pub mod logging;
pub mod metrics;
