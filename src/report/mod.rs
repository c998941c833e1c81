//! Result aggregation and reporting.
//!
//! # Data Flow
//! ```text
//! Vec<AttemptResult> (unordered)
//!     → summary.rs (partition, verdict, exit code)
//!     → write_report (summary line + one delimited block per failure)
//! ```
//!
//! # Design Decisions
//! - Failures surface only after every artifact has been attempted
//! - An empty artifact list is a failure, not a vacuous success

pub mod summary;

pub use summary::{RunSummary, Verdict};
