//! Process harness.
//!
//! # Data Flow
//! ```text
//! (Artifact, lane port)
//!     → engine::synth (config token)
//!     → engine::process (spawn, supervised by hard cap + attempt token)
//!     → readiness.rs (poll port with backoff, or fixed grace)
//!     → probe.rs (one GET through 127.0.0.1:<port>)
//!     → terminate unconditionally, collect streams
//!     → AttemptResult
//! ```
//!
//! # Design Decisions
//! - Nothing escapes an attempt: every error is recovered into the result log
//! - The attempt owns its process exclusively; the process is gone before the
//!   result is returned

pub mod attempt;
pub mod probe;
pub mod readiness;

pub use attempt::{error_chain, AttemptResult, AttemptRunner, AttemptState, Harness};
pub use probe::{Probe, ProbeError};
pub use readiness::{Readiness, ReadyOutcome};
