//! Resilience helpers.
//!
//! # Design Decisions
//! - Polling loops back off exponentially with jitter
//! - Attempts themselves are never retried; a failure is a result

pub mod backoff;
