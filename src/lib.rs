//! Rule-set artifact validation harness library.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod harness;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod report;
pub mod resilience;

pub use config::schema::HarnessConfig;
pub use discovery::{Artifact, BehaviorKind};
pub use harness::{AttemptResult, AttemptRunner, Harness};
pub use pool::{LanePlan, WorkerPool};
pub use report::{RunSummary, Verdict};
