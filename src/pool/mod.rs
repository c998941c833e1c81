//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Vec<Artifact>
//!     → queue.rs (one atomic cursor, exactly-once claims)
//!     → lanes.rs (lane i ↔ port start_port + i, fixed for the run)
//!     → scheduler.rs (N lanes loop: claim → run_one → send result)
//!     → mpsc channel → Vec<AttemptResult> after all lanes join
//! ```
//!
//! # Design Decisions
//! - Static port partitioning replaces any port allocator or lock
//! - Lanes race for items; claim order is not FIFO-strict under concurrency
//! - A slow attempt only delays its own lane

pub mod lanes;
pub mod queue;
pub mod scheduler;

pub use lanes::{LanePlan, LanePlanError};
pub use queue::WorkQueue;
pub use scheduler::WorkerPool;
