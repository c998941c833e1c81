//! Proxy engine integration.
//!
//! # Data Flow
//! ```text
//! (port, behavior, artifact path)
//!     → synth.rs (EngineDocument → JSON → base64 ConfigToken)
//!     → process.rs (spawn `<engine> -config <token>`, supervise, collect)
//!     → EngineOutput (stdout, stderr, exit status, stop reason)
//! ```
//!
//! # Design Decisions
//! - The engine is an external executable; only its CLI surface is relied on
//! - Config and process live for exactly one attempt and are never reused

pub mod process;
pub mod synth;

pub use process::{EngineError, EngineLauncher, EngineOutput, RunningEngine, StopReason};
pub use synth::{synthesize, ConfigToken, EngineDocument};
