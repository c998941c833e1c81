//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel root token
//!         → pool lanes stop claiming
//!         → child tokens end every live engine
//!         → run reports Interrupted
//! ```

pub mod signals;
