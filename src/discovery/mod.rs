//! Artifact discovery.
//!
//! # Data Flow
//! ```text
//! DiscoveryConfig.roots (path + behavior kind)
//!     → lister.rs (recursive scan for *.<extension>)
//!     → RuleRoots::classify (deepest root containing the file)
//!     → Vec<Artifact> (immutable, handed to the pool)
//! ```
//!
//! # Design Decisions
//! - Behavior kind comes from the root an artifact was found under, never from file content
//! - A missing root is logged and skipped; an unreadable directory aborts discovery

pub mod artifact;
pub mod lister;

pub use artifact::{Artifact, BehaviorKind, RuleRoot, RuleRoots};
pub use lister::{list_artifacts, DiscoveryError};
