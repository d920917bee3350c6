//! Shared cycle records and the recorder interface for the simsims world.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod kind;
pub mod recorder;
pub mod snapshot;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export kind types
pub use kind::{ResourceKind, TRACKED_KINDS};

// Re-export snapshot types
pub use snapshot::{CycleRow, CycleSnapshot, RunSummary};

// Re-export recorder types
pub use recorder::{CycleRecorder, NullRecorder, RecordError};
