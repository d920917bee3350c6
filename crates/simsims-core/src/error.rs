//! Error taxonomy of the world.
//!
//! Shortages are not errors: they are [`crate::activity::ShortageEvent`]s
//! consumed by the coordinator. Extinction is not an error either; it ends
//! the run through [`crate::world::CycleOutcome::Extinct`].

use simsims_events::{RecordError, ResourceKind};
use thiserror::Error;

use crate::activity::{ActivityKind, Role};
use crate::storage::{StorageId, StorageKind};

/// Local precondition violations on a single storage instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Retrieval attempted on an empty instance
    #[error("cannot retrieve from empty {kind} {id}")]
    EmptyStorage { id: StorageId, kind: StorageKind },
    /// The resource variant does not belong in this storage kind
    #[error("a {found} cannot be stored in {kind} {id}, which holds {expected}")]
    MismatchedResource {
        id: StorageId,
        kind: StorageKind,
        expected: ResourceKind,
        found: ResourceKind,
    },
}

/// Topology defects detected while wiring activities to storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// The storage kind is not declared by the activity kind for that role
    #[error("{activity} cannot bind a {storage} as {role}")]
    IncompatibleBinding {
        activity: ActivityKind,
        storage: StorageKind,
        role: Role,
    },
    /// A topology named a storage instance the world does not have
    #[error("no storage {0} to bind")]
    UnknownStorage(StorageId),
}

/// Errors surfaced by the coordinator.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A registry lost every instance of a required kind
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The world already ended; it never restarts
    #[error("the world ended after {cycles} cycles")]
    Ended { cycles: u64 },
    /// Activity workers need a tokio runtime to run on
    #[error("no tokio runtime available to start activity workers")]
    NoRuntime,
    /// The dispatch limiter was closed while a cycle was dispatching
    #[error("dispatch limiter closed")]
    DispatchClosed,
    #[error(transparent)]
    Record(#[from] RecordError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let empty = StorageError::EmptyStorage {
            id: StorageId(3),
            kind: StorageKind::Barn,
        };
        assert_eq!(empty.to_string(), "cannot retrieve from empty Barn place_0003");

        let binding = BindingError::IncompatibleBinding {
            activity: ActivityKind::Factory,
            storage: StorageKind::Barn,
            role: Role::Input,
        };
        assert_eq!(binding.to_string(), "Factory cannot bind a Barn as input");

        let world: WorldError = binding.into();
        assert!(matches!(world, WorldError::Binding(_)));
    }
}
