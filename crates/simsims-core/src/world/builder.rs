//! Explicit topology construction.

use std::sync::Arc;
use tokio::runtime::Handle;

use simsims_events::CycleRecorder;

use super::{World, WorldShared};
use crate::activity::ActivityKind;
use crate::config::SimsimsConfig;
use crate::error::{BindingError, WorldError};
use crate::resource::Resource;
use crate::storage::{Storage, StorageId, StorageKind};
use crate::sync::lock;

/// Builds a world from an explicit list of storages and activities.
///
/// Storage contents given here are preloaded without overflow handling.
/// Activities are created in the order they were added; unpinned roles
/// are bound at random.
#[derive(Debug)]
pub struct WorldBuilder {
    config: SimsimsConfig,
    storages: Vec<(StorageKind, Vec<Resource>)>,
    activities: Vec<(ActivityKind, Vec<StorageId>)>,
}

impl WorldBuilder {
    pub fn new(config: SimsimsConfig) -> Self {
        Self {
            config,
            storages: Vec::new(),
            activities: Vec::new(),
        }
    }

    /// Adds a storage instance holding `contents`, returning the id it
    /// will have in the built world.
    pub fn storage<I>(&mut self, kind: StorageKind, contents: I) -> StorageId
    where
        I: IntoIterator<Item = Resource>,
    {
        self.storages.push((kind, contents.into_iter().collect()));
        StorageId(self.storages.len() as u64)
    }

    /// Adds an activity bound at random.
    pub fn activity(&mut self, kind: ActivityKind) -> &mut Self {
        self.activity_bound(kind, &[])
    }

    /// Adds an activity bound to the given instances wherever their kind
    /// is declared; remaining roles are bound at random.
    pub fn activity_bound(&mut self, kind: ActivityKind, storages: &[StorageId]) -> &mut Self {
        self.activities.push((kind, storages.to_vec()));
        self
    }

    /// Creates the world and starts every activity worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self, recorder: Box<dyn CycleRecorder>) -> Result<World, WorldError> {
        let runtime = Handle::try_current().map_err(|_| WorldError::NoRuntime)?;
        let shared = WorldShared::new(&self.config, runtime);

        {
            let mut registry = lock(&shared.registry);
            let mut priorities = lock(&shared.priorities);
            let mut rng = lock(&shared.rng);

            for (kind, contents) in self.storages {
                let storage = shared.new_storage(&mut registry, kind, self.config.storage.capacity);
                storage.preload(contents)?;
            }

            for (kind, pinned) in self.activities {
                let pinned = pinned
                    .into_iter()
                    .map(|id| {
                        registry
                            .storage(id)
                            .cloned()
                            .ok_or(BindingError::UnknownStorage(id))
                    })
                    .collect::<Result<Vec<Arc<Storage>>, _>>()?;
                shared.spawn_activity(&mut registry, &mut priorities, &mut rng, kind, &pinned)?;
            }

            registry.check_invariants()?;
        }

        Ok(World::from_parts(shared, &self.config, recorder))
    }
}
