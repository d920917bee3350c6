//! Shortage and overflow handling.
//!
//! Both handlers run on the calling activity's task, under the registry
//! lock, and finish before the call that triggered them returns.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::sync::Arc;

use simsims_events::ResourceKind;

use super::registry::Registry;
use super::{PriorityTable, WorldShared};
use crate::activity::{ActivityKind, Coordinator, ShortageEvent};
use crate::error::WorldError;
use crate::storage::{OverflowHandler, Storage, StorageKind};
use crate::sync::lock;

impl Coordinator for WorldShared {
    fn lack_of_resources(&self, event: ShortageEvent) {
        if self.is_ended() {
            return;
        }
        let mut registry = lock(&self.registry);
        let mut priorities = lock(&self.priorities);
        let mut rng = lock(&self.rng);
        if let Err(e) = self.handle_shortage(&mut registry, &mut priorities, &mut rng, &event) {
            tracing::error!("Shortage at {} {} unresolved: {}", event.kind, event.activity, e);
        }
    }

    fn decrease_priority(&self, kind: ActivityKind) {
        lock(&self.priorities).decay(kind);
    }
}

impl OverflowHandler for WorldShared {
    fn overflowing_resource(&self, places: &[Arc<Storage>]) {
        if self.is_ended() {
            return;
        }
        let mut registry = lock(&self.registry);
        let mut rng = lock(&self.rng);
        for place in places {
            self.resolve_overflow(&mut registry, &mut rng, place);
        }
    }
}

impl WorldShared {
    fn handle_shortage(
        &self,
        registry: &mut Registry,
        priorities: &mut PriorityTable,
        rng: &mut SmallRng,
        event: &ShortageEvent,
    ) -> Result<(), WorldError> {
        for storage in &event.storages {
            if !storage.is_empty() {
                // Contended rather than scarce: try another instance.
                if let Some(activity) = registry.activity(event.activity) {
                    registry.connect(activity, Some(storage.id()), rng)?;
                }
                continue;
            }

            let kind = storage.kind();
            if registry.contains_storage(storage.id()) {
                let instances = registry.storages(kind).len();
                let total = registry.total(kind);
                if instances > 1 && total < (storage.capacity() / 2) * instances {
                    let rebound = registry.rebind_away_from(storage.id(), rng)?;
                    registry.retire_storage(storage.id());
                    tracing::info!(
                        "Removed empty {} {} ({} units across {} instances, {} activities rebound)",
                        kind,
                        storage.id(),
                        total,
                        instances,
                        rebound
                    );
                }
            } else if let Some(activity) = registry.activity(event.activity) {
                // Ran against an instance removed while it was working.
                registry.connect(activity, Some(storage.id()), rng)?;
            }

            self.raise_priority(registry, priorities, rng, kind.holds())?;
        }
        Ok(())
    }

    /// Raises every kind producing `resource`, spawning another instance
    /// of a kind once its priority passes the threshold.
    fn raise_priority(
        &self,
        registry: &mut Registry,
        priorities: &mut PriorityTable,
        rng: &mut SmallRng,
        resource: ResourceKind,
    ) -> Result<(), WorldError> {
        let producers: Vec<ActivityKind> = registry
            .groups()
            .iter()
            .map(|g| g.kind)
            .filter(|k| k.produces() == Some(resource))
            .collect();

        for kind in producers {
            let priority = priorities.raise(kind);
            let instances = registry.instance_count(kind);
            let max_instances = registry
                .group(kind)
                .and_then(|g| g.members.first())
                .map_or(self.activity.max_instances, |m| m.activity.max_instances());

            if priority > self.activity.spawn_threshold && instances < max_instances {
                let activity = self.spawn_activity(registry, priorities, rng, kind, &[])?;
                tracing::info!(
                    "Spawned {} {} at priority {} ({} instances)",
                    kind,
                    activity.id(),
                    priority,
                    instances + 1
                );
            }
        }
        Ok(())
    }

    fn resolve_overflow(&self, registry: &mut Registry, rng: &mut SmallRng, place: &Arc<Storage>) {
        if !registry.contains_storage(place.id()) {
            return;
        }
        let kind = place.kind();
        let instances = registry.storages(kind).len();
        let total = registry.total(kind);

        let mut selected = None;
        if total > place.capacity() * instances {
            let clone = self.clone_storage(registry, kind);
            tracing::info!(
                "Cloned {} {} ({} units across {} instances)",
                kind,
                clone.id(),
                total,
                instances
            );
            selected = Some(clone);
        }

        let len = place.len();
        if len < place.capacity() {
            return;
        }
        let transfer = (place.capacity() / 2).min(len);
        let target = selected.or_else(|| {
            let others: Vec<&Arc<Storage>> = registry
                .storages(kind)
                .iter()
                .filter(|s| s.id() != place.id())
                .collect();
            others.choose(&mut *rng).map(|s| Arc::clone(*s))
        });
        let target = match target {
            Some(target) if transfer <= target.headroom() => target,
            _ => self.clone_storage(registry, kind),
        };

        let units = place.take_up_to(transfer);
        tracing::debug!(
            "Restocked {} units from {} {} to {}",
            units.len(),
            kind,
            place.id(),
            target.id()
        );
        target.absorb(units);
    }

    /// Registers a fresh, empty instance shaped like the kind's blueprint.
    fn clone_storage(&self, registry: &mut Registry, kind: StorageKind) -> Arc<Storage> {
        let capacity = registry
            .storages(kind)
            .first()
            .map_or(self.capacity, |blueprint| blueprint.capacity());
        self.new_storage(registry, kind, capacity)
    }
}
