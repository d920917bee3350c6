//! Storage and activity registries.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::activity::{Activity, ActivityId, ActivityKind, Role};
use crate::dispatch::{ActivityWorker, RunTicket};
use crate::error::WorldError;
use crate::storage::{Storage, StorageId, StorageKind};

/// One activity instance and the task running it.
#[derive(Debug)]
pub(crate) struct Member {
    pub activity: Arc<Activity>,
    pub worker: ActivityWorker,
}

/// All instances of one activity kind.
#[derive(Debug)]
pub(crate) struct ActivityGroup {
    pub kind: ActivityKind,
    pub members: Vec<Member>,
}

/// Every storage instance and activity instance of a world.
///
/// Storage instances keep insertion order per kind: index 0 is the
/// blueprint new instances are cloned from. Activity groups keep the
/// order their kinds were first registered in.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    storages: BTreeMap<StorageKind, Vec<Arc<Storage>>>,
    groups: Vec<ActivityGroup>,
    /// Instances removed while activities might still hold them; swept
    /// back into live instances once the cycle has drained.
    retired: Vec<Arc<Storage>>,
    next_storage: u64,
    next_activity: u64,
}

impl Registry {
    pub fn next_storage_id(&mut self) -> StorageId {
        self.next_storage += 1;
        StorageId(self.next_storage)
    }

    pub fn next_activity_id(&mut self) -> ActivityId {
        self.next_activity += 1;
        ActivityId(self.next_activity)
    }

    pub fn add_storage(&mut self, storage: Arc<Storage>) {
        self.storages.entry(storage.kind()).or_default().push(storage);
    }

    pub fn storages(&self, kind: StorageKind) -> &[Arc<Storage>] {
        self.storages.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn storage(&self, id: StorageId) -> Option<&Arc<Storage>> {
        self.storages.values().flatten().find(|s| s.id() == id)
    }

    pub fn contains_storage(&self, id: StorageId) -> bool {
        self.storage(id).is_some()
    }

    /// Units held across every instance of a kind.
    pub fn total(&self, kind: StorageKind) -> usize {
        self.storages(kind).iter().map(|s| s.len()).sum()
    }

    /// Removes an instance, keeping it aside until the next sweep.
    pub fn retire_storage(&mut self, id: StorageId) -> Option<Arc<Storage>> {
        let instances = self.storages.values_mut().find(|v| v.iter().any(|s| s.id() == id))?;
        let index = instances.iter().position(|s| s.id() == id)?;
        let storage = instances.remove(index);
        self.retired.push(Arc::clone(&storage));
        Some(storage)
    }

    /// Moves anything that landed in retired instances into live ones.
    pub fn sweep_retired(&mut self, rng: &mut SmallRng) -> usize {
        let mut moved = 0;
        for storage in std::mem::take(&mut self.retired) {
            let units = storage.take_up_to(usize::MAX);
            if units.is_empty() {
                continue;
            }
            let target = self.storages(storage.kind()).choose(rng).cloned();
            match target {
                Some(target) => {
                    moved += units.len();
                    target.absorb(units);
                }
                None => {
                    // Nowhere to go yet; keep it for the next sweep.
                    storage.absorb(units);
                    self.retired.push(storage);
                }
            }
        }
        moved
    }

    pub fn add_activity(&mut self, activity: Arc<Activity>, worker: ActivityWorker) {
        let kind = activity.kind();
        let member = Member { activity, worker };
        match self.groups.iter_mut().find(|g| g.kind == kind) {
            Some(group) => group.members.push(member),
            None => self.groups.push(ActivityGroup {
                kind,
                members: vec![member],
            }),
        }
    }

    pub fn group(&self, kind: ActivityKind) -> Option<&ActivityGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    pub fn groups(&self) -> &[ActivityGroup] {
        &self.groups
    }

    pub fn instance_count(&self, kind: ActivityKind) -> usize {
        self.group(kind).map_or(0, |g| g.members.len())
    }

    pub fn total_activities(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn activities(&self) -> impl Iterator<Item = &Arc<Activity>> {
        self.groups.iter().flat_map(|g| g.members.iter().map(|m| &m.activity))
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Arc<Activity>> {
        self.activities().find(|a| a.id() == id)
    }

    /// Signal handles of a kind's instances, in registration order.
    pub fn signals(&self, kind: ActivityKind) -> Vec<mpsc::UnboundedSender<RunTicket>> {
        self.group(kind)
            .map(|g| g.members.iter().map(|m| m.worker.signal()).collect())
            .unwrap_or_default()
    }

    /// Binds every declared role of `activity` to a random instance of
    /// the required kind, avoiding `vacated` unless it is the only one.
    pub fn connect(
        &self,
        activity: &Activity,
        vacated: Option<StorageId>,
        rng: &mut SmallRng,
    ) -> Result<(), WorldError> {
        let kind = activity.kind();
        for role in [Role::Input, Role::Output] {
            for &storage_kind in kind.declared(role) {
                let instances = self.storages(storage_kind);
                let candidates: Vec<&Arc<Storage>> = instances
                    .iter()
                    .filter(|s| Some(s.id()) != vacated)
                    .collect();
                let chosen = match candidates.choose(rng) {
                    Some(storage) => Arc::clone(*storage),
                    None => instances.first().cloned().ok_or_else(|| {
                        WorldError::InvariantViolation(format!(
                            "no {storage_kind} instance to bind {kind} {} as {role}",
                            activity.id()
                        ))
                    })?,
                };
                activity.bind(role, chosen)?;
            }
        }
        Ok(())
    }

    /// Rebinds every activity currently bound to `vacated`.
    pub fn rebind_away_from(&self, vacated: StorageId, rng: &mut SmallRng) -> Result<usize, WorldError> {
        let mut rebound = 0;
        for activity in self.activities().filter(|a| a.is_bound_to(vacated)) {
            self.connect(activity, Some(vacated), rng)?;
            rebound += 1;
        }
        Ok(rebound)
    }

    /// Every registered kind still has at least one instance.
    pub fn check_invariants(&self) -> Result<(), WorldError> {
        if let Some(kind) = self.storages.iter().find(|(_, v)| v.is_empty()).map(|(k, _)| k) {
            return Err(WorldError::InvariantViolation(format!("no {kind} instance left")));
        }
        if let Some(group) = self.groups.iter().find(|g| g.members.is_empty()) {
            return Err(WorldError::InvariantViolation(format!(
                "no {} instance left",
                group.kind
            )));
        }
        for group in &self.groups {
            for role in [Role::Input, Role::Output] {
                if let Some(missing) = group
                    .kind
                    .declared(role)
                    .iter()
                    .find(|k| self.storages(**k).is_empty())
                {
                    return Err(WorldError::InvariantViolation(format!(
                        "{} needs a {missing} but none exists",
                        group.kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stops every worker and empties both registries.
    pub fn clear(&mut self) -> Vec<JoinHandle<()>> {
        self.storages.clear();
        self.retired.clear();
        self.groups
            .drain(..)
            .flat_map(|g| g.members)
            .map(|m| m.worker.stop())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_CAPACITY;
    use rand::SeedableRng;

    fn place(registry: &mut Registry, kind: StorageKind) -> Arc<Storage> {
        let id = registry.next_storage_id();
        let storage = Arc::new(Storage::new(id, kind, DEFAULT_CAPACITY));
        registry.add_storage(Arc::clone(&storage));
        storage
    }

    #[test]
    fn test_storage_ids_are_sequential() {
        let mut registry = Registry::default();
        let a = place(&mut registry, StorageKind::Barack);
        let b = place(&mut registry, StorageKind::Barn);
        assert_eq!(a.id(), StorageId(1));
        assert_eq!(b.id(), StorageId(2));
        assert_eq!(registry.storages(StorageKind::Barack).len(), 1);
        assert!(registry.storages(StorageKind::Warehouse).is_empty());
    }

    #[test]
    fn test_retire_keeps_order_of_the_rest() {
        let mut registry = Registry::default();
        let a = place(&mut registry, StorageKind::Barn);
        let b = place(&mut registry, StorageKind::Barn);
        let c = place(&mut registry, StorageKind::Barn);

        assert!(registry.retire_storage(b.id()).is_some());
        let ids: Vec<_> = registry.storages(StorageKind::Barn).iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a.id(), c.id()]);
        assert!(!registry.contains_storage(b.id()));
        assert!(registry.retire_storage(b.id()).is_none());
    }

    #[test]
    fn test_sweep_returns_stray_units() {
        use crate::resource::Food;

        let mut registry = Registry::default();
        let mut rng = SmallRng::seed_from_u64(1);
        let kept = place(&mut registry, StorageKind::Barn);
        let stale = place(&mut registry, StorageKind::Barn);
        registry.retire_storage(stale.id());

        stale.preload([Food::with_quality(50).into()]).unwrap();
        assert_eq!(registry.sweep_retired(&mut rng), 1);
        assert_eq!(kept.len(), 1);
        assert!(stale.is_empty());
    }

    #[test]
    fn test_missing_storage_kind_violates_invariants() {
        let mut registry = Registry::default();
        place(&mut registry, StorageKind::Barack);
        assert!(registry.check_invariants().is_ok());

        let barn = place(&mut registry, StorageKind::Barn);
        registry.retire_storage(barn.id());
        assert!(matches!(
            registry.check_invariants(),
            Err(WorldError::InvariantViolation(_))
        ));
    }
}
