//! Activities ("transitions").
//!
//! An activity is a persistent worker that performs one unit of work each
//! time it is signaled: retrieve from its bound input storages, transform,
//! deposit into its bound output storages. The set of kinds is closed;
//! each kind declares which storage kinds it may bind per role and which
//! resource it produces for priority bookkeeping.
//!
//! Shortage never aborts anything: the unit of work is skipped and a
//! [`ShortageEvent`] goes to the [`Coordinator`].

mod dining;
mod factory;
mod fields;
mod home;

pub use dining::Dining;
pub use factory::Factory;
pub use fields::Fields;
pub use home::Home;

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use simsims_events::ResourceKind;

use crate::config::ActivityConfig;
use crate::error::{BindingError, StorageError};
use crate::storage::{Storage, StorageId, StorageKind};
use crate::sync::lock;

/// Default cap on instances of one activity kind.
pub const DEFAULT_MAX_INSTANCES: usize = 50;

/// Concrete activity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Workers make products, at the risk of fatal accidents
    Factory,
    /// Workers grow food, at the risk of injury
    Fields,
    /// Workers eat food to restore vitality
    Dining,
    /// Consumes a product to heal a worker or raise a new one
    Home,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Factory,
        ActivityKind::Fields,
        ActivityKind::Dining,
        ActivityKind::Home,
    ];

    /// Storage kinds this activity reads from.
    pub fn inputs(self) -> &'static [StorageKind] {
        match self {
            ActivityKind::Factory | ActivityKind::Fields => &[StorageKind::Barack],
            ActivityKind::Dining => &[StorageKind::Barack, StorageKind::Barn],
            ActivityKind::Home => &[StorageKind::Barack, StorageKind::Warehouse],
        }
    }

    /// Storage kinds this activity writes to.
    pub fn outputs(self) -> &'static [StorageKind] {
        match self {
            ActivityKind::Factory => &[StorageKind::Barack, StorageKind::Warehouse],
            ActivityKind::Fields => &[StorageKind::Barack, StorageKind::Barn],
            ActivityKind::Dining | ActivityKind::Home => &[StorageKind::Barack],
        }
    }

    /// Storage kinds declared for a role.
    pub fn declared(self, role: Role) -> &'static [StorageKind] {
        match role {
            Role::Input => self.inputs(),
            Role::Output => self.outputs(),
        }
    }

    /// The resource whose scarcity raises this kind's priority.
    pub fn produces(self) -> Option<ResourceKind> {
        match self {
            ActivityKind::Factory => Some(ResourceKind::Product),
            ActivityKind::Fields => Some(ResourceKind::Food),
            ActivityKind::Home => Some(ResourceKind::Worker),
            ActivityKind::Dining => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::Factory => "Factory",
            ActivityKind::Fields => "Fields",
            ActivityKind::Dining => "Dining",
            ActivityKind::Home => "Home",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Input,
    Output,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Input => f.write_str("input"),
            Role::Output => f.write_str("output"),
        }
    }
}

/// Identity of an activity instance, unique within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub u64);

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "activity_{:04}", self.0)
    }
}

/// Storage instances an activity currently reads from and writes to.
///
/// Bindings are assigned by the coordinator, never owned by the activity.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    inputs: BTreeMap<StorageKind, Arc<Storage>>,
    outputs: BTreeMap<StorageKind, Arc<Storage>>,
}

impl Bindings {
    pub fn get(&self, role: Role, kind: StorageKind) -> Option<&Arc<Storage>> {
        match role {
            Role::Input => self.inputs.get(&kind),
            Role::Output => self.outputs.get(&kind),
        }
    }

    /// True if any role is bound to the given instance.
    pub fn references(&self, id: StorageId) -> bool {
        self.inputs
            .values()
            .chain(self.outputs.values())
            .any(|s| s.id() == id)
    }

    fn slot(&mut self, role: Role) -> &mut BTreeMap<StorageKind, Arc<Storage>> {
        match role {
            Role::Input => &mut self.inputs,
            Role::Output => &mut self.outputs,
        }
    }

    /// The bound instance a unit of work needs.
    pub(crate) fn port(&self, role: Role, kind: StorageKind) -> Result<&Arc<Storage>, WorkError> {
        self.get(role, kind).ok_or(WorkError::Unbound { role, kind })
    }
}

/// Structured signal that an activity found its inputs insufficient.
#[derive(Debug, Clone)]
pub struct ShortageEvent {
    pub activity: ActivityId,
    pub kind: ActivityKind,
    /// The storages the activity needed, empty or not
    pub storages: Vec<Arc<Storage>>,
}

/// The coordinator callbacks an activity reports to.
pub trait Coordinator: Send + Sync {
    /// Inputs were insufficient; the unit of work was skipped.
    fn lack_of_resources(&self, event: ShortageEvent);

    /// A unit of work relieved the scarcity of the kind's product.
    fn decrease_priority(&self, kind: ActivityKind);
}

/// What one `run_once` call amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Work done and decay reported
    Succeeded,
    /// Work done without relieving scarcity (a healed worker, a lost worker)
    NoYield,
    /// Inputs were insufficient and a shortage was reported
    Shortage,
    /// The activity is miswired; nothing was done
    Faulted,
}

/// Result of a kind's unit of work, before reporting.
#[derive(Debug)]
pub(crate) enum Work {
    Yielded,
    NoYield,
    Short(Vec<Arc<Storage>>),
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum WorkError {
    #[error("no {kind} bound as {role}")]
    Unbound { role: Role, kind: StorageKind },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-kind parameters, fixed for the life of an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Factory(Factory),
    Fields(Fields),
    Dining(Dining),
    Home(Home),
}

impl Profile {
    /// Draws the per-instance parameters of a new activity of `kind`.
    pub fn generate(kind: ActivityKind, config: &ActivityConfig, rng: &mut SmallRng) -> Self {
        match kind {
            ActivityKind::Factory => Profile::Factory(Factory::generate(config, rng)),
            ActivityKind::Fields => Profile::Fields(Fields::generate(config, rng)),
            ActivityKind::Dining => Profile::Dining(Dining::from_config(config)),
            ActivityKind::Home => Profile::Home(Home::from_config(config)),
        }
    }

    pub fn kind(&self) -> ActivityKind {
        match self {
            Profile::Factory(_) => ActivityKind::Factory,
            Profile::Fields(_) => ActivityKind::Fields,
            Profile::Dining(_) => ActivityKind::Dining,
            Profile::Home(_) => ActivityKind::Home,
        }
    }

    fn work(&self, ports: &Bindings, rng: &mut SmallRng) -> Result<Work, WorkError> {
        match self {
            Profile::Factory(p) => p.work(ports, rng),
            Profile::Fields(p) => p.work(ports, rng),
            Profile::Dining(p) => p.work(ports),
            Profile::Home(p) => p.work(ports, rng),
        }
    }
}

/// An activity instance.
#[derive(Debug)]
pub struct Activity {
    id: ActivityId,
    profile: Profile,
    max_instances: usize,
    bindings: Mutex<Bindings>,
    rng: Mutex<SmallRng>,
}

impl Activity {
    /// Creates an unbound activity.
    pub fn new(id: ActivityId, profile: Profile, max_instances: usize, rng: SmallRng) -> Self {
        Self {
            id,
            profile,
            max_instances,
            bindings: Mutex::new(Bindings::default()),
            rng: Mutex::new(rng),
        }
    }

    pub fn id(&self) -> ActivityId {
        self.id
    }

    pub fn kind(&self) -> ActivityKind {
        self.profile.kind()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Cap on how many instances of this kind may ever exist.
    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    pub fn bind_input(&self, storage: Arc<Storage>) -> Result<(), BindingError> {
        self.bind(Role::Input, storage)
    }

    pub fn bind_output(&self, storage: Arc<Storage>) -> Result<(), BindingError> {
        self.bind(Role::Output, storage)
    }

    /// Replaces the binding of `role` for the storage's kind.
    pub fn bind(&self, role: Role, storage: Arc<Storage>) -> Result<(), BindingError> {
        let kind = self.kind();
        if !kind.declared(role).contains(&storage.kind()) {
            return Err(BindingError::IncompatibleBinding {
                activity: kind,
                storage: storage.kind(),
                role,
            });
        }
        lock(&self.bindings).slot(role).insert(storage.kind(), storage);
        Ok(())
    }

    /// Copy of the current bindings.
    pub fn bindings(&self) -> Bindings {
        lock(&self.bindings).clone()
    }

    pub fn is_bound_to(&self, id: StorageId) -> bool {
        lock(&self.bindings).references(id)
    }

    /// True once every declared role has a binding.
    pub fn is_fully_bound(&self) -> bool {
        let bindings = lock(&self.bindings);
        let kind = self.kind();
        [Role::Input, Role::Output].into_iter().all(|role| {
            kind.declared(role)
                .iter()
                .all(|k| bindings.get(role, *k).is_some())
        })
    }

    /// The activity's own liveness precondition on one storage.
    pub fn can_proceed(&self, storage: &Storage) -> bool {
        can_proceed(storage)
    }

    /// Performs exactly one unit of work against the current bindings.
    pub fn run_once(&self, coordinator: &dyn Coordinator) -> RunOutcome {
        let ports = self.bindings();
        let work = {
            let mut rng = lock(&self.rng);
            self.profile.work(&ports, &mut rng)
        };

        match work {
            Ok(Work::Yielded) => {
                coordinator.decrease_priority(self.kind());
                RunOutcome::Succeeded
            }
            Ok(Work::NoYield) => RunOutcome::NoYield,
            Ok(Work::Short(storages)) => {
                tracing::debug!(
                    "{} {} short on {:?}",
                    self.kind(),
                    self.id,
                    storages.iter().map(|s| s.id()).collect::<Vec<_>>()
                );
                coordinator.lack_of_resources(ShortageEvent {
                    activity: self.id,
                    kind: self.kind(),
                    storages,
                });
                RunOutcome::Shortage
            }
            Err(e) => {
                tracing::error!("{} {} faulted: {}", self.kind(), self.id, e);
                RunOutcome::Faulted
            }
        }
    }
}

pub(crate) fn can_proceed(storage: &Storage) -> bool {
    storage.len() > 0
}

/// Retrieves one unit, or `None` when a concurrent activity emptied the
/// storage between the length check and the retrieval.
pub(crate) fn take(storage: &Storage) -> Option<crate::resource::Resource> {
    storage.retrieve().ok()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the per-kind tests.

    use super::*;
    use rand::SeedableRng;

    #[derive(Default)]
    pub struct RecordingCoordinator {
        pub shortages: Mutex<Vec<ShortageEvent>>,
        pub decays: Mutex<Vec<ActivityKind>>,
    }

    impl RecordingCoordinator {
        pub fn shortage_ids(&self) -> Vec<Vec<StorageId>> {
            lock(&self.shortages)
                .iter()
                .map(|e| e.storages.iter().map(|s| s.id()).collect())
                .collect()
        }

        pub fn decay_count(&self) -> usize {
            lock(&self.decays).len()
        }
    }

    impl Coordinator for RecordingCoordinator {
        fn lack_of_resources(&self, event: ShortageEvent) {
            lock(&self.shortages).push(event);
        }

        fn decrease_priority(&self, kind: ActivityKind) {
            lock(&self.decays).push(kind);
        }
    }

    pub fn place(id: u64, kind: StorageKind) -> Arc<Storage> {
        Arc::new(Storage::new(StorageId(id), kind, crate::storage::DEFAULT_CAPACITY))
    }

    /// Activity bound to the given storages by kind, inputs and outputs.
    pub fn wired(profile: Profile, inputs: &[&Arc<Storage>], outputs: &[&Arc<Storage>]) -> Activity {
        let activity = Activity::new(
            ActivityId(1),
            profile,
            DEFAULT_MAX_INSTANCES,
            SmallRng::seed_from_u64(7),
        );
        for s in inputs {
            activity.bind_input(Arc::clone(s)).unwrap();
        }
        for s in outputs {
            activity.bind_output(Arc::clone(s)).unwrap();
        }
        activity
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::resource::Worker;

    #[test]
    fn test_declared_kinds() {
        assert_eq!(ActivityKind::Home.inputs(), &[StorageKind::Barack, StorageKind::Warehouse]);
        assert_eq!(ActivityKind::Fields.outputs(), &[StorageKind::Barack, StorageKind::Barn]);
        assert_eq!(ActivityKind::Factory.produces(), Some(ResourceKind::Product));
        assert_eq!(ActivityKind::Dining.produces(), None);
    }

    #[test]
    fn test_incompatible_binding_rejected() {
        let barack = place(1, StorageKind::Barack);
        let barn = place(2, StorageKind::Barn);
        let activity = wired(Profile::Dining(Dining { quality_offset: 6 }), &[], &[]);

        let err = activity.bind_output(barn.clone()).unwrap_err();
        assert_eq!(
            err,
            BindingError::IncompatibleBinding {
                activity: ActivityKind::Dining,
                storage: StorageKind::Barn,
                role: Role::Output,
            }
        );

        activity.bind_input(barn).unwrap();
        activity.bind_input(barack.clone()).unwrap();
        assert!(!activity.is_fully_bound());
        activity.bind_output(barack).unwrap();
        assert!(activity.is_fully_bound());
    }

    #[test]
    fn test_rebinding_replaces_role() {
        let first = place(1, StorageKind::Barack);
        let second = place(2, StorageKind::Barack);
        let activity = wired(
            Profile::Dining(Dining { quality_offset: 6 }),
            &[&first],
            &[&first],
        );
        assert!(activity.is_bound_to(StorageId(1)));

        activity.bind_input(second.clone()).unwrap();
        activity.bind_output(second).unwrap();
        assert!(!activity.is_bound_to(StorageId(1)));
        assert!(activity.is_bound_to(StorageId(2)));
    }

    #[test]
    fn test_can_proceed_tracks_length() {
        let barack = place(1, StorageKind::Barack);
        let activity = wired(Profile::Dining(Dining { quality_offset: 6 }), &[], &[]);
        assert!(!activity.can_proceed(&barack));

        barack.preload([Worker::with_vitality(40).into()]).unwrap();
        assert!(activity.can_proceed(&barack));
    }

    #[test]
    fn test_unbound_activity_faults_without_reporting() {
        let coordinator = RecordingCoordinator::default();
        let activity = wired(Profile::Dining(Dining { quality_offset: 6 }), &[], &[]);

        assert_eq!(activity.run_once(&coordinator), RunOutcome::Faulted);
        assert!(coordinator.shortage_ids().is_empty());
        assert_eq!(coordinator.decay_count(), 0);
    }
}
