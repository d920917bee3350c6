//! The coordinator.
//!
//! A [`World`] owns the storage and activity registries, the priority
//! table and the dispatcher. Each call to [`World::tick`] runs one cycle:
//!
//! 1. Check that every registered kind still has an instance
//! 2. Rank activity kinds by descending priority
//! 3. Signal instances, kind by kind, within the per-kind budget and the
//!    concurrency cap
//! 4. Wait for every signaled instance to finish
//! 5. Periodically reshuffle every binding and pause for pacing
//! 6. Take the census and hand it to the recorder
//!
//! Activities call back into the shared state while they run: shortages
//! raise priorities and may remove empty instances or spawn activities;
//! overflowing stores clone storage instances and restock them.

mod builder;
mod priority;
mod rebalance;
mod registry;

pub use builder::WorldBuilder;
pub use priority::PriorityTable;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use simsims_events::{CycleRecorder, CycleSnapshot, RunSummary};

use crate::activity::{Activity, ActivityKind, Coordinator, Profile, Role};
use crate::config::{ActivityConfig, SimsimsConfig};
use crate::dispatch::{ActivityWorker, DispatchStats, Dispatcher, RunTicket};
use crate::error::{BindingError, WorldError};
use crate::resource::{Food, Product, Resource, Worker};
use crate::storage::{OverflowHandler, Storage, StorageKind};
use crate::sync::lock;
use registry::Registry;

/// What a cycle ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Workers remain; the snapshot was recorded
    Continue(CycleSnapshot),
    /// The last worker is gone; the world has shut down
    Extinct(RunSummary),
}

/// State shared between the coordinator and running activities.
///
/// Lock order: registry, then priorities, then rng. Storage locks are
/// taken last and never while another storage lock is held.
pub(crate) struct WorldShared {
    registry: Mutex<Registry>,
    priorities: Mutex<PriorityTable>,
    rng: Mutex<SmallRng>,
    activity: ActivityConfig,
    capacity: usize,
    runtime: Handle,
    ended: AtomicBool,
    this: Weak<WorldShared>,
}

impl WorldShared {
    fn new(config: &SimsimsConfig, runtime: Handle) -> Arc<Self> {
        let rng = match config.world.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Arc::new_cyclic(|this| Self {
            registry: Mutex::new(Registry::default()),
            priorities: Mutex::new(PriorityTable::default()),
            rng: Mutex::new(rng),
            activity: config.activity.clone(),
            capacity: config.storage.capacity,
            runtime,
            ended: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Creates and registers an empty storage instance.
    fn new_storage(&self, registry: &mut Registry, kind: StorageKind, capacity: usize) -> Arc<Storage> {
        let handler: Weak<dyn OverflowHandler> = self.this.clone();
        let storage = Arc::new(Storage::with_overflow_handler(
            registry.next_storage_id(),
            kind,
            capacity,
            handler,
        ));
        registry.add_storage(Arc::clone(&storage));
        storage
    }

    /// Creates an activity, binds it, and starts its worker.
    ///
    /// Roles whose kind matches one of `pinned` are bound to it; the rest
    /// are bound at random.
    fn spawn_activity(
        &self,
        registry: &mut Registry,
        priorities: &mut PriorityTable,
        rng: &mut SmallRng,
        kind: ActivityKind,
        pinned: &[Arc<Storage>],
    ) -> Result<Arc<Activity>, WorldError> {
        let id = registry.next_activity_id();
        let profile = Profile::generate(kind, &self.activity, rng);
        let activity = Arc::new(Activity::new(
            id,
            profile,
            self.activity.max_instances,
            SmallRng::seed_from_u64(rng.gen()),
        ));

        registry.connect(&activity, None, rng)?;
        for storage in pinned {
            let roles: Vec<Role> = [Role::Input, Role::Output]
                .into_iter()
                .filter(|role| kind.declared(*role).contains(&storage.kind()))
                .collect();
            if roles.is_empty() {
                return Err(BindingError::IncompatibleBinding {
                    activity: kind,
                    storage: storage.kind(),
                    role: Role::Input,
                }
                .into());
            }
            for role in roles {
                activity.bind(role, Arc::clone(storage))?;
            }
        }

        let coordinator: Weak<dyn Coordinator> = self.this.clone();
        let worker = ActivityWorker::spawn(&self.runtime, Arc::clone(&activity), coordinator);
        registry.add_activity(Arc::clone(&activity), worker);
        priorities.register(kind);
        Ok(activity)
    }
}

/// Signals for one cycle, in dispatch order.
struct DispatchPlan {
    budget: usize,
    kinds: Vec<(ActivityKind, Vec<mpsc::UnboundedSender<RunTicket>>)>,
}

/// A running world.
pub struct World {
    shared: Arc<WorldShared>,
    dispatcher: Dispatcher,
    recorder: Box<dyn CycleRecorder>,
    cycle: u64,
    pacing: Duration,
    max_cycles: Option<u64>,
    outcome: Option<RunSummary>,
}

impl World {
    /// Starts describing a world topology.
    pub fn builder(config: SimsimsConfig) -> WorldBuilder {
        WorldBuilder::new(config)
    }

    /// Creates the initial settlement described by `config`.
    ///
    /// One instance of each storage kind is created; settlers and the
    /// starting stock are stored one by one, so overflow spreads them
    /// across cloned instances exactly as later stores would.
    pub fn settle(config: &SimsimsConfig, recorder: Box<dyn CycleRecorder>) -> Result<Self, WorldError> {
        let mut builder = WorldBuilder::new(config.clone());
        for kind in StorageKind::ALL {
            builder.storage(kind, []);
        }
        let counts = [
            (ActivityKind::Factory, config.world.factories),
            (ActivityKind::Fields, config.world.fields),
            (ActivityKind::Dining, config.world.dining_halls),
            (ActivityKind::Home, config.world.homes),
        ];
        let rounds = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        for round in 0..rounds {
            for (kind, count) in counts {
                if round < count {
                    builder.activity(kind);
                }
            }
        }
        let world = builder.build(recorder)?;

        let (settlers, stock) = {
            let mut rng = lock(&world.shared.rng);
            let activity = &config.activity;
            let settlers: Vec<Resource> = (0..config.world.starting_workers)
                .map(|_| Worker::random(&mut *rng, activity.worker_vitality).into())
                .collect();
            let stock: Vec<Resource> = (0..config.world.starting_resources)
                .map(|_| {
                    if rng.gen_bool(0.5) {
                        Food::random(&mut *rng, activity.food_quality).into()
                    } else {
                        Product.into()
                    }
                })
                .collect();
            (settlers, stock)
        };

        for resource in settlers.into_iter().chain(stock) {
            let kind = StorageKind::for_resource(resource.kind());
            let target = world
                .storages(kind)
                .into_iter()
                .next()
                .ok_or_else(|| WorldError::InvariantViolation(format!("no {kind} to settle")))?;
            target.store(resource)?;
        }

        tracing::info!(
            "Settled {} workers and {} resources",
            config.world.starting_workers,
            config.world.starting_resources
        );
        Ok(world)
    }

    fn from_parts(
        shared: Arc<WorldShared>,
        config: &SimsimsConfig,
        recorder: Box<dyn CycleRecorder>,
    ) -> Self {
        Self {
            shared,
            dispatcher: Dispatcher::new(config.dispatch.concurrency_cap),
            recorder,
            cycle: 0,
            pacing: config.world.pacing(),
            max_cycles: config.world.max_cycles,
            outcome: None,
        }
    }

    /// Runs one cycle.
    pub async fn tick(&mut self) -> Result<CycleOutcome, WorldError> {
        if let Some(summary) = &self.outcome {
            return Err(WorldError::Ended {
                cycles: summary.cycles_survived,
            });
        }

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!("Cycle {} aborted: {}", self.cycle, e);
                let snapshot = self.census();
                self.finish(snapshot, false).await;
                return Err(e);
            }
        };

        for (kind, signals) in plan.kinds {
            for signal in signals.into_iter().take(plan.budget) {
                let ticket = self.dispatcher.ticket().await?;
                if signal.send(ticket).is_err() {
                    tracing::warn!("A stopped {} missed its signal", kind);
                }
            }
        }
        self.dispatcher.wait_idle().await;

        self.after_cycle().await?;

        let snapshot = self.census();
        self.recorder.record_cycle(&snapshot)?;

        if snapshot.is_extinct() {
            tracing::info!("The civilisation lasted {} cycles", self.cycle);
            let summary = self.finish(snapshot, true).await;
            self.recorder.finalize(&summary)?;
            return Ok(CycleOutcome::Extinct(summary));
        }

        self.cycle += 1;
        Ok(CycleOutcome::Continue(snapshot))
    }

    /// Ticks until extinction or the configured cycle limit.
    pub async fn run(&mut self) -> Result<RunSummary, WorldError> {
        self.run_with(|_| {}).await
    }

    /// Like [`World::run`], calling `on_cycle` with every recorded snapshot.
    pub async fn run_with<F>(&mut self, mut on_cycle: F) -> Result<RunSummary, WorldError>
    where
        F: FnMut(&CycleSnapshot),
    {
        loop {
            match self.tick().await? {
                CycleOutcome::Extinct(summary) => {
                    on_cycle(&summary.final_snapshot);
                    return Ok(summary);
                }
                CycleOutcome::Continue(snapshot) => {
                    on_cycle(&snapshot);
                    if self.max_cycles.is_some_and(|max| self.cycle >= max) {
                        tracing::info!("Stopping after {} cycles", self.cycle);
                        let summary = self.finish(snapshot, false).await;
                        self.recorder.finalize(&summary)?;
                        return Ok(summary);
                    }
                }
            }
        }
    }

    /// Stops every activity without finalizing the recorder. Ticking
    /// afterwards fails with [`WorldError::Ended`].
    pub async fn shutdown(&mut self) {
        if self.outcome.is_none() {
            let snapshot = self.census();
            self.finish(snapshot, false).await;
        }
    }

    fn plan(&self) -> Result<DispatchPlan, WorldError> {
        let registry = lock(&self.shared.registry);
        registry.check_invariants()?;
        let ranked = lock(&self.shared.priorities).ranked();

        let living = registry.total(StorageKind::Barack);
        let budget = living / 10 + 2 * ranked.len();
        let kinds = ranked
            .into_iter()
            .map(|kind| (kind, registry.signals(kind)))
            .collect();
        Ok(DispatchPlan { budget, kinds })
    }

    /// Sweeps retired storage and, every N cycles where N is the number of
    /// activity instances, reshuffles every binding and pauses.
    async fn after_cycle(&mut self) -> Result<(), WorldError> {
        let reshuffled = {
            let mut registry = lock(&self.shared.registry);
            let mut rng = lock(&self.shared.rng);
            let swept = registry.sweep_retired(&mut rng);
            if swept > 0 {
                tracing::debug!("Swept {} stray units from retired storage", swept);
            }

            let total = registry.total_activities() as u64;
            if total > 0 && (self.cycle + 1) % total == 0 {
                for activity in registry.activities() {
                    registry.connect(activity, None, &mut rng)?;
                }
                true
            } else {
                false
            }
        };

        if reshuffled {
            tracing::debug!("Reshuffled every binding after cycle {}", self.cycle);
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        Ok(())
    }

    /// Stops every activity, clears the registries and records the outcome.
    async fn finish(&mut self, final_snapshot: CycleSnapshot, extinct: bool) -> RunSummary {
        self.shared.ended.store(true, Ordering::SeqCst);
        self.dispatcher.close();
        let tasks = lock(&self.shared.registry).clear();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Activity worker ended abnormally: {}", e);
            }
        }

        let summary = RunSummary {
            cycles_survived: self.cycle,
            extinct,
            final_snapshot,
        };
        self.outcome = Some(summary.clone());
        summary
    }

    /// Resource totals and topology right now, without recording.
    pub fn census(&self) -> CycleSnapshot {
        let registry = lock(&self.shared.registry);
        let mut snapshot = CycleSnapshot::new(self.cycle);
        for kind in StorageKind::ALL {
            snapshot = snapshot.with_count(kind.holds(), registry.total(kind) as u64);
            let instances = registry.storages(kind).len();
            if instances > 0 {
                snapshot.storage_instances.insert(kind.label().to_string(), instances);
            }
        }
        for group in registry.groups() {
            snapshot
                .activity_instances
                .insert(group.kind.label().to_string(), group.members.len());
        }
        drop(registry);
        snapshot.priorities = lock(&self.shared.priorities).labelled();
        snapshot
    }

    /// Cycles completed without extinction so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_ended(&self) -> bool {
        self.outcome.is_some()
    }

    /// How the world ended, once it has.
    pub fn outcome(&self) -> Option<&RunSummary> {
        self.outcome.as_ref()
    }

    pub fn priority_of(&self, kind: ActivityKind) -> Option<u32> {
        lock(&self.shared.priorities).get(kind)
    }

    pub fn storage_instances(&self, kind: StorageKind) -> usize {
        lock(&self.shared.registry).storages(kind).len()
    }

    pub fn activity_instances(&self, kind: ActivityKind) -> usize {
        lock(&self.shared.registry).instance_count(kind)
    }

    /// Handles to every live instance of a storage kind, blueprint first.
    pub fn storages(&self, kind: StorageKind) -> Vec<Arc<Storage>> {
        lock(&self.shared.registry).storages(kind).to_vec()
    }

    /// Handles to every instance of an activity kind.
    pub fn activities(&self, kind: ActivityKind) -> Vec<Arc<Activity>> {
        lock(&self.shared.registry)
            .group(kind)
            .map(|g| g.members.iter().map(|m| Arc::clone(&m.activity)).collect())
            .unwrap_or_default()
    }

    /// Living workers across every Barack.
    pub fn living_workers(&self) -> usize {
        lock(&self.shared.registry).total(StorageKind::Barack)
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Runs dispatched in the current cycle that have not completed.
    pub fn pending_runs(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn recorder(&self) -> &dyn CycleRecorder {
        self.recorder.as_ref()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("cycle", &self.cycle)
            .field("dispatcher", &self.dispatcher)
            .field("ended", &self.is_ended())
            .finish()
    }
}
