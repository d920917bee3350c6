//! Dispatch limiter and per-cycle completion barrier.
//!
//! The coordinator hands each dispatched activity a [`RunTicket`]. A ticket
//! holds one permit of the concurrency cap and one slot of the cycle
//! barrier; dropping it, after the run or when the activity is gone,
//! releases both. Activity workers are tokio tasks that wait for tickets
//! on an unbounded channel between cycles.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use crate::activity::{Activity, Coordinator};
use crate::error::WorldError;

/// Default number of activity runs allowed in flight at once.
pub const DEFAULT_CONCURRENCY_CAP: usize = 10;

/// Counters describing dispatch so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Runs in flight right now
    pub running: usize,
    /// Most runs ever in flight at once
    pub peak_running: usize,
    /// Tickets issued over the life of the world
    pub dispatched: u64,
    /// Times the coordinator had to wait for a free slot
    pub saturation_waits: u64,
}

#[derive(Debug, Default)]
struct RunGauge {
    running: AtomicUsize,
    peak: AtomicUsize,
    dispatched: AtomicU64,
    saturation_waits: AtomicU64,
}

impl RunGauge {
    fn enter(self: &Arc<Self>) -> RunningGuard {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        RunningGuard {
            gauge: Arc::clone(self),
        }
    }

    fn stats(&self) -> DispatchStats {
        DispatchStats {
            running: self.running.load(Ordering::SeqCst),
            peak_running: self.peak.load(Ordering::SeqCst),
            dispatched: self.dispatched.load(Ordering::SeqCst),
            saturation_waits: self.saturation_waits.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug)]
struct RunningGuard {
    gauge: Arc<RunGauge>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.gauge.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts runs dispatched in the current cycle that have not completed.
#[derive(Debug, Default)]
pub(crate) struct CycleBarrier {
    pending: AtomicUsize,
    drained: Notify,
}

impl CycleBarrier {
    fn register(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every registered run has completed.
    pub(crate) async fn wait(&self) {
        loop {
            // Created before the check so a completion in between still wakes us.
            let drained = self.drained.notified();
            if self.pending() == 0 {
                return;
            }
            drained.await;
        }
    }
}

/// Permission for one activity to perform one unit of work this cycle.
#[derive(Debug)]
pub(crate) struct RunTicket {
    lease: Option<(RunningGuard, OwnedSemaphorePermit)>,
    barrier: Arc<CycleBarrier>,
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        // Leave the gauge before the permit can be handed to another run,
        // and free the slot before the barrier can release the coordinator.
        if let Some((running, permit)) = self.lease.take() {
            drop(running);
            drop(permit);
        }
        self.barrier.complete();
    }
}

/// Concurrency cap plus the cycle barrier.
#[derive(Debug)]
pub struct Dispatcher {
    cap: usize,
    limiter: Arc<Semaphore>,
    gauge: Arc<RunGauge>,
    barrier: Arc<CycleBarrier>,
}

impl Dispatcher {
    /// Creates a dispatcher allowing `cap` runs at once. A cap of zero is
    /// raised to one.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            limiter: Arc::new(Semaphore::new(cap)),
            gauge: Arc::new(RunGauge::default()),
            barrier: Arc::new(CycleBarrier::default()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn stats(&self) -> DispatchStats {
        self.gauge.stats()
    }

    /// Runs dispatched this cycle and not yet completed.
    pub fn pending(&self) -> usize {
        self.barrier.pending()
    }

    /// Waits for a free slot and issues a ticket holding it.
    pub(crate) async fn ticket(&self) -> Result<RunTicket, WorldError> {
        let permit = match Arc::clone(&self.limiter).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                self.gauge.saturation_waits.fetch_add(1, Ordering::SeqCst);
                tracing::trace!("dispatch saturated at {} running", self.cap);
                Arc::clone(&self.limiter)
                    .acquire_owned()
                    .await
                    .map_err(|_| WorldError::DispatchClosed)?
            }
            Err(TryAcquireError::Closed) => return Err(WorldError::DispatchClosed),
        };
        self.barrier.register();
        Ok(RunTicket {
            lease: Some((self.gauge.enter(), permit)),
            barrier: Arc::clone(&self.barrier),
        })
    }

    /// Waits until every run dispatched this cycle has completed.
    pub(crate) async fn wait_idle(&self) {
        self.barrier.wait().await;
    }

    /// Refuses further tickets.
    pub(crate) fn close(&self) {
        self.limiter.close();
    }
}

/// The running task of one activity instance.
#[derive(Debug)]
pub(crate) struct ActivityWorker {
    signal: mpsc::UnboundedSender<RunTicket>,
    task: JoinHandle<()>,
}

impl ActivityWorker {
    /// Starts a worker that runs `activity` once per ticket received.
    pub(crate) fn spawn(
        runtime: &Handle,
        activity: Arc<Activity>,
        coordinator: Weak<dyn Coordinator>,
    ) -> Self {
        let (signal, tickets) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_activity(activity, coordinator, tickets));
        Self { signal, task }
    }

    /// Handle used to signal this worker.
    pub(crate) fn signal(&self) -> mpsc::UnboundedSender<RunTicket> {
        self.signal.clone()
    }

    /// Stops accepting signals; an in-flight run finishes first.
    pub(crate) fn stop(self) -> JoinHandle<()> {
        drop(self.signal);
        self.task
    }
}

async fn run_activity(
    activity: Arc<Activity>,
    coordinator: Weak<dyn Coordinator>,
    mut tickets: mpsc::UnboundedReceiver<RunTicket>,
) {
    while let Some(ticket) = tickets.recv().await {
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        activity.run_once(coordinator.as_ref());
        drop(ticket);
    }
    tracing::trace!("{} {} stopped", activity.kind(), activity.id());
}
