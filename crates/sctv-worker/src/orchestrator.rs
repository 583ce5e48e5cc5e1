//! Stream orchestration.
//!
//! The orchestrator polls the registry for the desired set of streams and
//! converges the running workers towards it: new ids get a worker, ids no
//! longer listed are cancelled, ids present in both are left alone. It also
//! owns graceful shutdown of every worker.
//!
//! The handle map is only touched by `reconcile` and `shutdown`, both of
//! which hold its lock for their whole mutation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use sctv_models::{StreamDescriptor, StreamId};
use sctv_registry::StreamRegistry;

use crate::metrics;
use crate::shutdown::{ShutdownSignal, ShutdownTrigger};
use crate::stream_worker::{WorkerContext, WorkerHandle, WorkerState};

/// Start/stop actions for one reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_start: Vec<StreamDescriptor>,
    pub to_stop: Vec<StreamId>,
    pub unchanged: Vec<StreamId>,
}

impl ReconcilePlan {
    /// Diff desired against running by id only.
    ///
    /// Duplicate ids in `desired` collapse to their first occurrence.
    pub fn compute(desired: Vec<StreamDescriptor>, running: &HashSet<StreamId>) -> Self {
        let mut seen = HashSet::with_capacity(desired.len());
        let mut plan = Self::default();

        for stream in desired {
            if !seen.insert(stream.id.clone()) {
                debug!("Ignoring duplicate registry entry for stream {}", stream.id);
                continue;
            }
            if running.contains(&stream.id) {
                plan.unchanged.push(stream.id);
            } else {
                plan.to_start.push(stream);
            }
        }

        plan.to_stop = running
            .iter()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();

        plan
    }

    pub fn is_noop(&self) -> bool {
        self.to_start.is_empty() && self.to_stop.is_empty()
    }
}

/// Outcome of one `reconcile` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: usize,
    pub stopped: usize,
    pub unchanged: usize,
    /// The registry could not be queried, or shutdown had begun
    pub skipped: bool,
}

impl ReconcileReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Keeps running workers in line with the registry.
pub struct StreamOrchestrator {
    registry: Arc<dyn StreamRegistry>,
    ctx: WorkerContext,
    workers: Mutex<HashMap<StreamId, WorkerHandle>>,
    shutdown: ShutdownTrigger,
}

impl StreamOrchestrator {
    pub fn new(registry: Arc<dyn StreamRegistry>, ctx: WorkerContext) -> Self {
        let (shutdown, _) = ShutdownTrigger::new();
        Self {
            registry,
            ctx,
            workers: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Signal that fires when shutdown begins.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.subscribe()
    }

    /// Run one reconciliation cycle.
    pub async fn reconcile(&self) -> ReconcileReport {
        if self.is_shutting_down() {
            return ReconcileReport::skipped();
        }

        // Fetch outside the lock so a slow registry never delays shutdown
        let desired = match self.registry.active_streams().await {
            Ok(desired) => desired,
            Err(e) => {
                metrics::record_registry_failure();
                warn!("Registry fetch failed, keeping current streams: {}", e);
                return ReconcileReport::skipped();
            }
        };

        let mut workers = self.workers.lock().await;
        if self.is_shutting_down() {
            return ReconcileReport::skipped();
        }

        self.reap_finished(&mut workers);

        let running: HashSet<StreamId> = workers.keys().cloned().collect();
        let plan = ReconcilePlan::compute(desired, &running);

        let stop_timeout = self.ctx.config.worker_stop_timeout;
        let stopping: Vec<WorkerHandle> = plan
            .to_stop
            .iter()
            .filter_map(|id| workers.remove(id))
            .collect();
        let stopped = stop_all(stopping, stop_timeout).await;

        for stream in &plan.to_start {
            info!(
                "Starting worker for stream {} ({}) at {}",
                stream.id, stream.name, stream.locator
            );
            let handle = WorkerHandle::spawn(stream.clone(), self.ctx.clone());
            workers.insert(stream.id.clone(), handle);
        }

        metrics::set_active_streams(workers.len());

        let report = ReconcileReport {
            started: plan.to_start.len(),
            stopped,
            unchanged: plan.unchanged.len(),
            skipped: false,
        };
        if plan.is_noop() {
            debug!("Reconciled: {} streams unchanged", report.unchanged);
        } else {
            info!(
                "Reconciled: {} started, {} stopped, {} unchanged",
                report.started, report.stopped, report.unchanged
            );
        }
        report
    }

    /// Drop handles whose task has already exited so they can be restarted.
    fn reap_finished(&self, workers: &mut HashMap<StreamId, WorkerHandle>) {
        workers.retain(|id, handle| {
            if handle.is_finished() {
                warn!("Worker for stream {} exited unexpectedly, will restart if still desired", id);
                false
            } else {
                true
            }
        });
    }

    /// Reconcile immediately, then every `reconcile_interval` until shutdown.
    ///
    /// Shuts every worker down before returning.
    pub async fn run(&self) {
        let period = self.ctx.config.reconcile_interval;
        info!("Starting stream orchestrator, reconciling every {:?}", period);

        let mut shutdown = self.shutdown.subscribe();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = interval.tick() => {
                    self.reconcile().await;
                }
            }
        }

        self.shutdown().await;
    }

    /// Cancel every worker concurrently and wait for them to exit.
    ///
    /// Each worker gets the configured stop timeout; one that misses it is
    /// reported as leaked and aborted. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();

        let handles: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock().await;
            workers.drain().map(|(_, handle)| handle).collect()
        };
        metrics::set_active_streams(0);

        if handles.is_empty() {
            return;
        }

        let total = handles.len();
        info!("Stopping {} stream workers", total);
        let stopped = stop_all(handles, self.ctx.config.worker_stop_timeout).await;
        if stopped < total {
            warn!("{} stream workers leaked during shutdown", total - stopped);
        }
        info!("All stream workers stopped");
    }

    /// Cancel one worker without forgetting it.
    ///
    /// The next `reconcile` reaps the finished handle and starts a fresh
    /// worker if the stream is still desired. Returns `false` for unknown ids.
    pub async fn request_restart(&self, stream_id: &StreamId) -> bool {
        match self.workers.lock().await.get(stream_id) {
            Some(handle) => {
                info!("Restart requested for stream {}", stream_id);
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Ids with a live handle.
    pub async fn running_streams(&self) -> HashSet<StreamId> {
        self.workers.lock().await.keys().cloned().collect()
    }

    /// State receivers that stay readable after their handle is gone.
    pub async fn subscribe_states(&self) -> HashMap<StreamId, watch::Receiver<WorkerState>> {
        self.workers
            .lock()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.subscribe()))
            .collect()
    }
}

/// Stop handles concurrently; returns how many exited in time.
async fn stop_all(handles: Vec<WorkerHandle>, timeout: Duration) -> usize {
    for handle in &handles {
        info!("Stopping worker for stream {}", handle.id());
    }
    join_all(handles.into_iter().map(|handle| handle.stop(timeout)))
        .await
        .into_iter()
        .filter(|stopped| *stopped)
        .count()
}
