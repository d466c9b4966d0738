//! Control service: wires the synchronizer and decision engine to the
//! scheduler.

use crate::engine::DecisionEngine;
use crate::scheduler::Scheduler;
use crate::sync::SensorSynchronizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const SYNC_TASK: &str = "sensor-sync";
const CONTROL_TASK: &str = "control-tick";

/// Runs the two periodic schedules: the synchronization pass and the
/// decision tick. The schedules are independent and may overlap; the
/// engine reads whatever is latest in persistence when it runs.
pub struct ControlService {
    synchronizer: Arc<SensorSynchronizer>,
    engine: Arc<DecisionEngine>,
    scheduler: Arc<Scheduler>,
    sync_interval: Duration,
    control_interval: Duration,
}

impl ControlService {
    #[must_use]
    pub fn new(
        synchronizer: Arc<SensorSynchronizer>,
        engine: Arc<DecisionEngine>,
        sync_interval: Duration,
        control_interval: Duration,
    ) -> Self {
        Self {
            synchronizer,
            engine,
            scheduler: Arc::new(Scheduler::new()),
            sync_interval,
            control_interval,
        }
    }

    /// Shared decision engine
    #[must_use]
    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// Register both schedules and start dispatching their events.
    ///
    /// A single tick's failures are contained by the synchronizer and
    /// engine themselves; the schedules never stop on their account.
    pub fn start(&self) {
        self.scheduler.schedule_interval(SYNC_TASK, self.sync_interval);
        self.scheduler
            .schedule_interval(CONTROL_TASK, self.control_interval);
        self.start_dispatch_listener();
        tracing::info!(
            "Control service started (sync every {:?}, control every {:?})",
            self.sync_interval,
            self.control_interval
        );
    }

    /// Stop both schedules
    pub fn stop(&self) {
        self.scheduler.remove(SYNC_TASK);
        self.scheduler.remove(CONTROL_TASK);
    }

    fn start_dispatch_listener(&self) {
        let synchronizer = Arc::clone(&self.synchronizer);
        let engine = Arc::clone(&self.engine);
        let mut rx = self.scheduler.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match event.task_id.as_str() {
                        SYNC_TASK => {
                            let synchronizer = Arc::clone(&synchronizer);
                            // Spawned so a slow pass does not hold back
                            // the control tick.
                            tokio::spawn(async move {
                                synchronizer.sync_all().await;
                            });
                        }
                        CONTROL_TASK => {
                            let engine = Arc::clone(&engine);
                            // Overlapping ticks are tolerated; the
                            // engine's per-device guard prevents
                            // duplicate commands.
                            tokio::spawn(async move {
                                engine.tick().await;
                            });
                        }
                        other => {
                            tracing::warn!("Unknown scheduler task {}", other);
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Control service lagged by {} scheduler events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Scheduler event channel closed");
                        break;
                    }
                }
            }
        });
    }
}
