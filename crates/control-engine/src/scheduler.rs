//! Interval scheduler for the periodic control loops

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Events emitted by the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerEvent {
    pub task_id: String,
}

/// Drives named fixed-interval tasks.
///
/// Tasks are independent timers; two tasks' firings may overlap in
/// wall-clock time and no exclusion is enforced between them.
pub struct Scheduler {
    /// Active timer handles (keyed by task ID)
    timers: Arc<DashMap<String, JoinHandle<()>>>,
    /// Event sender for fired intervals
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            timers: Arc::new(DashMap::new()),
            event_tx,
        }
    }

    /// Subscribe to scheduler events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Register an interval task, replacing any existing timer with the
    /// same ID.
    pub fn schedule_interval(&self, task_id: &str, period: Duration) {
        self.remove(task_id);

        let id = task_id.to_string();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                tracing::debug!("Interval fired for task {}", id);
                let _ = event_tx.send(SchedulerEvent {
                    task_id: id.clone(),
                });
            }
        });

        self.timers.insert(task_id.to_string(), handle);
        tracing::info!("Scheduled task {} every {:?}", task_id, period);
    }

    /// Remove a task from the scheduler
    pub fn remove(&self, task_id: &str) {
        if let Some((_, handle)) = self.timers.remove(task_id) {
            handle.abort();
            tracing::debug!("Removed scheduler timer for task {}", task_id);
        }
    }

    /// Get the number of active timers
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Abort all timer tasks
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_task_fires_after_each_period() {
        let scheduler = Scheduler::new();
        let mut rx = scheduler.subscribe();

        scheduler.schedule_interval("sensor-sync", Duration::from_secs(5));
        assert_eq!(scheduler.active_count(), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, "sensor-sync");
        let event = rx.recv().await.unwrap();
        assert_eq!(event.task_id, "sensor-sync");
    }

    #[tokio::test(start_paused = true)]
    async fn removed_task_stops_firing() {
        let scheduler = Scheduler::new();
        let mut rx = scheduler.subscribe();

        scheduler.schedule_interval("control-tick", Duration::from_secs(1));
        rx.recv().await.unwrap();

        scheduler.remove("control-tick");
        assert_eq!(scheduler.active_count(), 0);
    }
}
