//! Snapshot refresh jobs.
//!
//! Two independent jobs publish snapshots to the host:
//! - a periodic refresh at the configured interval, running from start
//!   until dispose
//! - a fast refresh that runs while any snapshot-linked event type is
//!   active

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::CameraConfig;
use crate::sink::NotificationSink;
use crate::transport::CameraTransport;

#[derive(Default)]
struct Jobs {
    /// Linked types currently active
    active_types: HashSet<String>,
    active_refresh: Option<JoinHandle<()>>,
    periodic_refresh: Option<JoinHandle<()>>,
}

/// Starts and stops snapshot refresh in response to event transitions.
///
/// The event callbacks must be invoked from within a tokio runtime since
/// they may spawn the refresh task.
pub struct SnapshotScheduler {
    transport: Arc<dyn CameraTransport>,
    sink: Arc<dyn NotificationSink>,
    linked_types: BTreeSet<String>,
    active_interval: Duration,
    jobs: Mutex<Jobs>,
}

impl SnapshotScheduler {
    pub fn new(
        transport: Arc<dyn CameraTransport>,
        sink: Arc<dyn NotificationSink>,
        config: &CameraConfig,
    ) -> Self {
        Self {
            transport,
            sink,
            linked_types: config.snapshot_linked_types.clone(),
            active_interval: config.active_snapshot_interval,
            jobs: Mutex::new(Jobs::default()),
        }
    }

    /// Start the periodic refresh, replacing a running one.
    pub fn start_periodic(&self, period: Duration) {
        let task = tokio::spawn(refresh_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.sink),
            period,
        ));
        if let Some(previous) = self.jobs.lock().periodic_refresh.replace(task) {
            previous.abort();
        }
        tracing::debug!(?period, "Periodic snapshot refresh started");
    }

    pub fn on_event_activated(&self, event_type: &str) {
        if !self.linked_types.contains(event_type) {
            return;
        }

        let mut jobs = self.jobs.lock();
        jobs.active_types.insert(event_type.to_string());

        let running = jobs
            .active_refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if !running {
            tracing::debug!(event_type, "Starting event snapshot refresh");
            jobs.active_refresh = Some(tokio::spawn(refresh_loop(
                Arc::clone(&self.transport),
                Arc::clone(&self.sink),
                self.active_interval,
            )));
        }
    }

    pub fn on_event_deactivated(&self, event_type: &str) {
        let mut jobs = self.jobs.lock();
        if self.linked_types.contains(event_type) {
            jobs.active_types.remove(event_type);
        }
        if jobs.active_types.is_empty() {
            stop(&mut jobs.active_refresh, "event snapshot refresh");
        }
    }

    /// Stop the fast refresh regardless of which types requested it.
    pub fn on_all_events_cleared(&self) {
        let mut jobs = self.jobs.lock();
        jobs.active_types.clear();
        stop(&mut jobs.active_refresh, "event snapshot refresh");
    }

    pub fn is_active_refresh_running(&self) -> bool {
        self.jobs
            .lock()
            .active_refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn is_periodic_refresh_running(&self) -> bool {
        self.jobs
            .lock()
            .periodic_refresh
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Fetch one snapshot now and publish it.
    pub async fn refresh_now(&self) -> Option<Bytes> {
        publish_snapshot(self.transport.as_ref(), self.sink.as_ref()).await
    }

    /// Cancel both jobs.
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock();
        jobs.active_types.clear();
        stop(&mut jobs.active_refresh, "event snapshot refresh");
        stop(&mut jobs.periodic_refresh, "periodic snapshot refresh");
    }
}

impl Drop for SnapshotScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stop(job: &mut Option<JoinHandle<()>>, name: &str) {
    if let Some(task) = job.take() {
        task.abort();
        tracing::debug!("Stopped {name}");
    }
}

async fn refresh_loop(
    transport: Arc<dyn CameraTransport>,
    sink: Arc<dyn NotificationSink>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        publish_snapshot(transport.as_ref(), sink.as_ref()).await;
    }
}

async fn publish_snapshot(
    transport: &dyn CameraTransport,
    sink: &dyn NotificationSink,
) -> Option<Bytes> {
    let image = match transport.fetch_snapshot().await {
        Ok(image) => {
            tracing::trace!(bytes = image.len(), "Snapshot fetched");
            Some(image)
        }
        Err(e) => {
            tracing::debug!(address = %transport.address(), error = %e, "Snapshot fetch failed");
            None
        }
    };
    sink.on_snapshot_updated(image.clone());
    image
}
