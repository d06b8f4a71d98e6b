//! Host-facing handle for one camera.

use std::sync::Arc;

use alert_stream::{ActiveEventTracker, AlertEvent, SharedTracker};
use bytes::Bytes;
use isapi_client::IsapiClient;

use crate::config::CameraConfig;
use crate::error::{ConnectionError, Result};
use crate::sink::{ConnectionStatus, NotificationSink};
use crate::snapshot::SnapshotScheduler;
use crate::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::transport::CameraTransport;

/// Forwards everything to the host and drives the event-linked snapshot job.
struct CameraSink {
    host: Arc<dyn NotificationSink>,
    snapshots: Arc<SnapshotScheduler>,
}

impl NotificationSink for CameraSink {
    fn on_event_activated(&self, event_type: &str) {
        self.host.on_event_activated(event_type);
        self.snapshots.on_event_activated(event_type);
    }

    fn on_event_deactivated(&self, event_type: &str) {
        self.host.on_event_deactivated(event_type);
        self.snapshots.on_event_deactivated(event_type);
    }

    fn on_all_events_cleared(&self) {
        self.host.on_all_events_cleared();
        self.snapshots.on_all_events_cleared();
    }

    fn on_snapshot_updated(&self, image: Option<Bytes>) {
        self.host.on_snapshot_updated(image);
    }

    fn on_connection_status_changed(&self, status: ConnectionStatus) {
        self.host.on_connection_status_changed(status);
    }
}

/// One Hikvision camera: alert stream, event registry and snapshot jobs.
///
/// # Examples
///
/// ```rust,ignore
/// let config = CameraConfig::new("192.168.1.64", Credentials::new("admin", "secret"))
///     .with_snapshot_link(event_types::MOTION);
/// let camera = Camera::new(config, Arc::new(MySink))?;
///
/// camera.start().await?;
/// // ... callbacks arrive on MySink ...
/// camera.dispose().await;
/// ```
pub struct Camera {
    config: CameraConfig,
    tracker: SharedTracker,
    snapshots: Arc<SnapshotScheduler>,
    supervisor: ConnectionSupervisor,
}

impl Camera {
    /// Create a camera that talks ISAPI over HTTP.
    pub fn new(config: CameraConfig, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        config.validate()?;
        let client = IsapiClient::with_timeouts(
            &config.address,
            config.credentials.clone(),
            config.connect_timeout,
            config.snapshot_timeout,
        )?;
        Ok(Self::assemble(config, Arc::new(client), sink))
    }

    /// Create a camera on top of any transport.
    pub fn with_transport(
        config: CameraConfig,
        transport: Arc<dyn CameraTransport>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, transport, sink))
    }

    fn assemble(
        config: CameraConfig,
        transport: Arc<dyn CameraTransport>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let tracker = ActiveEventTracker::shared();
        let snapshots = Arc::new(SnapshotScheduler::new(
            Arc::clone(&transport),
            Arc::clone(&sink),
            &config,
        ));
        let camera_sink = Arc::new(CameraSink {
            host: sink,
            snapshots: Arc::clone(&snapshots),
        });
        let supervisor =
            ConnectionSupervisor::new(&config, transport, Arc::clone(&tracker), camera_sink);

        Self {
            config,
            tracker,
            snapshots,
            supervisor,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Start the periodic snapshot job, the heartbeat and the first
    /// connection attempt.
    ///
    /// Returns the error of the first attempt. After a transient failure
    /// the heartbeat keeps retrying in the background.
    pub async fn start(&self) -> Result<()> {
        if let Some(period) = self.config.snapshot_refresh_period() {
            self.snapshots.start_periodic(period);
        }
        self.supervisor.start().await?;
        Ok(())
    }

    /// Make one connection attempt without arming the heartbeat.
    pub async fn connect(&self) -> std::result::Result<(), ConnectionError> {
        self.supervisor.connect().await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Events currently considered active, sorted by type.
    pub fn active_events(&self) -> Vec<AlertEvent> {
        self.tracker.lock().snapshot()
    }

    pub fn is_event_active(&self, event_type: &str) -> bool {
        self.tracker.lock().contains(event_type)
    }

    pub fn is_snapshot_refresh_active(&self) -> bool {
        self.snapshots.is_active_refresh_running()
    }

    /// Fetch and publish a snapshot now. `None` when the fetch failed.
    pub async fn refresh_snapshot(&self) -> Option<Bytes> {
        self.snapshots.refresh_now().await
    }

    /// Stop everything and forget active events without reporting them.
    pub async fn dispose(&self) {
        self.supervisor.disconnect().await;
        self.snapshots.shutdown();
        self.tracker.lock().reset();
        tracing::info!(address = %self.config.address, "Camera disposed");
    }
}
