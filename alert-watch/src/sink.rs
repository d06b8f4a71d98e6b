//! Console output for camera callbacks

use std::path::PathBuf;

use bytes::Bytes;
use chrono::Local;
use hikvision_sdk::{ConnectionStatus, NotificationSink};
use tracing::{debug, info, warn};

/// Logs every callback and optionally stores snapshots on disk.
pub struct WatchSink {
    address: String,
    snapshot_dir: Option<PathBuf>,
}

impl WatchSink {
    pub fn new(address: impl Into<String>, snapshot_dir: Option<PathBuf>) -> Self {
        Self {
            address: address.into(),
            snapshot_dir,
        }
    }

    /// File name for a snapshot taken now
    pub fn snapshot_file_name(taken_at: chrono::DateTime<Local>) -> String {
        format!("snapshot-{}.jpg", taken_at.format("%Y%m%d-%H%M%S%.3f"))
    }

    fn save_snapshot(&self, image: &Bytes) {
        let Some(dir) = &self.snapshot_dir else {
            return;
        };
        let path = dir.join(Self::snapshot_file_name(Local::now()));
        match std::fs::write(&path, image) {
            Ok(()) => debug!(path = %path.display(), bytes = image.len(), "Snapshot saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save snapshot"),
        }
    }
}

impl NotificationSink for WatchSink {
    fn on_event_activated(&self, event_type: &str) {
        info!(address = %self.address, event_type, "Event ON");
        println!("[{}] {event_type} ON", Local::now().format("%H:%M:%S"));
    }

    fn on_event_deactivated(&self, event_type: &str) {
        info!(address = %self.address, event_type, "Event OFF");
        println!("[{}] {event_type} OFF", Local::now().format("%H:%M:%S"));
    }

    fn on_all_events_cleared(&self) {
        debug!(address = %self.address, "No events active");
    }

    fn on_snapshot_updated(&self, image: Option<Bytes>) {
        match image {
            Some(image) => self.save_snapshot(&image),
            None => debug!(address = %self.address, "Snapshot unavailable"),
        }
    }

    fn on_connection_status_changed(&self, status: ConnectionStatus) {
        if status.is_online() {
            info!(address = %self.address, "Camera online");
        } else {
            warn!(address = %self.address, %status, "Camera offline");
        }
        println!("[{}] camera {status}", Local::now().format("%H:%M:%S"));
    }
}
