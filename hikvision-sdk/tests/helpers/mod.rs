//! Fakes shared by the supervisor, snapshot and camera tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alert_stream::StreamReadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use hikvision_sdk::{
    AlertByteStream, CameraConfig, CameraTransport, ConnectionError, ConnectionStatus, Credentials,
    NotificationSink, OfflineDetail, SnapshotFetchError,
};
use parking_lot::Mutex;

pub type Feed = UnboundedSender<Result<Bytes, StreamReadError>>;

/// What the next `open_alert_stream` call does
enum Script {
    Stream(UnboundedReceiver<Result<Bytes, StreamReadError>>),
    Reject(u16),
    Unreachable,
    /// Accept the connection but never answer
    Hang,
}

/// Transport whose connection outcomes are scripted by the test.
///
/// Unscripted connection attempts fail as unreachable.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<VecDeque<Script>>,
    opens: AtomicUsize,
    snapshots: AtomicUsize,
    fail_snapshots: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script a successful handshake and return the sender feeding its body
    pub fn push_stream(&self) -> Feed {
        let (tx, rx) = unbounded();
        self.scripts.lock().push_back(Script::Stream(rx));
        tx
    }

    pub fn push_reject(&self, status: u16) {
        self.scripts.lock().push_back(Script::Reject(status));
    }

    pub fn push_unreachable(&self) {
        self.scripts.lock().push_back(Script::Unreachable);
    }

    pub fn push_hang(&self) {
        self.scripts.lock().push_back(Script::Hang);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CameraTransport for FakeTransport {
    fn address(&self) -> String {
        "fake-camera".to_string()
    }

    async fn open_alert_stream(&self) -> Result<AlertByteStream, ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Stream(rx)) => Ok(rx.boxed()),
            Some(Script::Reject(status)) => Err(ConnectionError::Rejected {
                status,
                reason: "Unauthorized".to_string(),
            }),
            Some(Script::Hang) => futures::future::pending().await,
            Some(Script::Unreachable) | None => {
                Err(ConnectionError::Unreachable("connection refused".to_string()))
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<Bytes, SnapshotFetchError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshots.load(Ordering::SeqCst) {
            Err(SnapshotFetchError::Http("connection reset".to_string()))
        } else {
            Ok(Bytes::from_static(b"\xFF\xD8\xFF\xE0jpeg"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Activated(String),
    Deactivated(String),
    AllCleared,
    Snapshot(bool),
    Status(ConnectionStatus),
}

/// Sink that records every callback in order
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Call>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Activation, deactivation and idle callbacks only
    pub fn events(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Activated(_) | Call::Deactivated(_) | Call::AllCleared))
            .collect()
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Snapshot callbacks as "had an image" flags
    pub fn snapshots(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Snapshot(present) => Some(present),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn on_event_activated(&self, event_type: &str) {
        self.calls.lock().push(Call::Activated(event_type.to_string()));
    }

    fn on_event_deactivated(&self, event_type: &str) {
        self.calls.lock().push(Call::Deactivated(event_type.to_string()));
    }

    fn on_all_events_cleared(&self) {
        self.calls.lock().push(Call::AllCleared);
    }

    fn on_snapshot_updated(&self, image: Option<Bytes>) {
        self.calls.lock().push(Call::Snapshot(image.is_some()));
    }

    fn on_connection_status_changed(&self, status: ConnectionStatus) {
        self.calls.lock().push(Call::Status(status));
    }
}

/// Config with one-second heartbeat for paused-clock tests
pub fn test_config() -> CameraConfig {
    CameraConfig::new("fake-camera", Credentials::new("admin", "secret"))
        .with_heartbeat(Duration::from_secs(1), Duration::from_secs(1))
}

/// Frame one alert the way the camera writes it
pub fn alert_chunk(event_type: &str, state: &str, post_count: u32) -> Bytes {
    let body = format!(
        "<EventNotificationAlert version=\"2.0\" xmlns=\"http://www.hikvision.com/ver20/XMLSchema\">\r\n\
         <channelID>1</channelID>\r\n\
         <dateTime>2024-03-01T10:15:30+08:00</dateTime>\r\n\
         <activePostCount>{post_count}</activePostCount>\r\n\
         <eventType>{event_type}</eventType>\r\n\
         <eventState>{state}</eventState>\r\n\
         </EventNotificationAlert>\r\n"
    );
    frame(body.as_bytes())
}

pub fn frame(payload: &[u8]) -> Bytes {
    let mut out = format!(
        "--boundary\r\nContent-Type: application/xml; charset=\"UTF-8\"\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )
    .into_bytes();
    out.extend_from_slice(payload);
    Bytes::from(out)
}

pub fn send(feed: &Feed, chunk: Bytes) {
    feed.unbounded_send(Ok(chunk)).expect("read loop is listening");
}

pub fn offline(detail: OfflineDetail) -> impl Fn(&ConnectionStatus) -> bool {
    move |status| matches!(status, ConnectionStatus::Offline { detail: d, .. } if *d == detail)
}

/// Poll `condition` every 5ms, panicking after ten seconds
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
