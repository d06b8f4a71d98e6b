//! Alert stream connection lifecycle.
//!
//! The supervisor owns the streaming connection of one camera:
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──2xx──> Streaming
//!      ^                          │                   │
//!      │                          ├─ non-2xx ─> Rejected
//!      └──── network failure ─────┘                   │
//!      └──────── stream closed / read error ──────────┘
//! ```
//!
//! A heartbeat task started by [`ConnectionSupervisor::start`] calls
//! `connect()` whenever it finds the link `Disconnected`. `Rejected` needs
//! the host to fix credentials and is left alone.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alert_stream::{ChunkReader, EventStreamParser, SharedTracker, StreamChunk, StreamReadError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

use crate::config::CameraConfig;
use crate::error::ConnectionError;
use crate::sink::{dispatch, ConnectionStatus, NotificationSink, OfflineDetail};
use crate::transport::{AlertByteStream, CameraTransport};

/// Upper bound for waiting on the read loop in `disconnect()`.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Streaming,
    /// The handshake was refused; not retried by the heartbeat
    Rejected,
}

/// Snapshot of the supervisor's connection bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub link: LinkState,
    /// Heartbeat reconnect attempts since the last successful handshake
    pub reconnect_attempts: u32,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Streaming
    }
}

struct Settings {
    /// Upper bound for the handshake up to the response headers
    handshake_timeout: Duration,
    heartbeat_delay: Duration,
    heartbeat_period: Duration,
    reconnect_warn_threshold: u32,
    stream_idle_timeout: Option<Duration>,
    max_chunk_len: usize,
    accepted_types: Option<HashSet<String>>,
}

impl Settings {
    fn from_config(config: &CameraConfig) -> Self {
        Self {
            handshake_timeout: config.connect_timeout,
            heartbeat_delay: config.heartbeat_delay,
            heartbeat_period: config.heartbeat_period,
            reconnect_warn_threshold: config.reconnect_warn_threshold,
            stream_idle_timeout: config.stream_idle_timeout,
            max_chunk_len: config.max_chunk_len,
            accepted_types: config
                .event_types
                .as_ref()
                .map(|types| types.iter().cloned().collect()),
        }
    }
}

struct StreamTask {
    task: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

struct Shared {
    state: ConnectionState,
    /// Bumped by every connect attempt and by disconnect; a read loop or
    /// handshake from an older generation must not touch the state.
    generation: u64,
    /// Set by start(), cleared by disconnect()
    running: bool,
    last_status: Option<ConnectionStatus>,
    stream: Option<StreamTask>,
    heartbeat: Option<JoinHandle<()>>,
}

struct Inner {
    address: String,
    settings: Settings,
    transport: Arc<dyn CameraTransport>,
    tracker: SharedTracker,
    sink: Arc<dyn NotificationSink>,
    shared: Mutex<Shared>,
}

impl Inner {
    /// Forward a status change, skipping repeats of the same kind.
    fn report(&self, status: ConnectionStatus) {
        let changed = {
            let mut shared = self.shared.lock();
            let repeat = shared
                .last_status
                .as_ref()
                .is_some_and(|last| last.same_kind(&status));
            if !repeat {
                shared.last_status = Some(status.clone());
            }
            !repeat
        };

        if changed {
            tracing::info!(address = %self.address, %status, "Camera connection status changed");
            self.sink.on_connection_status_changed(status);
        }
    }
}

/// Keeps the alert stream of one camera connected.
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

impl ConnectionSupervisor {
    /// Create a supervisor. Nothing runs until `start()` or `connect()`.
    pub fn new(
        config: &CameraConfig,
        transport: Arc<dyn CameraTransport>,
        tracker: SharedTracker,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let inner = Inner {
            address: transport.address(),
            settings: Settings::from_config(config),
            transport,
            tracker,
            sink,
            shared: Mutex::new(Shared {
                state: ConnectionState {
                    link: LinkState::Disconnected,
                    reconnect_attempts: 0,
                },
                generation: 0,
                running: false,
                last_status: None,
                stream: None,
                heartbeat: None,
            }),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Arm the heartbeat and make the first connection attempt.
    ///
    /// The heartbeat stays armed when the attempt fails, so a transient
    /// failure is retried even though it is also returned here.
    pub async fn start(&self) -> Result<(), ConnectionError> {
        {
            let mut shared = self.inner.shared.lock();
            shared.running = true;
            if shared.heartbeat.is_none() {
                shared.heartbeat = Some(spawn_heartbeat(Arc::clone(&self.inner)));
            }
        }
        establish(&self.inner).await
    }

    /// Open the alert stream and start its read loop.
    ///
    /// A no-op while a connection is being opened or is streaming.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        establish(&self.inner).await
    }

    /// Stop the heartbeat and the read loop. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let (stream, heartbeat) = {
            let mut shared = self.inner.shared.lock();
            shared.running = false;
            shared.generation += 1;
            shared.state.link = LinkState::Disconnected;
            shared.last_status = None;
            (shared.stream.take(), shared.heartbeat.take())
        };

        if let Some(heartbeat) = heartbeat {
            heartbeat.abort();
        }

        if let Some(mut stream) = stream {
            if let Some(shutdown) = stream.shutdown.take() {
                let _ = shutdown.send(());
            }
            if timeout(SHUTDOWN_TIMEOUT, &mut stream.task).await.is_err() {
                tracing::warn!(
                    address = %self.inner.address,
                    "Read loop did not stop within {SHUTDOWN_TIMEOUT:?}, aborting"
                );
                stream.task.abort();
            }
            tracing::info!(address = %self.inner.address, "Disconnected from alert stream");
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        shared.running = false;
        shared.generation += 1;
        if let Some(heartbeat) = shared.heartbeat.take() {
            heartbeat.abort();
        }
        if let Some(stream) = shared.stream.take() {
            stream.task.abort();
        }
    }
}

/// Perform the handshake and spawn the read loop.
async fn establish(inner: &Arc<Inner>) -> Result<(), ConnectionError> {
    let generation = {
        let mut shared = inner.shared.lock();
        if matches!(shared.state.link, LinkState::Connecting | LinkState::Streaming) {
            return Ok(());
        }
        shared.state.link = LinkState::Connecting;
        shared.generation += 1;
        shared.generation
    };

    tracing::debug!(address = %inner.address, "Opening alert stream");
    let limit = inner.settings.handshake_timeout;
    let opened = timeout(limit, inner.transport.open_alert_stream())
        .await
        .unwrap_or_else(|_| {
            Err(ConnectionError::Unreachable(format!(
                "no response to alert stream request within {limit:?}"
            )))
        });

    let current = {
        let mut shared = inner.shared.lock();
        let current = shared.generation == generation;
        if current {
            shared.state.link = match &opened {
                Ok(_) => LinkState::Streaming,
                Err(e) if e.is_fatal() => LinkState::Rejected,
                Err(_) => LinkState::Disconnected,
            };
            if opened.is_ok() {
                shared.state.reconnect_attempts = 0;
            }
        }
        current
    };
    if !current {
        tracing::debug!(address = %inner.address, "Handshake finished after disconnect, dropping it");
        return Ok(());
    }

    let stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            let detail = if e.is_fatal() {
                tracing::error!(address = %inner.address, error = %e, "Alert stream refused, check address and credentials");
                OfflineDetail::ConfigurationError
            } else {
                tracing::debug!(address = %inner.address, error = %e, "Alert stream connection failed");
                OfflineDetail::CommunicationError
            };
            inner.report(ConnectionStatus::offline(detail, e.to_string()));
            return Err(e);
        }
    };

    tracing::info!(address = %inner.address, "Connected to alert stream");
    inner.report(ConnectionStatus::Online);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(read_loop(Arc::clone(inner), generation, stream, shutdown_rx));
    let task = StreamTask {
        task,
        shutdown: Some(shutdown_tx),
    };

    let superseded = {
        let mut shared = inner.shared.lock();
        if shared.generation == generation {
            shared.stream = Some(task);
            None
        } else {
            Some(task)
        }
    };
    if let Some(superseded) = superseded {
        superseded.task.abort();
    }

    Ok(())
}

/// Read chunks until the stream ends, is cancelled or fails.
async fn read_loop(
    inner: Arc<Inner>,
    generation: u64,
    stream: AlertByteStream,
    mut shutdown: oneshot::Receiver<()>,
) {
    let settings = &inner.settings;
    let mut reader = ChunkReader::new(stream).with_max_chunk_len(settings.max_chunk_len);
    let mut parser = EventStreamParser::new(Arc::clone(&inner.tracker));
    if let Some(types) = &settings.accepted_types {
        parser = parser.with_accepted_types(types.iter().cloned());
    }

    let reason = loop {
        let next = tokio::select! {
            _ = &mut shutdown => {
                tracing::debug!(address = %inner.address, "Read loop cancelled");
                return;
            }
            next = next_chunk(&mut reader, settings.stream_idle_timeout) => next,
        };

        match next {
            Ok(Some(chunk)) => match parser.process_chunk(&chunk) {
                Ok(transitions) => {
                    for transition in &transitions {
                        dispatch(inner.sink.as_ref(), transition);
                    }
                }
                Err(e) => tracing::warn!(
                    address = %inner.address,
                    error = %e,
                    len = chunk.len(),
                    "Discarding malformed alert chunk"
                ),
            },
            Ok(None) => break "alert stream closed by camera".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    tracing::debug!(
        address = %inner.address,
        processed = parser.chunks_processed(),
        rejected = parser.chunks_rejected(),
        "Read loop finished"
    );

    let current = {
        let mut shared = inner.shared.lock();
        let current = shared.generation == generation;
        if current {
            shared.state.link = LinkState::Disconnected;
            shared.stream = None;
        }
        current
    };

    if current {
        tracing::info!(address = %inner.address, %reason, "Lost alert stream");
        inner.report(ConnectionStatus::offline(OfflineDetail::CommunicationError, reason));
    }
}

async fn next_chunk(
    reader: &mut ChunkReader<AlertByteStream>,
    idle: Option<Duration>,
) -> Result<Option<StreamChunk>, StreamReadError> {
    match idle {
        Some(limit) => timeout(limit, reader.next_chunk())
            .await
            .unwrap_or_else(|_| Err(StreamReadError::IdleTimeout(limit))),
        None => reader.next_chunk().await,
    }
}

fn spawn_heartbeat(inner: Arc<Inner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(inner.settings.heartbeat_delay).await;
        let mut ticker = interval(inner.settings.heartbeat_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            heartbeat_tick(&inner).await;
        }
    })
}

/// Reconnect once if the link is down.
async fn heartbeat_tick(inner: &Arc<Inner>) {
    let attempt = {
        let mut shared = inner.shared.lock();
        if !shared.running || shared.state.link != LinkState::Disconnected {
            return;
        }
        shared.state.reconnect_attempts += 1;
        shared.state.reconnect_attempts
    };

    if attempt > inner.settings.reconnect_warn_threshold {
        tracing::warn!(address = %inner.address, attempt, "Alert stream still down, reconnecting");
    } else {
        tracing::debug!(address = %inner.address, attempt, "Heartbeat found alert stream down, reconnecting");
    }

    if let Err(e) = establish(inner).await {
        tracing::debug!(address = %inner.address, attempt, error = %e, "Reconnect attempt failed");
    }
}
