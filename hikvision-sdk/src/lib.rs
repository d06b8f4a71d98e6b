//! # Hikvision SDK
//!
//! Keeps a Hikvision camera's ISAPI alert stream connected and turns it
//! into host notifications.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hikvision_sdk::{Camera, CameraConfig, ConnectionStatus, Credentials, NotificationSink};
//!
//! struct Printer;
//!
//! impl NotificationSink for Printer {
//!     fn on_event_activated(&self, event_type: &str) {
//!         println!("{event_type} ON");
//!     }
//!     fn on_event_deactivated(&self, event_type: &str) {
//!         println!("{event_type} OFF");
//!     }
//!     fn on_connection_status_changed(&self, status: ConnectionStatus) {
//!         println!("camera is {status}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> hikvision_sdk::Result<()> {
//!     let config = CameraConfig::new("192.168.1.64", Credentials::new("admin", "secret"));
//!     let camera = Camera::new(config, Arc::new(Printer))?;
//!     camera.start().await?;
//!     tokio::signal::ctrl_c().await.ok();
//!     camera.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`ConnectionSupervisor`]: handshake, read loop and reconnect heartbeat
//! - [`SnapshotScheduler`]: periodic and event-linked snapshot refresh
//! - [`Camera`]: wires both to the host's [`NotificationSink`]
//!
//! Chunk framing and alert parsing live in the `alert-stream` crate; the
//! HTTP requests in `isapi-client`.

pub mod camera;
pub mod config;
pub mod error;
pub mod logging;
pub mod sink;
pub mod snapshot;
pub mod supervisor;
pub mod transport;

pub use camera::Camera;
pub use config::CameraConfig;
pub use error::{ConnectionError, Result, SdkError, SnapshotFetchError};
pub use sink::{dispatch, ConnectionStatus, NotificationSink, OfflineDetail};
pub use snapshot::SnapshotScheduler;
pub use supervisor::{ConnectionState, ConnectionSupervisor, LinkState};
pub use transport::{AlertByteStream, CameraTransport};

pub use alert_stream::{event_types, AlertEvent, AlertTransition, EventState};
pub use isapi_client::Credentials;
