//! Seam between the supervisor and the camera's HTTP endpoints.

use alert_stream::StreamReadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use isapi_client::IsapiClient;

use crate::error::{ConnectionError, SnapshotFetchError};

/// Body of an open alert stream.
pub type AlertByteStream = BoxStream<'static, Result<Bytes, StreamReadError>>;

/// The requests the SDK makes against a camera.
#[async_trait]
pub trait CameraTransport: Send + Sync {
    /// Address used in log output.
    fn address(&self) -> String;

    /// Perform the alert stream handshake and return the body.
    async fn open_alert_stream(&self) -> Result<AlertByteStream, ConnectionError>;

    async fn fetch_snapshot(&self) -> Result<Bytes, SnapshotFetchError>;
}

#[async_trait]
impl CameraTransport for IsapiClient {
    fn address(&self) -> String {
        self.base_url().to_string()
    }

    async fn open_alert_stream(&self) -> Result<AlertByteStream, ConnectionError> {
        let body = self.alert_stream().await?;
        Ok(body
            .map_err(|e| StreamReadError::Transport(e.to_string()))
            .boxed())
    }

    async fn fetch_snapshot(&self) -> Result<Bytes, SnapshotFetchError> {
        Ok(self.snapshot().await?)
    }
}
