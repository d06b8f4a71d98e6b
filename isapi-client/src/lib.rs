//! Private ISAPI client for Hikvision camera communication
//!
//! This crate covers the two requests the SDK makes: opening the
//! long-lived alert stream and fetching a still snapshot. Both use HTTP
//! Basic authentication.

mod error;

pub use error::IsapiError;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use url::Url;

/// Persistent multipart stream of `EventNotificationAlert` documents
pub const ALERT_STREAM_PATH: &str = "/ISAPI/Event/notification/alertStream";

/// JPEG still of the first channel
pub const SNAPSHOT_PATH: &str = "/Streaming/channels/1/picture";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("hikvision-sdk/", env!("CARGO_PKG_VERSION"));

/// Camera account used for Basic authentication
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A minimal ISAPI client bound to one camera
#[derive(Debug, Clone)]
pub struct IsapiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    request_timeout: Duration,
}

impl IsapiClient {
    /// Create a client with default timeouts
    ///
    /// `address` is a host (`192.168.1.64`), a host and port
    /// (`192.168.1.64:8080`) or a full base URL.
    pub fn new(address: &str, credentials: Credentials) -> Result<Self, IsapiError> {
        Self::with_timeouts(
            address,
            credentials,
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    /// Create a client with explicit timeouts
    ///
    /// `request_timeout` bounds snapshot requests only. The alert stream is
    /// expected to stay open indefinitely, so only its connect phase is
    /// bounded.
    pub fn with_timeouts(
        address: &str,
        credentials: Credentials,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, IsapiError> {
        let base_url = parse_base_url(address)?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IsapiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an absolute ISAPI path against the camera's base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, IsapiError> {
        self.base_url
            .join(path)
            .map_err(|e| IsapiError::InvalidAddress(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// Open the alert stream and return its body as a byte stream
    ///
    /// Fails with [`IsapiError::Status`] when the camera does not answer
    /// with a success status; the body is not read in that case.
    pub async fn alert_stream(
        &self,
    ) -> Result<impl Stream<Item = Result<Bytes, IsapiError>> + Send + 'static, IsapiError> {
        let url = self.endpoint(ALERT_STREAM_PATH)?;
        tracing::debug!(%url, "Opening alert stream");

        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;
        let response = check_status(response)?;

        Ok(response.bytes_stream().map_err(IsapiError::from))
    }

    /// Fetch one snapshot image
    pub async fn snapshot(&self) -> Result<Bytes, IsapiError> {
        let url = self.endpoint(SNAPSHOT_PATH)?;
        tracing::trace!(%url, "Fetching snapshot");

        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = check_status(response)?;

        Ok(response.bytes().await?)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IsapiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(IsapiError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        })
    }
}

fn parse_base_url(address: &str) -> Result<Url, IsapiError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(IsapiError::InvalidAddress("address is empty".to_string()));
    }

    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| IsapiError::InvalidAddress(format!("{address}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(IsapiError::InvalidAddress(format!(
            "{address}: unsupported scheme {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(IsapiError::InvalidAddress(format!("{address}: missing host")));
    }

    Ok(url)
}
