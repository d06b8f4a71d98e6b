//! Logging setup for hosts embedding the SDK
//!
//! The SDK logs through `tracing` and never installs a subscriber on its
//! own. Hosts without a subscriber can use these helpers.
//!
//! Filter directives are taken from `HIKVISION_LOG_LEVEL`, then `RUST_LOG`,
//! then the level passed in (or the mode's default).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const LEVEL_ENV: &str = "HIKVISION_LOG_LEVEL";
const MODE_ENV: &str = "HIKVISION_LOG_MODE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Install nothing
    Silent,
    /// Compact single-line output
    Development,
    /// Multi-line output with thread ids and source locations
    Debug,
    /// One JSON object per line
    Json,
}

impl LoggingMode {
    /// Parse a mode name as used in `HIKVISION_LOG_MODE`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            "json" => Some(LoggingMode::Json),
            _ => None,
        }
    }

    /// Level used when neither environment variable is set
    pub fn default_level(&self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Debug => "debug",
            LoggingMode::Development | LoggingMode::Json => "info",
        }
    }

    fn layer(&self) -> Option<BoxedLayer> {
        match self {
            LoggingMode::Silent => None,
            LoggingMode::Development => Some(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            LoggingMode::Debug => Some(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            LoggingMode::Json => Some(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .boxed(),
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to install tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid logging environment: {0}")]
    InvalidEnv(String),

    #[error("Invalid log filter {directives:?}: {reason}")]
    InvalidFilter { directives: String, reason: String },
}

/// Install a global subscriber for `mode` at its default level
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_logging_with_default(mode, mode.default_level())
}

/// Install a global subscriber for `mode`, falling back to `default_level`
/// when no filter is set in the environment
pub fn init_logging_with_default(mode: LoggingMode, default_level: &str) -> Result<(), LoggingError> {
    let Some(layer) = mode.layer() else {
        return Ok(());
    };
    let filter = resolve_filter(default_level)?;

    Registry::default()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Install a subscriber chosen by `HIKVISION_LOG_MODE`
///
/// Unset means silent. An unknown mode name is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var(MODE_ENV) {
        Ok(value) => LoggingMode::from_name(&value)
            .ok_or_else(|| LoggingError::InvalidEnv(format!("{MODE_ENV}={value}")))?,
        Err(_) => LoggingMode::Silent,
    };
    init_logging(mode)
}

fn resolve_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var(LEVEL_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .unwrap_or_else(|_| default_level.to_string());
    parse_filter(&directives)
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        directives: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Whether a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
