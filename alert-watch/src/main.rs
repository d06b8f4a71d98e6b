use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use hikvision_sdk::logging::{self, LoggingMode};
use hikvision_sdk::{Camera, CameraConfig, Credentials, SdkError};

pub mod sink;

use sink::WatchSink;

/// Hikvision alert watcher
///
/// Connects to a camera's alert stream, prints every event transition and
/// optionally saves snapshots while linked events are active.
#[derive(Parser, Debug)]
#[command(name = "alert-watch")]
#[command(about = "Watch a Hikvision camera's alert stream")]
#[command(version)]
pub struct Args {
    /// Camera host or host:port
    #[arg(short, long)]
    pub address: Option<String>,

    /// ISAPI user name
    #[arg(short, long, default_value = "admin")]
    pub username: String,

    /// ISAPI password
    #[arg(short, long, env = "HIKVISION_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JSON camera configuration; command-line flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Event type whose activation triggers fast snapshot refresh
    #[arg(short, long = "link", value_name = "EVENT_TYPE")]
    pub links: Vec<String>,

    /// Only track these event types
    #[arg(short, long = "event-type", value_name = "EVENT_TYPE")]
    pub event_types: Vec<String>,

    /// Periodic snapshot refresh in seconds, 0 to disable
    #[arg(short = 'i', long)]
    pub snapshot_interval: Option<u64>,

    /// Directory to write snapshots to
    #[arg(short = 'd', long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (development, debug, json)
    #[arg(long, default_value = "development")]
    pub log_format: String,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.address.is_none() && self.config.is_none() {
            return Err(anyhow::anyhow!(
                "Either --address or --config must be given"
            ));
        }

        if let Some(dir) = &self.snapshot_dir {
            if !dir.is_dir() {
                return Err(anyhow::anyhow!(
                    "Snapshot directory {} does not exist",
                    dir.display()
                ));
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        if LoggingMode::from_name(&self.log_format).is_none() {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid formats: development, debug, json",
                self.log_format
            ));
        }

        Ok(())
    }

    /// Logging mode selected by `--log-format`
    pub fn logging_mode(&self) -> LoggingMode {
        LoggingMode::from_name(&self.log_format).unwrap_or(LoggingMode::Development)
    }

    /// Build the camera configuration, layering flags over the config file
    pub fn camera_config(&self) -> Result<CameraConfig> {
        let mut config = match &self.config {
            Some(path) => CameraConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => CameraConfig::default(),
        };

        if let Some(address) = &self.address {
            config.address = address.clone();
        }

        if let Some(password) = &self.password {
            config.credentials = Credentials::new(self.username.clone(), password.clone());
        } else if self.config.is_none() {
            config.credentials = Credentials::new(self.username.clone(), String::new());
        }

        if !self.event_types.is_empty() {
            config = config.with_event_types(self.event_types.iter().cloned());
        }

        for link in &self.links {
            config = config.with_snapshot_link(link.clone());
        }

        if let Some(seconds) = self.snapshot_interval {
            config = config.with_snapshot_refresh(seconds);
        }

        config.validate().context("Invalid camera configuration")?;
        Ok(config)
    }
}

async fn run(config: CameraConfig, snapshot_dir: Option<PathBuf>) -> Result<()> {
    info!("Watching camera at {}", config.address);
    if !config.snapshot_linked_types.is_empty() {
        info!(
            "Fast snapshot refresh linked to: {}",
            config
                .snapshot_linked_types
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let sink = Arc::new(WatchSink::new(config.address.clone(), snapshot_dir));
    let camera = Camera::new(config, sink).context("Failed to create camera")?;

    if let Err(e) = camera.start().await {
        if matches!(&e, SdkError::Connection(conn) if conn.is_fatal()) {
            camera.dispose().await;
            return Err(e).context("Camera refused the alert stream");
        }
        warn!("Initial connection failed, retrying in background: {e}");
    }

    println!("Listening for alerts... (Press Ctrl+C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Shutting down...");
    camera.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    logging::init_logging_with_default(args.logging_mode(), &args.log_level.to_lowercase())
        .context("Failed to initialize logging")?;

    let config = args.camera_config()?;
    run(config, args.snapshot_dir.clone()).await
}
