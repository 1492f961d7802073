//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::polls::POLL_STORE_FILE;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingest bind address (e.g., "0.0.0.0:3000")
    pub bind_address: String,

    /// Device identifier stamped on every webhook body
    pub device_id: String,

    /// Webhook destinations (comma-separated in `WEBHOOK_URLS`)
    pub webhook_urls: Vec<String>,

    /// HMAC signing secret (optional)
    pub webhook_secret: Option<String>,

    /// Per-destination delivery deadline (default: 10s)
    pub webhook_timeout: Duration,

    /// Download media to disk instead of forwarding its URL (default: true)
    pub auto_download_media: bool,

    /// Directory holding the poll store
    pub storage_path: PathBuf,

    /// Directory downloaded media is written to
    pub media_path: PathBuf,

    /// Debounce window for own read receipts (default: 15s)
    pub read_receipt_cooldown: Duration,

    /// Link preview fetch deadline (default: 15s)
    pub link_preview_timeout: Duration,

    /// Protocol sidecar REST base URL (optional)
    pub protocol_api_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            device_id: env::var("DEVICE_ID").unwrap_or_else(|_| "default".into()),
            webhook_urls: env::var("WEBHOOK_URLS")
                .map(|s| parse_list(&s))
                .unwrap_or_default(),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            webhook_timeout: secs("WEBHOOK_TIMEOUT_SECS", 10)?,
            auto_download_media: flag("AUTO_DOWNLOAD_MEDIA", true)?,
            storage_path: env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "storages".into())
                .into(),
            media_path: env::var("MEDIA_PATH")
                .unwrap_or_else(|_| "statics/media".into())
                .into(),
            read_receipt_cooldown: secs("READ_RECEIPT_COOLDOWN_SECS", 15)?,
            link_preview_timeout: secs("LINK_PREVIEW_TIMEOUT_SECS", 15)?,
            protocol_api_url: env::var("PROTOCOL_API_URL").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Location of the poll store file.
    #[must_use]
    pub fn poll_store_path(&self) -> PathBuf {
        self.storage_path.join(POLL_STORE_FILE)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".into(),
            device_id: "test-device".into(),
            webhook_urls: Vec::new(),
            webhook_secret: None,
            webhook_timeout: Duration::from_secs(10),
            auto_download_media: false,
            storage_path: "storages".into(),
            media_path: "statics/media".into(),
            read_receipt_cooldown: Duration::from_secs(15),
            link_preview_timeout: Duration::from_secs(15),
            protocol_api_url: None,
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn secs(name: &str, default: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("{name} must be a whole number of seconds, got {v:?}")),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{name} must be a boolean, got {v:?}"),
        },
        Err(_) => Ok(default),
    }
}
