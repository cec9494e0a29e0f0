//! Configuration file parser for ~/.config/hubbub/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::sync::{HubPolicy, SyncOptions, DEFAULT_HUB};
use crate::transport::HttpConfig;
use crate::util::UrlPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file. `None` means `hubbub.db` next to the config file.
    pub database_path: Option<String>,

    /// Public base URI of this node, used for entry links and local feed URLs.
    pub base_uri: String,

    /// Where hubs deliver pushes; required for `request-subscription`.
    pub callback_url: Option<String>,

    /// Hub seeded onto every new feed.
    pub default_hub: String,

    /// Overall budget for fetching a remote feed, retries included.
    pub fetch_timeout_secs: u64,

    pub max_feed_bytes: usize,

    /// Retries for 429/5xx on feed fetches. Hub pings are never retried.
    pub fetch_retries: u32,

    /// First retry delay; doubles each retry.
    pub retry_backoff_ms: u64,

    /// Hub pings in flight at once.
    pub hub_concurrency: usize,

    /// Per-request timeout for every outbound HTTP call.
    pub hub_timeout_secs: u64,

    pub user_agent: String,

    /// Allow feeds and hubs on loopback/private addresses.
    pub allow_private_networks: bool,

    /// `"replace"` or `"merge"`.
    pub repopulate_hubs: HubPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            database_path: None,
            base_uri: "http://localhost:4567/".to_string(),
            callback_url: None,
            default_hub: DEFAULT_HUB.to_string(),
            fetch_timeout_secs: 30,
            max_feed_bytes: http.max_body_bytes,
            fetch_retries: http.max_retries,
            retry_backoff_ms: http.backoff_base.as_millis() as u64,
            hub_concurrency: 8,
            hub_timeout_secs: 15,
            user_agent: http.user_agent,
            allow_private_networks: false,
            repopulate_hubs: HubPolicy::Replace,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 13] = [
        "database_path",
        "base_uri",
        "callback_url",
        "default_hub",
        "fetch_timeout_secs",
        "max_feed_bytes",
        "fetch_retries",
        "retry_backoff_ms",
        "hub_concurrency",
        "hub_timeout_secs",
        "user_agent",
        "allow_private_networks",
        "repopulate_hubs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), base_uri = %config.base_uri, "Loaded configuration");
        Ok(config)
    }

    pub fn url_policy(&self) -> UrlPolicy {
        UrlPolicy {
            allow_private_networks: self.allow_private_networks,
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            request_timeout: Duration::from_secs(self.hub_timeout_secs),
            max_body_bytes: self.max_feed_bytes,
            max_retries: self.fetch_retries,
            backoff_base: Duration::from_millis(self.retry_backoff_ms),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            default_hub: self.default_hub.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            url_policy: self.url_policy(),
            hub_policy: self.repopulate_hubs,
            hub_concurrency: self.hub_concurrency,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
