//! Client configuration.
//!
//! [`ClientConfig`] is the single source of truth for runtime settings.  It is
//! built in three layers, each overriding the previous one:
//!
//! 1. [`ClientConfig::default`]
//! 2. an optional TOML file (`--config <path>`), read through [`FileConfig`]
//! 3. command-line flags and their environment variables (see `main.rs`)
//!
//! ```toml
//! server_url = "https://access.example.com"
//! keepalive_secs = 10
//! resize_debounce_ms = 500
//! base_dpi = 96
//! suppressed_keysym = 65288
//! log_level = "warn"
//! ```
//!
//! Any key missing from the file keeps its default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `server_url` is not an absolute http(s) URL.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// A periodic timer was configured with a zero period.
    #[error("'{key}' must be at least 1")]
    ZeroInterval { key: &'static str },
}

/// All runtime configuration of one client process.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// HTTP base of the access gateway, e.g. `http://127.0.0.1:8088`.
    pub server_url: Url,
    /// Interval between terminal keep-alive pings.
    pub keepalive_interval: Duration,
    /// Quiet period before a tracking-mode window resize is applied.
    pub resize_debounce: Duration,
    /// DPI reported to the display tunnel.  Doubled for telnet.
    pub base_dpi: u32,
    /// Keysym whose local default action is suppressed (BackSpace).
    pub suppressed_keysym: u32,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8088";

impl Default for ClientConfig {
    /// | Field              | Default                   |
    /// |--------------------|---------------------------|
    /// | server_url         | `http://127.0.0.1:8088`   |
    /// | keepalive_interval | 10 seconds                |
    /// | resize_debounce    | 500 ms                    |
    /// | base_dpi           | 96                        |
    /// | suppressed_keysym  | `0xFF08` (BackSpace)      |
    /// | log_level          | `warn`                    |
    fn default() -> Self {
        Self {
            // Compile-time constant; always parses.
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server URL is valid"),
            keepalive_interval: Duration::from_secs(default_keepalive_secs()),
            resize_debounce: Duration::from_millis(default_resize_debounce_ms()),
            base_dpi: default_base_dpi(),
            suppressed_keysym: default_suppressed_keysym(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Loads the TOML file at `path` on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid TOML,
    /// names an unusable `server_url`, or sets `keepalive_secs = 0`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses TOML text on top of the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text)?;
        file.into_config()
    }

    /// Replaces `server_url` after validating it.
    pub fn set_server_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.server_url = parse_server_url(raw)?;
        Ok(())
    }

    /// WebSocket base derived from `server_url` (`http` → `ws`,
    /// `https` → `wss`), keeping host, port and path prefix.
    pub fn ws_base(&self) -> Url {
        let mut ws = self.server_url.clone();
        let scheme = if self.server_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        // http(s) → ws(s) is always an allowed scheme change for special URLs.
        let _ = ws.set_scheme(scheme);
        ws
    }

    /// `<ws base>/quick/<session_id>/<leaf>` with an empty query.
    pub fn session_endpoint(&self, session_id: &str, leaf: &str) -> Url {
        let mut url = self.ws_base();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["quick", session_id, leaf]);
        }
        url.set_query(None);
        url
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidServerUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

// ── TOML schema ───────────────────────────────────────────────────────────────

/// On-disk shape of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "default_base_dpi")]
    pub base_dpi: u32,
    #[serde(default = "default_suppressed_keysym")]
    pub suppressed_keysym: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl FileConfig {
    fn into_config(self) -> Result<ClientConfig, ConfigError> {
        if self.keepalive_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                key: "keepalive_secs",
            });
        }
        Ok(ClientConfig {
            server_url: parse_server_url(&self.server_url)?,
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            resize_debounce: Duration::from_millis(self.resize_debounce_ms),
            base_dpi: self.base_dpi,
            suppressed_keysym: self.suppressed_keysym,
            log_level: self.log_level,
        })
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
fn default_keepalive_secs() -> u64 {
    10
}
fn default_resize_debounce_ms() -> u64 {
    500
}
fn default_base_dpi() -> u32 {
    96
}
fn default_suppressed_keysym() -> u32 {
    0xFF08
}
fn default_log_level() -> String {
    "warn".to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
