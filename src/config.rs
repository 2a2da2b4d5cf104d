//! # Configuration Management
//!
//! Loads the service configuration from several sources:
//! - Built-in defaults (`AppConfig::default()`)
//! - An optional `config.toml` next to the binary
//! - Environment variables with the `APP_` prefix (`APP_SERVER__PORT=9000`)
//! - Platform variables (`HOST`, `PORT`) and the platform auth variables
//!   (`YT_AUTH_MODE`, `YT_PO_TOKEN`, `YT_VISITOR_DATA`)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform variables
//! 2. `APP_*` environment variables
//! 3. Configuration file (`config.toml`)
//! 4. Default values
//!
//! Configuration is read once at startup. Request handlers receive it through
//! `AppState` and never consult the process environment themselves.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (containers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How the retrieval tool authenticates against the video platform.
///
/// ## Variants:
/// - **Auto**: the retrieval tool negotiates a token itself; this needs a
///   JavaScript runtime on the host
/// - **Manual**: a PO token and visitor data supplied by the operator
/// - **None**: no token at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Auto,
    Manual,
    #[default]
    None,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Auto => write!(f, "auto"),
            AuthMode::Manual => write!(f, "manual"),
            AuthMode::None => write!(f, "none"),
        }
    }
}

/// Platform authentication settings.
///
/// `po_token` and `visitor_data` are only used in [`AuthMode::Manual`].
/// `js_runtime` is only used in [`AuthMode::Auto`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub po_token: Option<String>,
    pub visitor_data: Option<String>,
    pub js_runtime: String,
}

impl AuthConfig {
    pub fn po_token_set(&self) -> bool {
        is_present(self.po_token.as_deref())
    }

    pub fn visitor_data_set(&self) -> bool {
        is_present(self.visitor_data.as_deref())
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Locations of the external executables.
///
/// Bare names are resolved through `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub ytdlp_path: String,
    pub ffmpeg_path: String,
}

/// Settings for a single conversion.
///
/// ## Fields:
/// - `fetch_timeout_secs`: upper bound for resolving and downloading the stream
/// - `transcode_timeout_secs`: upper bound for the transcoder run
/// - `audio_bitrate`: target MP3 bitrate passed to the transcoder (e.g. "192k")
/// - `scratch_dir`: where scratch files are created; the system temp dir if unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub fetch_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
    pub audio_bitrate: String,
    pub scratch_dir: Option<PathBuf>,
}

impl ConversionConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Provides default configuration values.
///
/// The defaults let the service start with no configuration file at all,
/// as long as `yt-dlp` and `ffmpeg` are on `PATH`.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            auth: AuthConfig {
                mode: AuthMode::None,
                po_token: None,
                visitor_data: None,
                js_runtime: "node".to_string(),
            },
            tools: ToolsConfig {
                ytdlp_path: "yt-dlp".to_string(),
                ffmpeg_path: "ffmpeg".to_string(),
            },
            conversion: ConversionConfig {
                fetch_timeout_secs: 300,
                transcode_timeout_secs: 300,
                audio_bitrate: "192k".to_string(),
                scratch_dir: None,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_CONVERSION__FETCH_TIMEOUT_SECS=60`: Override the fetch timeout
    /// - `APP_TOOLS__FFMPEG_PATH=/opt/ffmpeg/bin/ffmpeg`: Use a specific transcoder
    /// - `HOST=0.0.0.0` / `PORT=3000`: Deployment platform conventions
    /// - `YT_AUTH_MODE=manual`, `YT_PO_TOKEN=...`, `YT_VISITOR_DATA=...`
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(mode) = env::var("YT_AUTH_MODE") {
            settings = settings.set_override("auth.mode", mode.trim().to_lowercase())?;
        }

        if let Ok(token) = env::var("YT_PO_TOKEN") {
            settings = settings.set_override("auth.po_token", token)?;
        }

        if let Ok(visitor_data) = env::var("YT_VISITOR_DATA") {
            settings = settings.set_override("auth.visitor_data", visitor_data)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Both timeouts are greater than 0
    /// - Bitrate and tool paths are not empty
    /// - Manual auth mode has both credentials
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.conversion.fetch_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Fetch timeout must be greater than 0"));
        }

        if self.conversion.transcode_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Transcode timeout must be greater than 0"));
        }

        if self.conversion.audio_bitrate.trim().is_empty() {
            return Err(anyhow::anyhow!("Audio bitrate cannot be empty"));
        }

        if self.tools.ytdlp_path.trim().is_empty() || self.tools.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!("Tool paths cannot be empty"));
        }

        if self.auth.mode == AuthMode::Manual
            && !(self.auth.po_token_set() && self.auth.visitor_data_set())
        {
            return Err(anyhow::anyhow!(
                "Manual auth mode requires both YT_PO_TOKEN and YT_VISITOR_DATA"
            ));
        }

        if self.auth.mode == AuthMode::Auto && self.auth.js_runtime.trim().is_empty() {
            return Err(anyhow::anyhow!("Auto auth mode requires a JavaScript runtime"));
        }

        Ok(())
    }
}
