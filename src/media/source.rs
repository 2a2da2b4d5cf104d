//! # Remote Source
//!
//! Resolves a video URL to its title and best audio-only stream, and transfers
//! that stream into a local file. The production implementation drives
//! `yt-dlp` as a child process:
//!
//! - **resolve**: `yt-dlp --dump-single-json` and pick a format from the list
//! - **download**: `yt-dlp -f <format> -o -` with stdout copied into the file
//!
//! Authentication flags depend on the configured [`AuthMode`].

use crate::config::{AuthConfig, AuthMode};
use crate::media::{stderr_message, MediaError};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// An audio-only format offered by the remote platform.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
    pub format_id: String,
    pub ext: String,
    pub abr: Option<f64>,
}

/// A resolved URL: the human-readable title and the selected stream.
#[derive(Debug, Clone)]
pub struct ResolvedAudio {
    pub title: String,
    pub stream: AudioStream,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Look up `url` and select its best audio-only stream.
    async fn resolve(&self, url: &str) -> Result<ResolvedAudio, MediaError>;

    /// Write the full payload of `stream` into `dest` and flush it to storage.
    /// Returns the number of bytes written.
    async fn download(
        &self,
        url: &str,
        stream: &AudioStream,
        dest: &Path,
    ) -> Result<u64, MediaError>;
}

/// Subset of `yt-dlp`'s info JSON that stream selection needs.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatInfo {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
}

impl FormatInfo {
    fn is_audio_only(&self) -> bool {
        let has_audio = matches!(self.acodec.as_deref(), Some(codec) if codec != "none");
        // Some extractors leave `vcodec` off audio-only formats entirely.
        let has_video = matches!(self.vcodec.as_deref(), Some(codec) if codec != "none");
        has_audio && !has_video
    }

    fn is_m4a(&self) -> bool {
        self.ext.as_deref() == Some("m4a")
    }

    fn bitrate(&self) -> f64 {
        self.abr.or(self.tbr).unwrap_or(0.0)
    }

    fn to_stream(&self) -> AudioStream {
        AudioStream {
            format_id: self.format_id.clone(),
            ext: self.ext.clone().unwrap_or_else(|| "m4a".to_string()),
            abr: self.abr.or(self.tbr),
        }
    }
}

/// Pick the best audio-only format: mp4 audio first, then highest bitrate.
pub fn select_audio_stream(formats: &[FormatInfo]) -> Option<AudioStream> {
    formats
        .iter()
        .filter(|format| format.is_audio_only())
        .max_by(|a, b| {
            a.is_m4a()
                .cmp(&b.is_m4a())
                .then_with(|| a.bitrate().total_cmp(&b.bitrate()))
        })
        .map(FormatInfo::to_stream)
}

/// [`RemoteSource`] backed by the `yt-dlp` executable.
pub struct YtDlpSource {
    binary: String,
    auth: AuthConfig,
}

impl YtDlpSource {
    pub fn new(binary: impl Into<String>, auth: AuthConfig) -> Self {
        Self {
            binary: binary.into(),
            auth,
        }
    }

    /// Extra arguments for the configured authentication mode.
    pub fn auth_args(&self) -> Vec<String> {
        match self.auth.mode {
            AuthMode::Auto => vec!["--js-runtimes".to_string(), self.auth.js_runtime.clone()],
            AuthMode::Manual => {
                let token = self.auth.po_token.as_deref().unwrap_or_default().trim();
                let visitor = self.auth.visitor_data.as_deref().unwrap_or_default().trim();
                vec![
                    "--extractor-args".to_string(),
                    format!("youtube:po_token=web.gvs+{};visitor_data={}", token, visitor),
                ]
            }
            AuthMode::None => Vec::new(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .arg("--no-playlist")
            .arg("--no-warnings")
            .args(self.auth_args());
        command
    }

    fn spawn_error(&self, err: std::io::Error) -> String {
        if err.kind() == std::io::ErrorKind::NotFound {
            format!("{} is not installed or not on PATH", self.binary)
        } else {
            format!("failed to run {}: {}", self.binary, err)
        }
    }
}

#[async_trait]
impl RemoteSource for YtDlpSource {
    async fn resolve(&self, url: &str) -> Result<ResolvedAudio, MediaError> {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--")
            .arg(url);

        let output = command
            .output()
            .await
            .map_err(|err| MediaError::Resolve(self.spawn_error(err)))?;

        if !output.status.success() {
            return Err(MediaError::Resolve(stderr_message(&output.stderr, output.status)));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)
            .map_err(|err| MediaError::Resolve(format!("unreadable metadata: {}", err)))?;

        debug!(formats = info.formats.len(), "Fetched video metadata");

        let stream = select_audio_stream(&info.formats).ok_or(MediaError::NoAudioStream)?;
        Ok(ResolvedAudio {
            title: info.title.unwrap_or_default(),
            stream,
        })
    }

    async fn download(
        &self,
        url: &str,
        stream: &AudioStream,
        dest: &Path,
    ) -> Result<u64, MediaError> {
        let mut command = self.command();
        command
            .arg("--quiet")
            .arg("--no-progress")
            .arg("-f")
            .arg(&stream.format_id)
            .arg("-o")
            .arg("-")
            .arg("--")
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|err| MediaError::Download(self.spawn_error(err)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Download("stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Download("stderr was not captured".to_string()))?;

        let mut file = tokio::fs::File::create(dest).await?;

        // stderr is drained on its own task so a chatty child cannot block on a full pipe.
        let diagnostics = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(err) = stderr.read_to_end(&mut buf).await {
                debug!(error = %err, "Could not read download diagnostics");
            }
            buf
        });

        let copied = tokio::io::copy(&mut stdout, &mut file).await;
        drop(stdout);

        let written = match copied {
            Ok(written) => written,
            Err(err) => {
                // The child may be blocked on a full stdout pipe; it must not outlive the copy.
                if let Err(kill_err) = child.start_kill() {
                    debug!(error = %kill_err, "Failed to stop yt-dlp after a write error");
                }
                if let Err(wait_err) = child.wait().await {
                    debug!(error = %wait_err, "Failed to reap yt-dlp after a write error");
                }
                diagnostics.abort();
                return Err(MediaError::Io(err));
            }
        };

        let status = child.wait().await?;
        if !status.success() {
            let diagnostics = diagnostics.await.unwrap_or_default();
            return Err(MediaError::Download(stderr_message(&diagnostics, status)));
        }
        diagnostics.abort();

        file.flush().await?;
        file.sync_all().await?;

        if written == 0 {
            return Err(MediaError::Download("no audio data received".to_string()));
        }

        Ok(written)
    }
}
