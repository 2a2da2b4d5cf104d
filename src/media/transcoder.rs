use crate::media::{stderr_message, MediaError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Re-encodes a local audio file into MP3.
///
/// Implementations must have fully written `output` when they return `Ok`.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), MediaError>;
}

/// [`Transcoder`] backed by the `ffmpeg` executable and its LAME encoder.
pub struct FfmpegTranscoder {
    binary: String,
    bitrate: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            bitrate: bitrate.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(&self.bitrate)
            .arg("-f")
            .arg("mp3")
            .arg(output);
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let result = self.command(input, output).output().await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                MediaError::Transcode(format!("{} is not installed or not on PATH", self.binary))
            } else {
                MediaError::Transcode(format!("failed to run {}: {}", self.binary, err))
            }
        })?;

        if !result.status.success() {
            return Err(MediaError::Transcode(stderr_message(&result.stderr, result.status)));
        }

        Ok(())
    }
}
