//! # Conversion Pipeline
//!
//! One conversion, strictly in order:
//! 1. **Resolve** the URL to a title and an audio-only stream
//! 2. **Download** the stream into an input scratch file
//! 3. **Transcode** the input into an output scratch file
//! 4. **Load** the output into memory
//! 5. **Clean up** both scratch files
//!
//! Steps 1 and 2 share the fetch deadline; step 3 has its own. Scratch files
//! are [`ScratchFile`] guards, so an error or a timeout at any step still
//! removes whatever was already created.

use crate::config::AppConfig;
use crate::media::scratch::{suffix_for, ScratchFile};
use crate::media::{FfmpegTranscoder, MediaError, RemoteSource, Transcoder, YtDlpSource};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// MIME type of every successful response body.
pub const AUDIO_MIME: &str = "audio/mpeg";

const OUTPUT_SUFFIX: &str = ".mp3";

/// A finished conversion, held fully in memory.
#[derive(Debug, Clone)]
pub struct ConvertedAudio {
    pub title: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct ConversionPipeline {
    source: Arc<dyn RemoteSource>,
    transcoder: Arc<dyn Transcoder>,
    scratch_dir: PathBuf,
    fetch_timeout: Duration,
    transcode_timeout: Duration,
}

impl ConversionPipeline {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        transcoder: Arc<dyn Transcoder>,
        scratch_dir: PathBuf,
        fetch_timeout: Duration,
        transcode_timeout: Duration,
    ) -> Self {
        Self {
            source,
            transcoder,
            scratch_dir,
            fetch_timeout,
            transcode_timeout,
        }
    }

    /// Build the production pipeline: `yt-dlp` for retrieval, `ffmpeg` for encoding.
    pub fn from_config(config: &AppConfig) -> Self {
        let source = YtDlpSource::new(config.tools.ytdlp_path.clone(), config.auth.clone());
        let transcoder = FfmpegTranscoder::new(
            config.tools.ffmpeg_path.clone(),
            config.conversion.audio_bitrate.clone(),
        );

        Self::new(
            Arc::new(source),
            Arc::new(transcoder),
            config.conversion.scratch_dir(),
            config.conversion.fetch_timeout(),
            config.conversion.transcode_timeout(),
        )
    }

    /// Convert the audio behind `url` to MP3.
    pub async fn convert(&self, url: &str) -> Result<ConvertedAudio, MediaError> {
        let conversion_id = Uuid::new_v4();
        self.run(url)
            .instrument(info_span!("conversion", %conversion_id))
            .await
    }

    async fn run(&self, url: &str) -> Result<ConvertedAudio, MediaError> {
        let started = Instant::now();
        let fetch_deadline = started + self.fetch_timeout;

        let resolved = within(
            "resolve",
            fetch_deadline,
            self.fetch_timeout,
            self.source.resolve(url),
        )
        .await?;
        info!(
            title = %resolved.title,
            format_id = %resolved.stream.format_id,
            ext = %resolved.stream.ext,
            abr = ?resolved.stream.abr,
            "Resolved audio stream"
        );

        let input = ScratchFile::create(&self.scratch_dir, &suffix_for(&resolved.stream.ext))?;
        let downloaded = within(
            "download",
            fetch_deadline,
            self.fetch_timeout,
            self.source.download(url, &resolved.stream, input.path()),
        )
        .await?;
        info!(bytes = downloaded, "Downloaded audio stream");

        let output = ScratchFile::create(&self.scratch_dir, OUTPUT_SUFFIX)?;
        let transcode_deadline = Instant::now() + self.transcode_timeout;
        within(
            "transcode",
            transcode_deadline,
            self.transcode_timeout,
            self.transcoder.transcode(input.path(), output.path()),
        )
        .await?;

        let bytes = tokio::fs::read(output.path()).await?;
        if bytes.is_empty() {
            return Err(MediaError::Transcode("transcoder produced an empty file".to_string()));
        }

        drop(input);
        drop(output);

        info!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Conversion finished"
        );

        Ok(ConvertedAudio {
            filename: audio_filename(&resolved.title),
            title: resolved.title,
            bytes,
        })
    }
}

async fn within<T, F>(
    stage: &'static str,
    deadline: Instant,
    budget: Duration,
    fut: F,
) -> Result<T, MediaError>
where
    F: Future<Output = Result<T, MediaError>>,
{
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout {
            stage,
            after: budget,
        }),
    }
}

/// Download filename for a remote title: `<title>.mp3` with every `/` turned into `_`.
///
/// Only forward slashes are replaced.
pub fn audio_filename(title: &str) -> String {
    format!("{}{}", title, OUTPUT_SUFFIX).replace('/', "_")
}
