//! In-process stand-ins for `yt-dlp` and `ffmpeg` used by the unit tests.

use crate::media::{
    AudioStream, ConversionPipeline, MediaError, RemoteSource, ResolvedAudio, Transcoder,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// MPEG-1 Layer III frame header followed by filler.
pub const MP3_FRAME: &[u8] = b"\xff\xfb\x90\x00";

const SOURCE_PAYLOAD: &[u8] = b"fake m4a data";

enum SourceBehavior {
    Succeed,
    NoAudio,
    Reject(String),
    FailDownload(String),
    Stall,
}

pub struct FakeSource {
    title: String,
    behavior: SourceBehavior,
    resolve_calls: AtomicUsize,
}

impl FakeSource {
    fn with(title: &str, behavior: SourceBehavior) -> Self {
        Self {
            title: title.to_string(),
            behavior,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(title: &str) -> Self {
        Self::with(title, SourceBehavior::Succeed)
    }

    pub fn without_audio() -> Self {
        Self::with("No Audio", SourceBehavior::NoAudio)
    }

    pub fn rejecting(message: &str) -> Self {
        Self::with("", SourceBehavior::Reject(message.to_string()))
    }

    pub fn failing_download(message: &str) -> Self {
        Self::with("Song", SourceBehavior::FailDownload(message.to_string()))
    }

    pub fn stalling(title: &str) -> Self {
        Self::with(title, SourceBehavior::Stall)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn resolve(&self, _url: &str) -> Result<ResolvedAudio, MediaError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            SourceBehavior::NoAudio => Err(MediaError::NoAudioStream),
            SourceBehavior::Reject(message) => Err(MediaError::Resolve(message.clone())),
            _ => Ok(ResolvedAudio {
                title: self.title.clone(),
                stream: AudioStream {
                    format_id: "140".to_string(),
                    ext: "m4a".to_string(),
                    abr: Some(129.5),
                },
            }),
        }
    }

    async fn download(
        &self,
        _url: &str,
        _stream: &AudioStream,
        dest: &Path,
    ) -> Result<u64, MediaError> {
        match &self.behavior {
            SourceBehavior::FailDownload(message) => Err(MediaError::Download(message.clone())),
            SourceBehavior::Stall => {
                tokio::fs::write(dest, SOURCE_PAYLOAD).await?;
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(SOURCE_PAYLOAD.len() as u64)
            }
            _ => {
                tokio::fs::write(dest, SOURCE_PAYLOAD).await?;
                Ok(SOURCE_PAYLOAD.len() as u64)
            }
        }
    }
}

enum TranscoderBehavior {
    Succeed,
    Fail(String),
    Silent,
    Stall,
}

pub struct FakeTranscoder {
    behavior: TranscoderBehavior,
}

impl FakeTranscoder {
    pub fn succeeding() -> Self {
        Self {
            behavior: TranscoderBehavior::Succeed,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: TranscoderBehavior::Fail(message.to_string()),
        }
    }

    /// Succeeds without writing anything.
    pub fn silent() -> Self {
        Self {
            behavior: TranscoderBehavior::Silent,
        }
    }

    pub fn stalling() -> Self {
        Self {
            behavior: TranscoderBehavior::Stall,
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), MediaError> {
        let source = tokio::fs::read(input).await?;
        if source.is_empty() {
            return Err(MediaError::Transcode("input file is empty".to_string()));
        }

        match &self.behavior {
            TranscoderBehavior::Succeed => {
                let mut encoded = MP3_FRAME.to_vec();
                encoded.extend_from_slice(&b"fake mp3 data".repeat(100));
                tokio::fs::write(output, encoded).await?;
                Ok(())
            }
            TranscoderBehavior::Fail(message) => Err(MediaError::Transcode(message.clone())),
            TranscoderBehavior::Silent => Ok(()),
            TranscoderBehavior::Stall => {
                tokio::fs::write(output, MP3_FRAME).await?;
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }
}

/// Pipeline over the given fakes with scratch files in `dir` and generous timeouts.
pub fn pipeline_in(
    dir: &Path,
    source: Arc<dyn RemoteSource>,
    transcoder: Arc<dyn Transcoder>,
) -> ConversionPipeline {
    ConversionPipeline::new(
        source,
        transcoder,
        dir.to_path_buf(),
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
}
