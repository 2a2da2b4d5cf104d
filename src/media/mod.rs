//! # Media Module
//!
//! Turns a video URL into an MP3 file. The pipeline itself owns no media code:
//! it sequences two external collaborators and keeps their intermediate files
//! on scratch storage for the duration of one request.
//!
//! ## Key Components:
//! - **Remote Source**: resolves a URL to a title and an audio-only stream and
//!   transfers the stream's bytes (`yt-dlp`)
//! - **Transcoder**: re-encodes a local audio file to MP3 (`ffmpeg`)
//! - **Scratch Files**: uniquely named temp files removed on every exit path
//! - **Conversion Pipeline**: resolve → download → transcode → load → clean up
//!
//! ## Failure Kinds:
//! Every stage reports a [`MediaError`]. The HTTP layer maps the kinds to
//! status codes in `error.rs`; nothing in here knows about HTTP.

pub mod pipeline;    // Request-scoped conversion sequence
pub mod scratch;     // Scoped temporary files
pub mod source;      // Remote platform retrieval
pub mod transcoder;  // Audio re-encoding

#[cfg(test)]
pub mod testing;

pub use pipeline::{ConversionPipeline, AUDIO_MIME};
pub use source::{AudioStream, RemoteSource, ResolvedAudio, YtDlpSource};
pub use transcoder::{FfmpegTranscoder, Transcoder};

use std::fmt;
use std::time::Duration;

/// Failure raised by one stage of the conversion pipeline.
#[derive(Debug)]
pub enum MediaError {
    /// The platform rejected the URL, the network failed, or the retrieval
    /// tool could not be run
    Resolve(String),

    /// The URL resolved but offers no audio-only stream
    NoAudioStream,

    /// The stream transfer failed or delivered nothing
    Download(String),

    /// The transcoder failed or produced no output
    Transcode(String),

    /// A stage ran past its time budget
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    /// Local scratch storage failed
    Io(std::io::Error),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Resolve(msg) => write!(f, "{}", msg),
            MediaError::NoAudioStream => write!(f, "Kein Audiostream gefunden"),
            MediaError::Download(msg) => write!(f, "download failed: {}", msg),
            MediaError::Transcode(msg) => write!(f, "transcode failed: {}", msg),
            MediaError::Timeout { stage, after } => {
                write!(f, "{} timed out after {}s", stage, after.as_secs())
            }
            MediaError::Io(err) => write!(f, "scratch storage error: {}", err),
        }
    }
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Io(err)
    }
}

impl MediaError {
    /// Short machine-readable name, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::Resolve(_) => "resolve",
            MediaError::NoAudioStream => "no_audio_stream",
            MediaError::Download(_) => "download",
            MediaError::Transcode(_) => "transcode",
            MediaError::Timeout { .. } => "timeout",
            MediaError::Io(_) => "io",
        }
    }
}

/// Last meaningful line a child process wrote to stderr.
///
/// `yt-dlp` and `ffmpeg` both print the actual cause last, after any
/// progress or warning chatter.
pub(crate) fn stderr_message(stderr: &[u8], status: std::process::ExitStatus) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("exited with {}", status))
}
