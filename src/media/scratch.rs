//! Scratch files for a single conversion.
//!
//! A [`ScratchFile`] is created empty with a random name in the scratch
//! directory and removed when it is dropped, whichever way the request ends.

use std::io;
use std::path::Path;
use tempfile::TempPath;
use tracing::warn;

const SCRATCH_PREFIX: &str = "convert-";

pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    /// Create an empty, uniquely named file in `dir` ending with `suffix`.
    pub fn create(dir: &Path, suffix: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)?;

        // Only the path is kept; collaborators open the file themselves.
        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let location = path.to_path_buf();
        if let Err(err) = path.close() {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %location.display(), error = %err, "Failed to remove scratch file");
            }
        }
    }
}

/// File suffix for a container extension reported by the remote platform.
///
/// Anything that is not a short alphanumeric token falls back to `.m4a`.
pub fn suffix_for(ext: &str) -> String {
    let ext = ext.trim();
    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        format!(".{}", ext.to_ascii_lowercase())
    } else {
        ".m4a".to_string()
    }
}
