//! Media → still frame extraction boundary
//!
//! A [`MediaExtractor`] turns one media input into a lazy, finite sequence of
//! frames. The sequence cannot be restarted: extracting again re-opens the
//! source.

mod image_dir;

pub use image_dir::ImageDirectoryExtractor;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// One still image taken from the media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Position in the extracted sequence (0-based)
    pub index: usize,
    /// MIME type, e.g. `image/png`
    pub mime: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Frame {
    pub fn new(index: usize, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            index,
            mime: mime.into(),
            bytes,
        }
    }
}

/// Frame extraction errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `(current_frame, total_frames)` progress callback
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Lazy frame sequence
pub type FrameStream<'a> = BoxStream<'a, Result<Frame, MediaError>>;

/// Source of still frames
pub trait MediaExtractor: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Start extracting frames from `media`, one every `interval_seconds`
    ///
    /// Frames are produced on demand as the stream is polled; dropping the
    /// stream stops extraction.
    fn extract_frames<'a>(
        &'a self,
        media: &'a Path,
        interval_seconds: f64,
        on_progress: Option<ProgressCallback>,
    ) -> FrameStream<'a>;
}
