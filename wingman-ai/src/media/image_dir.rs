//! Screenshot directory extractor
//!
//! Treats a directory of profile screenshots as an ordered frame sequence:
//! every image file (verified by magic bytes, not extension) becomes one
//! frame, in file-name order. Time-based sampling does not apply to stills,
//! so the interval is ignored.

use super::{Frame, FrameStream, MediaError, MediaExtractor, ProgressCallback};
use async_stream::stream;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory-of-images [`MediaExtractor`]
#[derive(Debug, Clone)]
pub struct ImageDirectoryExtractor {
    max_depth: usize,
}

impl Default for ImageDirectoryExtractor {
    fn default() -> Self {
        Self { max_depth: 1 }
    }
}

impl ImageDirectoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also descend into subdirectories up to `max_depth`
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Candidate files in name order
    fn candidates(&self, root: &Path) -> Result<Vec<PathBuf>, MediaError> {
        if !root.exists() {
            return Err(MediaError::NotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(MediaError::Unsupported(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
        {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => warn!("Error accessing entry: {}", e),
            }
        }
        Ok(files)
    }
}

impl MediaExtractor for ImageDirectoryExtractor {
    fn name(&self) -> &'static str {
        "image-directory"
    }

    fn extract_frames<'a>(
        &'a self,
        media: &'a Path,
        _interval_seconds: f64,
        on_progress: Option<ProgressCallback>,
    ) -> FrameStream<'a> {
        Box::pin(stream! {
            let files = match self.candidates(media) {
                Ok(files) => files,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let total = files.len();
            let mut index = 0;

            for (position, path) in files.into_iter().enumerate() {
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(source) => {
                        yield Err(MediaError::Io { path: path.clone(), source });
                        return;
                    }
                };

                if let Some(progress) = &on_progress {
                    progress(position + 1, total);
                }

                let kind = match infer::get(&bytes) {
                    Some(kind) if kind.matcher_type() == infer::MatcherType::Image => kind,
                    _ => {
                        debug!("Skipping non-image file {}", path.display());
                        continue;
                    }
                };

                yield Ok::<Frame, MediaError>(Frame::new(index, kind.mime_type(), bytes));
                index += 1;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[tokio::test]
    async fn test_images_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.png"), PNG_HEADER).unwrap();
        std::fs::write(dir.path().join("a.jpg"), JPEG_HEADER).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let progress: ProgressCallback = Arc::new(move |_, total| {
            assert_eq!(total, 3);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let extractor = ImageDirectoryExtractor::new();
        let frames: Vec<Frame> = extractor
            .extract_frames(dir.path(), 1.0, Some(progress))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].mime, "image/jpeg");
        assert_eq!(frames[1].mime, "image/png");
        assert_eq!(frames[1].index, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let extractor = ImageDirectoryExtractor::new();
        let result: Result<Vec<Frame>, MediaError> = extractor
            .extract_frames(Path::new("/nonexistent/screens"), 1.0, None)
            .try_collect()
            .await;
        assert!(matches!(result, Err(MediaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let frames: Vec<Frame> = ImageDirectoryExtractor::new()
            .extract_frames(dir.path(), 1.0, None)
            .try_collect()
            .await
            .unwrap();
        assert!(frames.is_empty());
    }
}
