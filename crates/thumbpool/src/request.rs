use crate::{GenerationId, ThumbnailMode};
use std::path::{Path, PathBuf};

/// Default longest-edge hint, in pixels, for requests built with
/// [`InfoRequest::new`].
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;

/// A request for one file's header metadata and thumbnail.
///
/// Requests are immutable once handed to the [`Dispatcher`]. The `row` is an
/// opaque correlation key copied verbatim into the [`InfoResult`]; the pool
/// never interprets it.
///
/// [`Dispatcher`]: crate::Dispatcher
/// [`InfoResult`]: crate::InfoResult
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InfoRequest {
    /// The file to probe. For image sequences this names one frame.
    pub path: PathBuf,
    /// Whether and how a preview is sized.
    pub thumbnail_mode: ThumbnailMode,
    /// Longest-edge hint used by the thumbnail size policy.
    pub thumbnail_size: u32,
    /// Caller's display row.
    pub row: usize,
    /// Browsing session that produced this request.
    pub generation_id: GenerationId,
}

impl InfoRequest {
    /// Creates a request with thumbnails disabled.
    pub fn new(path: impl Into<PathBuf>, row: usize, generation_id: GenerationId) -> Self {
        Self {
            path: path.into(),
            thumbnail_mode: ThumbnailMode::Off,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            row,
            generation_id,
        }
    }

    /// Sets the thumbnail mode and longest-edge hint.
    #[must_use]
    pub fn with_thumbnail(mut self, mode: ThumbnailMode, size: u32) -> Self {
        self.thumbnail_mode = mode;
        self.thumbnail_size = size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A message sent from the [`Dispatcher`] to an individual worker thread.
///
/// Messages travel over bounded per-worker channels and are consumed in FIFO
/// order by the worker's loop.
///
/// [`Dispatcher`]: crate::Dispatcher
#[derive(Debug)]
pub(crate) enum WorkRequest {
    /// Probe a file and emit an [`InfoResult`](crate::InfoResult).
    Info(InfoRequest),

    /// Stop the worker. Sent behind any queued requests; the worker exits its
    /// loop when it dequeues this message.
    Shutdown,
}
