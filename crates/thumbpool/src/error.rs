//! Error types for the thumbnail pool.
//!
//! Two layers of failure exist and they never mix:
//!
//! - [`Error`] covers the pool lifecycle: configuration, thread startup,
//!   channel plumbing and shutdown. These propagate to the caller as hard
//!   errors from [`Dispatcher`] methods.
//! - [`DecodeError`] covers a single request. Workers catch it at the request
//!   boundary and attach it to an [`InfoResult`] whose metadata and thumbnail
//!   are absent; it never crosses a worker's thread boundary as a fault.
//!
//! [`Dispatcher`]: crate::Dispatcher
//! [`InfoResult`]: crate::InfoResult

use std::path::PathBuf;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Pool-level failures.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The [`PoolConfig`](crate::PoolConfig) cannot produce a working pool.
    #[error("Invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The OS refused to start a worker thread. A partially started pool is
    /// torn down before this is returned.
    #[error("Failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// A worker exited before it reported that it was running.
    #[error("Worker {index} exited during startup")]
    WorkerStartup { index: usize },

    /// Internal channel send/receive failure (e.g., a worker's channel closed).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A worker thread panicked outside the per-request boundary.
    #[error("Worker {index} panicked")]
    WorkerPanicked { index: usize },

    /// A request arrived after shutdown started.
    #[error("Dispatcher is shutting down")]
    ServiceShutdown,
}

/// Per-request failures raised while reading an image header.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file does not carry a signature this loader understands.
    #[error("Unrecognized file: {path}")]
    Unrecognized { path: PathBuf },

    /// The signature is known but the variant is not.
    #[error("Unsupported file {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    /// The header was readable but malformed or truncated.
    #[error("Error reading {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Codec error on {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A collaborator panicked while handling this request.
    #[error("Loader panicked on {path}: {message}")]
    Panicked { path: PathBuf, message: String },
}

impl DecodeError {
    /// The file the failure refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. }
            | Self::Unrecognized { path }
            | Self::Unsupported { path, .. }
            | Self::Read { path, .. }
            | Self::Codec { path, .. }
            | Self::Panicked { path, .. } => path,
        }
    }
}
