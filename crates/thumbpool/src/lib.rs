//! # thumbpool
//!
//! A fixed pool of persistent worker threads that probes image headers and
//! sizes thumbnails for file-browser rows, without ever decoding on the
//! caller's thread.
//!
//! Callers hand [`InfoRequest`]s to a [`Dispatcher`], which routes them to its
//! workers in round-robin order. Each worker reads the file's header through an
//! [`ImageLoader`], asks a [`ThumbnailSizePolicy`] how large the preview should
//! be, and emits an [`InfoResult`] on a single aggregated channel. Results are
//! tagged with the request's `row` and `generation_id`; delivery order across
//! workers is not guaranteed.
//!
//! ## Cancellation
//!
//! Every request carries the generation id of the browsing session that
//! produced it. [`Dispatcher::set_generation_id`] overwrites each worker's
//! current generation under that worker's own lock, and workers drop any
//! request whose generation no longer matches at pickup time. A decode already
//! underway is never interrupted.
//!
//! ## Example
//!
//! ```no_run
//! use thumbpool::{Dispatcher, InfoRequest, PoolConfig, ThumbnailMode};
//!
//! let mut dispatcher = Dispatcher::with_defaults(PoolConfig::default())?;
//! dispatcher.set_generation_id(1);
//! dispatcher.request(InfoRequest::new("shot.0001.ppm", 0, 1).with_thumbnail(ThumbnailMode::Low, 128))?;
//!
//! let result = dispatcher.results().recv().expect("pool is running");
//! assert_eq!(result.row, 0);
//! dispatcher.shutdown()?;
//! # Ok::<(), thumbpool::Error>(())
//! ```
//!
//! ## Features
//!
//! - `parking-lot` (default): guard worker generations with
//!   `parking_lot::Mutex` instead of `std::sync::Mutex`.
//! - `cache-padded`: pad each worker's generation guard to a cache line.
//! - `tracing`: emit `tracing` events from the dispatcher and workers.

mod error;
mod generation;
mod loader;
mod mutex;
mod pool;
mod request;
mod result;
mod stats;
mod thumbnail;

pub use crate::error::*;
pub use crate::generation::*;
pub use crate::loader::*;
pub use crate::pool::*;
pub use crate::request::*;
pub use crate::result::*;
pub use crate::stats::*;
pub use crate::thumbnail::*;

/// Re-exported so callers can name the result receiver's error types.
pub use crossbeam_channel;
