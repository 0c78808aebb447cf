use crate::{Error, Result};

/// Default number of worker threads.
pub const DEFAULT_NUM_WORKERS: usize = 12;

/// Default capacity of each worker's request channel.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default prefix for worker thread names.
pub const DEFAULT_THREAD_NAME: &str = "thumbpool-worker";

/// Shape of a [`Dispatcher`](crate::Dispatcher)'s worker pool.
///
/// The pool size is fixed for the lifetime of the dispatcher built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of persistent worker threads.
    pub num_workers: usize,

    /// Requests that may wait in one worker's channel before
    /// [`Dispatcher::request`](crate::Dispatcher::request) blocks.
    ///
    /// Larger values keep the calling thread from stalling behind a slow
    /// decode; smaller values let a generation bump skip less queued work.
    pub queue_depth: usize,

    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[must_use]
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Checks that the configuration can produce a working pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if there are no workers, the queue
    /// depth is zero, or the thread name contains a NUL byte.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "num_workers must be greater than 0".to_owned(),
            });
        }
        // A zero-capacity channel would turn every request into a rendezvous
        // with a worker that may be mid-decode.
        if self.queue_depth == 0 {
            return Err(Error::InvalidConfig {
                reason: "queue_depth must be greater than 0".to_owned(),
            });
        }
        if self.thread_name.contains('\0') {
            return Err(Error::InvalidConfig {
                reason: "thread_name must not contain NUL bytes".to_owned(),
            });
        }
        Ok(())
    }
}
