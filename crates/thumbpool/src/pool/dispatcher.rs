//! Fixed pool of worker threads behind a fire-and-forget request API.
//!
//! This module defines [`Dispatcher`], which owns N persistent worker threads
//! and their bounded request channels. Requests are distributed round-robin,
//! results from every worker are merged onto one channel, and a generation id
//! broadcast lets callers invalidate all queued work for a stale browsing
//! session in one call.
//!
//! Each worker guards its generation with its own lock, so broadcasting a new
//! generation never serializes unrelated workers against each other.

use super::config::PoolConfig;
use super::worker::{WorkerContext, worker_loop};
use crate::{
    Error, GenerationGuard, GenerationId, ImageLoader, InfoRequest, InfoResult, LoaderRegistry,
    PoolStats, PoolStatsSnapshot, ProxyThumbnailPolicy, Result, ThumbnailSizePolicy, WorkRequest,
};
use crossbeam_channel::{Receiver, Sender};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Body of one worker thread, handed to a [`Spawner`].
pub(crate) type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// Starts worker `index` on a thread configured by `builder`.
pub(crate) type Spawner<'a> =
    dyn FnMut(usize, thread::Builder, WorkerBody) -> io::Result<JoinHandle<()>> + 'a;

struct WorkerHandle {
    sender: Sender<WorkRequest>,
    generation: Arc<GenerationGuard>,
    thread: Option<JoinHandle<()>>,
}

/// Routes [`InfoRequest`]s to a fixed pool of worker threads and collects their
/// [`InfoResult`]s on a single channel.
///
/// - [`Dispatcher::request`] never decodes on the calling thread; it may block
///   only while the chosen worker's channel is full.
/// - [`Dispatcher::set_generation_id`] invalidates every request whose
///   generation differs from the new one and has not been picked up yet.
/// - [`Dispatcher::results`] yields results in completion order, which is not
///   request order across workers.
/// - [`Dispatcher::shutdown`] (or dropping the dispatcher) discards queued
///   requests, lets in-flight decodes finish, and joins every thread.
///
/// Workers start at generation `0`.
pub struct Dispatcher {
    workers: Vec<WorkerHandle>,
    num_workers: usize,
    next_worker: AtomicUsize,
    results: Receiver<InfoResult>,
    shutdown_token: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
}

impl Dispatcher {
    /// Starts a pool using the default [`LoaderRegistry`] and
    /// [`ProxyThumbnailPolicy`].
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::new`].
    pub fn with_defaults(config: PoolConfig) -> Result<Self> {
        Self::new(config, LoaderRegistry::default(), ProxyThumbnailPolicy)
    }

    /// Starts `config.num_workers` threads sharing `loader` and `policy`.
    ///
    /// Returns only once every worker thread is running.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `config` fails validation.
    /// - [`Error::WorkerSpawn`] if the OS refuses a thread.
    /// - [`Error::WorkerStartup`] if a thread exits before reporting in.
    ///
    /// On error every thread already started is shut down and joined before
    /// returning.
    pub fn new<L, P>(config: PoolConfig, loader: L, policy: P) -> Result<Self>
    where
        L: ImageLoader + Send + Sync + 'static,
        P: ThumbnailSizePolicy + Send + Sync + 'static,
    {
        Self::start(config, loader, policy, &mut |_, builder, body| builder.spawn(body))
    }

    /// [`Dispatcher::new`] with thread creation delegated to `spawn`.
    pub(crate) fn start<L, P>(
        config: PoolConfig,
        loader: L,
        policy: P,
        spawn: &mut Spawner<'_>,
    ) -> Result<Self>
    where
        L: ImageLoader + Send + Sync + 'static,
        P: ThumbnailSizePolicy + Send + Sync + 'static,
    {
        config.validate()?;

        let loader = Arc::new(loader);
        let policy = Arc::new(policy);
        let shutdown_token = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PoolStats::default());
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(config.num_workers);

        // Dropping `dispatcher` on an early return tears down whatever started.
        let mut dispatcher = Self {
            workers: Vec::with_capacity(config.num_workers),
            num_workers: config.num_workers,
            next_worker: AtomicUsize::new(0),
            results: results_rx,
            shutdown_token: Arc::clone(&shutdown_token),
            stats: Arc::clone(&stats),
        };

        for worker_id in 0..config.num_workers {
            let (tx, rx) = crossbeam_channel::bounded(config.queue_depth);
            let generation = Arc::new(GenerationGuard::default());
            let ctx = WorkerContext {
                worker_id,
                loader: Arc::clone(&loader),
                policy: Arc::clone(&policy),
                generation: Arc::clone(&generation),
                results: results_tx.clone(),
                shutdown_token: Arc::clone(&shutdown_token),
                stats: Arc::clone(&stats),
            };
            let ready = ready_tx.clone();

            let builder =
                thread::Builder::new().name(format!("{}-{worker_id}", config.thread_name));
            let body: WorkerBody = Box::new(move || worker_loop(ctx, rx, ready));
            let thread = spawn(worker_id, builder, body).map_err(|source| {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to spawn worker {worker_id}: {source}");
                Error::WorkerSpawn {
                    index: worker_id,
                    source,
                }
            })?;

            dispatcher.workers.push(WorkerHandle {
                sender: tx,
                generation,
                thread: Some(thread),
            });
        }

        // Only workers hold result senders from here on, so the result channel
        // disconnects once every worker has exited.
        drop(results_tx);
        drop(ready_tx);

        let mut started = vec![false; config.num_workers];
        for _ in 0..config.num_workers {
            match ready_rx.recv() {
                Ok(worker_id) => started[worker_id] = true,
                Err(_) => {
                    let index = started.iter().position(|s| !s).unwrap_or_default();
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {index} exited during startup");
                    return Err(Error::WorkerStartup { index });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Started {} workers (queue depth {})",
            config.num_workers,
            config.queue_depth
        );

        Ok(dispatcher)
    }

    /// Returns the index of the next worker to receive work (round-robin).
    ///
    /// The cursor always holds a valid worker index and resets to `0` after
    /// the last worker, so the cycle never skips when a counter would wrap.
    pub(crate) fn next_worker_index(&self) -> usize {
        let len = self.workers.len();
        self.next_worker
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i)
    }

    #[cfg(test)]
    pub(crate) fn worker_cursor(&self) -> usize {
        self.next_worker.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn shutdown_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_token)
    }

    /// Hands `request` to the next worker in round-robin order.
    ///
    /// The result, if any, arrives later on [`Dispatcher::results`]. No result
    /// is produced if the request's generation is stale when a worker picks it
    /// up.
    ///
    /// # Errors
    ///
    /// - [`Error::ServiceShutdown`] once shutdown has started.
    /// - [`Error::ChannelError`] if the chosen worker is gone.
    pub fn request(&self, request: InfoRequest) -> Result<()> {
        if self.shutdown_token.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }

        let worker_idx = self.next_worker_index();
        let worker = &self.workers[worker_idx];

        // Counted before the send so no worker outcome is ever seen first.
        self.stats.record_requested();
        worker
            .sender
            .send(WorkRequest::Info(request))
            .map_err(|_| {
                self.stats.revert_requested();
                Error::ChannelError {
                    context: format!("Worker {worker_idx} channel closed"),
                }
            })
    }

    /// Makes `generation_id` the current generation on every worker.
    ///
    /// Each worker's guard is locked and overwritten in turn. Once this returns,
    /// no request from another generation that has not yet been picked up will
    /// produce a result. Decodes already underway are not interrupted.
    pub fn set_generation_id(&self, generation_id: GenerationId) {
        for worker in &self.workers {
            worker.generation.set(generation_id);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Generation set to {generation_id}");
    }

    /// The current generation of worker `index`, or `None` if there is no such
    /// worker (including after shutdown).
    pub fn generation_id_of(&self, index: usize) -> Option<GenerationId> {
        self.workers.get(index).map(|w| w.generation.get())
    }

    /// The aggregated result stream.
    ///
    /// The receiver can be cloned and moved to another thread. It disconnects
    /// after [`Dispatcher::shutdown`] once every buffered result is drained.
    pub fn results(&self) -> &Receiver<InfoResult> {
        &self.results
    }

    /// Size of the pool this dispatcher was built with.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown_token.load(Ordering::Acquire)
    }

    /// Stops every worker and waits for its thread to exit.
    ///
    /// - Refuses new requests.
    /// - Marks the pool as shutting down, so requests still queued are
    ///   discarded without a result.
    /// - Queues a [`WorkRequest::Shutdown`] behind them on every worker.
    /// - Joins every worker thread. A decode already underway finishes first
    ///   and its result is still delivered.
    ///
    /// Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] for the first worker whose thread
    /// panicked. Every other worker is still joined.
    pub fn shutdown(&mut self) -> Result<()> {
        self.shutdown_token.store(true, Ordering::Release);
        if self.workers.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Shutting down {} workers", self.workers.len());

        for (_i, worker) in self.workers.iter().enumerate() {
            if let Err(_e) = worker.sender.send(WorkRequest::Shutdown) {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to send shutdown to worker {_i}: {_e}");
            }
        }

        let mut outcome = Ok(());
        for (i, mut worker) in self.workers.drain(..).enumerate() {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            if thread.join().is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {i} panicked");
                if outcome.is_ok() {
                    outcome = Err(Error::WorkerPanicked { index: i });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete: {:?}", self.stats.snapshot());

        outcome
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(_e) = self.shutdown() {
            #[cfg(feature = "tracing")]
            tracing::error!("Error during worker pool shutdown: {_e}");
        }
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("num_workers", &self.num_workers)
            .field("live_workers", &self.workers.len())
            .field("shut_down", &self.is_shut_down())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
