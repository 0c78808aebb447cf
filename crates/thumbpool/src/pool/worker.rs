use crate::{
    DecodeError, GenerationGuard, ImageHeader, ImageLoader, InfoRequest, InfoResult, PoolStats,
    Proxy, Thumbnail, ThumbnailSizePolicy, WorkRequest, blank_thumbnail,
};
use crossbeam_channel::{Receiver, Sender};
use portable_atomic::{AtomicBool, Ordering};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Everything a worker thread owns or shares with the dispatcher.
pub(crate) struct WorkerContext<L, P> {
    pub(crate) worker_id: usize,
    pub(crate) loader: Arc<L>,
    pub(crate) policy: Arc<P>,
    /// Written by the dispatcher, compared here at pickup time.
    pub(crate) generation: Arc<GenerationGuard>,
    pub(crate) results: Sender<InfoResult>,
    pub(crate) shutdown_token: Arc<AtomicBool>,
    pub(crate) stats: Arc<PoolStats>,
}

/// Body of a worker thread.
///
/// Reports readiness on `ready`, then processes [`WorkRequest`]s one at a time
/// in arrival order until it dequeues [`WorkRequest::Shutdown`] or its channel
/// disconnects. Nothing a single request does can end the loop: loader errors
/// and loader panics both become failed [`InfoResult`]s.
pub(crate) fn worker_loop<L, P>(
    ctx: WorkerContext<L, P>,
    rx: Receiver<WorkRequest>,
    ready: Sender<usize>,
) where
    L: ImageLoader,
    P: ThumbnailSizePolicy,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} started", ctx.worker_id);

    if ready.send(ctx.worker_id).is_err() {
        // The dispatcher abandoned startup; it will never send us work.
        return;
    }
    drop(ready);

    while let Ok(work) = rx.recv() {
        match work {
            WorkRequest::Info(request) => handle_info_request(&ctx, request),
            WorkRequest::Shutdown => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {} received shutdown signal", ctx.worker_id);
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {} stopped", ctx.worker_id);
}

#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "trace",
        skip_all,
        fields(worker = ctx.worker_id, row = request.row, generation = request.generation_id)
    )
)]
fn handle_info_request<L, P>(ctx: &WorkerContext<L, P>, request: InfoRequest)
where
    L: ImageLoader,
    P: ThumbnailSizePolicy,
{
    if ctx.shutdown_token.load(Ordering::Acquire) {
        ctx.stats.record_discarded();
        return;
    }

    if !ctx.generation.matches(request.generation_id) {
        #[cfg(feature = "tracing")]
        tracing::trace!("Dropping stale request for {}", request.path.display());
        ctx.stats.record_stale();
        return;
    }

    let result = match describe(&*ctx.loader, &*ctx.policy, &request) {
        Ok(Described {
            header,
            thumbnail,
            proxy,
        }) => InfoResult::success(&request, header, thumbnail, proxy),
        Err(e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Failed to describe {}: {e}", request.path.display());
            InfoResult::failure(&request, e)
        }
    };
    let succeeded = result.is_success();

    if ctx.results.send(result).is_err() {
        #[cfg(feature = "tracing")]
        tracing::trace!("Result receiver dropped; discarding result");
    }

    // Counted after the send so a settled count implies the result is readable.
    if succeeded {
        ctx.stats.record_completed();
    } else {
        ctx.stats.record_failed();
    }
}

pub(crate) struct Described {
    pub(crate) header: ImageHeader,
    pub(crate) thumbnail: Thumbnail,
    pub(crate) proxy: Proxy,
}

/// Reads `request`'s header and allocates a thumbnail sized by `policy`.
///
/// A panic inside either collaborator is caught here and reported as
/// [`DecodeError::Panicked`] so it stays scoped to this request.
pub(crate) fn describe<L, P>(
    loader: &L,
    policy: &P,
    request: &InfoRequest,
) -> Result<Described, DecodeError>
where
    L: ImageLoader + ?Sized,
    P: ThumbnailSizePolicy + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Described, DecodeError> {
        let header = loader.open_header(&request.path)?;
        let target = policy.compute(request.thumbnail_mode, request.thumbnail_size, header.size);
        Ok(Described {
            thumbnail: blank_thumbnail(target.size),
            proxy: target.proxy,
            header,
        })
    }));

    match outcome {
        Ok(described) => described,
        Err(payload) => Err(DecodeError::Panicked {
            path: request.path.clone(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
