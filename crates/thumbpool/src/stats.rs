use portable_atomic::{AtomicU64, Ordering};

/// Counters describing what a pool has done with its requests.
///
/// A request is counted as `requested` before it reaches a worker, and each
/// outcome counter is bumped with release ordering after the outcome. A
/// [`PoolStats::snapshot`] reads the outcomes with acquire ordering and
/// `requested` last, so `settled() <= requested` holds in every snapshot.
/// Snapshots are otherwise not linearizable.
#[derive(Debug, Default)]
pub struct PoolStats {
    requested: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
    discarded: AtomicU64,
}

/// A point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Requests accepted by the dispatcher.
    pub requested: u64,
    /// Results emitted with metadata and a thumbnail.
    pub completed: u64,
    /// Results emitted after a decode failure.
    pub failed: u64,
    /// Requests dropped because their generation was out of date.
    pub stale: u64,
    /// Requests dropped because the pool was shutting down.
    pub discarded: u64,
}

impl PoolStatsSnapshot {
    /// Requests that reached a final outcome.
    pub const fn settled(&self) -> u64 {
        self.completed + self.failed + self.stale + self.discarded
    }
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        let completed = self.completed.load(Ordering::Acquire);
        let failed = self.failed.load(Ordering::Acquire);
        let stale = self.stale.load(Ordering::Acquire);
        let discarded = self.discarded.load(Ordering::Acquire);
        PoolStatsSnapshot {
            requested: self.requested.load(Ordering::Acquire),
            completed,
            failed,
            stale,
            discarded,
        }
    }

    pub(crate) fn record_requested(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Undoes [`PoolStats::record_requested`] for a request that never reached
    /// a worker.
    pub(crate) fn revert_requested(&self) {
        self.requested.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_stale(&self) {
        self.stale.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Release);
    }
}
