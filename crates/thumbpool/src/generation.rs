use crate::mutex::{self, Mutex};

/// Identifier of a browsing session.
///
/// Callers bump it whenever the browsing context changes (new directory, new
/// filter, new sort order) so that work queued for the old context is dropped
/// instead of decoded.
pub type GenerationId = u64;

/// A worker's current generation, guarded by that worker's own lock.
///
/// The dispatcher writes it through [`GenerationGuard::set`]; the worker reads
/// and compares it through [`GenerationGuard::matches`] when it picks up a
/// request. Both happen under the same lock, so a pickup never observes a
/// generation update halfway.
///
/// Each worker owns a separate guard. Broadcasting a new generation therefore
/// takes N short locks instead of one pool-wide lock, and a worker checking its
/// own generation never contends with unrelated workers.
#[derive(Debug)]
pub struct GenerationGuard {
    #[cfg(feature = "cache-padded")]
    current: crossbeam_utils::CachePadded<Mutex<GenerationId>>,
    #[cfg(not(feature = "cache-padded"))]
    current: Mutex<GenerationId>,
}

impl GenerationGuard {
    pub fn new(initial: GenerationId) -> Self {
        Self {
            #[cfg(feature = "cache-padded")]
            current: crossbeam_utils::CachePadded::new(Mutex::new(initial)),
            #[cfg(not(feature = "cache-padded"))]
            current: Mutex::new(initial),
        }
    }

    /// Returns the current generation.
    pub fn get(&self) -> GenerationId {
        *mutex::lock(&self.current)
    }

    /// Overwrites the current generation.
    pub fn set(&self, generation_id: GenerationId) {
        *mutex::lock(&self.current) = generation_id;
    }

    /// Returns `true` if `generation_id` is the current generation.
    pub fn matches(&self, generation_id: GenerationId) -> bool {
        *mutex::lock(&self.current) == generation_id
    }
}

impl Default for GenerationGuard {
    fn default() -> Self {
        Self::new(0)
    }
}
