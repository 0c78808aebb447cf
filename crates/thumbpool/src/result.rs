use crate::{DecodeError, GenerationId, ImageHeader, InfoRequest, Proxy, Thumbnail};

/// The outcome of one [`InfoRequest`].
///
/// Built exactly once by the worker that processed the request and moved into
/// the dispatcher's result channel. `row` and `generation_id` are always
/// copied verbatim from the request so callers can correlate results that
/// arrive out of order.
///
/// A failed decode still produces a result: `metadata` and `thumbnail` are
/// `None` and `error` says why. Callers should treat such a result as a soft
/// failure for that row, not as a pipeline fault.
#[derive(Debug)]
pub struct InfoResult {
    pub row: usize,
    pub generation_id: GenerationId,
    pub metadata: Option<ImageHeader>,
    /// Allocated, transparent preview buffer of the policy's output size.
    pub thumbnail: Option<Thumbnail>,
    /// Reduction level a decoder should read at to fill `thumbnail`.
    pub proxy: Proxy,
    pub error: Option<DecodeError>,
}

impl InfoResult {
    pub(crate) fn success(
        request: &InfoRequest,
        metadata: ImageHeader,
        thumbnail: Thumbnail,
        proxy: Proxy,
    ) -> Self {
        Self {
            row: request.row,
            generation_id: request.generation_id,
            metadata: Some(metadata),
            thumbnail: Some(thumbnail),
            proxy,
            error: None,
        }
    }

    pub(crate) fn failure(request: &InfoRequest, error: DecodeError) -> Self {
        Self {
            row: request.row,
            generation_id: request.generation_id,
            metadata: None,
            thumbnail: None,
            proxy: Proxy::None,
            error: Some(error),
        }
    }

    /// Returns `true` if the header was read and a thumbnail allocated.
    pub fn is_success(&self) -> bool {
        self.metadata.is_some()
    }
}
