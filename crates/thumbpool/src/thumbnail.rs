//! Thumbnail sizing.
//!
//! A [`ThumbnailSizePolicy`] turns a request's [`ThumbnailMode`] and size hint,
//! together with an image's native size, into the size of the preview buffer
//! and the [`Proxy`] level a decoder should read at. Policies are pure: no I/O,
//! no shared state.

use core::fmt;

/// The preview buffer handed back to callers: RGBA, 8 bits per channel.
pub type Thumbnail = image::RgbaImage;

/// Allocates a fully transparent thumbnail of `size`.
///
/// Filling in pixels is the decoder's job; the pool guarantees only that a
/// correctly sized buffer exists.
pub fn blank_thumbnail(size: ImageSize) -> Thumbnail {
    Thumbnail::new(size.width, size.height)
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub const fn max_edge(&self) -> u32 {
        if self.width > self.height {
            self.width
        } else {
            self.height
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a request wants its preview produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThumbnailMode {
    /// No preview; successful results carry an empty placeholder.
    #[default]
    Off,
    /// Fast preview: the decoder may read at a reduced [`Proxy`] level.
    Low,
    /// Full-resolution decode scaled down to the requested size.
    High,
}

/// Power-of-two reduction applied while decoding, so a small image is produced
/// directly instead of downscaling a full-resolution decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Proxy {
    #[default]
    None,
    Half,
    Quarter,
    Eighth,
}

impl Proxy {
    /// The reduction factor.
    pub const fn scale(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Half => 2,
            Self::Quarter => 4,
            Self::Eighth => 8,
        }
    }

    /// The next coarser level, if any.
    pub const fn coarser(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Half),
            Self::Half => Some(Self::Quarter),
            Self::Quarter => Some(Self::Eighth),
            Self::Eighth => None,
        }
    }

    /// Size of `size` decoded at this level, rounding up on each axis.
    pub const fn scale_size(self, size: ImageSize) -> ImageSize {
        let scale = self.scale();
        ImageSize::new(size.width.div_ceil(scale), size.height.div_ceil(scale))
    }
}

/// Output of a [`ThumbnailSizePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ThumbnailSize {
    pub size: ImageSize,
    pub proxy: Proxy,
}

impl ThumbnailSize {
    pub const EMPTY: Self = Self {
        size: ImageSize::ZERO,
        proxy: Proxy::None,
    };
}

/// Computes a preview's size and decode proxy level.
pub trait ThumbnailSizePolicy {
    fn compute(&self, mode: ThumbnailMode, requested: u32, native: ImageSize) -> ThumbnailSize;
}

impl<F> ThumbnailSizePolicy for F
where
    F: Fn(ThumbnailMode, u32, ImageSize) -> ThumbnailSize,
{
    fn compute(&self, mode: ThumbnailMode, requested: u32, native: ImageSize) -> ThumbnailSize {
        self(mode, requested, native)
    }
}

/// The default policy.
///
/// - [`ThumbnailMode::Off`], a zero size hint, or an empty image yield
///   [`ThumbnailSize::EMPTY`].
/// - [`ThumbnailMode::Low`] steps to the next coarser [`Proxy`] for as long as
///   the current level's longest edge is more than twice the requested size,
///   stopping at [`Proxy::Eighth`]. The chosen level may therefore fall below
///   twice the hint, but never below the hint itself unless the image does.
/// - [`ThumbnailMode::High`] always decodes at [`Proxy::None`].
///
/// The proxied size is then scaled so its longest edge equals the hint,
/// rounding up and keeping each axis at least one pixel. Images already
/// smaller than the hint are not enlarged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyThumbnailPolicy;

impl ThumbnailSizePolicy for ProxyThumbnailPolicy {
    fn compute(&self, mode: ThumbnailMode, requested: u32, native: ImageSize) -> ThumbnailSize {
        if mode == ThumbnailMode::Off || requested == 0 || native.is_empty() {
            return ThumbnailSize::EMPTY;
        }

        let mut proxy = Proxy::None;
        if mode == ThumbnailMode::Low {
            let max_edge = u64::from(native.max_edge());
            let limit = u64::from(requested) * 2;
            while let Some(next) = proxy.coarser() {
                if max_edge > limit * u64::from(proxy.scale()) {
                    proxy = next;
                } else {
                    break;
                }
            }
        }

        let proxied = proxy.scale_size(native);
        ThumbnailSize {
            size: fit_longest_edge(proxied, requested),
            proxy,
        }
    }
}

fn fit_longest_edge(size: ImageSize, target: u32) -> ImageSize {
    let longest = size.max_edge();
    if longest <= target {
        return size;
    }

    let scale = |edge: u32| {
        let scaled = (u64::from(edge) * u64::from(target)).div_ceil(u64::from(longest));
        // `scaled <= target` because `edge <= longest`.
        u32::try_from(scaled).unwrap_or(target).max(1)
    };
    ImageSize::new(scale(size.width), scale(size.height))
}
