//! Image header loaders.
//!
//! Workers only need to know an image's native size and pixel layout before
//! they can size a thumbnail, so the loader interface stops at the header.
//! Pixel decoding belongs to whoever fills in the thumbnail buffer.
//!
//! - [`PpmLoader`] - NetPBM (`P1`-`P6`) header reader.
//! - [`CodecLoader`] - anything the `image` crate can sniff.
//! - [`LoaderRegistry`] - picks a loader by file extension.

mod codec;
mod ppm;
mod registry;

pub use codec::*;
pub use ppm::*;
pub use registry::*;

use crate::{DecodeError, ImageSize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens files far enough to describe them.
pub trait ImageLoader {
    /// Reads the header of the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the file cannot be opened, is not a format
    /// this loader understands, or has a malformed header.
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError>;
}

impl<L> ImageLoader for Arc<L>
where
    L: ImageLoader + ?Sized,
{
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        (**self).open_header(path)
    }
}

impl<L> ImageLoader for Box<L>
where
    L: ImageLoader + ?Sized,
{
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        (**self).open_header(path)
    }
}

/// A loader that can be shared between worker threads.
pub type SharedLoader = Arc<dyn ImageLoader + Send + Sync>;

/// Header information for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub path: PathBuf,
    /// Native (unproxied) size.
    pub size: ImageSize,
    pub pixel: PixelFormat,
    /// Format-specific details such as the codec name or bit depth.
    pub tags: BTreeMap<String, String>,
}

impl ImageHeader {
    pub fn new(path: impl Into<PathBuf>, size: ImageSize, pixel: PixelFormat) -> Self {
        Self {
            path: path.into(),
            size,
            pixel,
            tags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Pixel layout reported by a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    L8,
    L16,
    La8,
    La16,
    Rgb8,
    Rgb16,
    Rgba8,
    Rgba16,
    Rgb32F,
    Rgba32F,
}

impl PixelFormat {
    /// Integer pixel format for a channel count and bit depth, if one exists.
    pub const fn from_integer(channels: u8, bit_depth: u8) -> Option<Self> {
        match (channels, bit_depth) {
            (1, 8) => Some(Self::L8),
            (1, 16) => Some(Self::L16),
            (2, 8) => Some(Self::La8),
            (2, 16) => Some(Self::La16),
            (3, 8) => Some(Self::Rgb8),
            (3, 16) => Some(Self::Rgb16),
            (4, 8) => Some(Self::Rgba8),
            (4, 16) => Some(Self::Rgba16),
            _ => None,
        }
    }

    pub const fn channels(self) -> u8 {
        match self {
            Self::L8 | Self::L16 => 1,
            Self::La8 | Self::La16 => 2,
            Self::Rgb8 | Self::Rgb16 | Self::Rgb32F => 3,
            Self::Rgba8 | Self::Rgba16 | Self::Rgba32F => 4,
        }
    }

    pub const fn bit_depth(self) -> u8 {
        match self {
            Self::L8 | Self::La8 | Self::Rgb8 | Self::Rgba8 => 8,
            Self::L16 | Self::La16 | Self::Rgb16 | Self::Rgba16 => 16,
            Self::Rgb32F | Self::Rgba32F => 32,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Rgb32F | Self::Rgba32F)
    }

    pub const fn bytes_per_pixel(self) -> u64 {
        self.channels() as u64 * (self.bit_depth() as u64 / 8)
    }
}

impl TryFrom<image::ColorType> for PixelFormat {
    type Error = image::ColorType;

    fn try_from(color: image::ColorType) -> Result<Self, Self::Error> {
        use image::ColorType;

        Ok(match color {
            ColorType::L8 => Self::L8,
            ColorType::L16 => Self::L16,
            ColorType::La8 => Self::La8,
            ColorType::La16 => Self::La16,
            ColorType::Rgb8 => Self::Rgb8,
            ColorType::Rgb16 => Self::Rgb16,
            ColorType::Rgba8 => Self::Rgba8,
            ColorType::Rgba16 => Self::Rgba16,
            ColorType::Rgb32F => Self::Rgb32F,
            ColorType::Rgba32F => Self::Rgba32F,
            other => return Err(other),
        })
    }
}
