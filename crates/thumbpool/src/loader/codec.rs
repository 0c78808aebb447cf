use crate::{DecodeError, ImageHeader, ImageLoader, ImageSize, PixelFormat};
use image::{ImageDecoder, ImageReader};
use std::path::Path;

/// Reads headers through the `image` crate.
///
/// The format is sniffed from the file's leading bytes, falling back to the
/// extension, and only the decoder's header is consulted; no pixels are read.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecLoader;

impl ImageLoader for CodecLoader {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        let io_err = |source: std::io::Error| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = ImageReader::open(path)
            .map_err(io_err)?
            .with_guessed_format()
            .map_err(io_err)?;
        let Some(format) = reader.format() else {
            return Err(DecodeError::Unrecognized {
                path: path.to_path_buf(),
            });
        };

        let decoder = reader.into_decoder().map_err(|source| DecodeError::Codec {
            path: path.to_path_buf(),
            source,
        })?;
        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();
        let pixel = PixelFormat::try_from(color).map_err(|color| DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: format!("color type {color:?}"),
        })?;

        Ok(ImageHeader::new(path, ImageSize::new(width, height), pixel)
            .with_tag("format", format!("{format:?}").to_uppercase())
            .with_tag("mime_type", format.to_mime_type())
            .with_tag("bit_depth", pixel.bit_depth().to_string()))
    }
}
