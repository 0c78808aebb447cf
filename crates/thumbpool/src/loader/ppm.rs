use crate::{DecodeError, ImageHeader, ImageLoader, ImageSize, PixelFormat};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Longest header word accepted before the file is rejected.
const MAX_WORD_LEN: usize = 64;

/// How a NetPBM file stores its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PpmData {
    /// `P1`-`P3`: whitespace separated decimal samples.
    Ascii,
    /// `P4`-`P6`: packed big-endian samples.
    Binary,
}

impl PpmData {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Binary => "binary",
        }
    }
}

/// Reads NetPBM (`.pbm`, `.pgm`, `.ppm`, `.pnm`) headers.
///
/// Bitmaps (`P1`, `P4`) are reported as 8-bit luminance. Other types are 8 or
/// 16 bits deep depending on whether the maximum sample value reaches 256.
/// For binary files the remaining byte count must cover the pixel data, so a
/// truncated file fails here rather than later in a decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PpmLoader;

impl ImageLoader for PpmLoader {
    fn open_header(&self, path: &Path) -> Result<ImageHeader, DecodeError> {
        let io_err = |source: io::Error| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();
        let mut reader = HeaderReader::new(BufReader::new(file));
        read_header(path, &mut reader, file_len)
    }
}

fn read_header<R: Read>(
    path: &Path,
    reader: &mut HeaderReader<R>,
    file_len: u64,
) -> Result<ImageHeader, DecodeError> {
    let read_err = |reason: String| DecodeError::Read {
        path: path.to_path_buf(),
        reason,
    };
    let io_err = |source: io::Error| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut magic = [0_u8; 2];
    for byte in &mut magic {
        *byte = reader
            .next_byte()
            .map_err(io_err)?
            .ok_or_else(|| read_err("file too short for a signature".into()))?;
    }
    if magic[0] != b'P' {
        return Err(DecodeError::Unrecognized {
            path: path.to_path_buf(),
        });
    }
    let ppm_type = match magic[1] {
        b @ b'1'..=b'6' => b - b'0',
        other => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("NetPBM type P{}", char::from(other).escape_default()),
            });
        }
    };

    let mut number = |name: &str| -> Result<u32, DecodeError> {
        let word = reader
            .word()
            .map_err(io_err)?
            .ok_or_else(|| read_err(format!("missing {name}")))?;
        word.parse::<u32>()
            .map_err(|_| read_err(format!("invalid {name} {word:?}")))
    };

    let width = number("width")?;
    let height = number("height")?;
    let is_bitmap = matches!(ppm_type, 1 | 4);
    let max_value = if is_bitmap { None } else { Some(number("maximum value")?) };

    if width == 0 || height == 0 {
        return Err(read_err(format!("empty image {width}x{height}")));
    }

    let bit_depth: u8 = match max_value {
        None => 1,
        Some(max) if max == 0 || max > u32::from(u16::MAX) => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                reason: format!("maximum value {max}"),
            });
        }
        Some(max) if max < 256 => 8,
        Some(_) => 16,
    };
    let channels: u8 = match ppm_type {
        3 | 6 => 3,
        _ => 1,
    };
    let pixel = PixelFormat::from_integer(channels, bit_depth.max(8)).ok_or_else(|| {
        DecodeError::Unsupported {
            path: path.to_path_buf(),
            reason: format!("{channels} channels at {bit_depth} bits"),
        }
    })?;
    let data = if ppm_type <= 3 {
        PpmData::Ascii
    } else {
        PpmData::Binary
    };

    if data == PpmData::Binary {
        let needed = binary_byte_count(width, height, channels, bit_depth)
            .ok_or_else(|| read_err("image dimensions overflow".into()))?;
        let available = file_len.saturating_sub(reader.position());
        if available < needed {
            return Err(read_err(format!(
                "pixel data truncated ({available} of {needed} bytes)"
            )));
        }
    }

    let mut header = ImageHeader::new(path, ImageSize::new(width, height), pixel)
        .with_tag("format", "PPM")
        .with_tag("type", format!("P{ppm_type}"))
        .with_tag("data", data.as_str())
        .with_tag("bit_depth", bit_depth.to_string());
    if let Some(max) = max_value {
        header = header.with_tag("max_value", max.to_string());
    }
    Ok(header)
}

/// Bytes of packed pixel data, or `None` if the count does not fit in a `u64`.
fn binary_byte_count(width: u32, height: u32, channels: u8, bit_depth: u8) -> Option<u64> {
    let (width, height) = (u64::from(width), u64::from(height));
    if bit_depth == 1 {
        width.div_ceil(8).checked_mul(height)
    } else {
        width
            .checked_mul(height)?
            .checked_mul(u64::from(channels))?
            .checked_mul(u64::from(bit_depth / 8))
    }
}

/// Byte-at-a-time reader that tracks how far into the file it is.
struct HeaderReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> HeaderReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0_u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads the next whitespace-delimited word, skipping `#` comments.
    ///
    /// The single whitespace byte that ends the word is consumed, which leaves
    /// the reader at the first pixel byte after the last header word.
    fn word(&mut self) -> io::Result<Option<String>> {
        let mut word = String::new();
        let mut in_comment = false;
        while let Some(byte) = self.next_byte()? {
            if in_comment {
                in_comment = byte != b'\n' && byte != b'\r';
                continue;
            }
            match byte {
                b'#' if word.is_empty() => in_comment = true,
                b if b.is_ascii_whitespace() => {
                    if !word.is_empty() {
                        return Ok(Some(word));
                    }
                }
                b => {
                    if word.len() >= MAX_WORD_LEN {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "header word too long",
                        ));
                    }
                    word.push(char::from(b));
                }
            }
        }
        Ok((!word.is_empty()).then_some(word))
    }
}
