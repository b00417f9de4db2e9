//! Image codecs for kelp
//!
//! Decoding detects the source format from content. Encoding is done by a
//! [`FormatEncoder`], normally one of the built-in [`TargetFormat`]s.

pub mod format;

pub use format::{EncodeError, FormatEncoder, TargetFormat};

use image::{DynamicImage, ImageReader};
use std::io::{BufRead, Cursor, Seek};
use thiserror::Error;

/// File extensions of the formats kelp can decode (lowercase, no dot).
pub const SOURCE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Error type for decoding operations
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading the header while sniffing the format failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data is corrupt or in an unsupported format
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

/// Decode an image from a seekable reader, detecting the format from its magic bytes.
pub fn decode_reader<R: BufRead + Seek>(reader: R) -> Result<DynamicImage, DecodeError> {
    let image = ImageReader::new(reader).with_guessed_format()?.decode()?;
    Ok(image)
}

/// Decode an in-memory image, detecting the format from its magic bytes.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    decode_reader(Cursor::new(bytes))
}
