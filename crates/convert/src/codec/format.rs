//! Target formats and their encoders.

use crate::config::{validate_quality, ConfigError};
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, Frame};
use std::fmt;
use std::io::Write;
use thiserror::Error;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The codec rejected the image
    #[error("{0}")]
    Image(#[from] image::ImageError),

    /// IO error while writing encoded bytes
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes a decoded image into one target format.
///
/// Implementations are shared by every worker of a batch, so they must be
/// `Send + Sync` and must not keep per-image state.
pub trait FormatEncoder: Send + Sync {
    /// Extension given to destination files, without the leading dot.
    fn extension(&self) -> &str;

    /// Write `image` to `writer` in this format.
    fn encode(&self, image: &DynamicImage, writer: &mut dyn Write) -> Result<(), EncodeError>;
}

/// Built-in output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Bmp,
    Png,
    Gif,
    /// JPEG at the given quality (1-100)
    Jpeg { quality: u8 },
}

impl TargetFormat {
    /// JPEG target, rejecting qualities outside 1..=100
    pub fn jpeg(quality: i64) -> Result<Self, ConfigError> {
        let quality = validate_quality(quality)?;
        Ok(TargetFormat::Jpeg { quality })
    }

    /// Destination file extension
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Bmp => "bmp",
            TargetFormat::Png => "png",
            TargetFormat::Gif => "gif",
            TargetFormat::Jpeg { .. } => "jpg",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFormat::Jpeg { quality } => write!(f, "jpg (quality {})", quality),
            other => f.write_str(other.extension()),
        }
    }
}

impl FormatEncoder for TargetFormat {
    fn extension(&self) -> &str {
        TargetFormat::extension(self)
    }

    fn encode(&self, image: &DynamicImage, mut writer: &mut dyn Write) -> Result<(), EncodeError> {
        match *self {
            TargetFormat::Png => image.write_with_encoder(PngEncoder::new(writer))?,
            TargetFormat::Jpeg { quality } => {
                // JPEG carries no alpha channel
                let encoder = JpegEncoder::new_with_quality(writer, quality);
                match image.color() {
                    ColorType::L8 | ColorType::Rgb8 => image.write_with_encoder(encoder)?,
                    _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?,
                }
            }
            TargetFormat::Bmp => {
                let encoder = BmpEncoder::new(&mut writer);
                match image.color() {
                    ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
                        image.write_with_encoder(encoder)?
                    }
                    _ => DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)?,
                }
            }
            TargetFormat::Gif => {
                // The trailer is written when the encoder is dropped
                let mut encoder = GifEncoder::new(writer);
                encoder.encode_frame(Frame::new(image.to_rgba8()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_bytes;
    use image::{ImageBuffer, Luma, Rgb, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7) as u8, (y * 13) as u8, 128, 200])
        }))
    }

    fn all_formats() -> Vec<TargetFormat> {
        vec![
            TargetFormat::Bmp,
            TargetFormat::Png,
            TargetFormat::Gif,
            TargetFormat::Jpeg { quality: 90 },
        ]
    }

    fn encode_to_vec(format: TargetFormat, image: &DynamicImage) -> Vec<u8> {
        let mut out = Vec::new();
        format
            .encode(image, &mut out)
            .unwrap_or_else(|e| panic!("{} encode failed: {}", format, e));
        out
    }

    #[test]
    fn test_extensions() {
        assert_eq!(TargetFormat::Bmp.extension(), "bmp");
        assert_eq!(TargetFormat::Png.extension(), "png");
        assert_eq!(TargetFormat::Gif.extension(), "gif");
        assert_eq!(TargetFormat::Jpeg { quality: 1 }.extension(), "jpg");
    }

    #[test]
    fn test_jpeg_quality_validation() {
        assert_eq!(
            TargetFormat::jpeg(75).unwrap(),
            TargetFormat::Jpeg { quality: 75 }
        );
        assert!(TargetFormat::jpeg(1).is_ok());
        assert!(TargetFormat::jpeg(100).is_ok());
        assert!(matches!(
            TargetFormat::jpeg(0),
            Err(ConfigError::InvalidQuality(0))
        ));
        assert!(matches!(
            TargetFormat::jpeg(101),
            Err(ConfigError::InvalidQuality(101))
        ));
    }

    // Lossy encoders may alter pixels but never dimensions
    #[test]
    fn test_round_trip_preserves_dimensions() {
        let source = gradient(23, 11);
        for format in all_formats() {
            let bytes = encode_to_vec(format, &source);
            let decoded = decode_bytes(&bytes)
                .unwrap_or_else(|e| panic!("{} output should decode: {}", format, e));
            assert_eq!(
                (decoded.width(), decoded.height()),
                (23, 11),
                "{} changed dimensions",
                format
            );
        }
    }

    #[test]
    fn test_encodes_other_color_types() {
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(4, 4, Luma([90u8])));
        let wide = DynamicImage::ImageRgb16(ImageBuffer::from_pixel(4, 4, Rgb([1000u16, 2, 3])));
        for format in all_formats() {
            for image in [&gray, &wide] {
                let bytes = encode_to_vec(format, image);
                assert!(decode_bytes(&bytes).is_ok(), "{} output unreadable", format);
            }
        }
    }

    #[test]
    fn test_png_output_has_png_signature() {
        let bytes = encode_to_vec(TargetFormat::Png, &gradient(2, 2));
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_display() {
        assert_eq!(TargetFormat::Gif.to_string(), "gif");
        assert_eq!(TargetFormat::Jpeg { quality: 80 }.to_string(), "jpg (quality 80)");
    }
}
