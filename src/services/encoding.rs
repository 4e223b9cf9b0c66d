//! Final image encoding service
//!
//! Turns the pipeline output into PNG bytes and a `data:` URI for JSON responses.

use crate::{
    config::PngCompression,
    error::{BgRemovalError, Result},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;

/// MIME type of every encoded output
pub const PNG_MIME: &str = "image/png";

/// Service for encoding composited images
pub struct OutputEncoder;

impl OutputEncoder {
    /// Encode an image as PNG
    ///
    /// RGB and RGBA images are written as-is; other layouts are converted to RGBA.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_compose::{config::PngCompression, services::OutputEncoder};
    /// use image::{DynamicImage, RgbaImage};
    ///
    /// let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
    /// let png = OutputEncoder::encode_png(&image, PngCompression::Fast)?;
    /// assert_eq!(&png[1..4], b"PNG");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode_png(image: &DynamicImage, compression: PngCompression) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            compression_type(compression),
            FilterType::Adaptive,
        );

        match image {
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => {
                image.write_with_encoder(encoder)?;
            },
            other => {
                DynamicImage::ImageRgba8(other.to_rgba8()).write_with_encoder(encoder)?;
            },
        }

        if buffer.is_empty() {
            return Err(BgRemovalError::processing("PNG encoder produced no data"));
        }
        Ok(buffer)
    }

    /// Wrap encoded bytes in a base64 `data:` URI
    #[must_use]
    pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
    }

    /// Encode as PNG and wrap in a `data:image/png;base64,` URI
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn png_data_uri(image: &DynamicImage, compression: PngCompression) -> Result<String> {
        let png = Self::encode_png(image, compression)?;
        Ok(Self::to_data_uri(&png, PNG_MIME))
    }
}

fn compression_type(compression: PngCompression) -> CompressionType {
    match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    }
}
