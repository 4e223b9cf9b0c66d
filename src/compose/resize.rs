//! Resize Manager: bounded downscaling for inference and restoration afterwards

use crate::error::{BgRemovalError, Result};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use log::debug;

/// Default ceiling on the longest image side fed to segmentation
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Output of [`ResizeManager::downscale`]
#[derive(Debug, Clone)]
pub struct Downscaled {
    pub image: DynamicImage,
    /// Scale factor applied (1.0 when no downscale happened)
    pub ratio: f64,
    /// Original `(width, height)`
    pub original: (u32, u32),
}

impl Downscaled {
    #[must_use]
    pub fn was_resized(&self) -> bool {
        self.image.width() != self.original.0 || self.image.height() != self.original.1
    }
}

/// Downscales images above a configured ceiling and restores them afterwards
#[derive(Debug, Clone, Copy)]
pub struct ResizeManager {
    max_dimension: u32,
}

impl Default for ResizeManager {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ResizeManager {
    /// # Errors
    /// - `max_dimension` is zero
    pub fn new(max_dimension: u32) -> Result<Self> {
        if max_dimension == 0 {
            return Err(BgRemovalError::config_value_error(
                "max dimension",
                max_dimension,
                "1-16384",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }
        Ok(Self { max_dimension })
    }

    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Target size for an image, preserving the aspect ratio
    ///
    /// Returns the input size when the longest side already fits.
    #[must_use]
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32, f64) {
        if width.max(height) <= self.max_dimension {
            return (width, height, 1.0);
        }

        let max = f64::from(self.max_dimension);
        let ratio = (max / f64::from(width)).min(max / f64::from(height));
        let scaled = |side: u32| ((f64::from(side) * ratio).round() as u32).clamp(1, self.max_dimension);
        (scaled(width), scaled(height), ratio)
    }

    /// Shrink the image so its longest side is at most the ceiling
    #[must_use]
    pub fn downscale(&self, image: DynamicImage) -> Downscaled {
        let original = (image.width(), image.height());
        let (width, height, ratio) = self.target_size(original.0, original.1);

        if (width, height) == original {
            return Downscaled {
                image,
                ratio: 1.0,
                original,
            };
        }

        debug!(
            "📐 Downscaling {}x{} -> {}x{} (ratio {:.4})",
            original.0, original.1, width, height, ratio
        );
        Downscaled {
            image: resample(&image, width, height),
            ratio,
            original,
        }
    }

    /// Resample back to the original size; a no-op when the size already matches
    #[must_use]
    pub fn restore(&self, image: DynamicImage, width: u32, height: u32) -> DynamicImage {
        if image.width() == width && image.height() == height {
            return image;
        }
        debug!(
            "📐 Restoring {}x{} -> {}x{}",
            image.width(),
            image.height(),
            width,
            height
        );
        resample(&image, width, height)
    }
}

/// Lanczos3 resample; images with alpha are resampled premultiplied
fn resample(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    match image {
        DynamicImage::ImageRgba8(rgba) => {
            let premultiplied = premultiply(rgba);
            let resized =
                image::imageops::resize(&premultiplied, width, height, FilterType::Lanczos3);
            DynamicImage::ImageRgba8(unpremultiply(resized))
        },
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            resample(&DynamicImage::ImageRgba8(rgba), width, height)
        },
        other => other.resize_exact(width, height, FilterType::Lanczos3),
    }
}

fn premultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in 0..3 {
            pixel[channel] = ((u16::from(pixel[channel]) * alpha + 127) / 255) as u8;
        }
    }
    out
}

fn unpremultiply(mut image: RgbaImage) -> RgbaImage {
    for pixel in image.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        if alpha == 0 {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
            continue;
        }
        for channel in 0..3 {
            let value = (u16::from(pixel[channel]) * 255 + alpha / 2) / alpha;
            pixel[channel] = value.min(255) as u8;
        }
    }
    image
}
