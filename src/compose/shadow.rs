//! Shadow Renderer: soft drop shadow derived from the foreground alpha

use crate::{
    compose::composite::Compositor,
    error::{BgRemovalError, Result},
    types::{FallbackReason, ShadowSpec, StageOutcome},
};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use log::{debug, warn};

/// Renders a drop shadow beneath a foreground on an opaque backdrop
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowRenderer {
    spec: ShadowSpec,
}

impl ShadowRenderer {
    #[must_use]
    pub fn new(spec: ShadowSpec) -> Self {
        Self { spec }
    }

    #[must_use]
    pub fn spec(&self) -> &ShadowSpec {
        &self.spec
    }

    /// Add a shadow under `foreground` on the backdrop-applied image
    ///
    /// Never fails: a foreground without alpha or any internal error yields
    /// `Fallback` carrying the backdrop-applied image unchanged.
    #[must_use]
    pub fn render(&self, composited: DynamicImage, foreground: &DynamicImage) -> StageOutcome<DynamicImage> {
        if !foreground.color().has_alpha() {
            debug!("🌑 Foreground has no alpha channel, skipping shadow");
            return StageOutcome::Fallback {
                value: composited,
                reason: FallbackReason::ForegroundWithoutAlpha,
            };
        }

        match self.try_render(&composited, foreground) {
            Ok(shadowed) => StageOutcome::Applied(shadowed),
            Err(e) => {
                warn!("⚠️ Shadow synthesis failed, keeping image without shadow: {}", e);
                StageOutcome::Fallback {
                    value: composited,
                    reason: FallbackReason::ShadowSynthesisFailed(e.to_string()),
                }
            },
        }
    }

    fn try_render(&self, composited: &DynamicImage, foreground: &DynamicImage) -> Result<DynamicImage> {
        if composited.width() != foreground.width() || composited.height() != foreground.height() {
            return Err(BgRemovalError::processing(format!(
                "foreground is {}x{} but backdrop is {}x{}",
                foreground.width(),
                foreground.height(),
                composited.width(),
                composited.height()
            )));
        }
        if !self.spec.blur_radius.is_finite() {
            return Err(BgRemovalError::invalid_config(format!(
                "shadow blur radius must be finite, got {}",
                self.spec.blur_radius
            )));
        }

        let foreground = foreground.to_rgba8();
        let mask = alpha_mask(&foreground);
        let shadow = self.shadow_layer(&mask);

        let base = composited.to_rgba8();
        let with_shadow = Compositor::alpha_composite(&base, &shadow, (0, 0));
        let result = Compositor::alpha_composite(&with_shadow, &foreground, (0, 0));

        Ok(DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(result).to_rgb8()))
    }

    /// Blurred, offset shadow layer for a mask, the same size as the mask
    #[must_use]
    pub fn shadow_layer(&self, mask: &GrayImage) -> RgbaImage {
        let color = self.spec.color;
        let opacity = u32::from(self.spec.opacity);

        let filled = RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            let coverage = u32::from(mask.get_pixel(x, y)[0]);
            let alpha = (opacity * coverage / 255) as u8;
            Rgba([color.r, color.g, color.b, alpha])
        });

        let blurred = if self.spec.blur_radius > 0.0 {
            image::imageops::blur(&filled, self.spec.blur_radius)
        } else {
            filled
        };

        let (dx, dy) = self.spec.offset;
        let mut layer = RgbaImage::new(mask.width(), mask.height());
        image::imageops::replace(&mut layer, &blurred, i64::from(dx), i64::from(dy));
        layer
    }
}

fn alpha_mask(foreground: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(foreground.width(), foreground.height(), |x, y| {
        Luma([foreground.get_pixel(x, y)[3]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;
    use image::{Rgb, RgbImage};

    fn square_mask(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn alpha_bbox(layer: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        let mut bbox: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in layer.enumerate_pixels() {
            if pixel[3] > 0 {
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bbox
    }

    #[test]
    fn test_unblurred_shadow_is_shifted_by_offset() {
        let renderer = ShadowRenderer::new(ShadowSpec {
            blur_radius: 0.0,
            ..ShadowSpec::default()
        });
        let layer = renderer.shadow_layer(&square_mask(100, 30, 60));

        assert_eq!(alpha_bbox(&layer), Some((35, 38, 64, 67)));
        assert_eq!(layer.get_pixel(40, 40)[3], 80);
    }

    #[test]
    fn test_blurred_shadow_is_centered_on_offset_and_falls_off() {
        let renderer = ShadowRenderer::default();
        let layer = renderer.shadow_layer(&square_mask(120, 40, 60));

        // Mask center (49.5, 49.5) shifted by (5, 8)
        let center_x = 55;
        let center_y = 58;
        let peak = layer.get_pixel(center_x, center_y)[3];
        assert!(peak > 0);
        assert!(peak <= 80);

        let mut previous = peak;
        for x in center_x + 1..120 {
            let alpha = layer.get_pixel(x, center_y)[3];
            assert!(alpha <= previous, "alpha rises at x={}", x);
            // Flank across the shifted square edge, before the quantized tail
            if (58..=80).contains(&x) {
                assert!(alpha < previous, "alpha flat at x={}", x);
            }
            previous = alpha;
        }
        // Blur spreads beyond the shifted square edge, but not past the kernel reach
        assert!(layer.get_pixel(80, center_y)[3] > 0);
        assert_eq!(layer.get_pixel(100, center_y)[3], 0);
    }

    #[test]
    fn test_blurred_shadow_moves_by_exactly_the_offset() {
        let mask = square_mask(120, 40, 60);
        let centered = ShadowRenderer::new(ShadowSpec {
            offset: (0, 0),
            ..ShadowSpec::default()
        })
        .shadow_layer(&mask);
        let shifted = ShadowRenderer::default().shadow_layer(&mask);

        let (x0, y0, x1, y1) = alpha_bbox(&centered).unwrap();
        // Blurred footprint stays clear of the canvas border
        assert!(x0 > 0 && y0 > 0 && x1 < 110 && y1 < 110);
        assert_eq!(alpha_bbox(&shifted), Some((x0 + 5, y0 + 8, x1 + 5, y1 + 8)));
    }

    #[test]
    fn test_render_darkens_backdrop_near_foreground() {
        let renderer = ShadowRenderer::new(ShadowSpec {
            blur_radius: 0.0,
            ..ShadowSpec::default()
        });
        let backdrop = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])));
        let foreground = DynamicImage::ImageRgba8(RgbaImage::from_fn(50, 50, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        }));

        let outcome = renderer.render(backdrop, &foreground);
        assert!(!outcome.is_fallback());
        let image = outcome.into_inner().to_rgb8();

        // Foreground stays on top
        assert_eq!(*image.get_pixel(15, 15), Rgb([255, 0, 0]));
        // Shadow visible below-right of the square
        assert!(image.get_pixel(22, 25)[0] < 255);
        // Untouched corner
        assert_eq!(*image.get_pixel(45, 2), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_renderer_keeps_configured_spec() {
        let spec = ShadowSpec {
            color: Color::new(20, 0, 40),
            opacity: 120,
            blur_radius: 4.0,
            offset: (-3, 2),
        };
        assert_eq!(ShadowRenderer::new(spec).spec(), &spec);
        assert_eq!(ShadowRenderer::default().spec(), &ShadowSpec::default());
    }

    #[test]
    fn test_foreground_without_alpha_falls_back() {
        let backdrop = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])));
        let foreground = DynamicImage::ImageRgb8(RgbImage::new(4, 4));

        let outcome = ShadowRenderer::default().render(backdrop, &foreground);
        assert_eq!(
            outcome.fallback_reason(),
            Some(&FallbackReason::ForegroundWithoutAlpha)
        );
        assert_eq!(*outcome.value().to_rgb8().get_pixel(0, 0), Rgb([1, 2, 3]));
    }

    #[test]
    fn test_size_mismatch_falls_back_with_original_image() {
        let backdrop = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])));
        let foreground = DynamicImage::ImageRgba8(RgbaImage::new(5, 4));

        let outcome = ShadowRenderer::default().render(backdrop, &foreground);
        assert!(matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::ShadowSynthesisFailed(_))
        ));
        assert_eq!(outcome.value().width(), 4);
    }

    #[test]
    fn test_custom_shadow_color() {
        let renderer = ShadowRenderer::new(ShadowSpec {
            color: Color::new(0, 0, 255),
            opacity: 255,
            blur_radius: 0.0,
            offset: (0, 0),
        });
        let layer = renderer.shadow_layer(&square_mask(4, 0, 4));
        assert!(layer.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));
    }
}
