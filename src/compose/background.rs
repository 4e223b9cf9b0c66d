//! Background Synthesizer: solid and gradient backdrops

use crate::types::{Backdrop, Color, GradientSpec};
use image::{Rgb, RgbImage};

/// Builds opaque backdrops at a requested size
pub struct BackgroundSynthesizer;

impl BackgroundSynthesizer {
    /// Uniform backdrop of a single color
    #[must_use]
    pub fn solid(width: u32, height: u32, color: Color) -> RgbImage {
        RgbImage::from_pixel(width, height, color.to_rgb())
    }

    /// Vertical linear gradient
    ///
    /// Row `y` gets `start * (1 - t) + end * t` with `t = y / height`, truncated
    /// per channel. Every pixel in a row has the same color, so the last row is
    /// one step short of `end`.
    #[must_use]
    pub fn gradient(width: u32, height: u32, spec: GradientSpec) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        if height == 0 {
            return image;
        }

        for (y, row) in image.rows_mut().enumerate() {
            let t = y as f64 / f64::from(height);
            let color = Rgb([
                lerp(spec.start.r, spec.end.r, t),
                lerp(spec.start.g, spec.end.g, t),
                lerp(spec.start.b, spec.end.b, t),
            ]);
            for pixel in row {
                *pixel = color;
            }
        }
        image
    }

    /// Backdrop for the resolved background, `None` for transparent output
    #[must_use]
    pub fn synthesize(width: u32, height: u32, backdrop: &Backdrop) -> Option<RgbImage> {
        match backdrop {
            Backdrop::Transparent => None,
            Backdrop::Solid(color) => Some(Self::solid(width, height, *color)),
            Backdrop::Gradient(spec) => Some(Self::gradient(width, height, *spec)),
        }
    }
}

fn lerp(start: u8, end: u8, t: f64) -> u8 {
    (f64::from(start) * (1.0 - t) + f64::from(end) * t) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_to_white() -> GradientSpec {
        GradientSpec {
            start: Color::BLACK,
            end: Color::WHITE,
        }
    }

    #[test]
    fn test_solid_fills_every_pixel() {
        let color = Color::new(12, 34, 56);
        let image = BackgroundSynthesizer::solid(7, 3, color);
        assert_eq!(image.dimensions(), (7, 3));
        assert!(image.pixels().all(|p| *p == Rgb([12, 34, 56])));
    }

    #[test]
    fn test_gradient_endpoints() {
        let image = BackgroundSynthesizer::gradient(4, 256, black_to_white());
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        // t = 255/256 truncates to 254
        assert_eq!(*image.get_pixel(0, 255), Rgb([254, 254, 254]));
    }

    #[test]
    fn test_gradient_rows_are_uniform_and_monotonic() {
        let image = BackgroundSynthesizer::gradient(5, 100, black_to_white());
        let mut previous = 0u8;
        for y in 0..100 {
            let first = image.get_pixel(0, y)[0];
            assert!((1..5).all(|x| image.get_pixel(x, y)[0] == first));
            assert!(first >= previous);
            previous = first;
        }
    }

    #[test]
    fn test_gradient_default_colors() {
        let spec = GradientSpec {
            start: Color::new(0x66, 0x7E, 0xEA),
            end: Color::new(0x76, 0x4B, 0xA2),
        };
        let image = BackgroundSynthesizer::gradient(1, 10, spec);
        assert_eq!(*image.get_pixel(0, 0), Rgb([0x66, 0x7E, 0xEA]));
        // Row 5: t = 0.5
        assert_eq!(*image.get_pixel(0, 5), Rgb([110, 100, 198]));
    }

    #[test]
    fn test_gradient_truncates_in_double_precision() {
        let spec = GradientSpec {
            start: Color::new(247, 0, 0),
            end: Color::new(117, 0, 0),
        };
        let image = BackgroundSynthesizer::gradient(1, 10, spec);
        // 247 * 0.9 + 117 * 0.1 lands a hair under 234 in single precision
        assert_eq!(image.get_pixel(0, 1)[0], 234);
    }

    #[test]
    fn test_synthesize_dispatch() {
        assert!(BackgroundSynthesizer::synthesize(2, 2, &Backdrop::Transparent).is_none());
        let solid = BackgroundSynthesizer::synthesize(2, 2, &Backdrop::Solid(Color::WHITE)).unwrap();
        assert_eq!(*solid.get_pixel(1, 1), Rgb([255, 255, 255]));
        let gradient =
            BackgroundSynthesizer::synthesize(2, 2, &Backdrop::Gradient(black_to_white())).unwrap();
        assert_eq!(*gradient.get_pixel(0, 1), Rgb([127, 127, 127]));
    }
}
