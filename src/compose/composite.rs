//! Compositor: alpha blending of a foreground layer onto a backdrop

use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Alpha compositing primitives
pub struct Compositor;

impl Compositor {
    /// Blend an RGBA foreground onto an opaque backdrop at `offset`
    ///
    /// Each channel is `(fg * a + bg * (255 - a) + 127) / 255`, which is exact at
    /// `a = 0` and `a = 255`. Pixels outside the foreground placement keep the
    /// backdrop color. Negative offsets and partial overlap are allowed.
    #[must_use]
    pub fn composite_over(backdrop: &RgbImage, foreground: &RgbaImage, offset: (i64, i64)) -> RgbImage {
        let mut out = backdrop.clone();
        for_each_overlap(out.dimensions(), foreground.dimensions(), offset, |dx, dy, sx, sy| {
            let fg = foreground.get_pixel(sx, sy);
            let alpha = u32::from(fg[3]);
            if alpha == 0 {
                return;
            }
            let bg = out.get_pixel(dx, dy);
            let blend = |f: u8, b: u8| {
                ((u32::from(f) * alpha + u32::from(b) * (255 - alpha) + 127) / 255) as u8
            };
            let blended = Rgb([blend(fg[0], bg[0]), blend(fg[1], bg[1]), blend(fg[2], bg[2])]);
            out.put_pixel(dx, dy, blended);
        });
        out
    }

    /// Porter-Duff "over" of `source` onto `destination` at `offset`
    ///
    /// Both layers may be translucent; blending happens on premultiplied values.
    #[must_use]
    pub fn alpha_composite(
        destination: &RgbaImage,
        source: &RgbaImage,
        offset: (i64, i64),
    ) -> RgbaImage {
        let mut out = destination.clone();
        for_each_overlap(out.dimensions(), source.dimensions(), offset, |dx, dy, sx, sy| {
            let src = source.get_pixel(sx, sy);
            if src[3] == 0 {
                return;
            }
            let blended = over(*src, *out.get_pixel(dx, dy));
            out.put_pixel(dx, dy, blended);
        });
        out
    }
}

/// Flatten an RGBA image onto an opaque color
#[must_use]
pub fn flatten_onto(image: &RgbaImage, color: Rgb<u8>) -> RgbImage {
    let backdrop = RgbImage::from_pixel(image.width(), image.height(), color);
    Compositor::composite_over(&backdrop, image, (0, 0))
}

fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let src_alpha = f32::from(src[3]) / 255.0;
    let dst_alpha = f32::from(dst[3]) / 255.0;
    let out_alpha = src_alpha + dst_alpha * (1.0 - src_alpha);
    if out_alpha <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |s: u8, d: u8| {
        let premultiplied =
            f32::from(s) * src_alpha + f32::from(d) * dst_alpha * (1.0 - src_alpha);
        (premultiplied / out_alpha).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Visit every destination pixel covered by a layer placed at `offset`
///
/// The callback receives destination then source coordinates.
fn for_each_overlap<F>(destination: (u32, u32), layer: (u32, u32), offset: (i64, i64), mut visit: F)
where
    F: FnMut(u32, u32, u32, u32),
{
    let (dst_w, dst_h) = (i64::from(destination.0), i64::from(destination.1));
    let (src_w, src_h) = (i64::from(layer.0), i64::from(layer.1));
    let (ox, oy) = offset;

    let x_start = ox.max(0);
    let y_start = oy.max(0);
    let x_end = (ox + src_w).min(dst_w);
    let y_end = (oy + src_h).min(dst_h);

    for dy in y_start..y_end {
        for dx in x_start..x_end {
            visit(dx as u32, dy as u32, (dx - ox) as u32, (dy - oy) as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_foreground_replaces_backdrop() {
        let backdrop = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let foreground = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]));
        let out = Compositor::composite_over(&backdrop, &foreground, (0, 0));
        assert!(out.pixels().all(|p| *p == Rgb([200, 100, 50])));
    }

    #[test]
    fn test_transparent_foreground_keeps_backdrop() {
        let backdrop = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let foreground = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        let out = Compositor::composite_over(&backdrop, &foreground, (0, 0));
        assert!(out.pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn test_half_alpha_blend_rounds() {
        let backdrop = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let foreground = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        let out = Compositor::composite_over(&backdrop, &foreground, (0, 0));
        // (255 * 128 + 127) / 255 = 128
        assert_eq!(*out.get_pixel(0, 0), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_offset_placement_clips_at_edges() {
        let backdrop = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let foreground = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));

        let out = Compositor::composite_over(&backdrop, &foreground, (3, -1));
        assert_eq!(*out.get_pixel(3, 0), Rgb([255, 0, 0]));
        assert_eq!(*out.get_pixel(2, 0), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(3, 1), Rgb([0, 0, 0]));

        // Entirely outside
        let out = Compositor::composite_over(&backdrop, &foreground, (10, 10));
        assert_eq!(out, backdrop);
    }

    #[test]
    fn test_alpha_composite_over_transparent_destination() {
        let destination = RgbaImage::new(2, 2);
        let source = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 80]));
        let out = Compositor::alpha_composite(&destination, &source, (0, 0));
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 80]));
    }

    #[test]
    fn test_alpha_composite_translucent_layers() {
        let destination = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let source = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let out = Compositor::alpha_composite(&destination, &source, (0, 0));
        let pixel = out.get_pixel(0, 0);
        assert_eq!(pixel[3], 255);
        assert!((126..=128).contains(&pixel[0]));
    }

    #[test]
    fn test_flatten_onto_white() {
        let image = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([0, 0, 255, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let flat = flatten_onto(&image, Rgb([255, 255, 255]));
        assert_eq!(*flat.get_pixel(0, 0), Rgb([0, 0, 255]));
        assert_eq!(*flat.get_pixel(1, 0), Rgb([255, 255, 255]));
    }
}
