//! RGB sampling, masked perspective warp and hard-cut compositing.

use augmented_museum_core::{Homography, Mask};
use image::{Rgb, RgbImage};
use nalgebra::Point2;

#[inline]
fn get_rgb(src: &RgbImage, x: i64, y: i64) -> [f32; 3] {
    // Replicate the edge so the footprint boundary never picks up black.
    let x = x.clamp(0, src.width() as i64 - 1) as u32;
    let y = y.clamp(0, src.height() as i64 - 1) as u32;
    let p = src.get_pixel(x, y).0;
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Bilinear sample with integer coordinates at pixel centres.
///
/// Coordinates more than one pixel outside the image sample as black.
#[inline]
pub fn sample_bilinear_rgb(src: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = (src.width() as f64, src.height() as f64);
    if w == 0.0 || h == 0.0 || x < -1.0 || y < -1.0 || x > w || y > h || !x.is_finite() {
        return Rgb([0, 0, 0]);
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = get_rgb(src, x0, y0);
    let p10 = get_rgb(src, x0 + 1, y0);
    let p01 = get_rgb(src, x0, y0 + 1);
    let p11 = get_rgb(src, x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Warp `src` into a `mask`-sized buffer: for each masked destination pixel,
/// map back through `h_src_from_dst` and sample. Unmasked pixels stay black.
pub fn warp_perspective_rgb_masked(
    src: &RgbImage,
    h_src_from_dst: &Homography,
    mask: &Mask,
) -> RgbImage {
    let mut out = RgbImage::new(mask.width as u32, mask.height as u32);
    let Some((x0, y0, x1, y1)) = mask.bounds() else {
        return out;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            if !mask.is_set(x, y) {
                continue;
            }
            let ps = h_src_from_dst.apply(Point2::new(x as f64, y as f64));
            out.put_pixel(x as u32, y as u32, sample_bilinear_rgb(src, ps.x, ps.y));
        }
    }
    out
}

/// Copy masked pixels of `warped` into `dest`. Returns the number replaced.
pub fn composite_masked(dest: &mut RgbImage, warped: &RgbImage, mask: &Mask) -> usize {
    let Some((x0, y0, x1, y1)) = mask.bounds() else {
        return 0;
    };
    let mut replaced = 0;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if mask.is_set(x, y) {
                dest.put_pixel(x as u32, y as u32, *warped.get_pixel(x as u32, y as u32));
                replaced += 1;
            }
        }
    }
    replaced
}
