//! Binary footprint masks and convex polygon rasterization.

use nalgebra::Point2;

/// Row-major single-channel mask; nonzero means "inside".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x] != 0
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Inclusive bounding box `(x0, y0, x1, y1)` of the set pixels.
    pub fn bounds(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for y in 0..self.height {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            let Some(first) = row.iter().position(|&v| v != 0) else {
                continue;
            };
            let last = row.iter().rposition(|&v| v != 0).unwrap_or(first);
            bounds = Some(match bounds {
                None => (first, y, last, y),
                Some((x0, y0, x1, _)) => (x0.min(first), y0, x1.max(last), y),
            });
        }
        bounds
    }
}

/// True when `poly` is a strictly convex polygon with non-negligible area.
///
/// Rejects coincident and collinear vertices as well as self-intersecting
/// (bow-tie) quads, in either winding.
pub fn is_strictly_convex(poly: &[Point2<f64>], min_area: f64) -> bool {
    let n = poly.len();
    if n < 3 || poly.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return false;
    }

    let mut sign = 0.0_f64;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let c = poly[(i + 2) % n];
        let cross = (b - a).perp(&(c - b));
        if cross.abs() <= f64::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }

    // Turning consistently but winding more than once: a star, not a convex polygon.
    let mut turning = 0.0_f64;
    for i in 0..n {
        let e0 = poly[(i + 1) % n] - poly[i];
        let e1 = poly[(i + 2) % n] - poly[(i + 1) % n];
        turning += e0.perp(&e1).atan2(e0.dot(&e1));
    }
    if (turning.abs() - std::f64::consts::TAU).abs() > 1e-6 {
        return false;
    }

    polygon_area(poly).abs() >= min_area
}

/// Signed shoelace area.
pub fn polygon_area(poly: &[Point2<f64>]) -> f64 {
    let n = poly.len();
    let mut acc = 0.0;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

pub fn round_polygon(poly: &[Point2<f64>]) -> Vec<Point2<i32>> {
    poly.iter()
        .map(|p| Point2::new(p.x.round() as i32, p.y.round() as i32))
        .collect()
}

/// Scanline fill of a convex polygon on the integer pixel lattice.
///
/// Each row covers the inclusive span between the polygon's left and right
/// edges; pixels outside the mask bounds are clipped.
pub fn fill_convex_polygon(mask: &mut Mask, poly: &[Point2<i32>], value: u8) {
    if poly.is_empty() || mask.width == 0 || mask.height == 0 {
        return;
    }
    // Edge deltas between saturated i32 corners overflow i32.
    let poly: Vec<Point2<i64>> = poly
        .iter()
        .map(|p| Point2::new(i64::from(p.x), i64::from(p.y)))
        .collect();
    let y_min = poly.iter().map(|p| p.y).min().unwrap_or(0).max(0);
    let y_max = poly
        .iter()
        .map(|p| p.y)
        .max()
        .unwrap_or(-1)
        .min(mask.height as i64 - 1);

    let n = poly.len();
    for y in y_min..=y_max {
        let mut left = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        for i in 0..n {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            let (lo, hi) = if a.y <= b.y { (a, b) } else { (b, a) };
            if y < lo.y || y > hi.y {
                continue;
            }
            if lo.y == hi.y {
                left = left.min(lo.x.min(hi.x) as f64);
                right = right.max(lo.x.max(hi.x) as f64);
            } else {
                let num = (y - lo.y) as f64 * (hi.x - lo.x) as f64;
                let x = lo.x as f64 + num / (hi.y - lo.y) as f64;
                left = left.min(x);
                right = right.max(x);
            }
        }
        if left > right {
            continue;
        }
        let x0 = (left.ceil() as i64).max(0);
        let x1 = (right.floor() as i64).min(mask.width as i64 - 1);
        if x0 > x1 {
            continue;
        }
        let row = y as usize * mask.width;
        mask.data[row + x0 as usize..=row + x1 as usize].fill(value);
    }
}
