use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector2, Vector3};

/// Planar projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity that moves the centroid to the origin and scales the mean
/// distance from it to sqrt(2).
struct Conditioner {
    t: Matrix3<f64>,
}

impl Conditioner {
    fn fit(pts: &[Point2<f64>]) -> Self {
        let n = pts.len() as f64;
        let centroid = pts.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / n;
        let spread = pts.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;
        let s = if spread > 1e-12 {
            std::f64::consts::SQRT_2 / spread
        } else {
            1.0
        };
        let t = Matrix3::new(
            s, 0.0, -s * centroid.x, //
            0.0, s, -s * centroid.y, //
            0.0, 0.0, 1.0,
        );
        Self { t }
    }

    fn map(&self, p: &Point2<f64>) -> Point2<f64> {
        let v = self.t * p.to_homogeneous();
        Point2::new(v.x, v.y)
    }

    /// `T_dst^{-1} * hn * T_src`, scaled so `h33 = 1`.
    fn undo(src: &Self, dst: &Self, hn: Matrix3<f64>) -> Option<Matrix3<f64>> {
        let h = dst.t.try_inverse()? * hn * src.t;
        let s = h[(2, 2)];
        if s.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(h / s)
    }
}

/// The two DLT rows `[x y 1 0 0 0 -ux -uy -u]` and `[0 0 0 x y 1 -vx -vy -v]`
/// for one correspondence `(x, y) -> (u, v)`.
fn constraint_rows(p: Point2<f64>, q: Point2<f64>) -> [[f64; 9]; 2] {
    let (x, y, u, v) = (p.x, p.y, q.x, q.y);
    [
        [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
        [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
    ]
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular (coincident or collinear points) or the
/// result does not normalize.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    let cs = Conditioner::fit(src);
    let cd = Conditioner::fit(dst);

    // Fix h33 = 1 and move its column to the right-hand side.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in src.iter().zip(dst).enumerate() {
        for (j, row) in constraint_rows(cs.map(p), cd.map(q)).iter().enumerate() {
            let r = 2 * k + j;
            for c in 0..8 {
                a[(r, c)] = row[c];
            }
            b[r] = -row[8];
        }
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    // Collinear or repeated points leave hn (near) rank deficient.
    let scale = hn.norm();
    if !scale.is_finite() || hn.determinant().abs() < 1e-9 * scale.powi(3) {
        return None;
    }

    Conditioner::undo(&cs, &cd, hn).map(Homography::new)
}

/// Corners of a `w × h` pixel rectangle in TL, TR, BR, BL order.
pub fn rect_corners(w: f64, h: f64) -> [Point2<f64>; 4] {
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tilted() -> Homography {
        Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    #[test]
    fn inverse_maps_points_back() {
        let h = tilted();
        let inv = h.inverse().expect("invertible");
        for p in [Point2::new(0.0, 0.0), Point2::new(50.0, -20.0), Point2::new(320.0, 200.0)] {
            let back = inv.apply(h.apply(p));
            assert_relative_eq!(back.coords, p.coords, epsilon = 1e-9);
        }
    }

    #[test]
    fn four_corners_recover_known_warp() {
        let truth = tilted();
        let rect = rect_corners(180.0, 130.0);
        let dst = rect.map(|p| truth.apply(p));

        let h = homography_from_4pt(&rect, &dst).expect("recoverable");
        assert_relative_eq!(h.h, truth.h, epsilon = 1e-9, max_relative = 1e-6);
        assert_relative_eq!(
            h.apply(Point2::new(60.0, 40.0)).coords,
            truth.apply(Point2::new(60.0, 40.0)).coords,
            epsilon = 1e-6
        );
    }

    #[test]
    fn degenerate_destinations_are_rejected() {
        let rect = rect_corners(100.0, 50.0);
        let coincident = [Point2::new(40.0, 40.0); 4];
        let collinear = [0.0, 10.0, 20.0, 30.0].map(|t| Point2::new(t, t));
        assert!(homography_from_4pt(&rect, &coincident).is_none());
        assert!(homography_from_4pt(&rect, &collinear).is_none());
    }
}
