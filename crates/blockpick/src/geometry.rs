//! Rotated rectangles and the planar polygon helpers behind them.

use serde::{Deserialize, Serialize};

/// Oriented rectangle in image pixels.
///
/// `angle_deg` is the direction of the `width` side measured from +x toward
/// +y (clockwise on screen). After [`RotatedRect::canonicalize`] `width` is
/// the long side and the angle lies in `[0, 180)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: [f64; 2],
    pub width: f64,
    pub height: f64,
    pub angle_deg: f64,
}

impl RotatedRect {
    pub fn new(center: [f64; 2], width: f64, height: f64, angle_deg: f64) -> Self {
        Self {
            center,
            width,
            height,
            angle_deg,
        }
    }

    /// Ensure `width >= height`, swapping and adding 90° when needed.
    pub fn canonicalize(self) -> Self {
        let mut r = self;
        if r.width < r.height {
            std::mem::swap(&mut r.width, &mut r.height);
            r.angle_deg += 90.0;
        }
        r.angle_deg = r.angle_deg.rem_euclid(180.0);
        r
    }

    pub fn long_side(&self) -> f64 {
        self.width.max(self.height)
    }

    pub fn short_side(&self) -> f64 {
        self.width.min(self.height)
    }

    /// Long side over short side; infinite for a degenerate short side.
    pub fn aspect_ratio(&self) -> f64 {
        let short = self.short_side();
        if short > 0.0 {
            self.long_side() / short
        } else {
            f64::INFINITY
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Unit vectors along the `width` and `height` sides.
    pub fn axes(&self) -> ([f64; 2], [f64; 2]) {
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        ([c, s], [-s, c])
    }

    /// The four box points, in order around the rectangle.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        let (u, v) = self.axes();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let at = |a: f64, b: f64| {
            [
                self.center[0] + u[0] * a + v[0] * b,
                self.center[1] + u[1] * a + v[1] * b,
            ]
        };
        [at(-hw, -hh), at(hw, -hh), at(hw, hh), at(-hw, hh)]
    }
}

/// Absolute polygon area by the shoelace formula.
pub fn polygon_area(points: &[[f64; 2]]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    acc.abs() / 2.0
}

/// Minimum-area enclosing rectangle of a convex polygon (rotating calipers).
///
/// Works on sub-pixel `f64` points; `imageproc::geometry::min_area_rect`
/// only takes integer points. The hull must be given in order around its
/// boundary. The returned rectangle has its angle normalized into `[0, 90)`;
/// call
/// [`RotatedRect::canonicalize`] to make `width` the long side.
pub fn min_area_rect(hull: &[[f64; 2]]) -> Option<RotatedRect> {
    match hull.len() {
        0 => return None,
        1 => return Some(RotatedRect::new(hull[0], 0.0, 0.0, 0.0)),
        _ => {}
    }

    let n = hull.len();
    let mut best: Option<(f64, RotatedRect)> = None;
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = dx.hypot(dy);
        if len < 1e-12 {
            continue;
        }
        let e = [dx / len, dy / len];
        let m = [-e[1], e[0]];

        let (mut min_e, mut max_e) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_m, mut max_m) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in hull {
            let pe = p[0] * e[0] + p[1] * e[1];
            let pm = p[0] * m[0] + p[1] * m[1];
            min_e = min_e.min(pe);
            max_e = max_e.max(pe);
            min_m = min_m.min(pm);
            max_m = max_m.max(pm);
        }
        let width = max_e - min_e;
        let height = max_m - min_m;
        let area = width * height;
        if best.as_ref().is_some_and(|(a, _)| *a <= area) {
            continue;
        }
        let ce = (min_e + max_e) / 2.0;
        let cm = (min_m + max_m) / 2.0;
        let center = [e[0] * ce + m[0] * cm, e[1] * ce + m[1] * cm];
        let angle = e[1].atan2(e[0]).to_degrees();
        best = Some((area, RotatedRect::new(center, width, height, angle)));
    }

    let (_, rect) = best?;
    Some(normalize_quarter_turn(rect))
}

/// Rotate the rectangle's frame by quarter turns until the angle is in
/// `[0, 90)`. Each quarter turn swaps width and height.
fn normalize_quarter_turn(mut r: RotatedRect) -> RotatedRect {
    while r.angle_deg < 0.0 {
        r.angle_deg += 90.0;
        std::mem::swap(&mut r.width, &mut r.height);
    }
    while r.angle_deg >= 90.0 {
        r.angle_deg -= 90.0;
        std::mem::swap(&mut r.width, &mut r.height);
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    #[test]
    fn canonicalize_swaps_and_rotates() {
        let r = RotatedRect::new([10.0, 10.0], 20.0, 80.0, 30.0).canonicalize();
        assert_eq!(r.width, 80.0);
        assert_eq!(r.height, 20.0);
        assert_relative_eq!(r.angle_deg, 120.0);
    }

    #[test]
    fn canonical_rect_keeps_same_corners() {
        let raw = RotatedRect::new([50.0, 40.0], 10.0, 30.0, 20.0);
        let canon = raw.canonicalize();
        let mut a: Vec<[f64; 2]> = raw.corners().to_vec();
        let mut b: Vec<[f64; 2]> = canon.corners().to_vec();
        let key = |p: &[f64; 2]| (p[0] * 1e6).round() as i64 * 1_000_000_000 + (p[1] * 1e6).round() as i64;
        a.sort_by_key(key);
        b.sort_by_key(key);
        for (p, q) in a.iter().zip(&b) {
            assert_relative_eq!(p[0], q[0], epsilon = 1e-9);
            assert_relative_eq!(p[1], q[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn shoelace_area_of_square() {
        let sq = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        assert_relative_eq!(polygon_area(&sq), 16.0);
        assert_eq!(polygon_area(&sq[..2]), 0.0);
    }

    #[test]
    fn min_area_rect_recovers_rotated_box() {
        let truth = RotatedRect::new([120.0, 80.0], 90.0, 30.0, 35.0);
        let hull = truth.corners();
        let r = min_area_rect(&hull).unwrap().canonicalize();
        assert_relative_eq!(r.center[0], 120.0, epsilon = 1e-9);
        assert_relative_eq!(r.center[1], 80.0, epsilon = 1e-9);
        assert_relative_eq!(r.width, 90.0, epsilon = 1e-9);
        assert_relative_eq!(r.height, 30.0, epsilon = 1e-9);
        assert_relative_eq!(r.angle_deg, 35.0, epsilon = 1e-9);
    }

    #[test]
    fn min_area_rect_of_segment_is_flat() {
        let r = min_area_rect(&[[0.0, 0.0], [0.0, 10.0]]).unwrap().canonicalize();
        assert_relative_eq!(r.width, 10.0);
        assert_relative_eq!(r.height, 0.0);
        assert_relative_eq!(r.angle_deg, 90.0);
    }

    #[test]
    fn canonical_long_side_never_below_short_side() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let r = RotatedRect::new(
                [rng.gen_range(0.0..500.0), rng.gen_range(0.0..500.0)],
                rng.gen_range(1.0..200.0),
                rng.gen_range(1.0..200.0),
                rng.gen_range(-180.0..180.0),
            );
            let c = min_area_rect(&r.corners()).unwrap().canonicalize();
            assert!(c.width >= c.height);
            assert!((0.0..180.0).contains(&c.angle_deg));
            assert_relative_eq!(c.area(), r.area(), epsilon = 1e-6 * r.area().max(1.0));
        }
    }
}
