//! Long-axis direction and the anchor point on a block's far short edge.
//!
//! Image coordinates: +x right, +y down. A line has no inherent direction,
//! so the long-axis vector is signed by a [`DirectionPolicy`] that fixes
//! where the observer stands relative to the frame.

use serde::{Deserialize, Serialize};

use crate::geometry::RotatedRect;

const AXIS_EPS: f64 = 1e-6;
const PARALLEL_EPS: f64 = 1e-10;

/// Default length of the anchor ray, in pixels.
pub const DEFAULT_RAY_LENGTH: f64 = 1000.0;

/// Edge of the image the observer looks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverSide {
    /// Observer below the frame; "away" points toward the image top.
    #[default]
    Bottom,
    /// Observer above the frame; "away" points toward the image bottom.
    Top,
}

/// Sign chosen for a perfectly horizontal long axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalTieBreak {
    #[default]
    NegativeX,
    PositiveX,
}

/// Resolves the sign ambiguity of a long-axis vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionPolicy {
    pub observer: ObserverSide,
    pub horizontal: HorizontalTieBreak,
}

impl DirectionPolicy {
    /// Return `v` or `-v`, whichever points away from the observer.
    pub fn resolve(&self, v: [f64; 2]) -> [f64; 2] {
        let [vx, vy] = v;
        let flip = if vy.abs() <= AXIS_EPS {
            match self.horizontal {
                HorizontalTieBreak::NegativeX => vx > 0.0,
                HorizontalTieBreak::PositiveX => vx < 0.0,
            }
        } else {
            match self.observer {
                ObserverSide::Bottom => vy > 0.0,
                ObserverSide::Top => vy < 0.0,
            }
        };
        if flip {
            [-vx, -vy]
        } else {
            [vx, vy]
        }
    }
}

/// Unit vector along a rectangle's `width` side for `angle_deg`.
pub fn major_axis(angle_deg: f64) -> [f64; 2] {
    let theta = angle_deg.to_radians();
    let (vx, vy) = (theta.cos(), theta.sin());
    let norm = vx.hypot(vy);
    if !(norm >= 1e-8) {
        return [1.0, 0.0];
    }
    [vx / norm, vy / norm]
}

/// Rotate 90° counter-clockwise as seen on screen (+y down).
pub fn perpendicular_ccw(v: [f64; 2]) -> [f64; 2] {
    [v[1], -v[0]]
}

/// Intersection of segments `p1–p2` and `p3–p4`.
///
/// Returns `None` for (near-)parallel segments or when the crossing lies
/// outside either segment.
pub fn segment_intersection(
    p1: [f64; 2],
    p2: [f64; 2],
    p3: [f64; 2],
    p4: [f64; 2],
) -> Option<[f64; 2]> {
    let [x1, y1] = p1;
    let [x2, y2] = p2;
    let [x3, y3] = p3;
    let [x4, y4] = p4;

    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < PARALLEL_EPS {
        return None;
    }
    let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
    let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some([x1 + t * (x2 - x1), y1 + t * (y2 - y1)])
    } else {
        None
    }
}

/// Closest crossing of the ray `center + s·dir` (`0 ≤ s ≤ ray_length`) with
/// the rectangle's box edges.
pub fn find_anchor(rect: &RotatedRect, dir: [f64; 2], ray_length: f64) -> Option<[f64; 2]> {
    let c = rect.center;
    let end = [c[0] + dir[0] * ray_length, c[1] + dir[1] * ray_length];
    let box_pts = rect.corners();

    let mut best: Option<([f64; 2], f64)> = None;
    for i in 0..4 {
        let Some(p) = segment_intersection(c, end, box_pts[i], box_pts[(i + 1) % 4]) else {
            continue;
        };
        let d = (p[0] - c[0]).hypot(p[1] - c[1]);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((p, d));
        }
    }
    best.map(|(p, _)| p)
}

/// Long-axis direction (signed by `policy`) and the anchor on the edge the
/// counter-clockwise perpendicular points at.
pub fn resolve_anchor(
    rect: &RotatedRect,
    policy: &DirectionPolicy,
    ray_length: f64,
) -> ([f64; 2], Option<[f64; 2]>) {
    let dir = policy.resolve(major_axis(rect.angle_deg));
    let anchor = find_anchor(rect, perpendicular_ccw(dir), ray_length);
    (dir, anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn major_axis_is_unit_length() {
        for a in [0.0, 17.0, 45.0, 90.0, 133.0, 179.9] {
            let v = major_axis(a);
            assert_relative_eq!(v[0].hypot(v[1]), 1.0, epsilon = 1e-12);
        }
        assert_eq!(major_axis(f64::NAN), [1.0, 0.0]);
    }

    #[test]
    fn bottom_observer_points_up_the_image() {
        let p = DirectionPolicy::default();
        let v = p.resolve(major_axis(60.0));
        assert!(v[1] < 0.0);
        let v = p.resolve(major_axis(120.0));
        assert!(v[1] < 0.0);
    }

    #[test]
    fn top_observer_mirrors() {
        let p = DirectionPolicy {
            observer: ObserverSide::Top,
            ..DirectionPolicy::default()
        };
        assert!(p.resolve(major_axis(60.0))[1] > 0.0);
        assert!(p.resolve([0.5, -0.8])[1] > 0.0);
    }

    #[test]
    fn horizontal_tie_break_is_configurable() {
        let neg = DirectionPolicy::default();
        assert_eq!(neg.resolve([1.0, 0.0]), [-1.0, -0.0]);
        assert_eq!(neg.resolve([-1.0, 0.0]), [-1.0, 0.0]);

        let pos = DirectionPolicy {
            horizontal: HorizontalTieBreak::PositiveX,
            ..DirectionPolicy::default()
        };
        assert_eq!(pos.resolve([-1.0, 0.0]), [1.0, -0.0]);
    }

    #[test]
    fn perpendicular_is_counter_clockwise_on_screen() {
        // Up the screen (0, -1) turned counter-clockwise points left.
        assert_eq!(perpendicular_ccw([0.0, -1.0]), [-1.0, -0.0]);
        // Right (1, 0) turned counter-clockwise points up.
        assert_eq!(perpendicular_ccw([1.0, 0.0]), [0.0, -1.0]);
    }

    #[test]
    fn crossing_segments_intersect() {
        let p = segment_intersection([0.0, 0.0], [10.0, 10.0], [0.0, 10.0], [10.0, 0.0]).unwrap();
        assert_relative_eq!(p[0], 5.0);
        assert_relative_eq!(p[1], 5.0);
    }

    #[test]
    fn parallel_and_disjoint_segments_do_not() {
        assert!(segment_intersection([0.0, 0.0], [10.0, 0.0], [0.0, 1.0], [10.0, 1.0]).is_none());
        assert!(segment_intersection([0.0, 0.0], [1.0, 1.0], [5.0, 0.0], [6.0, -3.0]).is_none());
    }

    #[test]
    fn anchor_lies_on_far_long_edge() {
        // Vertical block: long axis up the image, perpendicular points left.
        let r = RotatedRect::new([100.0, 100.0], 80.0, 20.0, 90.0);
        let (dir, anchor) = resolve_anchor(&r, &DirectionPolicy::default(), DEFAULT_RAY_LENGTH);
        assert_relative_eq!(dir[1], -1.0, epsilon = 1e-12);
        let a = anchor.unwrap();
        assert_relative_eq!(a[0], 90.0, epsilon = 1e-9);
        assert_relative_eq!(a[1], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn horizontal_block_anchor_follows_tie_break() {
        let r = RotatedRect::new([50.0, 50.0], 60.0, 16.0, 0.0);
        let (_, a) = resolve_anchor(&r, &DirectionPolicy::default(), DEFAULT_RAY_LENGTH);
        // dir = (-1, 0) → perpendicular (0, 1): bottom edge.
        let a = a.unwrap();
        assert_relative_eq!(a[0], 50.0, epsilon = 1e-9);
        assert_relative_eq!(a[1], 58.0, epsilon = 1e-9);

        let pos = DirectionPolicy {
            horizontal: HorizontalTieBreak::PositiveX,
            ..DirectionPolicy::default()
        };
        let (_, a) = resolve_anchor(&r, &pos, DEFAULT_RAY_LENGTH);
        assert_relative_eq!(a.unwrap()[1], 42.0, epsilon = 1e-9);
    }

    #[test]
    fn ray_too_short_gives_no_anchor() {
        let r = RotatedRect::new([0.0, 0.0], 100.0, 40.0, 0.0);
        assert!(find_anchor(&r, [0.0, 1.0], 5.0).is_none());
    }
}
