//! Square binary fiducial (ArUco 4×4) detection on grayscale images.
//!
//! Pipeline: Otsu binarization → outer contours → Douglas–Peucker quads →
//! perspective sampling of the 6×6 cell grid → border check → dictionary
//! lookup under four rotations.

pub mod dictionary;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::homography::{estimate_homography_dlt, try_project};
use dictionary::{lookup, PAYLOAD_DIM};

/// Cells per marker side, black border included.
const GRID_CELLS: usize = PAYLOAD_DIM + 2;

/// Marker detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Shortest accepted quad side in pixels.
    pub min_side_px: f64,
    /// Douglas–Peucker tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Border cells allowed to read white.
    pub max_border_errors: usize,
    /// Payload bit errors corrected by the lookup.
    pub max_hamming: u32,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            min_side_px: 12.0,
            approx_epsilon_ratio: 0.03,
            max_border_errors: 2,
            max_hamming: 1,
        }
    }
}

/// A decoded marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedFiducial {
    pub id: u32,
    /// Outer corners in pixels, starting at the marker's own top-left and
    /// running clockwise on screen.
    pub corners: [[f64; 2]; 4],
    pub hamming: u32,
}

impl DetectedFiducial {
    /// Mean of the four corners.
    pub fn center(&self) -> [f64; 2] {
        let sx: f64 = self.corners.iter().map(|c| c[0]).sum();
        let sy: f64 = self.corners.iter().map(|c| c[1]).sum();
        [sx / 4.0, sy / 4.0]
    }
}

/// ArUco `DICT_4X4_50` detector.
#[derive(Debug, Clone, Default)]
pub struct MarkerDetector {
    config: MarkerConfig,
}

impl MarkerDetector {
    pub fn new(config: MarkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    /// Detect and decode all markers in `gray`.
    pub fn detect(&self, gray: &GrayImage) -> Vec<DetectedFiducial> {
        let level = imageproc::contrast::otsu_level(gray);
        let mut binary = GrayImage::new(gray.width(), gray.height());
        for (src, dst) in gray.pixels().zip(binary.pixels_mut()) {
            if src.0[0] <= level {
                dst.0[0] = 255;
            }
        }

        let mut out: Vec<DetectedFiducial> = Vec::new();
        for contour in find_contours::<i32>(&binary) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(quad) = self.quad_from_contour(&contour.points) else {
                continue;
            };
            let Some(marker) = self.decode_quad(gray, level, quad) else {
                continue;
            };
            let c = marker.center();
            let duplicate = out.iter().any(|m| {
                let mc = m.center();
                m.id == marker.id && (mc[0] - c[0]).hypot(mc[1] - c[1]) < self.config.min_side_px
            });
            if !duplicate {
                tracing::debug!(id = marker.id, cx = c[0], cy = c[1], "marker decoded");
                out.push(marker);
            }
        }
        out
    }

    /// Reduce a contour to a convex, clockwise quad with long enough sides.
    fn quad_from_contour(&self, points: &[Point<i32>]) -> Option<[[f64; 2]; 4]> {
        let min_perimeter = 4.0 * self.config.min_side_px;
        if (points.len() as f64) < min_perimeter {
            return None;
        }
        let perimeter = closed_length(points);
        if perimeter < min_perimeter {
            return None;
        }
        let eps = (self.config.approx_epsilon_ratio * perimeter).max(1.0);
        let mut poly = approximate_polygon_dp(points, eps, true);
        if poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() != 4 {
            return None;
        }

        let mut quad = [[0.0; 2]; 4];
        for (q, p) in quad.iter_mut().zip(&poly) {
            *q = [p.x as f64, p.y as f64];
        }
        if signed_area(&quad) < 0.0 {
            quad.reverse();
        }
        if !is_convex(&quad) {
            return None;
        }
        let min_side = (0..4)
            .map(|i| {
                let (a, b) = (quad[i], quad[(i + 1) % 4]);
                (b[0] - a[0]).hypot(b[1] - a[1])
            })
            .fold(f64::INFINITY, f64::min);
        (min_side >= self.config.min_side_px).then_some(quad)
    }

    fn decode_quad(&self, gray: &GrayImage, level: u8, quad: [[f64; 2]; 4]) -> Option<DetectedFiducial> {
        let n = GRID_CELLS as f64;
        let grid = [[0.0, 0.0], [n, 0.0], [n, n], [0.0, n]];
        let h = estimate_homography_dlt(&grid, &quad).ok()?;

        let mut border_errors = 0usize;
        let mut bits = 0u16;
        for gy in 0..GRID_CELLS {
            for gx in 0..GRID_CELLS {
                let white = sample_cell(gray, &h, gx, gy)? > level as f64;
                let on_border = gx == 0 || gy == 0 || gx == GRID_CELLS - 1 || gy == GRID_CELLS - 1;
                if on_border {
                    border_errors += usize::from(white);
                } else if white {
                    bits |= 1 << ((gy - 1) * PAYLOAD_DIM + (gx - 1));
                }
            }
        }
        if border_errors > self.config.max_border_errors {
            return None;
        }

        let hit = lookup(bits, self.config.max_hamming)?;
        // The observed grid is the code turned clockwise (4 - rotation) times,
        // so the code's top-left sits at that corner index.
        let shift = ((4 - hit.rotation) % 4) as usize;
        let mut corners = [[0.0; 2]; 4];
        for (i, c) in corners.iter_mut().enumerate() {
            *c = quad[(i + shift) % 4];
        }
        Some(DetectedFiducial {
            id: hit.id,
            corners,
            hamming: hit.hamming,
        })
    }
}

/// Mean intensity over a 3×3 sub-sample of cell `(gx, gy)`.
fn sample_cell(gray: &GrayImage, h: &Matrix3<f64>, gx: usize, gy: usize) -> Option<f64> {
    const OFFSETS: [f64; 3] = [0.3, 0.5, 0.7];
    let (w, ht) = gray.dimensions();
    let mut acc = 0.0;
    for oy in OFFSETS {
        for ox in OFFSETS {
            let p = try_project(h, gx as f64 + ox, gy as f64 + oy)?;
            let x = p[0].round();
            let y = p[1].round();
            if x < 0.0 || y < 0.0 || x >= w as f64 || y >= ht as f64 {
                return None;
            }
            acc += gray.get_pixel(x as u32, y as u32).0[0] as f64;
        }
    }
    Some(acc / 9.0)
}

fn closed_length(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            ((b.x - a.x) as f64).hypot((b.y - a.y) as f64)
        })
        .sum()
}

/// Shoelace sum; positive means clockwise on screen (+y down).
fn signed_area(q: &[[f64; 2]; 4]) -> f64 {
    (0..4)
        .map(|i| {
            let (a, b) = (q[i], q[(i + 1) % 4]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum::<f64>()
        / 2.0
}

fn is_convex(q: &[[f64; 2]; 4]) -> bool {
    (0..4).all(|i| {
        let (a, b, c) = (q[i], q[(i + 1) % 4], q[(i + 2) % 4]);
        let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        cross > 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{calibration_sheet, draw_marker};
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn decodes_single_marker() {
        let mut img = GrayImage::from_pixel(200, 200, Luma([255]));
        draw_marker(&mut img, 7, 50, 60, 12, 0);

        let found = MarkerDetector::default().detect(&img);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 7);
        assert_eq!(found[0].hamming, 0);
        let c = found[0].center();
        assert_relative_eq!(c[0], 50.0 + 71.0 / 2.0, epsilon = 0.5);
        assert_relative_eq!(c[1], 60.0 + 71.0 / 2.0, epsilon = 0.5);
    }

    #[test]
    fn rotated_prints_keep_their_id() {
        for turns in 0..4 {
            let mut img = GrayImage::from_pixel(160, 160, Luma([255]));
            draw_marker(&mut img, 12, 40, 40, 10, turns);
            let found = MarkerDetector::default().detect(&img);
            assert_eq!(found.len(), 1, "turns = {turns}");
            assert_eq!(found[0].id, 12, "turns = {turns}");
        }
    }

    #[test]
    fn top_left_corner_follows_print_rotation() {
        let mut upright = GrayImage::from_pixel(160, 160, Luma([255]));
        draw_marker(&mut upright, 2, 40, 40, 10, 0);
        let a = MarkerDetector::default().detect(&upright);
        assert_eq!(a.len(), 1);
        assert_relative_eq!(a[0].corners[0][0], 40.0, epsilon = 1.0);
        assert_relative_eq!(a[0].corners[0][1], 40.0, epsilon = 1.0);

        let mut turned = GrayImage::from_pixel(160, 160, Luma([255]));
        draw_marker(&mut turned, 2, 40, 40, 10, 1);
        let b = MarkerDetector::default().detect(&turned);
        assert_eq!(b.len(), 1);
        // One clockwise turn moves the marker's top-left to the image top-right.
        assert_relative_eq!(b[0].corners[0][0], 99.0, epsilon = 1.0);
        assert_relative_eq!(b[0].corners[0][1], 40.0, epsilon = 1.0);
    }

    #[test]
    fn finds_all_calibration_markers() {
        let (img, centers) = calibration_sheet(640, 480, 10);
        let mut found = MarkerDetector::default().detect(&img);
        found.sort_by_key(|m| m.id);
        let ids: Vec<u32> = found.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for m in &found {
            let c = m.center();
            let e = centers[m.id as usize];
            assert_relative_eq!(c[0], e[0], epsilon = 0.5);
            assert_relative_eq!(c[1], e[1], epsilon = 0.5);
        }
    }

    #[test]
    fn plain_black_square_is_not_a_marker() {
        let mut img = GrayImage::from_pixel(120, 120, Luma([255]));
        for y in 30..90 {
            for x in 30..90 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        assert!(MarkerDetector::default().detect(&img).is_empty());
    }

    #[test]
    fn blank_image_has_no_markers() {
        let img = GrayImage::from_pixel(64, 64, Luma([200]));
        assert!(MarkerDetector::default().detect(&img).is_empty());
    }
}
