//! Color-region extraction: HSV masks → cleaned masks → external contours →
//! candidate rectangles.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::geometry::convex_hull;
use serde::{Deserialize, Serialize};

use crate::color::{color_mask, to_hsv, ColorRange, ColorTable};
use crate::geometry::{min_area_rect, polygon_area, RotatedRect};

/// Mask cleanup and contour filtering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Side of the square structuring element used for close/open, in pixels.
    /// Values below 3 disable morphology.
    pub morph_kernel_px: u32,
    /// Contours with a smaller polygon area are treated as noise.
    pub min_area_px: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            morph_kernel_px: 5,
            min_area_px: 500.0,
        }
    }
}

/// One external contour of one color, reduced to its rectangle and shape stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    pub color: String,
    /// Contour polygon area in px².
    pub area: f64,
    /// Canonical minimum-area rectangle (`width >= height`).
    pub rect: RotatedRect,
    /// Convex hull area in px².
    pub hull_area: f64,
    /// `area / hull_area`, zero for a degenerate hull.
    pub solidity: f64,
}

/// Close then open with a square element to fill gaps and drop speckle.
pub fn clean_mask(mask: &GrayImage, kernel_px: u32) -> GrayImage {
    if kernel_px < 3 {
        return mask.clone();
    }
    let k = (kernel_px / 2).min(u8::MAX as u32) as u8;
    let closed = imageproc::morphology::close(mask, Norm::LInf, k);
    imageproc::morphology::open(&closed, Norm::LInf, k)
}

/// Candidate regions for every color of `table`, in table order.
pub fn extract_regions(
    image: &RgbImage,
    table: &ColorTable,
    config: &SegmentConfig,
) -> Vec<CandidateRegion> {
    let hsv = to_hsv(image);
    let mut out = Vec::new();
    for range in &table.colors {
        let found = regions_for_color(&hsv, range, config);
        if found.is_empty() {
            tracing::debug!(color = %range.name, "no qualifying regions");
        } else {
            tracing::debug!(color = %range.name, n = found.len(), "regions extracted");
        }
        out.extend(found);
    }
    out
}

/// Candidate regions of one color from a precomputed HSV image.
pub fn regions_for_color(
    hsv: &RgbImage,
    range: &ColorRange,
    config: &SegmentConfig,
) -> Vec<CandidateRegion> {
    let mask = clean_mask(&color_mask(hsv, range), config.morph_kernel_px);
    regions_in_mask(&mask, &range.name, config)
}

/// Candidate regions from a binary mask (non-zero = foreground).
pub fn regions_in_mask(
    mask: &GrayImage,
    color: &str,
    config: &SegmentConfig,
) -> Vec<CandidateRegion> {
    let contours = find_contours::<i32>(mask);
    let mut out = Vec::new();
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let poly: Vec<[f64; 2]> = contour
            .points
            .iter()
            .map(|p| [p.x as f64, p.y as f64])
            .collect();
        let area = polygon_area(&poly);
        if area < config.min_area_px {
            tracing::trace!(color, area, "contour below min area");
            continue;
        }

        let hull: Vec<[f64; 2]> = convex_hull::<i32>(contour.points.as_slice())
            .iter()
            .map(|p| [p.x as f64, p.y as f64])
            .collect();
        let hull_area = polygon_area(&hull);
        let Some(rect) = min_area_rect(&hull) else {
            continue;
        };
        let solidity = if hull_area > 0.0 { area / hull_area } else { 0.0 };

        out.push(CandidateRegion {
            color: color.to_string(),
            area,
            rect: rect.canonicalize(),
            hull_area,
            solidity,
        });
    }
    out
}
