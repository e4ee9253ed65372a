//! Splitting of merged same-color blobs into block-sized rectangles.
//!
//! Touching blocks of one color come out of segmentation as a single
//! contour. Using the known block proportions, an oversized rectangle is cut
//! into an `n_major × n_minor` grid of equal cells sharing its angle. Only
//! axis-aligned multiples of one block footprint are modeled; partial
//! overlaps are not.

use serde::{Deserialize, Serialize};

use crate::geometry::RotatedRect;

/// Known block proportions and split limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Physical long side of a block.
    pub block_long: f64,
    /// Physical short sides that may face the camera (top face, side face).
    pub block_short_sides: Vec<f64>,
    /// Relative excess over the expected aspect before a split triggers.
    pub tolerance: f64,
    /// Upper bound on cells per axis.
    pub max_split: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            block_long: 7.0,
            block_short_sides: vec![2.5, 1.5],
            tolerance: 0.30,
            max_split: 8,
        }
    }
}

impl SplitConfig {
    /// Expected long/short ratio closest to `observed`.
    pub fn expected_aspect(&self, observed: f64) -> Option<f64> {
        self.block_short_sides
            .iter()
            .filter(|&&s| s > 0.0)
            .map(|&s| self.block_long / s)
            .min_by(|a, b| (a - observed).abs().total_cmp(&(b - observed).abs()))
    }
}

/// Outcome of [`split_rect`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    pub n_major: u32,
    pub n_minor: u32,
    /// Cells in major-then-minor order. Holds the input alone when unsplit.
    pub rects: Vec<RotatedRect>,
}

impl SplitResult {
    pub fn is_split(&self) -> bool {
        self.n_major > 1 || self.n_minor > 1
    }
}

/// Split a canonical rectangle (`width >= height`) into block-sized cells.
pub fn split_rect(rect: &RotatedRect, config: &SplitConfig) -> SplitResult {
    let unsplit = || SplitResult {
        n_major: 1,
        n_minor: 1,
        rects: vec![*rect],
    };

    let (width, height) = (rect.width, rect.height);
    if !(width > 0.0 && height > 0.0) {
        return unsplit();
    }
    let observed = width / height;
    let Some(expected) = config.expected_aspect(observed) else {
        return unsplit();
    };

    let limit = 1.0 + config.tolerance;
    let clamp = |n: f64| (n.round() as i64).clamp(1, config.max_split.max(1) as i64) as u32;

    let n_major = if observed > expected * limit {
        clamp(observed / expected)
    } else {
        1
    };
    let minor_ratio = (height / width) * expected;
    let n_minor = if minor_ratio > limit { clamp(minor_ratio) } else { 1 };

    if n_major == 1 && n_minor == 1 {
        return unsplit();
    }
    tracing::debug!(n_major, n_minor, observed, expected, "splitting merged region");

    let (u, v) = rect.axes();
    let sub_w = width / n_major as f64;
    let sub_h = height / n_minor as f64;
    let mut rects = Vec::with_capacity((n_major * n_minor) as usize);
    for i in 0..n_major {
        for j in 0..n_minor {
            let off_major = (i as f64 - (n_major as f64 - 1.0) / 2.0) * sub_w;
            let off_minor = (j as f64 - (n_minor as f64 - 1.0) / 2.0) * sub_h;
            let center = [
                rect.center[0] + off_major * u[0] + off_minor * v[0],
                rect.center[1] + off_major * u[1] + off_minor * v[1],
            ];
            rects.push(RotatedRect::new(center, sub_w, sub_h, rect.angle_deg));
        }
    }

    SplitResult {
        n_major,
        n_minor,
        rects,
    }
}
