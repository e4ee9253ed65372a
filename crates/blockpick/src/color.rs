//! HSV color table and per-color binary masks.
//!
//! Hue follows the 8-bit OpenCV convention: degrees halved into `[0, 180)`,
//! saturation and value scaled to `[0, 255]`.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBound {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvBound {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// A named color and the union of HSV boxes that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    pub name: String,
    pub bounds: Vec<HsvBound>,
}

impl ColorRange {
    pub fn new(name: impl Into<String>, bounds: Vec<HsvBound>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        self.bounds.iter().any(|b| b.contains(hsv))
    }
}

/// Ordered set of color ranges. Detection visits colors in table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTable {
    pub colors: Vec<ColorRange>,
}

impl Default for ColorTable {
    /// Ranges tuned for painted wooden blocks under indoor lighting.
    fn default() -> Self {
        let b = HsvBound::new;
        Self {
            colors: vec![
                ColorRange::new(
                    "red",
                    vec![
                        b([0, 100, 100], [5, 255, 255]),
                        b([160, 100, 100], [180, 255, 255]),
                    ],
                ),
                ColorRange::new("blue", vec![b([70, 100, 100], [130, 255, 255])]),
                ColorRange::new("green", vec![b([40, 50, 50], [80, 255, 255])]),
                ColorRange::new("yellow", vec![b([21, 100, 100], [35, 255, 255])]),
                ColorRange::new("pink", vec![b([140, 25, 150], [165, 255, 255])]),
                ColorRange::new("orange", vec![b([6, 100, 100], [20, 255, 255])]),
            ],
        }
    }
}

impl ColorTable {
    pub fn get(&self, name: &str) -> Option<&ColorRange> {
        self.colors.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.colors.iter().map(|c| c.name.as_str())
    }

    /// Keep only the named colors, in table order.
    pub fn restricted_to(&self, names: &[String]) -> Self {
        Self {
            colors: self
                .colors
                .iter()
                .filter(|c| names.iter().any(|n| n == &c.name))
                .cloned()
                .collect(),
        }
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(px: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = px.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff * 255.0 / v } else { 0.0 };
    let h = if diff <= 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    // 360° wraps onto 0 after halving and rounding.
    let h8 = ((h / 2.0).round() as u16 % 180) as u8;

    [h8, s.round() as u8, v as u8]
}

/// Convert a whole image to HSV; channels are stored as (H, S, V).
pub fn to_hsv(rgb: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(rgb.width(), rgb.height());
    for (src, dst) in rgb.pixels().zip(out.pixels_mut()) {
        *dst = Rgb(rgb_to_hsv(src.0));
    }
    out
}

/// Binary mask (255 = inside) of the pixels selected by `range`.
pub fn color_mask(hsv: &RgbImage, range: &ColorRange) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for (src, dst) in hsv.pixels().zip(mask.pixels_mut()) {
        if range.contains(src.0) {
            *dst = Luma([255]);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors_map_to_opencv_hues() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([255, 255, 0]), [30, 255, 255]);
    }

    #[test]
    fn gray_has_no_hue_or_saturation() {
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
    }

    #[test]
    fn red_uses_both_hue_ends() {
        let table = ColorTable::default();
        let red = table.get("red").unwrap();
        assert!(red.contains(rgb_to_hsv([220, 20, 10])));
        // Magenta-leaning red wraps to the top of the hue circle.
        assert!(red.contains(rgb_to_hsv([220, 10, 40])));
        assert!(!red.contains(rgb_to_hsv([20, 20, 220])));
    }

    #[test]
    fn default_table_classifies_saturated_primaries() {
        let table = ColorTable::default();
        let classify = |px: [u8; 3]| -> Vec<&str> {
            let hsv = rgb_to_hsv(px);
            table
                .colors
                .iter()
                .filter(|c| c.contains(hsv))
                .map(|c| c.name.as_str())
                .collect()
        };
        assert_eq!(classify([0, 0, 255]), vec!["blue"]);
        assert_eq!(classify([0, 200, 0]), vec!["green"]);
        assert_eq!(classify([230, 220, 0]), vec!["yellow"]);
        assert_eq!(classify([255, 128, 0]), vec!["orange"]);
        assert!(classify([200, 200, 200]).is_empty());
    }

    #[test]
    fn mask_marks_only_matching_pixels() {
        let mut img = RgbImage::from_pixel(4, 3, Rgb([255, 255, 255]));
        img.put_pixel(1, 1, Rgb([0, 0, 255]));
        img.put_pixel(2, 1, Rgb([0, 0, 230]));
        let hsv = to_hsv(&img);
        let blue = ColorTable::default().get("blue").cloned().unwrap();
        let mask = color_mask(&hsv, &blue);
        let on: Vec<(u32, u32)> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(on, vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn restricted_table_keeps_order() {
        let t = ColorTable::default().restricted_to(&["orange".into(), "red".into()]);
        let names: Vec<&str> = t.names().collect();
        assert_eq!(names, vec!["red", "orange"]);
    }

    #[test]
    fn table_round_trips_through_json() {
        let t = ColorTable::default();
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.starts_with('['));
        let back: ColorTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
