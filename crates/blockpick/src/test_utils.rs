//! Shared synthetic-scene helpers for image-based unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rand::{Rng, SeedableRng};

use crate::geometry::RotatedRect;
use crate::marker::dictionary::DICT_4X4_50;

pub(crate) const RED: Rgb<u8> = Rgb([220, 30, 20]);
pub(crate) const GREEN: Rgb<u8> = Rgb([20, 190, 40]);
pub(crate) const BLUE: Rgb<u8> = Rgb([20, 40, 230]);
pub(crate) const YELLOW: Rgb<u8> = Rgb([235, 215, 10]);

pub(crate) fn white_canvas(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
}

/// Paint a filled rotated rectangle (`long` along `angle_deg`).
pub(crate) fn draw_block(
    img: &mut RgbImage,
    center: [f64; 2],
    long: f64,
    short: f64,
    angle_deg: f64,
    color: Rgb<u8>,
) {
    let rect = RotatedRect::new(center, long, short, angle_deg);
    let poly: Vec<Point<i32>> = rect
        .corners()
        .iter()
        .map(|c| Point::new(c[0].round() as i32, c[1].round() as i32))
        .collect();
    draw_polygon_mut(img, &poly, color);
}

/// Scatter `count` small squares of `color` using a fixed seed.
pub(crate) fn speckle(img: &mut RgbImage, count: usize, color: Rgb<u8>, size: u32) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xB10C);
    let (w, h) = img.dimensions();
    for _ in 0..count {
        let x = rng.gen_range(0..w.saturating_sub(size)) as i32;
        let y = rng.gen_range(0..h.saturating_sub(size)) as i32;
        draw_filled_rect_mut(img, Rect::at(x, y).of_size(size, size), color);
    }
}

/// Draw an axis-aligned DICT_4X4_50 marker with its top-left corner at
/// `(x0, y0)`. The marker spans 6 cells (border included). `quarter_turns`
/// rotates the printed pattern clockwise.
pub(crate) fn draw_marker(
    img: &mut GrayImage,
    id: usize,
    x0: i32,
    y0: i32,
    cell_px: u32,
    quarter_turns: u32,
) {
    let side = 6 * cell_px;
    draw_filled_rect_mut(img, Rect::at(x0, y0).of_size(side, side), Luma([0]));
    let code = DICT_4X4_50[id];
    for cy in 0..4u32 {
        for cx in 0..4u32 {
            // Clockwise rotation maps source (sx, sy) to (3 - sy, sx).
            let (mut sx, mut sy) = (cx, cy);
            for _ in 0..quarter_turns % 4 {
                let (nx, ny) = (sy, 3 - sx);
                sx = nx;
                sy = ny;
            }
            if (code >> (sy * 4 + sx)) & 1 == 1 {
                let rect = Rect::at(
                    x0 + ((cx + 1) * cell_px) as i32,
                    y0 + ((cy + 1) * cell_px) as i32,
                )
                .of_size(cell_px, cell_px);
                draw_filled_rect_mut(img, rect, Luma([255]));
            }
        }
    }
}

/// White page with the four calibration markers 0..=3 placed near the
/// corners. Returns the image and each marker's expected center.
pub(crate) fn calibration_sheet(w: u32, h: u32, cell_px: u32) -> (GrayImage, [[f64; 2]; 4]) {
    let mut img = GrayImage::from_pixel(w, h, Luma([255]));
    let side = (6 * cell_px) as i32;
    let margin = (2 * cell_px) as i32;
    let origins = [
        (margin, margin),
        (w as i32 - margin - side, margin),
        (w as i32 - margin - side, h as i32 - margin - side),
        (margin, h as i32 - margin - side),
    ];
    let mut centers = [[0.0; 2]; 4];
    for (id, &(x0, y0)) in origins.iter().enumerate() {
        draw_marker(&mut img, id, x0, y0, cell_px, 0);
        // Pixel-center coordinates of the outer black square.
        let half = (side - 1) as f64 / 2.0;
        centers[id] = [x0 as f64 + half, y0 as f64 + half];
    }
    (img, centers)
}
