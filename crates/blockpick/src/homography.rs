//! Planar homography estimation via DLT with Hartley normalization.
//!
//! Used by the calibrator to map image pixels onto the robot's work surface.

use nalgebra::{DMatrix, Matrix3, Vector3};

/// Projective normalizers below this magnitude are treated as degenerate.
pub const MIN_PROJECTIVE_W: f64 = 1e-6;

/// Twice the triangle area, in Hartley-normalized units, below which three
/// correspondences count as collinear.
const COLLINEAR_EPS: f64 = 1e-6;

/// Second-smallest to largest eigenvalue ratio of `AᵀA` below which the
/// null space is not unique.
const MIN_RANK_RATIO: f64 = 1e-12;

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    TooFewPoints { needed: usize, got: usize },
    LengthMismatch { src: usize, dst: usize },
    /// Input indices of three (nearly) collinear points that leave the
    /// transform underdetermined.
    Collinear { points: [usize; 3] },
    NumericalFailure(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::LengthMismatch { src, dst } => {
                write!(f, "point count mismatch: {} src vs {} dst", src, dst)
            }
            Self::Collinear { points } => write!(
                f,
                "points {}, {} and {} are collinear",
                points[0], points[1], points[2]
            ),
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
        }
    }
}

impl std::error::Error for HomographyError {}

// ── Projection ───────────────────────────────────────────────────────────

/// Apply `H` to `[x, y, 1]^T` and normalize.
///
/// Returns `None` when the projective coordinate is near zero.
pub fn try_project(h: &Matrix3<f64>, x: f64, y: f64) -> Option<[f64; 2]> {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < MIN_PROJECTIVE_W {
        return None;
    }
    let out = [p[0] / p[2], p[1] / p[2]];
    (out[0].is_finite() && out[1].is_finite()).then_some(out)
}

/// Reprojection error: ||project(H, src) - dst||. Infinite when undefined.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    match try_project(h, src[0], src[1]) {
        Some(p) => (p[0] - dst[0]).hypot(p[1] - dst[1]),
        None => f64::INFINITY,
    }
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Translate centroid to origin, scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| (p[0] - cx).hypot(p[1] - cy))
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

/// Twice the signed area of triangle `(a, b, c)`.
fn cross3(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// First collinear triple that makes the correspondence set degenerate.
///
/// With the minimal four points any collinear triple leaves the system
/// underdetermined. Larger sets are only screened for full collinearity
/// here; partial degeneracy shows up in the rank check of the solve.
fn degenerate_triple(pts: &[[f64; 2]]) -> Option<[usize; 3]> {
    let n = pts.len();
    let mut first = None;
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if cross3(pts[i], pts[j], pts[k]).abs() >= COLLINEAR_EPS {
                    if n > 4 {
                        return None;
                    }
                } else if n == 4 {
                    return Some([i, j, k]);
                } else {
                    first = first.or(Some([i, j, k]));
                }
            }
        }
    }
    first
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate a homography from ≥4 point correspondences using DLT.
///
/// Returns `H` such that `dst ≈ project(H, src)`, scaled so `h[2][2] = 1`
/// whenever that entry is non-zero. With exactly four points in general
/// position this is the closed-form perspective transform.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got: n });
    }
    if src.iter().chain(dst).any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "non-finite input point".into(),
        ));
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);
    if let Some(points) = degenerate_triple(&src_n).or_else(|| degenerate_triple(&dst_n)) {
        return Err(HomographyError::Collinear { points });
    }

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        // Row 2i:   [  0  0  0 | -sx -sy -1 | dy*sx  dy*sy  dy ]
        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        // Row 2i+1: [ sx  sy  1 |  0  0  0 | -dx*sx -dx*sy -dx ]
        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // Null vector of A = eigenvector of the smallest eigenvalue of A^T A.
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);
    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[i].abs().total_cmp(&eig.eigenvalues[j].abs()));
    let largest = eig.eigenvalues.amax();
    let second = eig.eigenvalues[order[1]].abs();
    if second <= MIN_RANK_RATIO * largest {
        return Err(HomographyError::NumericalFailure(
            "correspondences do not determine a unique homography".into(),
        ));
    }
    let v = eig.eigenvectors.column(order[0]);
    #[rustfmt::skip]
    let h_norm = Matrix3::new(
        v[0], v[1], v[2],
        v[3], v[4], v[5],
        v[6], v[7], v[8],
    );

    // Denormalize: H = T_dst^-1 * H_norm * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    let h = if scale.abs() < 1e-15 { h } else { h / scale };
    if h.iter().any(|x| !x.is_finite()) {
        return Err(HomographyError::NumericalFailure(
            "non-finite homography".into(),
        ));
    }
    Ok(h)
}

pub(crate) fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

pub(crate) fn array_to_matrix3(a: &[[f64; 3]; 3]) -> Matrix3<f64> {
    #[rustfmt::skip]
    let m = Matrix3::new(
        a[0][0], a[0][1], a[0][2],
        a[1][0], a[1][1], a[1][2],
        a[2][0], a[2][1], a[2][2],
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};

    #[test]
    fn dlt_exact_4points() {
        let src = [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]];
        let dst = [[10.0, 20.0], [110.0, 25.0], [105.0, 130.0], [5.0, 120.0]];

        let h = estimate_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&h, s, d) < 1e-6);
        }
        assert_relative_eq!(h[(2, 2)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn marker_centroids_map_to_robot_points() {
        let image = [[120.5, 88.0], [515.0, 92.5], [530.25, 400.0], [101.0, 395.75]];
        let robot = [
            [414.36, 214.40],
            [417.66, -224.17],
            [108.74, -224.55],
            [106.34, 225.74],
        ];
        let h = estimate_homography_dlt(&image, &robot).unwrap();
        for (s, d) in image.iter().zip(&robot) {
            let p = try_project(&h, s[0], s[1]).unwrap();
            assert_relative_eq!(p[0], d[0], epsilon = 1e-6);
            assert_relative_eq!(p[1], d[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn random_projective_maps_are_recovered() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        #[rustfmt::skip]
        let h_true = Matrix3::new(
            0.9, 0.05, 12.0,
            -0.04, 1.1, -30.0,
            1e-4, -2e-4, 1.0,
        );
        let src: Vec<[f64; 2]> = (0..12)
            .map(|_| [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)])
            .collect();
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| try_project(&h_true, p[0], p[1]).unwrap())
            .collect();

        let h = estimate_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&h, s, d) < 1e-6);
        }
    }

    #[test]
    fn too_few_points() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert_eq!(
            estimate_homography_dlt(&src, &dst),
            Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
        );
    }

    #[test]
    fn collinear_points_are_rejected() {
        let src = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5]];
        assert!(matches!(
            estimate_homography_dlt(&src, &dst),
            Err(HomographyError::Collinear { .. })
        ));
    }

    #[test]
    fn three_of_four_collinear_is_rejected() {
        let src = [[0.0, 0.0], [100.0, 0.0], [200.0, 0.0], [0.0, 100.0]];
        let dst = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert_eq!(
            estimate_homography_dlt(&src, &dst),
            Err(HomographyError::Collinear { points: [0, 1, 2] })
        );
        // Same failure when the degenerate side is the destination.
        assert_eq!(
            estimate_homography_dlt(&dst, &src),
            Err(HomographyError::Collinear { points: [0, 1, 2] })
        );
    }

    #[test]
    fn collinear_subset_is_fine_with_extra_points() {
        let src = [[0.0, 0.0], [100.0, 0.0], [200.0, 0.0], [0.0, 100.0], [150.0, 120.0]];
        #[rustfmt::skip]
        let h_true = Matrix3::new(
            1.2, 0.1, 5.0,
            -0.1, 0.9, 8.0,
            0.0, 0.0, 1.0,
        );
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| try_project(&h_true, p[0], p[1]).unwrap())
            .collect();
        let h = estimate_homography_dlt(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            assert!(reprojection_error(&h, s, d) < 1e-6);
        }
    }

    #[test]
    fn projection_at_infinity_is_none() {
        #[rustfmt::skip]
        let h = Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            1.0, 0.0, 0.0,
        );
        assert!(try_project(&h, 0.0, 5.0).is_none());
    }

    #[test]
    fn array_conversion_preserves_layout() {
        let a = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let m = array_to_matrix3(&a);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(2, 0)], 7.0);
        assert_eq!(matrix3_to_array(&m), a);
    }
}
