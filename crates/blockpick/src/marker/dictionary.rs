//! ArUco `DICT_4X4_50` code table and rotation-aware lookup.
//!
//! Bit `i` (LSB first) holds payload cell `(x, y)` with `i = y * 4 + x`,
//! row-major from the marker's top-left; a set bit is a white cell.

/// Payload grid side (cells), border excluded.
pub const PAYLOAD_DIM: usize = 4;

#[rustfmt::skip]
pub const DICT_4X4_50: [u16; 50] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23, 0x5b7f, 0x6af3,
    0x899f, 0xe588, 0xed70, 0xf054, 0x8d24, 0x7c64, 0xa662, 0x0066, 0x7a36, 0xf56e,
    0xd161, 0xd40d, 0xab33, 0x41bb, 0xe27f, 0x8e29, 0x2735, 0x2aa5, 0xc484, 0xf62c,
    0xa822, 0x4dea, 0xf379, 0xd30f, 0x7510, 0x9490, 0xae18, 0xff20, 0x6fb0, 0x5a38,
    0x18e8, 0x1454, 0x314c, 0x4d1c, 0x1724, 0xd774, 0xfcb4, 0x26d2, 0x740a, 0xc80a,
];

/// Rotate a square bit grid by 90° clockwise (as seen with +y down).
pub fn rotate90(bits: u16, dim: usize) -> u16 {
    let mut res = 0u16;
    for y in 0..dim {
        for x in 0..dim {
            if (bits >> (y * dim + x)) & 1 != 0 {
                let nx = dim - 1 - y;
                let ny = x;
                res |= 1 << (ny * dim + nx);
            }
        }
    }
    res
}

/// A dictionary hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMatch {
    pub id: u32,
    /// Clockwise quarter turns applied to the observed bits to reach the code.
    pub rotation: u32,
    pub hamming: u32,
}

/// Closest code within `max_hamming` over all four rotations.
pub fn lookup(bits: u16, max_hamming: u32) -> Option<CodeMatch> {
    let mut best: Option<CodeMatch> = None;
    let mut rbits = bits;
    for rotation in 0..4 {
        for (id, &code) in DICT_4X4_50.iter().enumerate() {
            let hamming = (rbits ^ code).count_ones();
            if hamming > max_hamming {
                continue;
            }
            if best.map_or(true, |b| hamming < b.hamming) {
                best = Some(CodeMatch {
                    id: id as u32,
                    rotation,
                    hamming,
                });
            }
        }
        rbits = rotate90(rbits, PAYLOAD_DIM);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_rotations_are_identity() {
        for &code in &DICT_4X4_50 {
            let mut r = code;
            for _ in 0..4 {
                r = rotate90(r, PAYLOAD_DIM);
            }
            assert_eq!(r, code);
        }
    }

    #[test]
    fn rotate_moves_top_left_to_top_right() {
        assert_eq!(rotate90(0b1, PAYLOAD_DIM), 0b1000);
    }

    #[test]
    fn exact_codes_decode_without_rotation() {
        for (id, &code) in DICT_4X4_50.iter().enumerate() {
            let m = lookup(code, 0).unwrap();
            assert_eq!(m.id, id as u32);
            assert_eq!(m.rotation, 0);
        }
    }

    #[test]
    fn rotated_codes_decode_with_their_turn_count() {
        let code = DICT_4X4_50[3];
        let observed = rotate90(code, PAYLOAD_DIM);
        let m = lookup(observed, 0).unwrap();
        assert_eq!(m.id, 3);
        assert_eq!(m.rotation, 3);
    }

    #[test]
    fn single_bit_error_is_corrected() {
        let m = lookup(DICT_4X4_50[17] ^ 0x0100, 1).unwrap();
        assert_eq!(m.id, 17);
        assert_eq!(m.hamming, 1);
    }

    #[test]
    fn blank_payload_is_rejected() {
        assert!(lookup(0x0000, 1).is_none());
        assert!(lookup(0xffff, 1).is_none());
    }
}
