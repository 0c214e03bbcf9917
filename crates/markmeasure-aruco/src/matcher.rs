//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Brute-force matcher over every id and quarter turn of a fixed dictionary.
///
/// A 50-symbol 4×4 dictionary is 200 XOR/popcount pairs per lookup.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher for `dict` accepting codes up to `max_hamming` bits away.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&code| std::array::from_fn(|rot| rotate_code_u64(code, n, rot as u8)))
            .collect();
        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Closest dictionary entry within `max_hamming`; ties keep the lowest id.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let hamming = (observed ^ cand).count_ones() as u8;
                if hamming > self.max_hamming {
                    continue;
                }
                if best.is_some_and(|b| b.hamming <= hamming) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming,
                });
                if hamming == 0 {
                    return best;
                }
            }
        }
        best
    }
}

/// Rotate an `n × n` code (bit index `y * n + x`) clockwise by `rot` quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let bit = |x: usize, y: usize| (code >> (y * n + x)) & 1;
    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let v = match rot & 3 {
                0 => bit(x, y),
                1 => bit(y, n - 1 - x),
                2 => bit(n - 1 - x, n - 1 - y),
                _ => bit(n - 1 - y, x),
            };
            out |= v << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    #[test]
    fn four_quarter_turns_are_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let r = (0..4).fold(code, |c, _| rotate_code_u64(c, 8, 1));
        assert_eq!(r, code);
    }

    #[test]
    fn single_turn_moves_bottom_left_to_top_left() {
        // 2x2: only bottom-left (x=0, y=1) set -> bit index 2.
        let rotated = rotate_code_u64(1 << 2, 2, 1);
        assert_eq!(rotated, 1);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let dict = builtins::DICT_4X4_50;
        let matcher = Matcher::new(dict, 0);

        let observed = rotate_code_u64(dict.codes[7], dict.marker_size, 3);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 7);
        assert_eq!(m.rotation, 3);
        assert_eq!(m.hamming, 0);
    }

    #[test]
    fn single_bit_error_within_tolerance() {
        let dict = builtins::DICT_4X4_50;
        let observed = dict.codes[0] ^ (1 << 5);

        assert!(Matcher::new(dict, 0).match_code(observed).is_none());
        let m = Matcher::new(dict, 1).match_code(observed).expect("match");
        assert_eq!(m.hamming, 1);
    }
}
