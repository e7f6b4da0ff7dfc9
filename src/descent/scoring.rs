use serde::{Deserialize, Serialize};

use crate::descent::query::BASE_N;

/// Penalty charged for a mismatched read character.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub enum MismatchCost {
    Constant(u32),
    /// Linear in the Phred quality, saturating at Q40: `min` at Q0, `max`
    /// at Q40 and above.
    QualityScaled { min: u32, max: u32 },
}

/// Penalty scheme consumed by the descent engine. A length-k gap costs
/// `open + (k - 1) * extend`: the opening penalty covers the first gapped
/// position, extensions cover the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scoring {
    pub mm_cost: MismatchCost,
    /// Penalty for a mismatch whose read character is `N`.
    pub n_cost: u32,
    pub read_gap_open: u32,
    pub read_gap_extend: u32,
    pub ref_gap_open: u32,
    pub ref_gap_extend: u32,
    /// Minimum distance from either read end at which gaps may occur.
    /// Must be at least 1.
    pub gap_dist_ends: usize,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            mm_cost: MismatchCost::Constant(3),
            n_cost: 1,
            read_gap_open: 8,
            read_gap_extend: 3,
            ref_gap_open: 8,
            ref_gap_extend: 3,
            gap_dist_ends: 4,
        }
    }
}

impl Scoring {
    /// Mismatch penalty for the given read character and Phred quality.
    pub fn mm(&self, read_char: u8, qual: u8) -> u32 {
        if read_char >= BASE_N {
            return self.n_cost;
        }
        match self.mm_cost {
            MismatchCost::Constant(pen) => pen,
            MismatchCost::QualityScaled { min, max } => {
                let q = u32::from(qual.min(40));
                min + (max - min) * q / 40
            }
        }
    }
}
