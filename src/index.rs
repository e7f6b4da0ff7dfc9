use bio::{
    alphabets::{Alphabet, RankTransform},
    data_structures::{
        bwt::{bwt, less, Less, Occ, BWT},
        suffix_array::suffix_array,
    },
};
use log::debug;

use crate::errors::{Error, Result};

/// Bases the engine works with, in code order (`A = 0 .. T = 3`).
pub const DNA_BASES: &[u8; 4] = b"ACGT";
/// Symbols accepted in reference sequences.
pub const DNA_UPPERCASE_N_ALPHABET: &[u8; 5] = b"ACGTN";

/// Reference symbols are rank-transformed over the fixed alphabet `$ACGNT`
/// (byte order), so ranks are stable regardless of which symbols a
/// particular reference happens to contain.
const SENTINEL_RANK: u8 = 0;
/// Rank of each base code `A, C, G, T`. `N` sits at rank 4, between `G`
/// and `T`.
const RANK_OF_BASE: [u8; 4] = [1, 2, 3, 5];
/// Inverse of `RANK_OF_BASE`; `None` for the sentinel and `N`.
const BASE_OF_RANK: [Option<u8>; 6] = [None, Some(0), Some(1), Some(2), None, Some(3)];

/// Fixed-width k-mer lookup table: SA range per k-mer, one table lookup
/// instead of `width` LF operations. K-mers touching `N` or the sentinel are
/// absent and yield the empty range.
struct Ftab {
    lohi: Vec<(usize, usize)>,
}

impl Ftab {
    /// One sweep over the suffix array; equal k-mers occupy contiguous SA
    /// rows, so every entry is filled by extending its `bot`.
    fn new(text: &[u8], suffix_array: &[usize], width: usize) -> Self {
        let mut lohi = vec![(0, 0); 4_usize.pow(width as u32)];
        for (row, &pos) in suffix_array.iter().enumerate() {
            if pos + width >= text.len() {
                continue;
            }
            let code = text[pos..pos + width]
                .iter()
                .try_fold(0_usize, |acc, &rank| {
                    BASE_OF_RANK[rank as usize].map(|base| acc * 4 + base as usize)
                });
            if let Some(code) = code {
                let entry = &mut lohi[code];
                if entry.1 == 0 {
                    entry.0 = row;
                }
                entry.1 = row + 1;
            }
        }
        Self { lohi }
    }

    /// SA range of the k-mer given as base codes. K-mers containing codes
    /// outside `A..T` (read `N`s) are never present.
    fn get(&self, mut kmer: impl Iterator<Item = u8>) -> (usize, usize) {
        kmer.try_fold(0_usize, |acc, base| {
            (base < 4).then(|| acc * 4 + base as usize)
        })
        .map_or((0, 0), |code| self.lohi[code])
    }
}

/// One FM half: BWT, C ("less") table, sampled Occ table, cached sentinel
/// row, and the half's ftab.
struct FmHalf {
    bwt: BWT,
    less: Less,
    occ: Occ,
    sentinel: usize,
    ftab: Ftab,
}

impl FmHalf {
    fn new(text: Vec<u8>, alphabet: &Alphabet, ftab_width: usize) -> Self {
        let sa = suffix_array(&text);
        let bwt = bwt(&text, &sa);
        let less = less(&bwt, alphabet);
        let occ = Occ::new(&bwt, 128, alphabet);
        let sentinel = bwt
            .iter()
            .position(|&symbol| symbol == SENTINEL_RANK)
            .expect("transformed text ends with the sentinel");
        let ftab = Ftab::new(&text, &sa, ftab_width);
        Self {
            bwt,
            less,
            occ,
            sentinel,
            ftab,
        }
    }

    /// Occurrences of `rank` in `bwt[..r]`. The sentinel occurs exactly once,
    /// so its count comes from the cached row instead of the Occ table.
    fn cnt(&self, r: usize, rank: u8) -> usize {
        if r == 0 {
            0
        } else if rank == SENTINEL_RANK {
            usize::from(self.sentinel < r)
        } else {
            self.occ.get(&self.bwt, r - 1, rank)
        }
    }

    fn lf(&self, r: usize, rank: u8) -> usize {
        self.less[rank as usize] + self.cnt(r, rank)
    }
}

/// Bidirectional index: an FM half over the reference text and a mirror half
/// over the reversed text. A matched substring is represented by equal-width
/// SA ranges in both halves, which allows extension at either end of the
/// match in O(alphabet) work per step.
pub struct BiFmIndex {
    fw: FmHalf,
    bw: FmHalf,
    fchr: [(usize, usize); 4],
    ftab_width: usize,
    reference_len: usize,
}

impl BiFmIndex {
    /// Build both halves from an `ACGTN` reference. `ftab_width` is the k-mer
    /// width of the lookup tables (the original default is 10).
    pub fn new(reference: &[u8], ftab_width: usize) -> Result<Self> {
        if reference.is_empty() {
            return Err(Error::ParseError("empty reference sequence".into()));
        }
        if !(1..=15).contains(&ftab_width) {
            return Err(Error::ParseError(format!(
                "unsupported ftab width: {}",
                ftab_width
            )));
        }
        let reference = reference.to_ascii_uppercase();
        if !Alphabet::new(DNA_UPPERCASE_N_ALPHABET).is_word(&reference) {
            return Err(Error::ParseError(
                "found non-ACGTN symbol in reference sequence".into(),
            ));
        }

        debug!("Compress reference");
        let mut symbols = b"$".to_vec();
        symbols.extend_from_slice(DNA_UPPERCASE_N_ALPHABET);
        let rank_transform = RankTransform::new(&Alphabet::new(&symbols));
        let rank_alphabet = Alphabet::new(0..rank_transform.ranks.len() as u8);

        debug!("Build forward half");
        let mut text = reference.clone();
        text.push(b'$');
        let fw = FmHalf::new(rank_transform.transform(&text), &rank_alphabet, ftab_width);

        debug!("Build mirror half");
        let mut text_rev = reference.clone();
        text_rev.reverse();
        text_rev.push(b'$');
        let bw = FmHalf::new(
            rank_transform.transform(&text_rev),
            &rank_alphabet,
            ftab_width,
        );

        // Character counts are identical in both halves, so the single-base
        // ranges can be shared.
        let mut fchr = [(0, 0); 4];
        for (base, slot) in fchr.iter_mut().enumerate() {
            let rank = RANK_OF_BASE[base];
            let start = fw.less[rank as usize];
            let count = fw.cnt(fw.bwt.len(), rank);
            *slot = (start, start + count);
        }

        Ok(Self {
            fw,
            bw,
            fchr,
            ftab_width,
            reference_len: reference.len(),
        })
    }

    pub fn ftab_width(&self) -> usize {
        self.ftab_width
    }

    pub fn reference_len(&self) -> usize {
        self.reference_len
    }

    /// SA range of all suffixes beginning with `base`, valid in both halves.
    pub fn fchr(&self, base: u8) -> (usize, usize) {
        self.fchr[base as usize]
    }

    /// Ranges of the k-mer `seq[off..off + width]` in the forward and mirror
    /// halves. `seq` is given as base codes. The mirror lookup reverses the
    /// k-mer internally, since the mirror half indexes the reversed text.
    pub fn ftab_lo_hi(&self, seq: &[u8], off: usize) -> ((usize, usize), (usize, usize)) {
        let kmer = &seq[off..off + self.ftab_width];
        let fw_range = self.fw.ftab.get(kmer.iter().copied());
        if fw_range.1 <= fw_range.0 {
            return ((0, 0), (0, 0));
        }
        let bw_range = self.bw.ftab.get(kmer.iter().rev().copied());
        debug_assert_eq!(fw_range.1 - fw_range.0, bw_range.1 - bw_range.0);
        (fw_range, bw_range)
    }

    /// One backward-extension step in the stepping half (the mirror half when
    /// `l2r`), producing child ranges for all four bases (`t`/`b`) together
    /// with the matching co-ranges in the other half (`tp`/`bp`).
    ///
    /// Co-ranges follow from the partition order of the co-half's suffix
    /// array: within `[topp, botp)` the occurrences are sorted by the
    /// extension character, sentinel first, then by rank. Accumulating child
    /// widths in rank order therefore lays the co-ranges out exactly.
    #[allow(clippy::type_complexity)]
    pub fn map_bi_lf_ex(
        &self,
        l2r: bool,
        top: usize,
        bot: usize,
        topp: usize,
        botp: usize,
    ) -> ([usize; 4], [usize; 4], [usize; 4], [usize; 4]) {
        debug_assert_eq!(bot - top, botp - topp);
        let half = if l2r { &self.bw } else { &self.fw };
        let (mut t, mut b, mut tp, mut bp) = ([0; 4], [0; 4], [0; 4], [0; 4]);
        let mut acc = topp;
        for rank in 0..6_u8 {
            let o = half.cnt(top, rank);
            let width = half.cnt(bot, rank) - o;
            if let Some(base) = BASE_OF_RANK[rank as usize] {
                let base = base as usize;
                t[base] = half.less[rank as usize] + o;
                b[base] = t[base] + width;
                tp[base] = acc;
                bp[base] = acc + width;
            }
            acc += width;
        }
        debug_assert_eq!(acc, botp);
        (t, b, tp, bp)
    }

    /// Width-1 fast path: LF-map a single row of the stepping half. Returns
    /// the base preceding that row's suffix and the mapped row, or `None`
    /// when the preceding symbol is the sentinel or `N`.
    pub fn map_lf1(&self, l2r: bool, row: usize) -> Option<(u8, usize)> {
        let half = if l2r { &self.bw } else { &self.fw };
        let rank = half.bwt[row];
        let base = BASE_OF_RANK[rank as usize]?;
        Some((base, half.lf(row, rank)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(seq: &[u8]) -> Vec<u8> {
        seq.iter()
            .map(|symbol| match symbol {
                b'A' => 0,
                b'C' => 1,
                b'G' => 2,
                b'T' => 3,
                _ => 4,
            })
            .collect()
    }

    fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        if needle.is_empty() || haystack.len() < needle.len() {
            return 0;
        }
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    const REF: &[u8] = b"GATTACAGATTACAGGGT";

    #[test]
    fn fchr_covers_base_counts() {
        let index = BiFmIndex::new(REF, 3).unwrap();
        for (code, &base) in DNA_BASES.iter().enumerate() {
            let (top, bot) = index.fchr(code as u8);
            assert_eq!(bot - top, occurrences(REF, &[base]), "base {}", base as char);
        }
    }

    #[test]
    fn ftab_matches_naive_counts() {
        let index = BiFmIndex::new(REF, 3).unwrap();
        for kmer in [&b"GAT"[..], b"TTA", b"ACA", b"GGG", b"AAA", b"TAC"] {
            let ((topf, botf), (topb, botb)) = index.ftab_lo_hi(&encode(kmer), 0);
            assert_eq!(botf - topf, occurrences(REF, kmer), "{:?}", kmer);
            assert_eq!(botf - topf, botb - topb);
        }
    }

    #[test]
    fn ftab_skips_n_kmers() {
        let index = BiFmIndex::new(b"GATNACA", 3).unwrap();
        let ((topf, botf), _) = index.ftab_lo_hi(&encode(b"ATN"), 0);
        assert_eq!(botf - topf, 0);
        let ((topf, botf), _) = index.ftab_lo_hi(&encode(b"ACA"), 0);
        assert_eq!(botf - topf, 1);
    }

    #[test]
    fn backward_step_partitions_range() {
        let index = BiFmIndex::new(REF, 3).unwrap();
        let ((topf, botf), (topb, botb)) = index.ftab_lo_hi(&encode(b"ATT"), 0);
        assert_eq!(botf - topf, 2);
        let (t, b, tp, bp) = index.map_bi_lf_ex(false, topf, botf, topb, botb);
        for base in 0..4_usize {
            let mut pattern = vec![DNA_BASES[base]];
            pattern.extend_from_slice(b"ATT");
            assert_eq!(b[base] - t[base], occurrences(REF, &pattern));
            assert_eq!(b[base] - t[base], bp[base] - tp[base]);
        }
    }

    #[test]
    fn forward_step_partitions_range() {
        let index = BiFmIndex::new(REF, 3).unwrap();
        let ((topf, botf), (topb, botb)) = index.ftab_lo_hi(&encode(b"GAT"), 0);
        assert_eq!(botf - topf, 2);
        // Appending steps the mirror half; co-ranges live in the forward one.
        let (t, b, tp, bp) = index.map_bi_lf_ex(true, topb, botb, topf, botf);
        for base in 0..4_usize {
            let mut pattern = b"GAT".to_vec();
            pattern.push(DNA_BASES[base]);
            assert_eq!(b[base] - t[base], occurrences(REF, &pattern), "{}", base);
            assert_eq!(b[base] - t[base], bp[base] - tp[base]);
        }
    }

    #[test]
    fn lf1_extends_unique_range() {
        let index = BiFmIndex::new(REF, 3).unwrap();
        // "GGG" occurs once; its preceding reference bases are "CA".
        let ((topf, botf), _) = index.ftab_lo_hi(&encode(b"GGG"), 0);
        assert_eq!(botf - topf, 1);
        let (base, row) = index.map_lf1(false, topf).unwrap();
        assert_eq!(DNA_BASES[base as usize], b'A');
        let (next_base, _) = index.map_lf1(false, row).unwrap();
        assert_eq!(DNA_BASES[next_base as usize], b'C');
    }

    #[test]
    fn lf1_stops_at_text_start() {
        let index = BiFmIndex::new(b"ACGT", 2).unwrap();
        let ((topf, botf), _) = index.ftab_lo_hi(&encode(b"AC"), 0);
        assert_eq!(botf - topf, 1);
        // The suffix "ACGT$" is preceded by nothing but the sentinel.
        assert!(index.map_lf1(false, topf).is_none());
    }

    #[test]
    fn rejects_invalid_reference() {
        assert!(BiFmIndex::new(b"", 3).is_err());
        assert!(BiFmIndex::new(b"ACGU", 3).is_err());
        assert!(BiFmIndex::new(b"ACGT", 0).is_err());
    }
}
