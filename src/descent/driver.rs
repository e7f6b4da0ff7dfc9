use log::trace;

use crate::descent::{
    arena::Arena,
    node::{Descent, SearchCx},
    pos::DescentPos,
    query::DescentQuery,
    redundancy::RedundancyChecker,
    scoring::Scoring,
    sink::DescentAlignmentSink,
    DescentConfig, DescentHeap, DescentRoot,
};
use crate::errors::{Error, Result};
use crate::index::BiFmIndex;

/// Cap on live descent records in one `go()` call.
pub const DESCENT_LIMIT: usize = 2_000_000;
/// Cap on live position records in one `go()` call.
pub const POS_LIMIT: usize = 10_000_000;

/// Counters over index operations performed during one search.
#[derive(Debug, Default, Clone)]
pub struct DescentMetrics {
    /// Total LF operations.
    pub bwops: u64,
    /// Bidirectional (width > 1) steps.
    pub bwops_bi: u64,
    /// Width-1 steps.
    pub bwops_1: u64,
}

/// Drives the descent search for one read: owns the query, the roots and
/// their configs, both arenas, the frontier, the redundancy checker and the
/// sink. One driver serves one read at a time; independent reads on separate
/// drivers may run on separate threads against a shared index.
#[derive(Default)]
pub struct DescentDriver {
    q: DescentQuery,
    roots: Vec<DescentRoot>,
    confs: Vec<DescentConfig>,
    df: Arena<Descent>,
    pf: Arena<DescentPos>,
    heap: DescentHeap,
    re: RedundancyChecker,
    sink: DescentAlignmentSink,
}

impl DescentDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new read (ASCII sequence, Phred+33 qualities) and reset all
    /// per-read state, including roots and previously collected alignments.
    pub fn init_read(&mut self, seq: &[u8], qual: &[u8]) -> Result<()> {
        self.q = DescentQuery::new(seq, qual)?;
        self.roots.clear();
        self.confs.clear();
        self.df.clear();
        self.pf.clear();
        self.heap.clear();
        self.re.clear();
        self.sink.clear();
        Ok(())
    }

    /// Add a search root at a 5' offset of the current read. `l2r` is the
    /// first extension direction, `fw` the strand, `pri` the user-supplied
    /// tie-breaking priority (lower explores first).
    pub fn add_root(&mut self, conf: DescentConfig, off5p: usize, l2r: bool, fw: bool, pri: f32) {
        debug_assert!(off5p < self.q.len());
        self.roots.push(DescentRoot {
            off5p,
            l2r,
            fw,
            pri,
        });
        self.confs.push(conf);
    }

    pub fn query(&self) -> &DescentQuery {
        &self.q
    }

    pub fn sink(&self) -> &DescentAlignmentSink {
        &self.sink
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// Seed one descent per root, then repeatedly follow the best outgoing
    /// edge of the best frontier descent until the frontier drains.
    /// Termination is guaranteed: every branch strictly increases depth or
    /// penalty and the consistency function caps the penalty.
    pub fn go(&mut self, sc: &Scoring, index: &BiFmIndex, met: &mut DescentMetrics) -> Result<()> {
        debug_assert!(sc.gap_dist_ends >= 1);
        let Self {
            q,
            roots,
            confs,
            df,
            pf,
            heap,
            re,
            sink,
        } = self;
        df.clear();
        pf.clear();
        heap.clear();
        re.clear();
        let cx = SearchCx {
            q: &*q,
            sc,
            index,
            roots: roots.as_slice(),
            confs: confs.as_slice(),
        };
        for rid in 0..cx.roots.len() {
            let dfsz = df.size();
            let pfsz = pf.size();
            let id = df.alloc();
            let succ = Descent::init_root(&cx, rid, id, df, pf, heap, re, sink, met);
            if !succ {
                // The root produced no outgoing work; reclaim its records.
                df.resize(dfsz);
                pf.resize(pfsz);
            }
        }
        while let Some((_pri, id)) = heap.pop() {
            if df.size() > DESCENT_LIMIT || pf.size() > POS_LIMIT {
                trace!(
                    "Search space limit exceeded (read length: {} bp, descents: {}, positions: {}). Aborting the read.",
                    cx.q.len(),
                    df.size(),
                    pf.size(),
                );
                return Err(Error::SearchSpaceExceeded);
            }
            Descent::follow_best_outgoing(id, &cx, df, pf, heap, re, sink, met);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_read_validates_input() {
        let mut driver = DescentDriver::new();
        assert!(driver.init_read(b"", b"").is_err());
        assert!(driver.init_read(b"A", b"I").is_err());
        assert!(driver.init_read(b"ACGT", b"III").is_err());
        assert!(driver.init_read(b"ACGT", b"IIII").is_ok());
        assert_eq!(driver.query().len(), 4);
    }

    #[test]
    fn go_without_roots_finds_nothing() {
        let index = BiFmIndex::new(b"ACGTACGTACGT", 3).unwrap();
        let mut driver = DescentDriver::new();
        driver.init_read(b"ACGTACGT", b"IIIIIIII").unwrap();
        let mut met = DescentMetrics::default();
        driver.go(&Scoring::default(), &index, &mut met).unwrap();
        assert_eq!(driver.sink().nrange(), 0);
        assert_eq!(met.bwops, 0);
    }

    #[test]
    fn init_read_resets_previous_results() {
        let index = BiFmIndex::new(b"ACGTAACCGGTTACGT", 2).unwrap();
        let mut driver = DescentDriver::new();
        driver.init_read(b"AACCGGTT", b"IIIIIIII").unwrap();
        driver.add_root(
            DescentConfig {
                cons: crate::descent::Consistency::Linear {
                    intercept: 0.0,
                    slope: 1.0,
                },
            },
            0,
            true,
            true,
            0.0,
        );
        let mut met = DescentMetrics::default();
        driver.go(&Scoring::default(), &index, &mut met).unwrap();
        assert_eq!(driver.sink().nrange(), 1);

        driver.init_read(b"AACCGGTT", b"IIIIIIII").unwrap();
        assert_eq!(driver.sink().nrange(), 0);
        assert_eq!(driver.num_roots(), 0);
    }
}
