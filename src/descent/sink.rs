use std::collections::HashSet;
use std::ops::Index;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::descent::{arena::Arena, edge::DescentEdit, node::Descent, DescentRoot};

/// One full-length hit: equal-width SA ranges in both index halves, the
/// penalty, the root that produced it, and the edit script in 5'-to-3'
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescentAlignment {
    pub pen: u32,
    pub rid: usize,
    pub fw: bool,
    pub topf: usize,
    pub botf: usize,
    pub topb: usize,
    pub botb: usize,
    pub edits: SmallVec<[DescentEdit; 8]>,
}

/// Collects full-length alignments. Distinct search paths can reach the
/// same SA range (the same set of reference intervals); the sink keeps only
/// the first report per forward range, which under best-first exploration is
/// the best-penalty one.
#[derive(Debug, Default)]
pub struct DescentAlignmentSink {
    alns: Vec<DescentAlignment>,
    seen: HashSet<(usize, usize)>,
}

impl DescentAlignmentSink {
    /// Record a hit reported by `leaf` (plus a trailing edit not yet
    /// attached to any descent). The edit script is assembled by walking the
    /// leaf's ancestor chain. Returns false iff the range was already
    /// recorded.
    #[allow(clippy::too_many_arguments)]
    pub fn report_alignment(
        &mut self,
        roots: &[DescentRoot],
        df: &Arena<Descent>,
        leaf: &Descent,
        extra: Option<DescentEdit>,
        pen: u32,
        topf: usize,
        botf: usize,
        topb: usize,
        botb: usize,
    ) -> bool {
        debug_assert_eq!(botf - topf, botb - topb);
        if !self.seen.insert((topf, botf)) {
            return false;
        }
        let mut edits: SmallVec<[DescentEdit; 8]> = SmallVec::new();
        if let Some(edit) = extra {
            edits.push(edit);
        }
        let mut cur = Some(leaf);
        while let Some(desc) = cur {
            if let Some(edit) = desc.edit {
                edits.push(edit);
            }
            cur = desc.parent.map(|id| &df[id]);
        }
        // Leaf-to-root collection order, restored to root-to-leaf before the
        // positional sort so gap chains keep their path order.
        edits.reverse();
        edits.sort_by_key(DescentEdit::off5p);
        self.alns.push(DescentAlignment {
            pen,
            rid: leaf.rid,
            fw: roots[leaf.rid].fw,
            topf,
            botf,
            topb,
            botb,
            edits,
        });
        true
    }

    /// Number of distinct SA ranges recorded.
    pub fn nrange(&self) -> usize {
        self.alns.len()
    }

    /// Total number of SA elements across all recorded ranges.
    pub fn nelt(&self) -> usize {
        self.alns.iter().map(|aln| aln.botf - aln.topf).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.alns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DescentAlignment> {
        self.alns.iter()
    }

    pub fn clear(&mut self) {
        self.alns.clear();
        self.seen.clear();
    }
}

impl Index<usize> for DescentAlignmentSink {
    type Output = DescentAlignment;

    fn index(&self, i: usize) -> &DescentAlignment {
        &self.alns[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<DescentRoot> {
        vec![DescentRoot {
            off5p: 0,
            l2r: true,
            fw: true,
            pri: 0.0,
        }]
    }

    fn mm(off5p: u32) -> DescentEdit {
        DescentEdit::Mismatch {
            off5p,
            ref_base: 0,
            read_base: 1,
        }
    }

    #[test]
    fn assembles_edit_script_from_ancestor_chain() {
        let roots = roots();
        let mut df: Arena<Descent> = Arena::new();
        let root_id = df.alloc();
        let mid_id = df.alloc();
        df[mid_id].parent = Some(root_id);
        df[mid_id].edit = Some(mm(20));
        let leaf_id = df.alloc();
        df[leaf_id].parent = Some(mid_id);
        df[leaf_id].edit = Some(mm(4));

        let mut sink = DescentAlignmentSink::default();
        let leaf = df[leaf_id].clone();
        assert!(sink.report_alignment(&roots, &df, &leaf, Some(mm(12)), 9, 5, 6, 7, 8));
        assert_eq!(sink.nrange(), 1);
        assert_eq!(sink.nelt(), 1);
        let offs: Vec<u32> = sink[0].edits.iter().map(DescentEdit::off5p).collect();
        assert_eq!(offs, vec![4, 12, 20]);
        assert_eq!(sink[0].pen, 9);
    }

    #[test]
    fn deduplicates_identical_ranges() {
        let roots = roots();
        let mut df: Arena<Descent> = Arena::new();
        let id = df.alloc();
        let leaf = df[id].clone();

        let mut sink = DescentAlignmentSink::default();
        assert!(sink.report_alignment(&roots, &df, &leaf, None, 0, 10, 12, 30, 32));
        assert!(!sink.report_alignment(&roots, &df, &leaf, None, 3, 10, 12, 30, 32));
        assert!(sink.report_alignment(&roots, &df, &leaf, None, 3, 11, 12, 31, 32));
        assert_eq!(sink.nrange(), 2);
        assert_eq!(sink.nelt(), 3);
        assert_eq!(sink[0].pen, 0);
    }
}
