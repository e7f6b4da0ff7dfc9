use crate::descent::{
    arena::Arena,
    driver::DescentMetrics,
    edge::{DescentEdit, DescentOut, OutEdge},
    pos::DescentPos,
    query::DescentQuery,
    redundancy::RedundancyChecker,
    scoring::Scoring,
    sink::DescentAlignmentSink,
    DescentConfig, DescentHeap, DescentRoot, Priority,
};
use crate::index::BiFmIndex;

/// Depth from the search root within which branching is not considered.
/// Only the ftab shortcut's width is bounded by it: a root may jump the
/// first `ftab_width <= NOBRANCH_DEPTH` characters in one table lookup.
pub(crate) const NOBRANCH_DEPTH: usize = 20;

/// Read-only context shared by every operation of one `go()` call.
pub(crate) struct SearchCx<'a> {
    pub q: &'a DescentQuery,
    pub sc: &'a Scoring,
    pub index: &'a BiFmIndex,
    pub roots: &'a [DescentRoot],
    pub confs: &'a [DescentConfig],
}

/// Outcome of `follow_matches`: how the exact extension ended, and the SA
/// range at that point (consumed by `bounce` when an extremity was reached
/// with read left on the other side).
#[derive(Debug, Default, Copy, Clone)]
struct FollowOut {
    /// At least one sibling range had mass somewhere along the run.
    #[allow(dead_code)]
    branches: bool,
    hit_end: bool,
    done: bool,
    topf: usize,
    botf: usize,
    topb: usize,
    botb: usize,
}

/// Everything a branch child inherits from its parent at creation time.
pub(crate) struct BranchArgs {
    pub rid: usize,
    pub al5pi: usize,
    pub al5pf: usize,
    pub topf: usize,
    pub botf: usize,
    pub topb: usize,
    pub botb: usize,
    pub l2r: bool,
    pub parent: usize,
    pub pen: u32,
    pub edit: Option<DescentEdit>,
    pub parent_gapadd: i32,
}

/// One contiguous matched run from a root or a branch point. Cross-references
/// (parent, position records) are integer ids into the arenas; a descent
/// never holds direct references to other records.
#[derive(Debug, Default, Clone)]
pub struct Descent {
    pub(crate) rid: usize,
    pub(crate) al5pi: usize,
    pub(crate) al5pf: usize,
    pub(crate) l2r: bool,
    pub(crate) pen: u32,
    pub(crate) topf: usize,
    pub(crate) botf: usize,
    pub(crate) topb: usize,
    pub(crate) botb: usize,
    pub(crate) descid: usize,
    pub(crate) parent: Option<usize>,
    pub(crate) posid: usize,
    pub(crate) len: usize,
    pub(crate) off5p_i: usize,
    pub(crate) gapadd: i32,
    pub(crate) edit: Option<DescentEdit>,
    pub(crate) out: DescentOut,
    pub(crate) last_recalc: bool,
}

impl Descent {
    fn root(&self) -> bool {
        self.parent.is_none()
    }

    /// Initialize a descent at a search root. Returns false iff it produced
    /// neither outgoing edges nor a bounce child; the caller must then roll
    /// both arenas back.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn init_root(
        cx: &SearchCx,
        rid: usize,
        descid: usize,
        df: &mut Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        heap: &mut DescentHeap,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
    ) -> bool {
        let root = cx.roots[rid];
        let node = Descent {
            rid,
            al5pi: root.off5p,
            al5pf: root.off5p,
            l2r: root.l2r,
            descid,
            parent: None,
            posid: usize::MAX,
            last_recalc: true,
            ..Descent::default()
        };
        Self::finish_init(node, cx, df, pf, heap, re, sink, met)
    }

    /// Initialize a descent branching from a parent via an edit (or via a
    /// bounce, with no edit). Same return contract as `init_root`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn init_branch(
        cx: &SearchCx,
        args: BranchArgs,
        descid: usize,
        df: &mut Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        heap: &mut DescentHeap,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
    ) -> bool {
        let gapadd = args.parent_gapadd
            + args.edit.map_or(0, |e| {
                if e.is_read_gap() {
                    1
                } else if e.is_ref_gap() {
                    -1
                } else {
                    0
                }
            });
        let node = Descent {
            rid: args.rid,
            al5pi: args.al5pi,
            al5pf: args.al5pf,
            l2r: args.l2r,
            pen: args.pen,
            topf: args.topf,
            botf: args.botf,
            topb: args.topb,
            botb: args.botb,
            descid,
            parent: Some(args.parent),
            posid: usize::MAX,
            len: 0,
            off5p_i: 0,
            gapadd,
            edit: args.edit,
            out: DescentOut::default(),
            last_recalc: true,
        };
        debug_assert!(
            cx.confs[node.rid]
                .cons
                .max_pen(node.al5pf - node.al5pi + 1)
                >= node.pen
        );
        Self::finish_init(node, cx, df, pf, heap, re, sink, met)
    }

    /// Shared tail of both constructors: exact extension, optional bounce,
    /// then branch enumeration and heap insertion.
    #[allow(clippy::too_many_arguments)]
    fn finish_init(
        mut node: Descent,
        cx: &SearchCx,
        df: &mut Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        heap: &mut DescentHeap,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
    ) -> bool {
        let id = node.descid;
        let (match_succ, fo) = node.follow_matches(cx, df, pf, re, sink, met);
        // Store before bouncing so descendants can walk their ancestry.
        df.set(id, node);
        let mut bounce_succ = false;
        if match_succ && fo.hit_end && !fo.done {
            bounce_succ = Self::bounce(id, cx, df, pf, heap, re, sink, met, &fo);
        }
        let mut nonempty = false;
        if match_succ {
            let mut node = std::mem::take(&mut df[id]);
            node.recalc_outgoing(cx, pf, re);
            if let Some(pri) = node.out.best_pri() {
                nonempty = true;
                heap.insert(pri, id);
            }
            df.set(id, node);
        }
        nonempty || bounce_succ
    }

    /// Direction flip at a read extremity: a no-cost child that continues
    /// from the range just reached, extending the other way.
    #[allow(clippy::too_many_arguments)]
    fn bounce(
        parent_id: usize,
        cx: &SearchCx,
        df: &mut Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        heap: &mut DescentHeap,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
        fo: &FollowOut,
    ) -> bool {
        debug_assert!(fo.botf > fo.topf);
        let args = {
            let parent = &df[parent_id];
            debug_assert!(parent.al5pi == 0 || parent.al5pf == cx.q.len() - 1);
            debug_assert!(!(parent.al5pi == 0 && parent.al5pf == cx.q.len() - 1));
            BranchArgs {
                rid: parent.rid,
                al5pi: parent.al5pi,
                al5pf: parent.al5pf,
                topf: fo.topf,
                botf: fo.botf,
                topb: fo.topb,
                botb: fo.botb,
                l2r: !parent.l2r,
                parent: parent_id,
                pen: parent.pen,
                edit: None,
                parent_gapadd: parent.gapadd,
            }
        };
        let dfsz = df.size();
        let pfsz = pf.size();
        let id = df.alloc();
        let succ = Self::init_branch(cx, args, id, df, pf, heap, re, sink, met);
        if !succ {
            df.resize(dfsz);
            pf.resize(pfsz);
        }
        succ
    }

    /// Advance by following read matches as far as possible: the ftab
    /// shortcut (roots only), then bidirectional LF steps, one position
    /// record per consumed character. Stops on a non-matching character, a
    /// read extremity, a redundant intermediate state, or full alignment
    /// (which is reported right here).
    ///
    /// Returns `(false, _)` only when the descent made no progress at all;
    /// a mid-read stall still returns true, with the stalled position's
    /// record in place for branch enumeration.
    #[allow(clippy::too_many_arguments)]
    fn follow_matches(
        &mut self,
        cx: &SearchCx,
        df: &Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
    ) -> (bool, FollowOut) {
        let q = cx.q;
        let fw = cx.roots[self.rid].fw;
        let (mut topf, mut botf, mut topb, mut botb) =
            (self.topf, self.botf, self.topb, self.botb);
        let mut out = FollowOut::default();

        // Resolve the initial direction and next offset. `al5pi == al5pf`
        // means a fresh root with nothing consumed; a root sitting at an
        // extremity flips direction here instead of bouncing later.
        let mut toward3p;
        let mut off5p;
        loop {
            toward3p = self.l2r == fw;
            debug_assert!(self.al5pi != 0 || self.al5pf != q.len() - 1);
            if toward3p {
                if self.al5pf == q.len() - 1 {
                    self.l2r = !self.l2r;
                    continue;
                }
                off5p = if self.al5pi == self.al5pf {
                    self.al5pi
                } else {
                    self.al5pf + 1
                };
            } else {
                if self.al5pi == 0 {
                    self.l2r = !self.l2r;
                    continue;
                }
                off5p = if self.al5pi == self.al5pf {
                    self.al5pi
                } else {
                    self.al5pi - 1
                };
            }
            break;
        }
        self.off5p_i = off5p;
        let mut off3p = q.len() - off5p - 1;
        let mut first_pos = true;
        debug_assert_eq!(self.len, 0);

        if self.root() {
            debug_assert_eq!(self.al5pi, self.al5pf);
            let ftab_len = cx.index.ftab_width();
            let ftab_fits = if toward3p {
                ftab_len + off5p <= q.len()
            } else {
                off5p >= ftab_len
            };
            if ftab_len > 1 && ftab_len <= NOBRANCH_DEPTH && ftab_fits {
                // One table lookup covers the first ftab_len characters.
                let oriented = q.seq(fw);
                let mut off = if fw { off5p } else { q.len() - off5p - 1 };
                if !self.l2r {
                    off -= ftab_len - 1;
                }
                let ((tf, bf), (tb, bb)) = cx.index.ftab_lo_hi(oriented, off);
                if bf <= tf {
                    return (false, out);
                }
                topf = tf;
                botf = bf;
                topb = tb;
                botb = bb;
                let c_r2l = oriented[off];
                let c_l2r = oriented[off + ftab_len - 1];
                self.len += ftab_len;
                if toward3p {
                    // al5pi and al5pf start out equal, so the far end only
                    // advances by ftab_len - 1.
                    self.al5pf += ftab_len - 1;
                    if self.al5pf == q.len() - 1 {
                        out.hit_end = true;
                        out.done = self.al5pi == 0;
                    } else {
                        off5p += ftab_len;
                        off3p -= ftab_len;
                    }
                } else {
                    self.al5pi -= ftab_len - 1;
                    if self.al5pi == 0 {
                        out.hit_end = true;
                        out.done = self.al5pf == q.len() - 1;
                    } else {
                        off5p -= ftab_len;
                        off3p += ftab_len;
                    }
                }
                // The jumped-over records stay empty: no branch information
                // exists for them. Only the terminal one gets the matched
                // character's quad.
                let mut id = 0;
                for _ in 0..ftab_len {
                    id = pf.alloc();
                    pf[id].reset();
                    if first_pos {
                        self.posid = id;
                        first_pos = false;
                    }
                }
                let terminal = usize::from(if self.l2r { c_l2r } else { c_r2l });
                debug_assert!(terminal < 4);
                let rec = &mut pf[id];
                rec.c = terminal as i8;
                rec.topf[terminal] = topf;
                rec.botf[terminal] = botf;
                rec.topb[terminal] = topb;
                rec.botb[terminal] = botb;
            } else {
                // No usable ftab: take the first character from fchr.
                let rdc = q.getc(off5p, fw);
                if rdc >= 4 {
                    return (false, out);
                }
                let (t, b) = cx.index.fchr(rdc);
                if b <= t {
                    return (false, out);
                }
                topf = t;
                topb = t;
                botf = b;
                botb = b;
                self.len += 1;
                if toward3p {
                    if self.al5pf == q.len() - 1 {
                        out.hit_end = true;
                        out.done = self.al5pi == 0;
                    } else {
                        off5p += 1;
                        off3p -= 1;
                    }
                } else if self.al5pi == 0 {
                    out.hit_end = true;
                    out.done = self.al5pf == q.len() - 1;
                } else {
                    off5p -= 1;
                    off3p += 1;
                }
                let id = pf.alloc();
                pf[id].reset();
                self.posid = id;
                first_pos = false;
                let rec = &mut pf[id];
                rec.c = rdc as i8;
                rec.topf[rdc as usize] = topf;
                rec.botf[rdc as usize] = botf;
                rec.topb[rdc as usize] = topb;
                rec.botb[rdc as usize] = botb;
            }
            debug_assert!(botf > topf);
            debug_assert_eq!(botf - topf, botb - topb);
            let span = (self.al5pf - self.al5pi + 1) as isize + self.gapadd as isize;
            if !re.check(fw, self.al5pi, self.al5pf, span, topf, botf, self.pen) {
                return (false, out);
            }
        }

        if out.done {
            out.topf = topf;
            out.botf = botf;
            out.topb = topb;
            out.botb = botb;
            sink.report_alignment(cx.roots, df, self, None, self.pen, topf, botf, topb, botb);
            return (true, out);
        } else if out.hit_end {
            out.topf = topf;
            out.botf = botf;
            out.topb = topb;
            out.botb = botb;
            return (true, out);
        }

        let mut fail = false;
        while !fail && !out.hit_end {
            debug_assert!(!out.done);
            let rdc = q.getc(off5p, fw);
            debug_assert!(botf > topf);
            let width = botf - topf;
            let ltr = self.l2r;
            let (mut t, mut b) = ([0_usize; 4], [0_usize; 4]);
            let (mut tp, mut bp) = ([0_usize; 4], [0_usize; 4]);
            if width > 1 {
                met.bwops += 1;
                met.bwops_bi += 1;
                let (top, bot, topp, botp) = if ltr {
                    (topb, botb, topf, botf)
                } else {
                    (topf, botf, topb, botb)
                };
                (t, b, tp, bp) = cx.index.map_bi_lf_ex(ltr, top, bot, topp, botp);
                if rdc < 4 {
                    let rdc = rdc as usize;
                    fail = b[rdc] <= t[rdc];
                    if b[rdc] - t[rdc] < width {
                        out.branches = true;
                    }
                } else {
                    fail = true;
                    out.branches = true;
                }
            } else {
                met.bwops += 1;
                met.bwops_1 += 1;
                let step_row = if ltr { topb } else { topf };
                match cx.index.map_lf1(ltr, step_row) {
                    Some((cc, row)) => {
                        fail = rdc != cc;
                        if fail {
                            out.branches = true;
                        }
                        let cc = cc as usize;
                        t[cc] = row;
                        b[cc] = row + 1;
                        tp[cc] = if ltr { topf } else { topb };
                        bp[cc] = if ltr { botf } else { botb };
                    }
                    None => {
                        fail = true;
                        out.branches = true;
                    }
                }
            }
            if rdc < 4 {
                let rdc = rdc as usize;
                topf = if ltr { tp[rdc] } else { t[rdc] };
                botf = if ltr { bp[rdc] } else { b[rdc] };
                topb = if ltr { t[rdc] } else { tp[rdc] };
                botb = if ltr { b[rdc] } else { bp[rdc] };
                debug_assert_eq!(botf - topf, botb - topb);
            }
            // The record is installed even on failure: branch enumeration
            // wants to consider ways of leaving the failed position too.
            let id = pf.alloc();
            if first_pos {
                self.posid = id;
                first_pos = false;
            }
            debug_assert_eq!(id, self.posid + self.len);
            let (tf, bf, tb, bb) = if ltr { (tp, bp, t, b) } else { (t, b, tp, bp) };
            let rec = &mut pf[id];
            rec.reset();
            rec.c = rdc as i8;
            rec.topf = tf;
            rec.botf = bf;
            rec.topb = tb;
            rec.botb = bb;
            if !fail {
                let (mut al5pi, mut al5pf) = (self.al5pi, self.al5pf);
                if toward3p {
                    al5pf += 1;
                } else {
                    al5pi -= 1;
                }
                let span = (al5pf - al5pi + 1) as isize + self.gapadd as isize;
                fail = !re.check(fw, al5pi, al5pf, span, topf, botf, self.pen);
            }
            if !fail {
                self.len += 1;
                if toward3p {
                    self.al5pf += 1;
                    if self.al5pf == q.len() - 1 {
                        out.hit_end = true;
                        out.done = self.al5pi == 0;
                    } else {
                        off5p += 1;
                        off3p -= 1;
                    }
                } else {
                    debug_assert!(self.al5pi > 0);
                    self.al5pi -= 1;
                    if self.al5pi == 0 {
                        out.hit_end = true;
                        out.done = self.al5pf == q.len() - 1;
                    } else {
                        off5p -= 1;
                        off3p += 1;
                    }
                }
            }
        }
        debug_assert!(self.al5pf >= self.al5pi);

        out.topf = topf;
        out.botf = botf;
        out.topb = topb;
        out.botb = botb;
        if out.done {
            sink.report_alignment(cx.roots, df, self, None, self.pen, topf, botf, topb, botb);
        }
        (true, out)
    }

    /// Enumerate the legal outgoing edges of this descent, walking every
    /// position record it owns, and keep the best five. Each candidate is
    /// bounded by the consistency function at its depth, gated by the
    /// exploration flags, and pre-filtered against the redundancy checker
    /// (planning-time check). Sets `last_recalc` iff the ranker's cache is
    /// complete.
    fn recalc_outgoing(
        &mut self,
        cx: &SearchCx,
        pf: &mut Arena<DescentPos>,
        re: &RedundancyChecker,
    ) -> usize {
        debug_assert_eq!(self.botf - self.topf, self.botb - self.topb);
        debug_assert!(self.out.is_empty());
        let q = cx.q;
        let fw = cx.roots[self.rid].fw;
        let root_pri = cx.roots[self.rid].pri;
        let toward3p = self.l2r == fw;
        let gapadd = self.gapadd as isize;
        let mut off5p = self.off5p_i;
        let mut off3p = q.len() - off5p - 1;
        debug_assert!(self.al5pf >= self.al5pi);

        // The walk covers this descent's own records; when the last one is a
        // failed match it sits one past the aligned window, hence the extra
        // position on the failing side.
        let (mut extrai, mut extraf) = (0_usize, 0_usize);
        let (mut cur5pi, mut cur5pf) = (self.al5pi, self.al5pf);
        let mut depth;
        if toward3p {
            cur5pf = off5p;
            depth = off5p - self.al5pi;
            if self.al5pf < q.len() - 1 {
                extraf = 1;
            }
        } else {
            cur5pi = off5p;
            depth = self.al5pf - off5p;
            if self.al5pi > 0 {
                extrai = 1;
            }
        }

        let pen_rdg_ex = cx.sc.read_gap_extend;
        let pen_rfg_ex = cx.sc.ref_gap_extend;
        let pen_rdg_op = cx.sc.read_gap_open;
        let pen_rfg_op = cx.sc.ref_gap_open;
        // Range entering the current position, in descent direction and the
        // opposite one.
        let (mut top, mut bot, mut topp, mut botp) = if self.l2r {
            (self.topb, self.botb, self.topf, self.botf)
        } else {
            (self.topf, self.botf, self.topb, self.botb)
        };
        let mut nout = 0_usize;
        let mut d = self.posid;

        while off5p >= self.al5pi - extrai && off5p <= self.al5pf + extraf {
            debug_assert!(off5p < q.len());
            let maxpen = cx.confs[self.rid].cons.max_pen(depth);
            debug_assert!(maxpen >= self.pen);
            let diff = maxpen - self.pen;
            let rec = &pf[d];
            let (rtopf, rbotf, rtopb, rbotb) = (rec.topf, rec.botf, rec.topb, rec.botb);
            let flags = rec.flags;
            let (t, b, tp, bp) = if self.l2r {
                (rtopb, rbotb, rtopf, rbotf)
            } else {
                (rtopf, rbotf, rtopb, rbotb)
            };
            let (c, qq) = q.get(off5p, fw);

            if !flags.exhausted() && diff > 0 {
                let pen_mm = cx.sc.mm(c, qq);
                if pen_mm <= diff {
                    for j in 0..4_u8 {
                        if j == c {
                            continue;
                        }
                        let ju = j as usize;
                        if b[ju] <= t[ju] {
                            continue;
                        }
                        if !flags.mm_explore(j) {
                            continue;
                        }
                        let span = (cur5pf - cur5pi + 1) as isize + gapadd;
                        if re.contains(
                            fw,
                            cur5pi,
                            cur5pf,
                            span,
                            rtopf[ju],
                            rbotf[ju],
                            self.pen + pen_mm,
                        ) {
                            continue;
                        }
                        debug_assert_eq!(rbotb[ju] - rtopb[ju], rbotf[ju] - rtopf[ju]);
                        self.out.update(OutEdge {
                            edit: DescentEdit::Mismatch {
                                off5p: off5p as u32,
                                ref_base: j,
                                read_base: c,
                            },
                            off5p,
                            pri: Priority::new(self.pen + pen_mm, depth, b[ju] - t[ju], root_pri),
                            pos: d,
                        });
                        nout += 1;
                    }
                }
                let gaps_allowed = off5p >= cx.sc.gap_dist_ends && off3p >= cx.sc.gap_dist_ends;
                if gaps_allowed {
                    // If every way of proceeding is a match, a gap here is
                    // never better than the same gap one position further
                    // along.
                    let totwidth = (b[0] - t[0]) + (b[1] - t[1]) + (b[2] - t[2]) + (b[3] - t[3]);
                    let allmatch =
                        c < 4 && totwidth == (b[c as usize] - t[c as usize]);
                    let mut rdex = false;
                    let mut rfex = false;
                    let (cur5pi_i, cur5pf_i) = if toward3p {
                        (cur5pi, cur5pf - 1)
                    } else {
                        (cur5pi + 1, cur5pf)
                    };
                    if off5p == self.off5p_i {
                        if let Some(in_edit) = self.edit {
                            // At the descent's own root position an incoming
                            // gap can be scored as an extension.
                            if pen_rdg_ex <= diff && in_edit.is_read_gap() {
                                rdex = true;
                                for j in 0..4_u8 {
                                    let ju = j as usize;
                                    if b[ju] <= t[ju] {
                                        continue;
                                    }
                                    if !flags.rdg_explore(j) {
                                        continue;
                                    }
                                    let span = (cur5pf - cur5pi + 1) as isize + gapadd;
                                    if re.contains(
                                        fw,
                                        cur5pi_i,
                                        cur5pf_i,
                                        span,
                                        rtopf[ju],
                                        rbotf[ju],
                                        self.pen + pen_rdg_ex,
                                    ) {
                                        continue;
                                    }
                                    let off = off5p as u32 + u32::from(!self.l2r);
                                    self.out.update(OutEdge {
                                        edit: DescentEdit::ReadGap {
                                            off5p: off,
                                            ref_base: j,
                                            chain: in_edit.chain()
                                                + if self.l2r { 1 } else { -1 },
                                        },
                                        off5p,
                                        pri: Priority::new(
                                            self.pen + pen_rdg_ex,
                                            depth,
                                            b[ju] - t[ju],
                                            root_pri,
                                        ),
                                        pos: d,
                                    });
                                    nout += 1;
                                }
                            }
                            if pen_rfg_ex <= diff && in_edit.is_ref_gap() {
                                rfex = true;
                                if flags.rfg_explore() && bot > top {
                                    let (etopf, ebotf) =
                                        if self.l2r { (topp, botp) } else { (top, bot) };
                                    let nrefal = (cur5pf - cur5pi) as isize + gapadd;
                                    if !re.contains(
                                        fw,
                                        cur5pi,
                                        cur5pf,
                                        nrefal,
                                        etopf,
                                        ebotf,
                                        self.pen + pen_rfg_ex,
                                    ) {
                                        self.out.update(OutEdge {
                                            edit: DescentEdit::RefGap {
                                                off5p: off5p as u32,
                                                read_base: c,
                                            },
                                            off5p,
                                            pri: Priority::new(
                                                self.pen + pen_rfg_ex,
                                                depth,
                                                bot - top,
                                                root_pri,
                                            ),
                                            pos: d,
                                        });
                                        nout += 1;
                                    }
                                }
                            }
                        }
                    }
                    if !allmatch && pen_rdg_op <= diff && !rdex {
                        for j in 0..4_u8 {
                            let ju = j as usize;
                            if b[ju] <= t[ju] {
                                continue;
                            }
                            if !flags.rdg_explore(j) {
                                continue;
                            }
                            let span = (cur5pf - cur5pi + 1) as isize + gapadd;
                            if re.contains(
                                fw,
                                cur5pi_i,
                                cur5pf_i,
                                span,
                                rtopf[ju],
                                rbotf[ju],
                                self.pen + pen_rdg_op,
                            ) {
                                continue;
                            }
                            let off = off5p as u32 + u32::from(!self.l2r);
                            self.out.update(OutEdge {
                                edit: DescentEdit::ReadGap {
                                    off5p: off,
                                    ref_base: j,
                                    chain: 0,
                                },
                                off5p,
                                pri: Priority::new(
                                    self.pen + pen_rdg_op,
                                    depth,
                                    b[ju] - t[ju],
                                    root_pri,
                                ),
                                pos: d,
                            });
                            nout += 1;
                        }
                    }
                    if !allmatch && pen_rfg_op <= diff && !rfex && flags.rfg_explore() && bot > top
                    {
                        let (etopf, ebotf) = if self.l2r { (topp, botp) } else { (top, bot) };
                        let nrefal = (cur5pf - cur5pi) as isize + gapadd;
                        if !re.contains(fw, cur5pi, cur5pf, nrefal, etopf, ebotf, self.pen + pen_rfg_op)
                        {
                            self.out.update(OutEdge {
                                edit: DescentEdit::RefGap {
                                    off5p: off5p as u32,
                                    read_base: c,
                                },
                                off5p,
                                pri: Priority::new(self.pen + pen_rfg_op, depth, bot - top, root_pri),
                                pos: d,
                            });
                            nout += 1;
                        }
                    }
                }
            }

            d += 1;
            depth += 1;
            debug_assert!(depth <= self.al5pf - self.al5pi + 2);
            if toward3p {
                if off3p == 0 {
                    break;
                }
                off5p += 1;
                off3p -= 1;
                cur5pf += 1;
            } else {
                if off5p == 0 {
                    break;
                }
                off3p += 1;
                off5p -= 1;
                cur5pi -= 1;
            }
            if c >= 4 {
                // A read N never matched, so this was the last owned record.
                break;
            }
            let cu = c as usize;
            top = t[cu];
            topp = tp[cu];
            bot = b[cu];
            botp = bp[cu];
            debug_assert_eq!(bot - top, botp - topp);
        }

        self.last_recalc = nout <= 5;
        self.out.update_flags(pf);
        nout
    }

    /// Follow this descent's best outgoing edge: spawn the child descent (or
    /// report, if the edge completes the read), then re-insert the descent
    /// with its new best priority if edges remain. The descent must have
    /// been popped from the heap.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn follow_best_outgoing(
        id: usize,
        cx: &SearchCx,
        df: &mut Arena<Descent>,
        pf: &mut Arena<DescentPos>,
        heap: &mut DescentHeap,
        re: &mut RedundancyChecker,
        sink: &mut DescentAlignmentSink,
        met: &mut DescentMetrics,
    ) {
        let mut node = std::mem::take(&mut df[id]);
        debug_assert!(!node.out.is_empty());
        let q = cx.q;
        let fw = cx.roots[node.rid].fw;
        let toward3p = node.l2r == fw;
        let best = node.out.best_pri().expect("descent on the heap has edges");
        let e = node.out.rotate().expect("descent on the heap has edges");
        let edoff = e.off5p;
        debug_assert!(edoff <= node.al5pf + 1);
        debug_assert!(edoff + 1 >= node.al5pi);

        if node.out.is_empty() && !node.last_recalc {
            // The previous enumeration overflowed the ranker; refill it.
            node.recalc_outgoing(cx, pf, re);
            if node.out.is_empty() {
                // Everything left became redundant in the meantime; the
                // rotated edge is abandoned along with the descent.
                df.set(id, node);
                return;
            }
        }

        let (mut al5pi_new, mut al5pf_new) = (node.al5pi, node.al5pf);
        let hit_end;
        let done;
        let doff;
        if toward3p {
            al5pf_new = edoff;
            if e.edit.is_read_gap() {
                // The read character at edoff was not consumed; retract the
                // 3' extreme. The depth of the SA range taken is unaffected.
                debug_assert!(al5pf_new > 0);
                al5pf_new -= 1;
            }
            debug_assert!(al5pf_new < q.len());
            hit_end = al5pf_new == q.len() - 1;
            done = hit_end && al5pi_new == 0;
            debug_assert!(edoff >= node.off5p_i);
            doff = edoff - node.off5p_i;
        } else {
            al5pi_new = edoff;
            if e.edit.is_read_gap() {
                al5pi_new += 1;
            }
            hit_end = al5pi_new == 0;
            done = hit_end && al5pf_new == q.len() - 1;
            debug_assert!(node.off5p_i >= edoff);
            doff = node.off5p_i - edoff;
        }
        debug_assert!(doff <= node.len);
        let mut l2r = node.l2r;
        if !done && hit_end {
            l2r = !l2r;
        }

        let (topf, botf, topb, botb);
        match e.edit {
            DescentEdit::RefGap { .. } => {
                if doff == 0 {
                    // No reference consumed yet along this descent: the
                    // child inherits the incoming range unchanged.
                    topf = node.topf;
                    botf = node.botf;
                    topb = node.topb;
                    botb = node.botb;
                } else {
                    // Reference was consumed, the read character was not:
                    // the range one position earlier applies.
                    let rec = &pf[node.posid + doff - 1];
                    debug_assert!(rec.inited());
                    let chr = rec.c as usize;
                    topf = rec.topf[chr];
                    botf = rec.botf[chr];
                    topb = rec.topb[chr];
                    botb = rec.botb[chr];
                }
            }
            DescentEdit::Mismatch { ref_base, .. } | DescentEdit::ReadGap { ref_base, .. } => {
                let d = node.posid + doff;
                debug_assert_eq!(d, e.pos);
                let rec = &pf[d];
                debug_assert!(rec.inited());
                let chr = ref_base as usize;
                topf = rec.topf[chr];
                botf = rec.botf[chr];
                topb = rec.topb[chr];
                botb = rec.botb[chr];
            }
        }
        debug_assert_eq!(botf - topf, botb - topb);

        if done {
            // The edge aligns the last remaining character; no child node is
            // needed.
            sink.report_alignment(
                cx.roots,
                df,
                &node,
                Some(e.edit),
                best.pen,
                topf,
                botf,
                topb,
                botb,
            );
            df.set(id, node);
            return;
        }

        debug_assert!(al5pi_new != 0 || al5pf_new != q.len() - 1);
        let (rid, gapadd) = (node.rid, node.gapadd);
        df.set(id, node);
        let dfsz = df.size();
        let pfsz = pf.size();
        let child = df.alloc();
        let succ = Self::init_branch(
            cx,
            BranchArgs {
                rid,
                al5pi: al5pi_new,
                al5pf: al5pf_new,
                topf,
                botf,
                topb,
                botb,
                l2r,
                parent: id,
                pen: best.pen,
                edit: Some(e.edit),
                parent_gapadd: gapadd,
            },
            child,
            df,
            pf,
            heap,
            re,
            sink,
            met,
        );
        if !succ {
            df.resize(dfsz);
            pf.resize(pfsz);
        }
        if let Some(pri) = df[id].out.best_pri() {
            heap.insert(pri, id);
        }
    }
}
