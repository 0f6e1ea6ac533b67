use super::geom::BlockGeomTable;
use crate::api::PartitionSettings;
use crate::def::PartitionShape::*;
use crate::def::*;

/// Position of a block relative to the picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockVisibility {
    Inside,
    /// straddles the right or bottom edge
    Partial,
    Outside,
}

/// What the partition search needs from a block evaluator.
///
/// Evaluating or recommitting a block updates the neighbor context seen by the
/// following blocks; a checkpoint restores it.
pub(crate) trait BlockEvaluator {
    type Checkpoint;

    fn visibility(&self, mds: usize) -> BlockVisibility;
    /// Best cost of the block, leaving its winner committed.
    fn evaluate_block(&mut self, mds: usize) -> u64;
    fn partition_cost(&self, sq_mds: usize, shape: PartitionShape) -> u64;
    fn checkpoint(&self) -> Self::Checkpoint;
    fn rollback(&mut self, cp: &Self::Checkpoint);
    /// Commits again the stored winner of an already evaluated block.
    fn recommit_block(&mut self, mds: usize);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SquareDecision {
    pub(crate) shape: PartitionShape,
    pub(crate) cost: u64,
    /* best shape inside the square, None when it cannot be coded whole */
    pub(crate) d1_shape: Option<PartitionShape>,
    pub(crate) d1_cost: u64,
    pub(crate) split_cost: u64,
}

/// Decisions of every visited square of a superblock, indexed by mds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PartitionTree {
    pub(crate) squares: Vec<Option<SquareDecision>>,
    pub(crate) cost: u64,
}

impl PartitionTree {
    /// Leaf blocks of the decided partitioning, in coding order.
    pub(crate) fn leaves(&self, geom: &BlockGeomTable) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect(geom, 0, &mut out);
        out
    }

    fn collect(&self, geom: &BlockGeomTable, sq: usize, out: &mut Vec<usize>) {
        let d = match self.squares.get(sq).copied().flatten() {
            Some(d) => d,
            None => return,
        };
        if d.shape == PARTITION_SPLIT {
            for q in 0..4 {
                if let Some(c) = geom.child_sq_mds(sq, q) {
                    self.collect(geom, c, out);
                }
            }
        } else if let Some(r) = geom.shape_blocks(sq, d.shape) {
            out.extend(r);
        }
    }
}

fn shape_enabled(shape: PartitionShape, s: usize, settings: &PartitionSettings) -> bool {
    if !shape.allowed_for(s) {
        return false;
    }
    match shape {
        PARTITION_NONE => true,
        PARTITION_HORZ | PARTITION_VERT => settings.nsq && s >= 2 * settings.min_block_size,
        PARTITION_HORZ_A | PARTITION_HORZ_B | PARTITION_VERT_A | PARTITION_VERT_B => {
            settings.nsq && settings.ab_shapes && s >= 2 * settings.min_block_size
        }
        PARTITION_HORZ_4 | PARTITION_VERT_4 => {
            settings.nsq && settings.four_way && s >= 4 * settings.min_block_size
        }
        PARTITION_SPLIT => s >= 2 * settings.min_block_size,
    }
}

struct Search<'a, E: BlockEvaluator> {
    geom: &'a BlockGeomTable,
    settings: &'a PartitionSettings,
    eval: &'a mut E,
    squares: Vec<Option<SquareDecision>>,
}

impl<'a, E: BlockEvaluator> Search<'a, E> {
    /// d1: best shape of the square, each shape starting from the same context.
    fn d1(&mut self, sq: usize, cp: &E::Checkpoint, part: &[u64; PARTITION_SHAPES]) -> Option<(PartitionShape, u64)> {
        let s = self.geom.get(sq).bwidth;
        let mut best: Option<(PartitionShape, u64)> = None;
        for &shape in PartitionShape::D1_SHAPES.iter() {
            if !shape_enabled(shape, s, self.settings) {
                continue;
            }
            let range = match self.geom.shape_blocks(sq, shape) {
                Some(r) => r,
                None => continue,
            };
            self.eval.rollback(cp);
            let mut acc = part[shape as usize];
            if range.clone().any(|b| self.eval.visibility(b) != BlockVisibility::Inside) {
                acc = MAX_MODE_COST;
            } else {
                for mds in range {
                    if best.map_or(false, |(_, c)| acc >= c) {
                        break;
                    }
                    acc = acc.saturating_add(self.eval.evaluate_block(mds));
                }
            }
            if best.map_or(true, |(_, c)| acc < c) {
                best = Some((shape, acc));
            }
        }
        best
    }

    fn decide_square(&mut self, sq: usize) -> u64 {
        let vis = self.eval.visibility(sq);
        if vis == BlockVisibility::Outside {
            return 0;
        }
        let s = self.geom.get(sq).bwidth;
        let cp = self.eval.checkpoint();
        let mut part = [MAX_MODE_COST; PARTITION_SHAPES];
        for &shape in PartitionShape::D1_SHAPES.iter().chain([PARTITION_SPLIT].iter()) {
            if shape_enabled(shape, s, self.settings) {
                part[shape as usize] = self.eval.partition_cost(sq, shape);
            }
        }
        let can_split = shape_enabled(PARTITION_SPLIT, s, self.settings) && self.geom.child_sq_mds(sq, 0).is_some();

        // a square crossing the picture edge, or above the largest block size, must split
        let d1 = if vis == BlockVisibility::Inside && (s <= self.settings.max_block_size || !can_split) {
            self.d1(sq, &cp, &part)
        } else {
            None
        };

        let mut split_cost = MAX_MODE_COST;
        if can_split {
            self.eval.rollback(&cp);
            let mut acc = part[PARTITION_SPLIT as usize];
            for q in 0..4 {
                let child = match self.geom.child_sq_mds(sq, q) {
                    Some(c) => c,
                    None => break,
                };
                acc = acc.saturating_add(self.decide_square(child));
                if q < 3 {
                    if let (Some(margin), Some((_, parent))) = (self.settings.parent_cost_early_exit, d1) {
                        let done = q as u64 + 1;
                        let projected = acc.saturating_mul(4) / done;
                        if projected.saturating_mul(100) > parent.saturating_mul(100 + margin) {
                            acc = MAX_MODE_COST;
                            break;
                        }
                    }
                }
            }
            split_cost = acc;
        }

        // d2: split iff the children are strictly cheaper
        let decision = match d1 {
            Some((shape, d1_cost)) if split_cost >= d1_cost => {
                self.eval.rollback(&cp);
                if let Some(r) = self.geom.shape_blocks(sq, shape) {
                    for mds in r {
                        self.eval.recommit_block(mds);
                    }
                }
                SquareDecision {
                    shape,
                    cost: d1_cost,
                    d1_shape: Some(shape),
                    d1_cost,
                    split_cost,
                }
            }
            Some((shape, d1_cost)) => SquareDecision {
                shape: PARTITION_SPLIT,
                cost: split_cost,
                d1_shape: Some(shape),
                d1_cost,
                split_cost,
            },
            None if can_split => SquareDecision {
                shape: PARTITION_SPLIT,
                cost: split_cost,
                d1_shape: None,
                d1_cost: 0,
                split_cost,
            },
            // cannot be coded at all
            None => return 0,
        };
        self.squares[sq] = Some(decision);
        decision.cost
    }
}

/// Partition decision of one superblock: d1 over the shapes of every square,
/// d2 between the best shape and the split, bottom-up through the recursion.
pub(crate) fn decide_superblock<E: BlockEvaluator>(
    geom: &BlockGeomTable,
    settings: &PartitionSettings,
    eval: &mut E,
) -> PartitionTree {
    let mut search = Search {
        geom,
        settings,
        eval,
        squares: vec![None; geom.len()],
    };
    let cost = search.decide_square(0);
    PartitionTree {
        squares: search.squares,
        cost,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::EncoderSettings;

    /// Context-free costs; the committed blocks stand in for the neighbor arrays.
    struct SyntheticEval<'a> {
        geom: &'a BlockGeomTable,
        sb: (usize, usize),
        pic: (usize, usize),
        seed: u64,
        committed: Vec<usize>,
        evaluated: usize,
    }

    impl<'a> SyntheticEval<'a> {
        fn new(geom: &'a BlockGeomTable, sb: (usize, usize), pic: (usize, usize), seed: u64) -> Self {
            SyntheticEval {
                geom,
                sb,
                pic,
                seed,
                committed: Vec::new(),
                evaluated: 0,
            }
        }

        fn cost(&self, mds: usize) -> u64 {
            let g = self.geom.get(mds);
            let h = (mds as u64 + 1)
                .wrapping_mul(0x9e37_79b9_7f4a_7c15)
                .wrapping_add(self.seed)
                .rotate_left(17);
            // larger blocks get relatively cheaper, with noise
            (g.area() as u64 / 4) + h % (g.area() as u64 / 2 + 50)
        }
    }

    impl<'a> BlockEvaluator for SyntheticEval<'a> {
        type Checkpoint = usize;

        fn visibility(&self, mds: usize) -> BlockVisibility {
            let g = self.geom.get(mds);
            let (x, y) = (self.sb.0 + g.origin_x, self.sb.1 + g.origin_y);
            if x >= self.pic.0 || y >= self.pic.1 {
                BlockVisibility::Outside
            } else if x + g.bwidth > self.pic.0 || y + g.bheight > self.pic.1 {
                BlockVisibility::Partial
            } else {
                BlockVisibility::Inside
            }
        }

        fn evaluate_block(&mut self, mds: usize) -> u64 {
            assert_eq!(self.visibility(mds), BlockVisibility::Inside);
            self.evaluated += 1;
            self.committed.push(mds);
            self.cost(mds)
        }

        fn partition_cost(&self, sq_mds: usize, shape: PartitionShape) -> u64 {
            (sq_mds as u64 * 7 + shape as u64 * 3) % 40
        }

        fn checkpoint(&self) -> usize {
            self.committed.len()
        }

        fn rollback(&mut self, cp: &usize) {
            self.committed.truncate(*cp);
        }

        fn recommit_block(&mut self, mds: usize) {
            self.committed.push(mds);
        }
    }

    fn settings(preset: u8) -> PartitionSettings {
        EncoderSettings::from_preset(preset).partition
    }

    #[test]
    fn decision_is_deterministic_and_state_matches_leaves() {
        let geom = BlockGeomTable::new(64);
        let s = settings(2);
        let mut a = SyntheticEval::new(&geom, (0, 0), (64, 64), 1);
        let mut b = SyntheticEval::new(&geom, (0, 0), (64, 64), 1);
        let ta = decide_superblock(&geom, &s, &mut a);
        let tb = decide_superblock(&geom, &s, &mut b);
        assert_eq!(ta, tb);
        assert_eq!(a.committed, ta.leaves(&geom));
        let area: usize = ta.leaves(&geom).iter().map(|&m| geom.get(m).area()).sum();
        assert_eq!(area, 64 * 64);
    }

    #[test]
    fn split_iff_children_are_cheaper() {
        let geom = BlockGeomTable::new(64);
        let mut s = settings(0);
        s.parent_cost_early_exit = None;
        for seed in 0..20 {
            let mut e = SyntheticEval::new(&geom, (0, 0), (64, 64), seed);
            let t = decide_superblock(&geom, &s, &mut e);
            for d in t.squares.iter().flatten() {
                let d1 = d.d1_shape.expect("every square is inside");
                if d.split_cost < d.d1_cost {
                    assert_eq!(d.shape, PARTITION_SPLIT);
                    assert_eq!(d.cost, d.split_cost);
                } else {
                    assert_eq!(d.shape, d1);
                    assert_eq!(d.cost, d.d1_cost);
                }
            }
        }
    }

    #[test]
    fn parent_cost_early_exit_never_beats_exhaustive_search() {
        let geom = BlockGeomTable::new(64);
        let mut exhaustive = settings(2);
        exhaustive.parent_cost_early_exit = None;
        let mut fast = exhaustive.clone();
        fast.parent_cost_early_exit = Some(0);
        for seed in 0..20 {
            let mut e0 = SyntheticEval::new(&geom, (0, 0), (64, 64), seed);
            let mut e1 = SyntheticEval::new(&geom, (0, 0), (64, 64), seed);
            let t0 = decide_superblock(&geom, &exhaustive, &mut e0);
            let t1 = decide_superblock(&geom, &fast, &mut e1);
            assert!(t0.cost <= t1.cost, "seed {}", seed);
            assert!(e1.evaluated <= e0.evaluated);
        }
    }

    #[test]
    fn boundary_squares_are_never_leaves() {
        let geom = BlockGeomTable::new(64);
        let s = settings(2);
        // right superblock of an 80x80 picture
        let mut e = SyntheticEval::new(&geom, (64, 0), (80, 80), 3);
        let t = decide_superblock(&geom, &s, &mut e);
        let leaves = t.leaves(&geom);
        assert!(!leaves.is_empty());
        let mut area = 0;
        for &m in leaves.iter() {
            assert_eq!(e.visibility(m), BlockVisibility::Inside);
            assert!(geom.get(m).bwidth <= 16);
            area += geom.get(m).area();
        }
        assert_eq!(area, 16 * 64);
        assert_eq!(t.squares[0].map(|d| d.shape), Some(PARTITION_SPLIT));
        assert_eq!(e.committed, leaves);
    }

    #[test]
    fn disabled_shapes_are_never_chosen() {
        let geom = BlockGeomTable::new(64);
        let mut s = settings(0);
        s.nsq = false;
        let mut e = SyntheticEval::new(&geom, (0, 0), (64, 64), 9);
        let t = decide_superblock(&geom, &s, &mut e);
        for d in t.squares.iter().flatten() {
            assert!(d.shape == PARTITION_NONE || d.shape == PARTITION_SPLIT);
        }
    }
}
