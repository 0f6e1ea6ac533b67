use std::collections::HashMap;
use std::ops::Range;

use crate::def::*;

/// Static description of one block of the mode-decision scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BlockGeom {
    /* position inside the superblock */
    pub(crate) origin_x: usize,
    pub(crate) origin_y: usize,
    pub(crate) bwidth: usize,
    pub(crate) bheight: usize,
    pub(crate) shape: PartitionShape,
    /* square depth, 0 for the superblock */
    pub(crate) depth: usize,
    pub(crate) sq_size: usize,
    /* square this block was generated from */
    pub(crate) sqi_mds: usize,
    pub(crate) max_tx_depth: usize,
    /* square whose neighbor checkpoint this block sees unchanged, if any */
    pub(crate) ctx_anchor: Option<usize>,
    /* earlier block with equal geometry and equal neighbor context */
    pub(crate) redund_src: Option<usize>,
    /* earlier block with equal geometry only */
    pub(crate) similar_src: Option<usize>,
}

impl BlockGeom {
    #[inline]
    pub(crate) fn is_square(&self) -> bool {
        self.bwidth == self.bheight
    }

    #[inline]
    pub(crate) fn area(&self) -> usize {
        self.bwidth * self.bheight
    }
}

/// Per-square layout: where each shape's blocks and each child square live.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SquareGeom {
    pub(crate) shapes: [Option<Range<usize>>; 9],
    pub(crate) children: [Option<usize>; 4],
}

/// Pre-order table of all blocks of a superblock, indexed by mds.
#[derive(Clone, Debug)]
pub(crate) struct BlockGeomTable {
    pub(crate) sb_size: usize,
    pub(crate) blocks: Vec<BlockGeom>,
    pub(crate) squares: Vec<Option<SquareGeom>>,
}

/// Transform dimensions after `depth` splits of a `w`x`h` block.
pub(crate) fn tx_dims(w: usize, h: usize, depth: usize) -> (usize, usize) {
    let mut tw = w.min(MAX_TX_SIZE);
    let mut th = h.min(MAX_TX_SIZE);
    for _ in 0..depth {
        if tw == th {
            tw >>= 1;
            th >>= 1;
        } else if tw > th {
            tw >>= 1;
        } else {
            th >>= 1;
        }
    }
    (tw, th)
}

fn max_tx_depth(w: usize, h: usize) -> usize {
    let mut d = 0;
    while d < MAX_TX_DEPTH {
        let (tw, th) = tx_dims(w, h, d + 1);
        if tw < MIN_TX_SIZE || th < MIN_TX_SIZE {
            break;
        }
        d += 1;
    }
    d
}

impl BlockGeomTable {
    pub(crate) fn new(sb_size: usize) -> Self {
        let mut t = BlockGeomTable {
            sb_size,
            blocks: Vec::new(),
            squares: Vec::new(),
        };
        t.build_square(0, 0, sb_size, 0, None, 0, 0);
        t.link_redundant_blocks();
        t
    }

    #[inline]
    pub(crate) fn get(&self, mds: usize) -> &BlockGeom {
        &self.blocks[mds]
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    pub(crate) fn square(&self, sq_mds: usize) -> Option<&SquareGeom> {
        self.squares.get(sq_mds).and_then(|s| s.as_ref())
    }

    /// Blocks of `shape` inside square `sq_mds`, if the shape exists at that size.
    pub(crate) fn shape_blocks(&self, sq_mds: usize, shape: PartitionShape) -> Option<Range<usize>> {
        if shape == PartitionShape::PARTITION_SPLIT {
            return None;
        }
        self.square(sq_mds)
            .and_then(|s| s.shapes[shape as usize].clone())
    }

    pub(crate) fn child_sq_mds(&self, sq_mds: usize, quadrant: usize) -> Option<usize> {
        self.square(sq_mds).and_then(|s| s.children[quadrant])
    }

    #[allow(clippy::too_many_arguments)]
    fn build_square(
        &mut self,
        x: usize,
        y: usize,
        s: usize,
        depth: usize,
        parent: Option<usize>,
        quadrant: usize,
        parent_anchor: usize,
    ) -> usize {
        let sq_mds = self.blocks.len();
        // the first quadrant starts from its parent's checkpoint unchanged
        let anchor = if parent.is_some() && quadrant == 0 {
            parent_anchor
        } else {
            sq_mds
        };

        let mut sq = SquareGeom::default();
        for &shape in PartitionShape::D1_SHAPES.iter() {
            if !shape.allowed_for(s) {
                continue;
            }
            let start = self.blocks.len();
            let subs = shape.sub_blocks(s);
            for (nsi, &(bx, by, bw, bh)) in subs.iter().enumerate() {
                self.blocks.push(BlockGeom {
                    origin_x: x + bx,
                    origin_y: y + by,
                    bwidth: bw,
                    bheight: bh,
                    shape,
                    depth,
                    sq_size: s,
                    sqi_mds: sq_mds,
                    max_tx_depth: max_tx_depth(bw, bh),
                    ctx_anchor: if nsi == 0 { Some(anchor) } else { None },
                    redund_src: None,
                    similar_src: None,
                });
                self.squares.push(None);
            }
            sq.shapes[shape as usize] = Some(start..self.blocks.len());
        }
        self.squares[sq_mds] = Some(sq);

        if PartitionShape::PARTITION_SPLIT.allowed_for(s) {
            let h = s >> 1;
            for q in 0..4 {
                let child = self.build_square(
                    x + (q & 1) * h,
                    y + (q >> 1) * h,
                    h,
                    depth + 1,
                    Some(sq_mds),
                    q,
                    anchor,
                );
                if let Some(sq) = self.squares[sq_mds].as_mut() {
                    sq.children[q] = Some(child);
                }
            }
        }
        sq_mds
    }

    fn link_redundant_blocks(&mut self) {
        let mut seen: HashMap<(usize, usize, usize, usize), Vec<usize>> = HashMap::new();
        for mds in 0..self.blocks.len() {
            let b = self.blocks[mds];
            let key = (b.origin_x, b.origin_y, b.bwidth, b.bheight);
            if let Some(prev) = seen.get(&key) {
                let redund = prev.iter().copied().find(|&p| {
                    b.ctx_anchor.is_some() && self.blocks[p].ctx_anchor == b.ctx_anchor
                });
                self.blocks[mds].redund_src = redund;
                if redund.is_none() {
                    self.blocks[mds].similar_src = prev.first().copied();
                }
            }
            seen.entry(key).or_insert_with(Vec::new).push(mds);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::def::PartitionShape::*;

    #[test]
    fn square_layout_64() {
        let t = BlockGeomTable::new(64);
        let root = t.square(0).unwrap();
        // N, H, V, 4 x AB, H4, V4
        let d1: usize = root.shapes.iter().flatten().map(|r| r.len()).sum();
        assert_eq!(d1, 1 + 2 + 2 + 12 + 8);
        assert_eq!(root.children[0], Some(d1));
        let b = t.get(0);
        assert_eq!((b.bwidth, b.bheight, b.shape), (64, 64, PARTITION_NONE));
        let h4 = t.shape_blocks(0, PARTITION_HORZ_4).unwrap();
        assert_eq!(h4.len(), 4);
        assert_eq!(t.get(h4.start + 3).origin_y, 48);
        assert_eq!(t.get(h4.start).bheight, 16);
    }

    #[test]
    fn children_follow_shapes() {
        let t = BlockGeomTable::new(64);
        let c0 = t.child_sq_mds(0, 0).unwrap();
        let last = t.square(0).unwrap().shapes.iter().flatten().map(|r| r.end).max();
        assert_eq!(Some(c0), last);
        let c3 = t.child_sq_mds(0, 3).unwrap();
        let g = t.get(c3);
        assert_eq!((g.origin_x, g.origin_y, g.bwidth), (32, 32, 32));
        assert_eq!(g.sqi_mds, c3);
        assert_eq!(g.depth, 1);
        // 8x8 squares have only NONE and cannot split
        let mut sq = 0;
        while let Some(c) = t.child_sq_mds(sq, 0) {
            sq = c;
        }
        let leaf = t.square(sq).unwrap();
        assert_eq!(t.get(sq).bwidth, 8);
        assert_eq!(leaf.shapes.iter().flatten().count(), 1);
        assert!(leaf.children.iter().all(|c| c.is_none()));
    }

    #[test]
    fn shapes_by_size() {
        let t = BlockGeomTable::new(128);
        assert!(t.shape_blocks(0, PARTITION_HORZ_4).is_none());
        assert!(t.shape_blocks(0, PARTITION_VERT_A).is_some());
        let c = t.child_sq_mds(0, 1).unwrap();
        assert!(t.shape_blocks(c, PARTITION_VERT_4).is_some());
        let mut s16 = c;
        while t.get(s16).bwidth > 16 {
            s16 = t.child_sq_mds(s16, 0).unwrap();
        }
        assert!(t.shape_blocks(s16, PARTITION_HORZ_4).is_none());
        assert!(t.shape_blocks(s16, PARTITION_HORZ_A).is_some());
    }

    #[test]
    fn redundant_blocks_share_context() {
        let t = BlockGeomTable::new(64);
        let h = t.shape_blocks(0, PARTITION_HORZ).unwrap();
        let hb = t.shape_blocks(0, PARTITION_HORZ_B).unwrap();
        // top half of HORZ_B equals the top half of HORZ, both first after the checkpoint
        assert_eq!(t.get(hb.start).redund_src, Some(h.start));
        // bottom half of HORZ_A has a different top neighbor
        let ha = t.shape_blocks(0, PARTITION_HORZ_A).unwrap();
        assert_eq!(t.get(ha.start + 2).redund_src, None);
        assert_eq!(t.get(ha.start + 2).similar_src, Some(h.start + 1));
        // first child square equals the top-left quarter of HORZ_A
        let c0 = t.child_sq_mds(0, 0).unwrap();
        assert_eq!(t.get(c0).redund_src, Some(ha.start));
        // the second child only resembles the quarter of HORZ_A
        let c1 = t.child_sq_mds(0, 1).unwrap();
        assert_eq!(t.get(c1).redund_src, None);
        assert_eq!(t.get(c1).similar_src, Some(ha.start + 1));
    }

    #[test]
    fn tx_depths() {
        assert_eq!(tx_dims(128, 128, 0), (64, 64));
        assert_eq!(tx_dims(32, 8, 1), (16, 8));
        assert_eq!(tx_dims(16, 16, 2), (4, 4));
        assert_eq!(max_tx_depth(8, 8), 1);
        assert_eq!(max_tx_depth(64, 16), 2);
    }
}
