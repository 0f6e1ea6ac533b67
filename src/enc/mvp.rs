use super::neighbor::*;
use crate::api::ReferenceList;
use crate::def::*;

/* weight of a temporal predictor relative to one 4x4 spatial unit */
const TEMPORAL_WEIGHT: u32 = 2;

/// Candidate vectors for one reference or reference pair, most likely first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MvpStack {
    pub(crate) mvs: [[MotionVector; 2]; MAX_REF_MV_STACK_SIZE],
    pub(crate) weights: [u32; MAX_REF_MV_STACK_SIZE],
    pub(crate) len: usize,
    /* entries found in neighbors, the rest is zero padding */
    pub(crate) found: usize,
}

impl MvpStack {
    fn add(&mut self, mv: [MotionVector; 2], weight: u32) {
        for i in 0..self.len {
            if self.mvs[i] == mv {
                self.weights[i] += weight;
                return;
            }
        }
        if self.len < MAX_REF_MV_STACK_SIZE {
            self.mvs[self.len] = mv;
            self.weights[self.len] = weight;
            self.len += 1;
        }
    }

    fn sort(&mut self) {
        // stable insertion sort, heavier first
        for i in 1..self.len {
            let mut j = i;
            while j > 0 && self.weights[j] > self.weights[j - 1] {
                self.weights.swap(j, j - 1);
                self.mvs.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    fn pad(&mut self, min_len: usize) {
        self.found = self.len;
        while self.len < min_len.min(MAX_REF_MV_STACK_SIZE) {
            let z = [MotionVector::zero(); 2];
            if self.mvs[..self.len].contains(&z) {
                // keep entries distinct from the zero vector already present
                break;
            }
            self.mvs[self.len] = z;
            self.weights[self.len] = 0;
            self.len += 1;
        }
        while self.len < min_len.min(MAX_REF_MV_STACK_SIZE) {
            self.mvs[self.len] = self.mvs[self.len - 1];
            self.weights[self.len] = 0;
            self.len += 1;
        }
    }

    /// NEAREST vector (index 0) or NEAR vector at `drl_idx` >= 1.
    #[inline]
    pub(crate) fn get(&self, idx: usize) -> [MotionVector; 2] {
        if self.len == 0 {
            [MotionVector::zero(); 2]
        } else {
            self.mvs[idx.min(self.len - 1)]
        }
    }

    pub(crate) fn single(&self) -> Vec<MotionVector> {
        self.mvs[..self.len].iter().map(|m| m[0]).collect()
    }
}

/// Block position in picture coordinates and what lies around it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MvpBlock {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) w: usize,
    pub(crate) h: usize,
    pub(crate) pic_w: usize,
    /* the block's top edge is the top edge of its superblock */
    pub(crate) sb_top: bool,
}

fn neighbor_units(nbr: &NeighborArrays, b: &MvpBlock) -> Vec<(NeighborModeInfo, u32)> {
    let mut units = Vec::new();
    if b.y > 0 {
        let mut x = b.x;
        while x < b.x + b.w {
            units.push((nbr.mode_info.read_top(x), 2));
            x += MI_SIZE;
        }
        if b.sb_top && b.x + b.w < b.pic_w {
            units.push((nbr.mode_info.read_top(b.x + b.w), 1));
        }
    }
    if b.x > 0 {
        let mut y = b.y;
        while y < b.y + b.h {
            units.push((nbr.mode_info.read_left(y), 2));
            y += MI_SIZE;
        }
    }
    if b.x > 0 && b.y > 0 {
        units.push((nbr.mode_info.read_top_left(b.x, b.y), 1));
    }
    units
}

/// Builds the single-reference predictor stack of `rf`.
pub(crate) fn single_ref_stack(
    nbr: &NeighborArrays,
    refs: &ReferenceList,
    b: &MvpBlock,
    rf: RefFrame,
) -> MvpStack {
    let mut st = MvpStack::default();
    let r = rf.to_i8();
    for (mi, w) in neighbor_units(nbr, b) {
        if !mi.coded || !mi.is_inter {
            continue;
        }
        for k in 0..2 {
            if mi.ref_frame[k] == r {
                st.add([mi.mv[k], MotionVector::zero()], w);
            }
        }
    }
    st.sort();
    if let Some(t) = refs
        .get_ref(rf)
        .and_then(|p| p.colocated_mv(b.x + b.w / 2, b.y + b.h / 2))
    {
        st.add([t, MotionVector::zero()], TEMPORAL_WEIGHT);
    }
    st.pad(2);
    st
}

/// Builds the compound predictor stack of (`rf0`, `rf1`) from neighbors coded
/// with the same pair, completed by pairing the single stacks.
pub(crate) fn compound_stack(
    nbr: &NeighborArrays,
    b: &MvpBlock,
    rf0: RefFrame,
    rf1: RefFrame,
    s0: &MvpStack,
    s1: &MvpStack,
) -> MvpStack {
    let mut st = MvpStack::default();
    let (r0, r1) = (rf0.to_i8(), rf1.to_i8());
    for (mi, w) in neighbor_units(nbr, b) {
        if mi.coded && mi.is_inter && mi.ref_frame == [r0, r1] {
            st.add(mi.mv, w);
        }
    }
    st.sort();
    let n = s0.found.max(s1.found).max(1);
    for i in 0..n {
        st.add([s0.get(i)[0], s1.get(i)[0]], 0);
    }
    st.pad(2);
    st
}

#[cfg(test)]
mod test {
    use super::*;

    fn block(x: usize, y: usize) -> MvpBlock {
        MvpBlock {
            x,
            y,
            w: 16,
            h: 16,
            pic_w: 64,
            sb_top: false,
        }
    }

    fn inter_info(rf: RefFrame, mv: MotionVector) -> NeighborModeInfo {
        NeighborModeInfo {
            coded: true,
            is_inter: true,
            ref_frame: [rf.to_i8(), REF_FRAME_NONE],
            mv: [mv, MotionVector::zero()],
            ..Default::default()
        }
    }

    #[test]
    fn empty_neighborhood_gives_zero() {
        let nbr = NeighborArrays::new(64, 64).unwrap();
        let st = single_ref_stack(&nbr, &ReferenceList::new(), &block(0, 0), RefFrame::new(0, 0));
        assert_eq!(st.found, 0);
        assert_eq!(st.len, 2);
        assert_eq!(st.get(0)[0], MotionVector::zero());
        assert_eq!(st.get(1)[0], MotionVector::zero());
    }

    #[test]
    fn heavier_neighbor_comes_first() {
        let mut nbr = NeighborArrays::new(64, 64).unwrap();
        let rf = RefFrame::new(0, 0);
        let a = MotionVector::new(8, 16);
        let l = MotionVector::new(-24, 0);
        // above spans the whole width, left only half the height
        nbr.mode_info.write_uniform(inter_info(rf, a), 16, 0, 16, 16);
        nbr.mode_info.write_uniform(inter_info(rf, l), 0, 16, 16, 8);
        let st = single_ref_stack(&nbr, &ReferenceList::new(), &block(16, 16), rf);
        assert_eq!(st.get(0)[0], a);
        assert_eq!(st.get(1)[0], l);
        assert_eq!(st.found, 2);
        // a different reference sees nothing
        let other = single_ref_stack(&nbr, &ReferenceList::new(), &block(16, 16), RefFrame::new(1, 0));
        assert_eq!(other.found, 0);
    }

    #[test]
    fn compound_pairs_single_stacks() {
        let nbr = NeighborArrays::new(64, 64).unwrap();
        let mut s0 = MvpStack::default();
        s0.add([MotionVector::new(8, 0), MotionVector::zero()], 4);
        s0.pad(2);
        let mut s1 = MvpStack::default();
        s1.add([MotionVector::new(0, -8), MotionVector::zero()], 4);
        s1.pad(2);
        let st = compound_stack(&nbr, &block(16, 16), RefFrame::new(0, 0), RefFrame::new(1, 0), &s0, &s1);
        assert_eq!(st.get(0), [MotionVector::new(8, 0), MotionVector::new(0, -8)]);
        assert!(st.len >= 2);
    }
}
