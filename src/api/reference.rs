use std::sync::Arc;

use super::frame::*;
use crate::def::*;

/// Granularity (luma samples) of stored temporal motion vectors.
pub const TMVP_UNIT: usize = 8;

/// Motion field left behind by a coded picture, one vector per 8x8 area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TemporalMvs {
    pub cols: usize,
    pub rows: usize,
    pub mvs: Vec<Option<MotionVector>>,
}

impl TemporalMvs {
    pub fn new(width: usize, height: usize) -> Self {
        let cols = (width + TMVP_UNIT - 1) / TMVP_UNIT;
        let rows = (height + TMVP_UNIT - 1) / TMVP_UNIT;
        TemporalMvs {
            cols,
            rows,
            mvs: vec![None; cols * rows],
        }
    }

    /// Co-located vector at luma position (x, y).
    pub fn get(&self, x: usize, y: usize) -> Option<MotionVector> {
        let c = x / TMVP_UNIT;
        let r = y / TMVP_UNIT;
        if c >= self.cols || r >= self.rows {
            return None;
        }
        self.mvs[r * self.cols + c]
    }

    pub fn set_block(&mut self, x: usize, y: usize, w: usize, h: usize, mv: Option<MotionVector>) {
        let c0 = x / TMVP_UNIT;
        let r0 = y / TMVP_UNIT;
        let c1 = ((x + w + TMVP_UNIT - 1) / TMVP_UNIT).min(self.cols);
        let r1 = ((y + h + TMVP_UNIT - 1) / TMVP_UNIT).min(self.rows);
        for r in r0..r1 {
            for c in c0..c1 {
                self.mvs[r * self.cols + c] = mv;
            }
        }
    }
}

/// A reconstructed picture usable for inter prediction.
#[derive(Clone, Debug)]
pub struct ReferencePicture {
    pub frame: Arc<Frame<pel>>,
    pub poc: u64,
    /// Key or intra-only picture; its vectors are never used temporally.
    pub intra_only: bool,
    pub temporal_mvs: Option<Arc<TemporalMvs>>,
}

impl ReferencePicture {
    pub fn new(frame: Arc<Frame<pel>>, poc: u64, intra_only: bool) -> Self {
        ReferencePicture {
            frame,
            poc,
            intra_only,
            temporal_mvs: None,
        }
    }

    pub fn with_temporal_mvs(mut self, mvs: TemporalMvs) -> Self {
        self.temporal_mvs = Some(Arc::new(mvs));
        self
    }

    /// Co-located temporal vector, never taken from intra-only pictures.
    pub(crate) fn colocated_mv(&self, x: usize, y: usize) -> Option<MotionVector> {
        if self.intra_only {
            return None;
        }
        self.temporal_mvs.as_ref().and_then(|t| t.get(x, y))
    }
}

/// Reference pictures of the current picture, by list and index.
#[derive(Clone, Debug, Default)]
pub struct ReferenceList {
    refs: [[Option<Arc<ReferencePicture>>; MAX_REF_IDX]; REF_LIST_CNT],
}

impl ReferenceList {
    pub fn new() -> Self {
        ReferenceList::default()
    }

    pub fn set(&mut self, list: usize, idx: usize, pic: ReferencePicture) {
        if list < REF_LIST_CNT && idx < MAX_REF_IDX {
            self.refs[list][idx] = Some(Arc::new(pic));
        }
    }

    pub fn get(&self, list: usize, idx: usize) -> Option<&ReferencePicture> {
        self.refs
            .get(list)
            .and_then(|l| l.get(idx))
            .and_then(|r| r.as_deref())
    }

    pub(crate) fn get_ref(&self, rf: RefFrame) -> Option<&ReferencePicture> {
        self.get(rf.list as usize, rf.idx as usize)
    }

    pub(crate) fn get_arc(&self, rf: RefFrame) -> Option<Arc<ReferencePicture>> {
        self.refs[rf.list as usize][rf.idx as usize].clone()
    }

    /// Available single references in list-major order.
    pub fn available(&self) -> Vec<RefFrame> {
        let mut out = Vec::new();
        for list in 0..REF_LIST_CNT {
            for idx in 0..MAX_REF_IDX {
                if self.refs[list][idx].is_some() {
                    out.push(RefFrame::new(list, idx));
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.available().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temporal_mvs_cover_blocks() {
        let mut t = TemporalMvs::new(64, 32);
        t.set_block(8, 8, 16, 8, Some(MotionVector::new(8, -8)));
        assert_eq!(t.get(9, 9), Some(MotionVector::new(8, -8)));
        assert_eq!(t.get(23, 15), Some(MotionVector::new(8, -8)));
        assert_eq!(t.get(24, 8), None);
        assert_eq!(t.get(640, 8), None);
    }

    #[test]
    fn intra_only_reference_has_no_temporal_vectors() {
        let mut mvs = TemporalMvs::new(16, 16);
        mvs.set_block(0, 0, 16, 16, Some(MotionVector::new(16, 16)));
        let frame = Arc::new(Frame::new(16, 16));
        let key = ReferencePicture::new(frame.clone(), 0, true).with_temporal_mvs(mvs.clone());
        assert_eq!(key.colocated_mv(0, 0), None);
        let inter = ReferencePicture::new(frame, 1, false).with_temporal_mvs(mvs);
        assert_eq!(inter.colocated_mv(0, 0), Some(MotionVector::new(16, 16)));
    }

    #[test]
    fn list_lookup() {
        let mut l = ReferenceList::new();
        assert!(l.is_empty());
        l.set(1, 2, ReferencePicture::new(Arc::new(Frame::new(8, 8)), 3, false));
        assert!(l.get(1, 2).is_some());
        assert!(l.get(0, 0).is_none());
        assert!(l.get(5, 0).is_none());
        assert_eq!(l.available(), vec![RefFrame::new(1, 2)]);
    }
}
