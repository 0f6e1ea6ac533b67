use crate::api::MdError;
use crate::def::*;
use crate::util::try_alloc;

/// Which edges of a block a write updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NeighborArrayMask {
    /// bottom row only, seen by blocks below
    Top,
    /// right column only, seen by blocks to the right
    Left,
    /// bottom row, right column and the top-left diagonal
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Top,
    Left,
    TopLeft,
}

#[derive(Clone, Copy, Debug)]
struct JournalEntry<T: Copy> {
    slot: Slot,
    idx: u32,
    old: T,
}

/// Edge values of already coded blocks, one entry per `1 << unit_log2` samples.
///
/// Every write is journaled so that a checkpoint can be restored; checkpoints
/// are positions in the journal and nest naturally.
#[derive(Clone, Debug)]
pub(crate) struct NeighborArrayUnit<T: Copy + Default> {
    top: Vec<T>,
    left: Vec<T>,
    top_left: Vec<T>,
    unit_log2: usize,
    /* number of units along the height, offset of the diagonal index */
    height_units: usize,
    journal: Vec<JournalEntry<T>>,
}

impl<T: Copy + Default> NeighborArrayUnit<T> {
    pub(crate) fn new(width: usize, height: usize, unit_log2: usize) -> Result<Self, MdError> {
        let wu = (width + (1 << unit_log2) - 1) >> unit_log2;
        let hu = (height + (1 << unit_log2) - 1) >> unit_log2;
        Ok(NeighborArrayUnit {
            top: try_alloc(wu, "neighbor array")?,
            left: try_alloc(hu, "neighbor array")?,
            top_left: try_alloc(wu + hu, "neighbor array")?,
            unit_log2,
            height_units: hu,
            journal: Vec::new(),
        })
    }

    /// Clears every entry to the default value and forgets the journal.
    pub(crate) fn reset(&mut self) {
        for v in self.top.iter_mut().chain(self.left.iter_mut()).chain(self.top_left.iter_mut()) {
            *v = T::default();
        }
        self.journal.clear();
    }

    #[inline]
    fn store(&mut self, slot: Slot, idx: usize, v: T) {
        let arr = match slot {
            Slot::Top => &mut self.top,
            Slot::Left => &mut self.left,
            Slot::TopLeft => &mut self.top_left,
        };
        if let Some(e) = arr.get_mut(idx) {
            let old = *e;
            *e = v;
            self.journal.push(JournalEntry {
                slot,
                idx: idx as u32,
                old,
            });
        }
    }

    #[inline]
    fn diag(&self, xu: usize, yu: usize) -> usize {
        self.height_units + xu - yu
    }

    /// Writes the edges of the block at (`org_x`, `org_y`) of size `w`x`h`
    /// (in samples). `bottom_row` holds one value per unit along the width and
    /// `right_col` one per unit along the height.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn write(
        &mut self,
        bottom_row: &[T],
        right_col: &[T],
        org_x: usize,
        org_y: usize,
        w: usize,
        h: usize,
        mask: NeighborArrayMask,
    ) {
        let xu = org_x >> self.unit_log2;
        let yu = org_y >> self.unit_log2;
        let wu = (w >> self.unit_log2).max(1);
        let hu = (h >> self.unit_log2).max(1);
        if mask != NeighborArrayMask::Left {
            for i in 0..wu {
                self.store(Slot::Top, xu + i, bottom_row[i]);
            }
        }
        if mask != NeighborArrayMask::Top {
            for j in 0..hu {
                self.store(Slot::Left, yu + j, right_col[j]);
            }
        }
        if mask == NeighborArrayMask::Complete {
            let last_y = yu + hu - 1;
            for i in 0..wu {
                let d = self.diag(xu + i, last_y);
                self.store(Slot::TopLeft, d, bottom_row[i]);
            }
            let last_x = xu + wu - 1;
            for j in 0..hu {
                let d = self.diag(last_x, yu + j);
                self.store(Slot::TopLeft, d, right_col[j]);
            }
        }
    }

    /// Writes the same value on every edge unit of the block.
    pub(crate) fn write_uniform(&mut self, v: T, org_x: usize, org_y: usize, w: usize, h: usize) {
        let xu = org_x >> self.unit_log2;
        let yu = org_y >> self.unit_log2;
        let wu = (w >> self.unit_log2).max(1);
        let hu = (h >> self.unit_log2).max(1);
        for i in 0..wu {
            self.store(Slot::Top, xu + i, v);
        }
        for j in 0..hu {
            self.store(Slot::Left, yu + j, v);
        }
        let last_y = yu + hu - 1;
        for i in 0..wu {
            let d = self.diag(xu + i, last_y);
            self.store(Slot::TopLeft, d, v);
        }
        let last_x = xu + wu - 1;
        for j in 0..hu {
            let d = self.diag(last_x, yu + j);
            self.store(Slot::TopLeft, d, v);
        }
    }

    /// Value written above sample column `x`.
    #[inline]
    pub(crate) fn read_top(&self, x: usize) -> T {
        self.top
            .get(x >> self.unit_log2)
            .copied()
            .unwrap_or_default()
    }

    /// Value written left of sample row `y`.
    #[inline]
    pub(crate) fn read_left(&self, y: usize) -> T {
        self.left
            .get(y >> self.unit_log2)
            .copied()
            .unwrap_or_default()
    }

    /// Value at the sample diagonally above-left of (x, y); both must be non-zero.
    #[inline]
    pub(crate) fn read_top_left(&self, x: usize, y: usize) -> T {
        let xu = (x >> self.unit_log2).wrapping_sub(1);
        let yu = (y >> self.unit_log2).wrapping_sub(1);
        if xu == usize::MAX || yu == usize::MAX {
            return T::default();
        }
        self.top_left
            .get(self.height_units + xu - yu)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn top_slice(&self, x: usize, len: usize) -> &[T] {
        let s = (x >> self.unit_log2).min(self.top.len());
        let e = (s + len).min(self.top.len());
        &self.top[s..e]
    }

    pub(crate) fn left_slice(&self, y: usize, len: usize) -> &[T] {
        let s = (y >> self.unit_log2).min(self.left.len());
        let e = (s + len).min(self.left.len());
        &self.left[s..e]
    }

    #[inline]
    pub(crate) fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    /// Undoes every write made after `cp`.
    pub(crate) fn rollback(&mut self, cp: usize) {
        while self.journal.len() > cp {
            if let Some(e) = self.journal.pop() {
                let arr = match e.slot {
                    Slot::Top => &mut self.top,
                    Slot::Left => &mut self.left,
                    Slot::TopLeft => &mut self.top_left,
                };
                arr[e.idx as usize] = e.old;
            }
        }
    }

    /// Makes every write permanent.
    pub(crate) fn clear_journal(&mut self) {
        self.journal.clear();
    }
}

/// Mode information kept per 4x4 unit along block edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct NeighborModeInfo {
    pub(crate) coded: bool,
    pub(crate) is_inter: bool,
    pub(crate) skip: bool,
    pub(crate) mode: u8,
    pub(crate) ref_frame: [i8; 2],
    pub(crate) mv: [MotionVector; 2],
    /* log2 of the block width and height */
    pub(crate) log2_w: u8,
    pub(crate) log2_h: u8,
}

/// All neighbor arrays of a picture.
#[derive(Clone, Debug)]
pub(crate) struct NeighborArrays {
    pub(crate) recon: [NeighborArrayUnit<pel>; N_C],
    pub(crate) mode_info: NeighborArrayUnit<NeighborModeInfo>,
    /* cumulative DC sign level per 4x4 unit of each plane */
    pub(crate) dc_sign: [NeighborArrayUnit<i8>; N_C],
}

/// Journal positions of every array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NeighborCheckpoint {
    recon: [usize; N_C],
    mode_info: usize,
    dc_sign: [usize; N_C],
}

impl NeighborArrays {
    pub(crate) fn new(width: usize, height: usize) -> Result<Self, MdError> {
        let wc = (width + 1) >> 1;
        let hc = (height + 1) >> 1;
        Ok(NeighborArrays {
            recon: [
                NeighborArrayUnit::new(width, height, 0)?,
                NeighborArrayUnit::new(wc, hc, 0)?,
                NeighborArrayUnit::new(wc, hc, 0)?,
            ],
            mode_info: NeighborArrayUnit::new(width, height, MI_SIZE_LOG2)?,
            dc_sign: [
                NeighborArrayUnit::new(width, height, MI_SIZE_LOG2)?,
                NeighborArrayUnit::new(wc, hc, MI_SIZE_LOG2)?,
                NeighborArrayUnit::new(wc, hc, MI_SIZE_LOG2)?,
            ],
        })
    }

    pub(crate) fn reset(&mut self) {
        for r in self.recon.iter_mut() {
            r.reset();
        }
        self.mode_info.reset();
        for d in self.dc_sign.iter_mut() {
            d.reset();
        }
    }

    pub(crate) fn checkpoint(&self) -> NeighborCheckpoint {
        NeighborCheckpoint {
            recon: [
                self.recon[0].checkpoint(),
                self.recon[1].checkpoint(),
                self.recon[2].checkpoint(),
            ],
            mode_info: self.mode_info.checkpoint(),
            dc_sign: [
                self.dc_sign[0].checkpoint(),
                self.dc_sign[1].checkpoint(),
                self.dc_sign[2].checkpoint(),
            ],
        }
    }

    pub(crate) fn rollback(&mut self, cp: &NeighborCheckpoint) {
        for c in 0..N_C {
            self.recon[c].rollback(cp.recon[c]);
            self.dc_sign[c].rollback(cp.dc_sign[c]);
        }
        self.mode_info.rollback(cp.mode_info);
    }

    pub(crate) fn clear_journal(&mut self) {
        for c in 0..N_C {
            self.recon[c].clear_journal();
            self.dc_sign[c].clear_journal();
        }
        self.mode_info.clear_journal();
    }
}
