use std::fmt;
use std::ops::{Add, Neg, Sub};

use num_derive::FromPrimitive;

/*****************************************************************************
 * types
 *****************************************************************************/
#[allow(non_camel_case_types)]
pub type pel = u16;

pub(crate) const Y_C: usize = 0; /* Y luma */
pub(crate) const U_C: usize = 1; /* Cb Chroma */
pub(crate) const V_C: usize = 2; /* Cr Chroma */
pub(crate) const N_C: usize = 3; /* number of color component */

pub(crate) const REF_LIST_0: usize = 0;
pub(crate) const REF_LIST_1: usize = 1;
pub const REF_LIST_CNT: usize = 2;
pub const MAX_REF_IDX: usize = 4;
pub(crate) const TOTAL_REFS: usize = REF_LIST_CNT * MAX_REF_IDX;

/*****************************************************************************
 * block sizes
 *****************************************************************************/
pub const MAX_SB_SIZE: usize = 128;
pub(crate) const MAX_SB_SQUARE: usize = MAX_SB_SIZE * MAX_SB_SIZE;
/* smallest luma side of a coding block, so that every block carries 4:2:0 chroma */
pub(crate) const MIN_BLOCK_SIZE: usize = 8;
pub(crate) const MIN_BLOCK_LOG2: usize = 3;

pub(crate) const MI_SIZE_LOG2: usize = 2;
pub(crate) const MI_SIZE: usize = 1 << MI_SIZE_LOG2;

pub(crate) const MAX_TX_SIZE: usize = 64;
pub(crate) const MIN_TX_SIZE: usize = 4;
/* coefficients beyond this index are forced to zero for 64-point transforms */
pub(crate) const MAX_TX_CODED: usize = 32;
pub(crate) const MAX_TX_DEPTH: usize = 2;

/* padding around every plane of input and reference pictures */
pub(crate) const PIC_PAD_SIZE_L: usize = MAX_SB_SIZE + 32;
/* margin that sub-pel interpolation may read beyond a clipped block */
pub(crate) const INTERP_EXTEND: isize = 4;

/*****************************************************************************
 * mode decision limits
 *****************************************************************************/
/* maximum number of candidates generated for one block */
pub(crate) const MAX_NFL: usize = 192;
pub(crate) const MAX_REF_MV_STACK_SIZE: usize = 4;
pub(crate) const MAX_ANGLE_DELTA: i8 = 3;
pub(crate) const ANGLE_STEP: i16 = 3;

/* artificial maximum used for candidates and shapes that cannot be coded */
pub(crate) const MAX_MODE_COST: u64 = 1 << 56;

/*****************************************************************************
 * motion vector
 *****************************************************************************/
pub(crate) const MV_FRAC_BITS: i32 = 3;
pub(crate) const MV_UPP: i32 = (1 << 14) - 1;
pub(crate) const MV_LOW: i32 = -(1 << 14);

/// Motion vector in 1/8 luma sample units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MotionVector {
    pub row: i16,
    pub col: i16,
}

impl MotionVector {
    pub const fn new(row: i16, col: i16) -> Self {
        MotionVector { row, col }
    }

    pub const fn zero() -> Self {
        MotionVector { row: 0, col: 0 }
    }

    pub fn is_zero(self) -> bool {
        self.row == 0 && self.col == 0
    }

    /// Builds a vector from full-pel offsets.
    pub fn from_full_pel(row: isize, col: isize) -> Self {
        MotionVector {
            row: (row << MV_FRAC_BITS).max(MV_LOW as isize).min(MV_UPP as isize) as i16,
            col: (col << MV_FRAC_BITS).max(MV_LOW as isize).min(MV_UPP as isize) as i16,
        }
    }

    /// Integer part of the vector, rounded toward negative infinity.
    pub fn full_pel(self) -> (isize, isize) {
        (
            (self.row as isize) >> MV_FRAC_BITS,
            (self.col as isize) >> MV_FRAC_BITS,
        )
    }

    /// Rounds to the nearest full-pel position.
    pub fn round_to_full_pel(self) -> Self {
        let r = |v: i16| -> i16 {
            let v = v as i32;
            let half = 1 << (MV_FRAC_BITS - 1);
            let q = if v >= 0 {
                (v + half) >> MV_FRAC_BITS
            } else {
                -((-v + half) >> MV_FRAC_BITS)
            };
            (q << MV_FRAC_BITS).max(MV_LOW).min(MV_UPP) as i16
        };
        MotionVector::new(r(self.row), r(self.col))
    }

    pub fn is_full_pel(self) -> bool {
        (self.row & 7) == 0 && (self.col & 7) == 0
    }

    /// Chebyshev distance in 1/8 units.
    pub fn max_abs_diff(self, other: MotionVector) -> i32 {
        let dr = (self.row as i32 - other.row as i32).abs();
        let dc = (self.col as i32 - other.col as i32).abs();
        dr.max(dc)
    }
}

impl Add for MotionVector {
    type Output = MotionVector;
    fn add(self, o: MotionVector) -> MotionVector {
        MotionVector {
            row: (self.row as i32 + o.row as i32).max(MV_LOW).min(MV_UPP) as i16,
            col: (self.col as i32 + o.col as i32).max(MV_LOW).min(MV_UPP) as i16,
        }
    }
}

impl Sub for MotionVector {
    type Output = MotionVector;
    fn sub(self, o: MotionVector) -> MotionVector {
        MotionVector {
            row: (self.row as i32 - o.row as i32).max(MV_LOW).min(MV_UPP) as i16,
            col: (self.col as i32 - o.col as i32).max(MV_LOW).min(MV_UPP) as i16,
        }
    }
}

impl Neg for MotionVector {
    type Output = MotionVector;
    fn neg(self) -> MotionVector {
        MotionVector {
            row: (-(self.row as i32)).min(MV_UPP) as i16,
            col: (-(self.col as i32)).min(MV_UPP) as i16,
        }
    }
}

impl fmt::Display for MotionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/*****************************************************************************
 * reference frame identifier
 *****************************************************************************/
pub(crate) const REF_FRAME_NONE: i8 = -1;

/// A single reference: list and index inside that list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefFrame {
    pub list: u8,
    pub idx: u8,
}

impl RefFrame {
    pub const fn new(list: usize, idx: usize) -> Self {
        RefFrame {
            list: list as u8,
            idx: idx as u8,
        }
    }

    #[inline]
    pub(crate) fn to_i8(self) -> i8 {
        (self.list as usize * MAX_REF_IDX + self.idx as usize) as i8
    }

    #[inline]
    pub(crate) fn from_i8(v: i8) -> Option<Self> {
        if v < 0 || v as usize >= TOTAL_REFS {
            None
        } else {
            Some(RefFrame::new(v as usize / MAX_REF_IDX, v as usize % MAX_REF_IDX))
        }
    }
}

impl fmt::Display for RefFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}[{}]", self.list, self.idx)
    }
}

/*****************************************************************************
 * partition shapes
 *****************************************************************************/
pub const PARTITION_SHAPES: usize = 10;

/// Partition shapes of a square block, in tie-break order.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum PartitionShape {
    PARTITION_NONE = 0,
    PARTITION_HORZ,
    PARTITION_VERT,
    PARTITION_HORZ_A,
    PARTITION_HORZ_B,
    PARTITION_VERT_A,
    PARTITION_VERT_B,
    PARTITION_HORZ_4,
    PARTITION_VERT_4,
    PARTITION_SPLIT,
}

use self::PartitionShape::*;

impl Default for PartitionShape {
    fn default() -> Self {
        PARTITION_NONE
    }
}

impl PartitionShape {
    /// Shapes evaluated inside one square, in evaluation order.
    pub(crate) const D1_SHAPES: [PartitionShape; 9] = [
        PARTITION_NONE,
        PARTITION_HORZ,
        PARTITION_VERT,
        PARTITION_HORZ_A,
        PARTITION_HORZ_B,
        PARTITION_VERT_A,
        PARTITION_VERT_B,
        PARTITION_HORZ_4,
        PARTITION_VERT_4,
    ];

    pub fn num_blocks(self) -> usize {
        match self {
            PARTITION_NONE => 1,
            PARTITION_HORZ | PARTITION_VERT => 2,
            PARTITION_HORZ_A | PARTITION_HORZ_B | PARTITION_VERT_A | PARTITION_VERT_B => 3,
            PARTITION_HORZ_4 | PARTITION_VERT_4 | PARTITION_SPLIT => 4,
        }
    }

    /// Rectangles (x, y, w, h) of the sub-blocks of a square of side `s`,
    /// relative to the square origin, in coding order.
    pub fn sub_blocks(self, s: usize) -> Vec<(usize, usize, usize, usize)> {
        let h = s >> 1;
        let q = s >> 2;
        match self {
            PARTITION_NONE => vec![(0, 0, s, s)],
            PARTITION_HORZ => vec![(0, 0, s, h), (0, h, s, h)],
            PARTITION_VERT => vec![(0, 0, h, s), (h, 0, h, s)],
            PARTITION_HORZ_A => vec![(0, 0, h, h), (h, 0, h, h), (0, h, s, h)],
            PARTITION_HORZ_B => vec![(0, 0, s, h), (0, h, h, h), (h, h, h, h)],
            PARTITION_VERT_A => vec![(0, 0, h, h), (0, h, h, h), (h, 0, h, s)],
            PARTITION_VERT_B => vec![(0, 0, h, s), (h, 0, h, h), (h, h, h, h)],
            PARTITION_HORZ_4 => (0..4).map(|i| (0, i * q, s, q)).collect(),
            PARTITION_VERT_4 => (0..4).map(|i| (i * q, 0, q, s)).collect(),
            PARTITION_SPLIT => vec![(0, 0, h, h), (h, 0, h, h), (0, h, h, h), (h, h, h, h)],
        }
    }

    /// Whether the shape exists for a square of side `s`.
    pub(crate) fn allowed_for(self, s: usize) -> bool {
        match self {
            PARTITION_NONE => true,
            PARTITION_HORZ | PARTITION_VERT | PARTITION_SPLIT => s >= 2 * MIN_BLOCK_SIZE,
            PARTITION_HORZ_A | PARTITION_HORZ_B | PARTITION_VERT_A | PARTITION_VERT_B => {
                s >= 2 * MIN_BLOCK_SIZE
            }
            PARTITION_HORZ_4 | PARTITION_VERT_4 => s >= 4 * MIN_BLOCK_SIZE && s <= 64,
        }
    }

    pub fn is_square_only(self) -> bool {
        self == PARTITION_NONE
    }
}

impl fmt::Display for PartitionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PARTITION_NONE => "N",
            PARTITION_HORZ => "H",
            PARTITION_VERT => "V",
            PARTITION_HORZ_A => "HA",
            PARTITION_HORZ_B => "HB",
            PARTITION_VERT_A => "VA",
            PARTITION_VERT_B => "VB",
            PARTITION_HORZ_4 => "H4",
            PARTITION_VERT_4 => "V4",
            PARTITION_SPLIT => "S",
        };
        write!(f, "{}", s)
    }
}

/*****************************************************************************
 * prediction modes
 *****************************************************************************/
pub(crate) const INTRA_MODES: usize = 13;
pub(crate) const UV_INTRA_MODES: usize = 14;
pub(crate) const INTER_MODES: usize = 8;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum PredictionMode {
    DC_PRED = 0,
    V_PRED,
    H_PRED,
    D45_PRED,
    D135_PRED,
    D113_PRED,
    D157_PRED,
    D203_PRED,
    D67_PRED,
    SMOOTH_PRED,
    SMOOTH_V_PRED,
    SMOOTH_H_PRED,
    PAETH_PRED,
    UV_CFL_PRED,
    NEARESTMV,
    NEARMV,
    GLOBALMV,
    NEWMV,
    NEAREST_NEARESTMV,
    NEAR_NEARMV,
    GLOBAL_GLOBALMV,
    NEW_NEWMV,
}

use self::PredictionMode::*;

impl Default for PredictionMode {
    fn default() -> Self {
        DC_PRED
    }
}

impl PredictionMode {
    pub(crate) const INTRA: [PredictionMode; INTRA_MODES] = [
        DC_PRED,
        V_PRED,
        H_PRED,
        D45_PRED,
        D135_PRED,
        D113_PRED,
        D157_PRED,
        D203_PRED,
        D67_PRED,
        SMOOTH_PRED,
        SMOOTH_V_PRED,
        SMOOTH_H_PRED,
        PAETH_PRED,
    ];

    pub fn is_intra(self) -> bool {
        self <= UV_CFL_PRED
    }

    pub fn is_inter(self) -> bool {
        self >= NEARESTMV
    }

    pub fn is_compound(self) -> bool {
        self >= NEAREST_NEARESTMV
    }

    pub fn is_directional(self) -> bool {
        self >= V_PRED && self <= D67_PRED
    }

    pub fn has_newmv(self) -> bool {
        self == NEWMV || self == NEW_NEWMV
    }

    /// Nominal angle in degrees of a directional mode.
    pub(crate) fn base_angle(self) -> i16 {
        match self {
            V_PRED => 90,
            H_PRED => 180,
            D45_PRED => 45,
            D135_PRED => 135,
            D113_PRED => 113,
            D157_PRED => 157,
            D203_PRED => 203,
            D67_PRED => 67,
            _ => 0,
        }
    }

    /// Index of an inter mode inside the inter-mode rate tables.
    pub(crate) fn inter_index(self) -> usize {
        debug_assert!(self.is_inter());
        self as usize - NEARESTMV as usize
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/*****************************************************************************
 * candidate classes
 *****************************************************************************/
pub const CAND_CLASS_TOTAL: usize = 5;

/// Class of a mode-decision candidate; budgets and pruning are tracked per class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum CandClass {
    Intra = 0,
    /// single-reference NEWMV, including predictive-ME vectors
    InterNew,
    /// single-reference NEAREST/NEAR/GLOBAL
    InterPred,
    Compound,
    InterIntra,
}

impl CandClass {
    pub const ALL: [CandClass; CAND_CLASS_TOTAL] = [
        CandClass::Intra,
        CandClass::InterNew,
        CandClass::InterPred,
        CandClass::Compound,
        CandClass::InterIntra,
    ];
}

/*****************************************************************************
 * reference pruning groups
 *****************************************************************************/
pub const REF_PRUNE_GROUPS: usize = 4;

/// Semantic groups of inter candidates that reference pruning can switch off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum RefPruneGroup {
    Unipred = 0,
    Bipred,
    Global,
    InterIntra,
}

impl RefPruneGroup {
    pub const ALL: [RefPruneGroup; REF_PRUNE_GROUPS] = [
        RefPruneGroup::Unipred,
        RefPruneGroup::Bipred,
        RefPruneGroup::Global,
        RefPruneGroup::InterIntra,
    ];
}
