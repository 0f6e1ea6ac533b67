use super::reference::TemporalMvs;
use crate::def::*;

/// Prediction chosen for a coded block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMode {
    Intra {
        mode: PredictionMode,
        angle_delta: i8,
        uv_mode: PredictionMode,
        uv_angle_delta: i8,
        cfl_alpha: [i8; 2],
    },
    Inter {
        mode: PredictionMode,
        refs: [Option<RefFrame>; 2],
        mvs: [MotionVector; 2],
        interintra: Option<PredictionMode>,
    },
}

/// Final decision for one coded (leaf) block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockDecision {
    /// Luma position in the picture.
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Shape of the square partition the block belongs to.
    pub partition: PartitionShape,
    pub sq_size: usize,
    pub mode: BlockMode,
    pub skip: bool,
    pub tx_depth: u8,
    pub y_nonzero: u32,
    pub uv_nonzero: u32,
    pub cost: u64,
}

impl BlockDecision {
    pub fn is_inter(&self) -> bool {
        matches!(self.mode, BlockMode::Inter { .. })
    }

    pub fn prediction_mode(&self) -> PredictionMode {
        match self.mode {
            BlockMode::Intra { mode, .. } => mode,
            BlockMode::Inter { mode, .. } => mode,
        }
    }

    /// First motion vector of an inter block.
    pub fn mv(&self) -> Option<MotionVector> {
        match self.mode {
            BlockMode::Inter { mvs, .. } => Some(mvs[0]),
            BlockMode::Intra { .. } => None,
        }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuperblockDecision {
    pub x: usize,
    pub y: usize,
    pub size: usize,
    /// Leaf blocks in coding order.
    pub blocks: Vec<BlockDecision>,
    pub cost: u64,
}

impl SuperblockDecision {
    pub fn block_at(&self, x: usize, y: usize) -> Option<&BlockDecision> {
        self.blocks.iter().find(|b| b.contains(x, y))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PictureDecision {
    pub width: usize,
    pub height: usize,
    pub superblocks: Vec<SuperblockDecision>,
}

impl PictureDecision {
    pub fn blocks(&self) -> impl Iterator<Item = &BlockDecision> {
        self.superblocks.iter().flat_map(|sb| sb.blocks.iter())
    }

    pub fn block_at(&self, x: usize, y: usize) -> Option<&BlockDecision> {
        self.blocks().find(|b| b.contains(x, y))
    }

    pub fn total_cost(&self) -> u64 {
        self.superblocks
            .iter()
            .fold(0u64, |acc, sb| acc.saturating_add(sb.cost))
    }

    /// Motion field to attach to this picture when it becomes a reference.
    pub fn temporal_mvs(&self) -> TemporalMvs {
        let mut t = TemporalMvs::new(self.width, self.height);
        for b in self.blocks() {
            let mv = match b.mode {
                BlockMode::Inter { mvs, interintra: None, .. } => Some(mvs[0]),
                _ => None,
            };
            t.set_block(b.x, b.y, b.width, b.height, mv);
        }
        t
    }
}
