use crate::api::MdError;
use crate::def::*;

/// Which refinement stages run between stage 0 and stage 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MdStagingMode {
    /// stage 0 then stage 3
    Mode0,
    /// stage 0, stage 1, stage 3
    Mode1,
    /// all four stages
    Mode2,
}

impl MdStagingMode {
    pub(crate) fn runs_stage1(self) -> bool {
        self != MdStagingMode::Mode0
    }

    pub(crate) fn runs_stage2(self) -> bool {
        self == MdStagingMode::Mode2
    }
}

/// Number of candidates per class surviving into each stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NicSettings {
    pub stage1_count: [usize; CAND_CLASS_TOTAL],
    pub stage2_count: [usize; CAND_CLASS_TOTAL],
    pub stage3_count: [usize; CAND_CLASS_TOTAL],
    /// Bound on the union of all classes entering stage 3.
    pub stage3_total: usize,
}

/// Cross-class and intra-class pruning between stages.
///
/// Class thresholds are the percentage by which a class-best cost may exceed
/// the block-best cost before the class is dropped. Candidate thresholds are the
/// percentage by which a candidate may exceed its class best. `None` disables
/// the corresponding test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NicPruningSettings {
    pub mds1_class_th: Option<u64>,
    pub mds1_band_cnt: u64,
    pub mds2_class_th: Option<u64>,
    pub mds2_band_cnt: u64,
    pub mds3_class_th: Option<u64>,
    pub mds3_band_cnt: u64,
    pub mds1_cand_th: Option<u64>,
    pub mds2_cand_th: Option<u64>,
    pub mds3_cand_th: Option<u64>,
    /// Candidates a surviving class keeps when the picture is used as a reference.
    pub min_count_ref_pic: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TxTypeSearchLevel {
    DctOnly,
    Reduced,
    Full,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSearchSettings {
    pub txt_level: TxTypeSearchLevel,
    /// Deepest transform split tried at stage 3.
    pub txs_max_depth: usize,
    /// Abandon a depth once its running cost exceeds the best depth.
    pub early_exit: bool,
    pub rdoq: bool,
    /// Distortion of stage 1 measured in the pixel domain instead of the
    /// transform domain.
    pub spatial_sse_stage1: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChromaSettings {
    /// Add chroma distortion to the stage-0 fast cost.
    pub stage0_chroma: bool,
    pub cfl: bool,
    /// Search the best intra UV mode once per block, independently of luma.
    pub independent_uv: bool,
    /// UV modes re-evaluated for intra candidates at stage 3.
    pub uv_recheck_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntraSettings {
    pub angle_delta: bool,
    pub smooth: bool,
    pub paeth: bool,
    pub interintra: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterSettings {
    pub near: bool,
    pub global: bool,
    pub compound: bool,
    /// Add predictive-ME vectors as NEWMV candidates.
    pub pme_cand: bool,
}

/// Half-width, half-height and step of a full-pel search window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchArea {
    pub width: i16,
    pub height: i16,
    pub step: i16,
}

impl SearchArea {
    pub const fn new(width: i16, height: i16, step: i16) -> Self {
        SearchArea { width, height, step }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqMotionSearchSettings {
    pub enabled: bool,
    /// Spatial predictor spread (full pel) that marks a block as high motion.
    pub spatial_dev_th: i32,
    /// Co-located temporal vector magnitude (full pel) that marks high motion.
    pub temporal_mv_th: i32,
    /// Nested sparse searches, each seeded by the previous one.
    pub stages: [Option<SearchArea>; 3],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NsqMotionSearchSettings {
    pub enabled: bool,
    pub window: SearchArea,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PmeSettings {
    pub enabled: bool,
    pub window: SearchArea,
    /// Predictor and ME vectors closer than this (1/8 pel) reuse the ME result.
    pub reuse_tolerance: i32,
    /// ME result is reused when the best predictor is this many percent worse.
    pub reuse_cost_th: Option<u64>,
    pub subpel: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubpelSettings {
    pub enabled: bool,
    pub half: bool,
    pub quarter: bool,
    pub eighth: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionRefinementSettings {
    /// Half range (full pel) of the coarse search at 64x64.
    pub coarse_search_range: i16,
    pub sq: SqMotionSearchSettings,
    pub nsq: NsqMotionSearchSettings,
    pub pme: PmeSettings,
    pub subpel: SubpelSettings,
    pub use_ssd: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefPruningSettings {
    pub enabled: bool,
    /// Per group, percent deviation from the best reference beyond which a
    /// reference is skipped for that group.
    pub thresholds: [Option<u64>; REF_PRUNE_GROUPS],
    /// References ranked below this are never pruned.
    pub min_kept: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionSettings {
    pub min_block_size: usize,
    pub max_block_size: usize,
    pub nsq: bool,
    pub ab_shapes: bool,
    pub four_way: bool,
    /// Margin (percent) for skipping remaining quadrants once their
    /// extrapolated cost exceeds the parent.
    pub parent_cost_early_exit: Option<u64>,
    pub redundant_blk: bool,
    pub similar_blk: bool,
}

/// All speed/quality controls of the mode decision, resolved once from a preset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    pub md_staging: MdStagingMode,
    pub nic: NicSettings,
    pub nic_pruning: NicPruningSettings,
    pub tx: TxSearchSettings,
    pub chroma: ChromaSettings,
    pub intra: IntraSettings,
    pub inter: InterSettings,
    pub me: MotionRefinementSettings,
    pub ref_pruning: RefPruningSettings,
    pub partition: PartitionSettings,
    /// Include mode and vector rate in the stage-0 cost.
    pub fast_cost_rate: bool,
    pub stage0_use_ssd: bool,
}

const STAGE1_BASE: [usize; CAND_CLASS_TOTAL] = [10, 10, 8, 6, 4];
const NIC_SCALE: [usize; 9] = [16, 14, 12, 10, 8, 7, 6, 5, 4];
const STAGE3_TOTAL: [usize; 9] = [12, 10, 8, 7, 6, 5, 4, 3, 2];

fn scale_counts(base: &[usize; CAND_CLASS_TOTAL], num: usize, den: usize) -> [usize; CAND_CLASS_TOTAL] {
    let mut out = [0; CAND_CLASS_TOTAL];
    for (o, b) in out.iter_mut().zip(base.iter()) {
        *o = ((b * num + den / 2) / den).max(1);
    }
    out
}

impl EncoderSettings {
    pub fn from_preset(preset: u8) -> Self {
        let p = preset.min(8) as usize;

        let stage1_count = scale_counts(&STAGE1_BASE, NIC_SCALE[p], 16);
        let stage2_count = scale_counts(&stage1_count, 1, 2);
        let stage3_count = scale_counts(&stage2_count, 1, 2);

        let nic_pruning = match p {
            0 => NicPruningSettings {
                mds1_class_th: None,
                mds1_band_cnt: 1,
                mds2_class_th: None,
                mds2_band_cnt: 1,
                mds3_class_th: None,
                mds3_band_cnt: 1,
                mds1_cand_th: None,
                mds2_cand_th: None,
                mds3_cand_th: None,
                min_count_ref_pic: 2,
            },
            1..=4 => NicPruningSettings {
                mds1_class_th: Some(300),
                mds1_band_cnt: 4,
                mds2_class_th: Some(100),
                mds2_band_cnt: 2,
                mds3_class_th: Some(50),
                mds3_band_cnt: 2,
                mds1_cand_th: Some(500),
                mds2_cand_th: Some(300),
                mds3_cand_th: Some(100),
                min_count_ref_pic: 2,
            },
            _ => NicPruningSettings {
                mds1_class_th: Some(100),
                mds1_band_cnt: 4,
                mds2_class_th: Some(50),
                mds2_band_cnt: 2,
                mds3_class_th: Some(25),
                mds3_band_cnt: 2,
                mds1_cand_th: Some(200),
                mds2_cand_th: Some(100),
                mds3_cand_th: Some(50),
                min_count_ref_pic: 2,
            },
        };

        let tx = TxSearchSettings {
            txt_level: match p {
                0..=2 => TxTypeSearchLevel::Full,
                3..=5 => TxTypeSearchLevel::Reduced,
                _ => TxTypeSearchLevel::DctOnly,
            },
            txs_max_depth: match p {
                0..=2 => 2,
                3..=5 => 1,
                _ => 0,
            },
            early_exit: p >= 1,
            rdoq: p <= 6,
            spatial_sse_stage1: p <= 1,
        };

        let sq_stages = if p <= 2 {
            [
                Some(SearchArea::new(48, 48, 4)),
                Some(SearchArea::new(16, 16, 2)),
                Some(SearchArea::new(4, 4, 1)),
            ]
        } else {
            [
                Some(SearchArea::new(32, 32, 4)),
                Some(SearchArea::new(8, 8, 2)),
                None,
            ]
        };

        let ref_thresholds = match p {
            0 => [None; REF_PRUNE_GROUPS],
            1..=3 => [Some(60), Some(40), Some(80), Some(30)],
            _ => [Some(30), Some(20), Some(40), Some(10)],
        };

        EncoderSettings {
            md_staging: match p {
                0..=2 => MdStagingMode::Mode2,
                3..=5 => MdStagingMode::Mode1,
                _ => MdStagingMode::Mode0,
            },
            nic: NicSettings {
                stage1_count,
                stage2_count,
                stage3_count,
                stage3_total: STAGE3_TOTAL[p],
            },
            nic_pruning,
            tx,
            chroma: ChromaSettings {
                stage0_chroma: p <= 1,
                cfl: p <= 5,
                independent_uv: p <= 4,
                uv_recheck_count: if p <= 2 { 3 } else { 0 },
            },
            intra: IntraSettings {
                angle_delta: p <= 3,
                smooth: true,
                paeth: true,
                interintra: p <= 3,
            },
            inter: InterSettings {
                near: true,
                global: true,
                compound: p <= 6,
                pme_cand: p <= 4,
            },
            me: MotionRefinementSettings {
                coarse_search_range: match p {
                    0..=3 => 32,
                    4..=6 => 24,
                    _ => 16,
                },
                sq: SqMotionSearchSettings {
                    enabled: p <= 4,
                    spatial_dev_th: 8,
                    temporal_mv_th: 16,
                    stages: sq_stages,
                },
                nsq: NsqMotionSearchSettings {
                    enabled: p <= 5,
                    window: SearchArea::new(2, 2, 1),
                },
                pme: PmeSettings {
                    enabled: p <= 4,
                    window: SearchArea::new(3, 3, 1),
                    reuse_tolerance: 8,
                    reuse_cost_th: Some(50),
                    subpel: p <= 2,
                },
                subpel: SubpelSettings {
                    enabled: p <= 7,
                    half: true,
                    quarter: p <= 6,
                    eighth: p <= 3,
                },
                use_ssd: false,
            },
            ref_pruning: RefPruningSettings {
                enabled: p >= 1,
                thresholds: ref_thresholds,
                min_kept: 1,
            },
            partition: PartitionSettings {
                min_block_size: MIN_BLOCK_SIZE,
                max_block_size: MAX_SB_SIZE,
                nsq: p <= 5,
                ab_shapes: p <= 3,
                four_way: p <= 2,
                parent_cost_early_exit: match p {
                    0..=1 => None,
                    2..=4 => Some(20),
                    _ => Some(5),
                },
                redundant_blk: true,
                similar_blk: p <= 6,
            },
            fast_cost_rate: true,
            stage0_use_ssd: p <= 1,
        }
    }

    pub fn validate(&self) -> Result<(), MdError> {
        let nic = &self.nic;
        if nic.stage3_total == 0 {
            return Err(MdError::InvalidConfig("stage 3 must keep at least one candidate"));
        }
        for c in 0..CAND_CLASS_TOTAL {
            if nic.stage2_count[c] > nic.stage1_count[c] || nic.stage3_count[c] > nic.stage2_count[c] {
                return Err(MdError::InvalidConfig("candidate counts must not grow across stages"));
            }
        }
        if nic.stage1_count.iter().sum::<usize>() + CAND_CLASS_TOTAL > MAX_NFL {
            return Err(MdError::InvalidConfig("stage 1 candidate counts exceed the candidate limit"));
        }
        for band in &[
            self.nic_pruning.mds1_band_cnt,
            self.nic_pruning.mds2_band_cnt,
            self.nic_pruning.mds3_band_cnt,
        ] {
            if *band == 0 {
                return Err(MdError::InvalidConfig("pruning band count must be at least 1"));
            }
        }
        if self.tx.txs_max_depth > MAX_TX_DEPTH {
            return Err(MdError::InvalidConfig("transform depth above the supported maximum"));
        }
        let part = &self.partition;
        if !part.min_block_size.is_power_of_two()
            || part.min_block_size < MIN_BLOCK_SIZE
            || part.min_block_size > part.max_block_size
        {
            return Err(MdError::InvalidConfig("invalid block size range"));
        }
        for s in self.me.sq.stages.iter().flatten() {
            if s.step <= 0 || s.width < 0 || s.height < 0 {
                return Err(MdError::InvalidConfig("invalid square motion search area"));
            }
        }
        let w = &self.me.nsq.window;
        let pw = &self.me.pme.window;
        if w.step <= 0 || pw.step <= 0 || w.width < 0 || w.height < 0 || pw.width < 0 || pw.height < 0 {
            return Err(MdError::InvalidConfig("invalid motion search window"));
        }
        Ok(())
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        EncoderSettings::from_preset(6)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_preset_is_valid() {
        for p in 0..=8 {
            let s = EncoderSettings::from_preset(p);
            assert_eq!(s.validate(), Ok(()), "preset {}", p);
        }
    }

    #[test]
    fn faster_presets_keep_fewer_candidates() {
        let slow = EncoderSettings::from_preset(0);
        let fast = EncoderSettings::from_preset(8);
        let s: usize = slow.nic.stage1_count.iter().sum();
        let f: usize = fast.nic.stage1_count.iter().sum();
        assert!(f < s);
        assert!(fast.nic.stage1_count.iter().all(|&c| c >= 1));
    }

    #[test]
    fn slowest_preset_never_prunes() {
        let s = EncoderSettings::from_preset(0);
        assert_eq!(s.nic_pruning.mds1_class_th, None);
        assert_eq!(s.ref_pruning.thresholds, [None; REF_PRUNE_GROUPS]);
        assert_eq!(s.partition.parent_cost_early_exit, None);
    }
}
