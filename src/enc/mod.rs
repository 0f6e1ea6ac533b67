pub(crate) mod cand;
pub(crate) mod cand_buf;
pub(crate) mod dist;
pub(crate) mod full_loop;
pub(crate) mod geom;
pub(crate) mod hme;
pub(crate) mod md_stage;
pub(crate) mod me;
pub(crate) mod mode;
pub(crate) mod mvp;
pub(crate) mod neighbor;
pub(crate) mod pd;
pub(crate) mod rate;
pub(crate) mod ref_prune;
pub(crate) mod tq;
pub(crate) mod txs;
pub(crate) mod uv;

use std::sync::Arc;

use super::api::frame::*;
use super::api::*;
use super::def::*;
use super::ipred::*;
use super::mc::PredBuf;
use super::tracer::*;
use super::util::*;

use cand::ModeDecisionCandidate;
use cand_buf::CandidateBufferPool;
use geom::BlockGeomTable;
use neighbor::*;
use rate::*;
use tq::QuantParams;
use uv::IndependentUv;

/*****************************************************************************
 * per-block evaluation inputs
 *****************************************************************************/

/// Read-only view of everything a block evaluation needs.
#[derive(Clone, Copy)]
pub(crate) struct BlockCtx<'a> {
    pub(crate) src: &'a Frame<pel>,
    pub(crate) refs: &'a ReferenceList,
    pub(crate) nbr: &'a NeighborArrays,
    pub(crate) rates: &'a MdRateEstimation,
    pub(crate) settings: &'a EncoderSettings,
    pub(crate) qp: QuantParams,
    pub(crate) full_lambda: u64,
    pub(crate) fast_lambda: u64,
    pub(crate) bit_depth: usize,

    /* luma position and size in the picture */
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) w: usize,
    pub(crate) h: usize,
    /* picture width rounded up to the minimum block size */
    pub(crate) pic_w: usize,
    pub(crate) sb_top: bool,
    pub(crate) max_tx_depth: usize,
    pub(crate) is_ref_pic: bool,

    pub(crate) skip_ctx: usize,
    pub(crate) is_inter_ctx: usize,
    pub(crate) uv: Option<&'a IndependentUv>,
}

impl<'a> BlockCtx<'a> {
    /// Position and size of the block in plane `c`.
    #[inline]
    pub(crate) fn plane_rect(&self, c: usize) -> (usize, usize, usize, usize) {
        if c == Y_C {
            (self.x, self.y, self.w, self.h)
        } else {
            (self.x >> 1, self.y >> 1, self.w >> 1, self.h >> 1)
        }
    }

    /// Source samples of plane `c` at the block origin, with their stride.
    #[inline]
    pub(crate) fn src_block(&self, c: usize) -> (&'a [pel], usize) {
        let (x, y, _, _) = self.plane_rect(c);
        let p = &self.src.planes[c];
        (p.slice_at(x as isize, y as isize), p.cfg.stride)
    }

    /// Intra prediction allowed for the block size.
    #[inline]
    pub(crate) fn allow_intra(&self) -> bool {
        self.w <= MAX_TX_SIZE && self.h <= MAX_TX_SIZE
    }

    /// Chroma from luma allowed for the block size.
    #[inline]
    pub(crate) fn allow_cfl(&self) -> bool {
        self.w <= 32 && self.h <= 32
    }

    #[inline]
    pub(crate) fn allow_interintra(&self) -> bool {
        self.w <= 32 && self.h <= 32
    }
}

/// Intra prediction of plane `c` of the block into `dst` (stride = plane width).
pub(crate) fn predict_intra_plane(
    bc: &BlockCtx,
    c: usize,
    mode: PredictionMode,
    angle_delta: i8,
    edges: &mut IntraEdges,
    dst: &mut Vec<pel>,
) {
    let (x, y, w, h) = bc.plane_rect(c);
    let ss = (c != Y_C) as usize;
    let avail = EdgeAvail {
        pic_w: bc.pic_w >> ss,
        sb_top: bc.sb_top,
    };
    build_intra_edges(&bc.nbr.recon[c], x, y, w, h, avail, bc.bit_depth, edges);
    reset_buf(dst, w * h);
    intra_predict(edges, mode, angle_delta, dst, w, h, bc.bit_depth);
}

/// Working buffers reused by every block of a picture.
#[derive(Default)]
pub(crate) struct MdScratch {
    pub(crate) edges: IntraEdges,
    pub(crate) pred_tmp: PredBuf,
    pub(crate) intra_tmp: Vec<pel>,
    pub(crate) subpel: Vec<pel>,
    pub(crate) residual: Vec<i32>,
    pub(crate) coeff: Vec<i32>,
    pub(crate) qcoeff: Vec<i32>,
    pub(crate) dqcoeff: Vec<i32>,
    pub(crate) best_dq: Vec<i32>,
    pub(crate) tile_recon: Vec<pel>,
    pub(crate) recon_tx: Vec<pel>,
    pub(crate) cfl_ac: Vec<i32>,
    pub(crate) uv_pred: [Vec<pel>; 2],
}

/*****************************************************************************
 * per-block results
 *****************************************************************************/

/// Winner of one block, kept for the partition decision and for reuse.
#[derive(Clone, Debug)]
pub(crate) struct BlockResult {
    pub(crate) cand: ModeDecisionCandidate,
    pub(crate) skip: bool,
    pub(crate) tx_depth: u8,
    pub(crate) y_nonzero: u32,
    pub(crate) uv_nonzero: u32,
    pub(crate) cost: u64,
    /* reconstruction per plane, stride = plane block width */
    pub(crate) recon: [Vec<pel>; N_C],
    pub(crate) dc_level: [i8; N_C],
}

/// Working state of one block of the mode-decision scan.
#[derive(Clone, Debug, Default)]
pub(crate) struct MdBlkStruct {
    pub(crate) cost: u64,
    pub(crate) result: Option<BlockResult>,
}

/*****************************************************************************
 * per-picture encoder state
 *****************************************************************************/

/// Picture being decided.
pub(crate) struct PictureCtx {
    pub(crate) src: Frame<pel>,
    pub(crate) refs: ReferenceList,
    pub(crate) is_inter: bool,
    pub(crate) used_as_reference: bool,
    pub(crate) qindex: u8,
    pub(crate) recon: Frame<pel>,
    pub(crate) decision: PictureDecision,
    pub(crate) sb_coded: Vec<bool>,
}

/// Mode-decision context: everything that outlives one block.
pub(crate) struct MdCtx {
    pub(crate) cfg: EncoderConfig,
    pub(crate) settings: EncoderSettings,
    pub(crate) geom: Arc<BlockGeomTable>,
    pub(crate) nbr: NeighborArrays,
    pub(crate) rates: MdRateEstimation,
    pub(crate) qp: QuantParams,
    pub(crate) full_lambda: u64,
    pub(crate) fast_lambda: u64,
    pub(crate) md_blk: Vec<MdBlkStruct>,
    pub(crate) pool: CandidateBufferPool,
    pub(crate) scratch: MdScratch,
    pub(crate) tracer: Option<Tracer>,
}

impl MdCtx {
    pub(crate) fn new(cfg: EncoderConfig, settings: EncoderSettings) -> Result<Self, MdError> {
        cfg.validate()?;
        settings.validate()?;
        let geom = Arc::new(BlockGeomTable::new(cfg.sb_size));
        let nbr = NeighborArrays::new(cfg.aligned_width(), cfg.aligned_height())?;
        let pool = CandidateBufferPool::new(&settings.nic, cfg.sb_size)?;
        let mut md_blk = Vec::new();
        md_blk
            .try_reserve_exact(geom.len())
            .map_err(|_| MdError::OutOfMemory("block records"))?;
        md_blk.resize(geom.len(), MdBlkStruct::default());
        let mut md = MdCtx {
            cfg,
            settings,
            geom,
            nbr,
            rates: MdRateEstimation::new(cfg.qindex),
            qp: QuantParams::new(cfg.qindex, cfg.bit_depth),
            full_lambda: 0,
            fast_lambda: 0,
            md_blk,
            pool,
            scratch: MdScratch::default(),
            tracer: None,
        };
        md.init_picture(cfg.qindex);

        #[cfg(feature = "trace")]
        {
            md.tracer = OPEN_TRACE();
        }

        Ok(md)
    }

    /// Refreshes the rate tables and quantizer, and forgets the previous picture.
    pub(crate) fn init_picture(&mut self, qindex: u8) {
        self.rates = MdRateEstimation::new(qindex);
        self.qp = QuantParams::new(qindex, self.cfg.bit_depth);
        self.full_lambda = full_lambda(qindex);
        self.fast_lambda = fast_lambda(qindex);
        self.nbr.reset();
    }

    pub(crate) fn init_sb(&mut self) {
        for b in self.md_blk.iter_mut() {
            b.cost = 0;
            b.result = None;
        }
        self.pool.reset();
    }
}
