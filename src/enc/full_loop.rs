use super::cand::CandidateKind;
use super::cand_buf::CandidateBuffer;
use super::dist::*;
use super::rate::RDCOST;
use super::txs::*;
use super::uv::choose_intra_uv;
use super::*;
use crate::api::TxTypeSearchLevel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FullLoopStage {
    Stage1,
    Stage2,
    Final,
}

/// Accuracy of one full-loop pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FullLoopParams {
    pub(crate) max_depth: usize,
    pub(crate) txt_level: TxTypeSearchLevel,
    pub(crate) rdoq: bool,
    pub(crate) spatial: bool,
    pub(crate) chroma: bool,
    pub(crate) cfl: bool,
    pub(crate) uv_recheck: usize,
    /* compare against coding the block as skip */
    pub(crate) skip_decision: bool,
}

impl FullLoopParams {
    pub(crate) fn new(stage: FullLoopStage, bc: &BlockCtx) -> Self {
        let s = bc.settings;
        match stage {
            FullLoopStage::Stage1 => FullLoopParams {
                max_depth: 0,
                txt_level: TxTypeSearchLevel::DctOnly,
                rdoq: false,
                spatial: s.tx.spatial_sse_stage1,
                chroma: false,
                cfl: false,
                uv_recheck: 0,
                skip_decision: false,
            },
            FullLoopStage::Stage2 => FullLoopParams {
                max_depth: 0,
                txt_level: s.tx.txt_level,
                rdoq: false,
                spatial: false,
                chroma: true,
                cfl: false,
                uv_recheck: 0,
                skip_decision: false,
            },
            FullLoopStage::Final => FullLoopParams {
                max_depth: s.tx.txs_max_depth,
                txt_level: s.tx.txt_level,
                rdoq: s.tx.rdoq,
                spatial: true,
                chroma: true,
                cfl: s.chroma.cfl,
                uv_recheck: if bc.uv.is_some() { s.chroma.uv_recheck_count } else { 0 },
                skip_decision: true,
            },
        }
    }
}

fn prediction_distortion(bc: &BlockCtx, pred: &PredBuf, planes: usize) -> u64 {
    let mut d = 0;
    for p in 0..planes {
        let (src, s_src) = bc.src_block(p);
        let (_, _, w, h) = bc.plane_rect(p);
        d += spatial_full_distortion(w, h, src, s_src, &pred.data[p], w, bc.bit_depth);
    }
    d
}

/// Transforms, quantizes and reconstructs the candidate held by `buf`, and
/// stores its full rate-distortion cost. Returns that cost.
pub(crate) fn full_loop_core(
    bc: &BlockCtx,
    buf: &mut CandidateBuffer,
    p: &FullLoopParams,
    scratch: &mut MdScratch,
) -> u64 {
    let mut cand = match buf.cand {
        Some(c) => c,
        None => return MAX_MODE_COST,
    };
    let is_inter = cand.is_inter();
    if p.chroma && !buf.chroma_predicted {
        if !cand.predict(bc, true, &mut buf.pred, scratch) {
            buf.full_cost = MAX_MODE_COST;
            return MAX_MODE_COST;
        }
        buf.chroma_predicted = true;
    }

    let luma = TxSearchParams {
        max_depth: p.max_depth,
        level: p.txt_level,
        rdoq: p.rdoq,
        spatial: p.spatial,
        early_exit: bc.settings.tx.early_exit,
        is_inter,
    };
    let y = tx_search(bc, Y_C, &buf.pred.data[Y_C], &luma, &mut buf.recon[Y_C], scratch);

    let mut uv_dist = 0;
    let mut uv_rate = 0;
    let mut uv_nonzero = 0;
    let mut dc_level = [y.dc_level, 0, 0];
    if p.chroma {
        if let CandidateKind::Intra(ic) = cand.kind {
            if p.cfl || p.uv_recheck > 0 {
                let ic = choose_intra_uv(bc, ic, &buf.recon[Y_C], &mut buf.pred, p.cfl, p.uv_recheck, scratch);
                cand.kind = CandidateKind::Intra(ic);
                buf.cand = Some(cand);
            }
        }
        let chroma = TxSearchParams {
            max_depth: 0,
            level: TxTypeSearchLevel::DctOnly,
            early_exit: false,
            ..luma
        };
        for c in U_C..=V_C {
            let r = tx_search(bc, c, &buf.pred.data[c], &chroma, &mut buf.recon[c], scratch);
            uv_dist += r.dist;
            uv_rate += r.rate;
            uv_nonzero += r.nonzero;
            dc_level[c] = r.dc_level;
        }
    }

    let mode_rate = if p.chroma {
        cand.full_mode_rate(bc)
    } else {
        cand.fast_rate(bc)
    };
    let skip_rate = bc.rates.skip[bc.skip_ctx];
    let dist = y.dist.saturating_add(uv_dist);
    let coded_cost = RDCOST(
        bc.full_lambda,
        mode_rate + skip_rate[0] as u64 + y.rate + uv_rate,
        dist,
    );

    let mut cost = coded_cost;
    let mut skip = false;
    let mut y_nonzero = y.nonzero;
    let mut tx_depth = y.depth;
    if p.skip_decision {
        if is_inter {
            let planes = if p.chroma { N_C } else { 1 };
            let skip_dist = prediction_distortion(bc, &buf.pred, planes);
            let skip_cost = RDCOST(bc.full_lambda, mode_rate + skip_rate[1] as u64, skip_dist);
            if skip_cost <= coded_cost {
                skip = true;
                cost = skip_cost;
                for c in 0..planes {
                    let n = buf.pred.data[c].len().min(buf.recon[c].len());
                    let (pred, recon) = (&buf.pred.data[c], &mut buf.recon[c]);
                    recon[..n].copy_from_slice(&pred[..n]);
                }
            }
        }
        if !skip && y_nonzero + uv_nonzero == 0 {
            skip = true;
            cost = RDCOST(bc.full_lambda, mode_rate + skip_rate[1] as u64, dist);
        }
        if skip {
            y_nonzero = 0;
            uv_nonzero = 0;
            tx_depth = 0;
            dc_level = [0; N_C];
        }
    }

    buf.full_cost = cost;
    buf.tx_depth = tx_depth;
    buf.tx_types = y.types;
    buf.y_nonzero = y_nonzero;
    buf.uv_nonzero = uv_nonzero;
    buf.skip = skip;
    buf.dc_level = dc_level;
    cost
}
