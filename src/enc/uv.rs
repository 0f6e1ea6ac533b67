use super::cand::IntraCandidate;
use super::dist::*;
use super::rate::*;
use super::*;

/// Chroma prediction cost of a UV mode for the current block, both planes.
fn uv_mode_cost(bc: &BlockCtx, mode: PredictionMode, delta: i8, scratch: &mut MdScratch) -> u64 {
    let mut dist = 0;
    for p in U_C..=V_C {
        let mut dst = std::mem::take(&mut scratch.uv_pred[p - 1]);
        predict_intra_plane(bc, p, mode, delta, &mut scratch.edges, &mut dst);
        let (src, s_src) = bc.src_block(p);
        let (_, _, w, h) = bc.plane_rect(p);
        dist += spatial_full_distortion(w, h, src, s_src, &dst, w, bc.bit_depth);
        scratch.uv_pred[p - 1] = dst;
    }
    let rate = bc.rates.intra_chroma_rate(mode, delta, bc.allow_cfl(), [0, 0]);
    RDCOST(bc.full_lambda, rate as u64, dist)
}

/// Intra chroma modes of a block ranked once, independently of the luma mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct IndependentUv {
    /* (mode, angle delta, cost), cheapest first */
    pub(crate) ranked: Vec<(PredictionMode, i8, u64)>,
}

impl IndependentUv {
    pub(crate) fn search(bc: &BlockCtx, scratch: &mut MdScratch) -> Self {
        let s = &bc.settings.intra;
        let mut ranked = Vec::with_capacity(INTRA_MODES * 3);
        for &mode in PredictionMode::INTRA.iter() {
            let smooth = matches!(
                mode,
                PredictionMode::SMOOTH_PRED | PredictionMode::SMOOTH_V_PRED | PredictionMode::SMOOTH_H_PRED
            );
            if (smooth && !s.smooth) || (mode == PredictionMode::PAETH_PRED && !s.paeth) {
                continue;
            }
            let max_delta = if mode.is_directional() && s.angle_delta {
                MAX_ANGLE_DELTA
            } else {
                0
            };
            for delta in -max_delta..=max_delta {
                ranked.push((mode, delta, uv_mode_cost(bc, mode, delta, scratch)));
            }
        }
        ranked.sort_by_key(|r| r.2);
        IndependentUv { ranked }
    }

    pub(crate) fn best(&self) -> Option<(PredictionMode, i8)> {
        self.ranked.first().map(|r| (r.0, r.1))
    }
}

/// Best CfL alphas of both planes and the resulting cost, from a luma reconstruction.
fn cfl_search(bc: &BlockCtx, luma: &[pel], scratch: &mut MdScratch) -> ([i8; 2], u64) {
    let (_, _, w, _) = bc.plane_rect(Y_C);
    let (_, _, w_uv, h_uv) = bc.plane_rect(U_C);
    let n = w_uv * h_uv;
    reset_buf(&mut scratch.cfl_ac, n);
    cfl_luma_ac(luma, w, w_uv, h_uv, &mut scratch.cfl_ac);
    let mut alphas = [0i8; 2];
    let mut dist = 0;
    for p in U_C..=V_C {
        let mut dc = std::mem::take(&mut scratch.uv_pred[p - 1]);
        predict_intra_plane(bc, p, PredictionMode::DC_PRED, 0, &mut scratch.edges, &mut dc);
        let (src, s_src) = bc.src_block(p);
        let mut best = (0i8, u64::MAX, 0u64);
        for a in -CFL_ALPHA_MAX..=CFL_ALPHA_MAX {
            reset_buf(&mut scratch.intra_tmp, n);
            scratch.intra_tmp[..n].copy_from_slice(&dc[..n]);
            cfl_predict(&mut scratch.intra_tmp, &scratch.cfl_ac, a, w_uv, h_uv, bc.bit_depth);
            let d = spatial_full_distortion(w_uv, h_uv, src, s_src, &scratch.intra_tmp, w_uv, bc.bit_depth);
            let cost = RDCOST(
                bc.full_lambda,
                bc.rates.cfl_alpha[(a + CFL_ALPHA_MAX) as usize] as u64,
                d,
            );
            if cost < best.1 {
                best = (a, cost, d);
            }
        }
        alphas[p - 1] = best.0;
        dist += best.2;
        scratch.uv_pred[p - 1] = dc;
    }
    let rate = bc
        .rates
        .intra_chroma_rate(PredictionMode::UV_CFL_PRED, 0, true, alphas);
    (alphas, RDCOST(bc.full_lambda, rate as u64, dist))
}

/// Final chroma choice of an intra candidate: its own UV mode, the best
/// independently ranked modes and CfL compete on prediction cost. The chroma
/// planes of `pred` are rewritten with the winner.
pub(crate) fn choose_intra_uv(
    bc: &BlockCtx,
    cand: IntraCandidate,
    luma_recon: &[pel],
    pred: &mut PredBuf,
    cfl: bool,
    recheck: usize,
    scratch: &mut MdScratch,
) -> IntraCandidate {
    let own = if cand.uv_mode == PredictionMode::UV_CFL_PRED {
        (PredictionMode::DC_PRED, 0)
    } else {
        (cand.uv_mode, cand.uv_angle_delta)
    };
    let mut options = vec![own];
    if let Some(uv) = bc.uv {
        for r in uv.ranked.iter().take(recheck) {
            if !options.contains(&(r.0, r.1)) {
                options.push((r.0, r.1));
            }
        }
    }
    let mut best = (own.0, own.1, [0i8; 2], u64::MAX);
    for &(mode, delta) in options.iter() {
        let cost = uv_mode_cost(bc, mode, delta, scratch);
        if cost < best.3 {
            best = (mode, delta, [0, 0], cost);
        }
    }
    if cfl && bc.allow_cfl() {
        let (alphas, cost) = cfl_search(bc, luma_recon, scratch);
        if cost < best.3 {
            best = (PredictionMode::UV_CFL_PRED, 0, alphas, cost);
        }
    }

    let (mode, delta, alphas, _) = best;
    for p in U_C..=V_C {
        predict_intra_plane(bc, p, mode, delta, &mut scratch.edges, &mut pred.data[p]);
        if mode == PredictionMode::UV_CFL_PRED {
            let (_, _, w_uv, h_uv) = bc.plane_rect(p);
            cfl_predict(&mut pred.data[p], &scratch.cfl_ac, alphas[p - 1], w_uv, h_uv, bc.bit_depth);
        }
    }
    IntraCandidate {
        uv_mode: mode,
        uv_angle_delta: delta,
        cfl_alpha: alphas,
        ..cand
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use crate::enc::neighbor::NeighborArrays;

    #[test]
    fn ranking_is_sorted_and_honors_settings() {
        let mut src = Frame::new(16, 16);
        for c in U_C..=V_C {
            for y in 0..8 {
                for x in 0..8 {
                    src.planes[c].set(x, y, (x * 20 + c) as pel);
                }
            }
        }
        src.pad();
        let refs = ReferenceList::new();
        let nbr = NeighborArrays::new(16, 16).unwrap();
        let rates = MdRateEstimation::new(80);
        let mut settings = EncoderSettings::from_preset(0);
        settings.intra.paeth = false;
        let bc = BlockCtx {
            src: &src,
            refs: &refs,
            nbr: &nbr,
            rates: &rates,
            settings: &settings,
            qp: QuantParams::new(80, 8),
            full_lambda: full_lambda(80),
            fast_lambda: fast_lambda(80),
            bit_depth: 8,
            x: 0,
            y: 0,
            w: 16,
            h: 16,
            pic_w: 16,
            sb_top: true,
            max_tx_depth: 2,
            is_ref_pic: false,
            skip_ctx: 0,
            is_inter_ctx: 0,
            uv: None,
        };
        let mut scratch = MdScratch::default();
        let uv = IndependentUv::search(&bc, &mut scratch);
        assert!(uv.ranked.windows(2).all(|w| w[0].2 <= w[1].2));
        assert!(uv.ranked.iter().all(|r| r.0 != PredictionMode::PAETH_PRED));
        // 12 modes, 8 of them directional with 7 deltas
        assert_eq!(uv.ranked.len(), 4 + 8 * 7);
        assert!(uv.best().is_some());
    }
}
