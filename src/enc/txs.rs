use super::dist::*;
use super::geom::tx_dims;
use super::rate::*;
use super::tq::*;
use super::*;
use crate::api::TxTypeSearchLevel;

/// How one plane of a candidate is transformed and coded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TxSearchParams {
    pub(crate) max_depth: usize,
    pub(crate) level: TxTypeSearchLevel,
    pub(crate) rdoq: bool,
    /* distortion measured on the reconstruction instead of the coefficients */
    pub(crate) spatial: bool,
    pub(crate) early_exit: bool,
    pub(crate) is_inter: bool,
}

/// Best transform partitioning of one plane.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct TxResult {
    pub(crate) depth: u8,
    /* chosen type of every transform block, raster order */
    pub(crate) types: Vec<TxType>,
    pub(crate) dist: u64,
    pub(crate) rate: u64,
    pub(crate) cost: u64,
    pub(crate) nonzero: u32,
    pub(crate) dc_level: i8,
}

struct TileResult {
    tx_type: TxType,
    dist: u64,
    rate: u64,
    cost: u64,
    nonzero: u32,
    dc: i32,
}

/// Codes the `tw`x`th` transform block at (`tx`, `ty`) of the plane block with
/// every type of the group, keeps the cheapest and reconstructs it into
/// `scratch.recon_tx`.
#[allow(clippy::too_many_arguments)]
fn code_tile(
    bc: &BlockCtx,
    plane: usize,
    pred: &[pel],
    w: usize,
    tx: usize,
    ty: usize,
    tw: usize,
    th: usize,
    ctxs: (usize, usize),
    p: &TxSearchParams,
    scratch: &mut MdScratch,
) -> TileResult {
    let (src, s_src) = bc.src_block(plane);
    let n = tw * th;
    let src_t = &src[ty * s_src + tx..];
    let pred_t = &pred[ty * w + tx..];
    reset_buf(&mut scratch.residual, n);
    reset_buf(&mut scratch.coeff, n);
    reset_buf(&mut scratch.qcoeff, n);
    reset_buf(&mut scratch.dqcoeff, n);
    reset_buf(&mut scratch.best_dq, n);
    reset_buf(&mut scratch.tile_recon, n);
    diff_16b(tw, th, src_t, s_src, pred_t, w, &mut scratch.residual, tw);

    let group = tx_type_group(p.level, tw, th, p.is_inter);
    let mut best: Option<TileResult> = None;
    for &t in group.iter() {
        fwd_txfm2d(&scratch.residual, tw, &mut scratch.coeff, tw, th, t);
        let mut eob = quantize(&scratch.coeff, &mut scratch.qcoeff, tw, th, &bc.qp, !p.is_inter);
        if p.rdoq && eob > 0 {
            eob = rdoq(
                &scratch.coeff,
                &mut scratch.qcoeff,
                tw,
                th,
                eob,
                &bc.qp,
                bc.full_lambda,
                bc.rates,
            );
        }
        if t != TxType::DCT_DCT && eob == 0 {
            continue;
        }
        dequantize(&scratch.qcoeff, &mut scratch.dqcoeff, tw, th, &bc.qp);
        let dist = if p.spatial {
            inv_txfm2d_add(
                &scratch.dqcoeff,
                tw,
                th,
                t,
                pred_t,
                w,
                &mut scratch.tile_recon,
                tw,
                bc.bit_depth,
            );
            spatial_full_distortion(tw, th, src_t, s_src, &scratch.tile_recon, tw, bc.bit_depth)
        } else {
            transform_domain_distortion(&scratch.coeff, &scratch.dqcoeff, n, bc.bit_depth)
        };
        let rate = bc.rates.coeff_rate(&scratch.qcoeff, tw, th, eob, ctxs.0, ctxs.1)
            + bc.rates.tx_type_rate(t, p.is_inter, group.len()) as u64;
        let cost = RDCOST(bc.full_lambda, rate, dist);
        if best.as_ref().map_or(true, |b| cost < b.cost) {
            scratch.best_dq[..n].copy_from_slice(&scratch.dqcoeff[..n]);
            best = Some(TileResult {
                tx_type: t,
                dist,
                rate,
                cost,
                nonzero: count_nonzero(&scratch.qcoeff[..n]),
                dc: scratch.qcoeff[0],
            });
        }
    }

    // DCT is always first and never rejected
    let best = best.unwrap_or(TileResult {
        tx_type: TxType::DCT_DCT,
        dist: MAX_MODE_COST,
        rate: 0,
        cost: MAX_MODE_COST,
        nonzero: 0,
        dc: 0,
    });
    let recon_t = &mut scratch.recon_tx[ty * w + tx..];
    if best.nonzero == 0 {
        for r in 0..th {
            recon_t[r * w..r * w + tw].copy_from_slice(&pred_t[r * w..r * w + tw]);
        }
    } else {
        inv_txfm2d_add(&scratch.best_dq, tw, th, best.tx_type, pred_t, w, recon_t, w, bc.bit_depth);
    }
    best
}

/// Transform partitioning and type search of one plane of a candidate.
///
/// Depths are tried from 0 up to `max_depth`; each depth splits the block into
/// equal transform blocks coded in raster order. With early exit, a depth is
/// abandoned as soon as its running cost exceeds the best depth so far. The
/// reconstruction of the best depth is left in `recon` (stride = plane width).
pub(crate) fn tx_search(
    bc: &BlockCtx,
    plane: usize,
    pred: &[pel],
    p: &TxSearchParams,
    recon: &mut Vec<pel>,
    scratch: &mut MdScratch,
) -> TxResult {
    let (x, y, w, h) = bc.plane_rect(plane);
    reset_buf(recon, w * h);
    let dc_ctx = dc_sign_ctx(bc.nbr, plane, x, y, w, h);
    let mut best = TxResult {
        cost: MAX_MODE_COST,
        ..Default::default()
    };
    let max_depth = if plane == Y_C { p.max_depth.min(bc.max_tx_depth) } else { 0 };
    for depth in 0..=max_depth {
        let (tw, th) = tx_dims(w, h, depth);
        if tw < MIN_TX_SIZE || th < MIN_TX_SIZE {
            break;
        }
        reset_buf(&mut scratch.recon_tx, w * h);
        let mut cur = TxResult {
            depth: depth as u8,
            ..Default::default()
        };
        if plane == Y_C {
            cur.rate = bc.rates.tx_depth_rate(bc.max_tx_depth, depth) as u64;
        }
        let whole = tw == w && th == h;
        let mut dc_sum = 0i32;
        let mut abandoned = false;
        'tiles: for ty in (0..h).step_by(th) {
            for tx in (0..w).step_by(tw) {
                let ctxs = (
                    if whole { 0 } else { 1 },
                    if tx == 0 && ty == 0 { dc_ctx } else { 0 },
                );
                let t = code_tile(bc, plane, pred, w, tx, ty, tw, th, ctxs, p, scratch);
                cur.types.push(t.tx_type);
                cur.dist = cur.dist.saturating_add(t.dist);
                cur.rate = cur.rate.saturating_add(t.rate);
                cur.nonzero += t.nonzero;
                dc_sum += t.dc;
                if p.early_exit && RDCOST(bc.full_lambda, cur.rate, cur.dist) > best.cost {
                    abandoned = true;
                    break 'tiles;
                }
            }
        }
        if abandoned {
            continue;
        }
        cur.cost = RDCOST(bc.full_lambda, cur.rate, cur.dist);
        cur.dc_level = dc_sum.signum() as i8;
        if cur.cost < best.cost {
            best = cur;
            std::mem::swap(recon, &mut scratch.recon_tx);
        }
    }
    best
}
