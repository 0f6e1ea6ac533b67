use super::dist::*;
use super::rate::*;
use crate::api::frame::Plane;
use crate::api::{PmeSettings, SearchArea, SqMotionSearchSettings, SubpelSettings};
use crate::def::*;
use crate::mc::mc_bilinear;

static test_pos: [[i16; 2]; 8] = [
    [-1, -1],
    [-1, 0],
    [-1, 1],
    [0, -1],
    [0, 1],
    [1, -1],
    [1, 0],
    [1, 1],
];

/// Clips `mv` so that the displaced block, widened by the interpolation
/// margin, stays inside the padded reference.
#[allow(clippy::too_many_arguments)]
pub(crate) fn clip_mv_on_pic_boundary(
    blk_x: usize,
    blk_y: usize,
    bw: usize,
    bh: usize,
    pic_w: usize,
    pic_h: usize,
    pad: usize,
    mv: MotionVector,
) -> MotionVector {
    let pad = pad as isize;
    let (bx, by) = (blk_x as isize, blk_y as isize);
    let min_col = (-pad + INTERP_EXTEND - bx) << MV_FRAC_BITS;
    let max_col = (pic_w as isize + pad - bw as isize - INTERP_EXTEND - bx) << MV_FRAC_BITS;
    let min_row = (-pad + INTERP_EXTEND - by) << MV_FRAC_BITS;
    let max_row = (pic_h as isize + pad - bh as isize - INTERP_EXTEND - by) << MV_FRAC_BITS;
    let clamp = |v: i16, lo: isize, hi: isize| -> i16 {
        (v as isize).max(lo).min(hi).max(MV_LOW as isize).min(MV_UPP as isize) as i16
    };
    MotionVector::new(clamp(mv.row, min_row, max_row), clamp(mv.col, min_col, max_col))
}

/// Everything a block motion search needs about one (block, reference) pair.
#[derive(Clone, Copy)]
pub(crate) struct MotionSearchCtx<'a> {
    pub(crate) src: &'a Plane<pel>,
    pub(crate) reference: &'a Plane<pel>,
    pub(crate) blk_x: usize,
    pub(crate) blk_y: usize,
    pub(crate) bw: usize,
    pub(crate) bh: usize,
    /* predictor the vector rate is measured against */
    pub(crate) ref_mv: MotionVector,
    pub(crate) lambda_sad: u64,
    pub(crate) lambda_sse: u64,
    pub(crate) rates: &'a MdRateEstimation,
    pub(crate) bit_depth: usize,
}

impl<'a> MotionSearchCtx<'a> {
    #[inline]
    pub(crate) fn clip(&self, mv: MotionVector) -> MotionVector {
        clip_mv_on_pic_boundary(
            self.blk_x,
            self.blk_y,
            self.bw,
            self.bh,
            self.src.cfg.width,
            self.src.cfg.height,
            self.reference.cfg.xorigin.min(self.reference.cfg.yorigin),
            mv,
        )
    }

    /// Distortion of a full-pel position (SAD or SSE at the 8-bit scale).
    pub(crate) fn full_pel_distortion(&self, mv: MotionVector, use_ssd: bool) -> u64 {
        let (dy, dx) = mv.full_pel();
        let s = self.src.slice_at(self.blk_x as isize, self.blk_y as isize);
        let r = self
            .reference
            .slice_at(self.blk_x as isize + dx, self.blk_y as isize + dy);
        let (ss, rs) = (self.src.cfg.stride, self.reference.cfg.stride);
        if use_ssd {
            scale_distortion(ssd_16b(self.bw, self.bh, s, ss, r, rs), self.bit_depth)
        } else {
            scale_sad(sad_16b(self.bw, self.bh, s, ss, r, rs), self.bit_depth)
        }
    }

    /// Distortion plus lambda-weighted vector rate of a full-pel position.
    pub(crate) fn full_pel_cost(&self, mv: MotionVector, use_ssd: bool) -> u64 {
        let d = self.full_pel_distortion(mv, use_ssd);
        let lambda = if use_ssd { self.lambda_sse } else { self.lambda_sad };
        RDCOST(lambda, self.rates.mv_rate(mv, self.ref_mv) as u64, d)
    }

    /// Variance-based cost of a sub-pel position.
    pub(crate) fn sub_pel_cost(&self, mv: MotionVector, pred: &mut Vec<pel>) -> u64 {
        crate::util::reset_buf(pred, self.bw * self.bh);
        mc_bilinear(
            self.reference,
            self.blk_x as isize,
            self.blk_y as isize,
            mv.row as i32,
            mv.col as i32,
            MV_FRAC_BITS as u32,
            pred,
            self.bw,
            self.bw,
            self.bh,
        );
        let s = self.src.slice_at(self.blk_x as isize, self.blk_y as isize);
        let (var, _) = variance_16b(self.bw, self.bh, s, self.src.cfg.stride, pred, self.bw);
        RDCOST(
            self.lambda_sse,
            self.rates.mv_rate(mv, self.ref_mv) as u64,
            scale_distortion(var, self.bit_depth),
        )
    }
}

/// Exhaustive search of a `(2 * sr_w + 1) x (2 * sr_h + 1)` full-pel grid around
/// `center`, visiting every `step`-th position. Positions are clipped before
/// they are evaluated; the first of equal costs wins.
pub(crate) fn full_pel_search(
    ctx: &MotionSearchCtx,
    center: MotionVector,
    sr_w: i16,
    sr_h: i16,
    step: i16,
    use_ssd: bool,
) -> (MotionVector, u64) {
    let c = ctx.clip(center.round_to_full_pel());
    let mut best = (c, ctx.full_pel_cost(c, use_ssd));
    let step = step.max(1) as isize;
    let (cy, cx) = c.full_pel();
    let mut dy = -(sr_h as isize);
    while dy <= sr_h as isize {
        let mut dx = -(sr_w as isize);
        while dx <= sr_w as isize {
            if dx != 0 || dy != 0 {
                let mv = ctx.clip(MotionVector::from_full_pel(cy + dy, cx + dx));
                let cost = ctx.full_pel_cost(mv, use_ssd);
                if cost < best.1 {
                    best = (mv, cost);
                }
            }
            dx += step;
        }
        dy += step;
    }
    best
}

/// Logarithmic half, quarter and eighth-pel refinement around a full-pel vector.
pub(crate) fn sub_pel_search(
    ctx: &MotionSearchCtx,
    center: MotionVector,
    settings: &SubpelSettings,
    pred: &mut Vec<pel>,
) -> (MotionVector, u64) {
    let mut best_mv = ctx.clip(center);
    let mut best_cost = ctx.sub_pel_cost(best_mv, pred);
    if !settings.enabled {
        return (best_mv, best_cost);
    }
    let levels = [(4i16, settings.half), (2, settings.quarter), (1, settings.eighth)];
    for &(dist, on) in levels.iter() {
        if !on {
            continue;
        }
        let round_center = best_mv;
        for p in test_pos.iter() {
            let mv = ctx.clip(MotionVector::new(
                round_center.row + p[0] * dist,
                round_center.col + p[1] * dist,
            ));
            if mv == round_center {
                continue;
            }
            let cost = ctx.sub_pel_cost(mv, pred);
            if cost < best_cost {
                best_cost = cost;
                best_mv = mv;
            }
        }
    }
    (best_mv, best_cost)
}

/// Inputs of the high-motion test of a square block.
#[derive(Clone, Debug, Default)]
pub(crate) struct MotionHints {
    /* spatial predictors of the same reference */
    pub(crate) spatial_mvs: Vec<MotionVector>,
    /* co-located vector of a usable (inter) reference */
    pub(crate) temporal_mv: Option<MotionVector>,
}

fn spatial_deviation(mvs: &[MotionVector]) -> i32 {
    if mvs.len() < 2 {
        return 0;
    }
    let n = mvs.len() as i32;
    let mr = mvs.iter().map(|m| m.row as i32).sum::<i32>() / n;
    let mc = mvs.iter().map(|m| m.col as i32).sum::<i32>() / n;
    mvs.iter()
        .map(|m| (m.row as i32 - mr).abs().max((m.col as i32 - mc).abs()))
        .max()
        .unwrap_or(0)
        >> MV_FRAC_BITS
}

/// Whether a square block should get the extra wide searches.
pub(crate) fn is_high_motion(hints: &MotionHints, settings: &SqMotionSearchSettings) -> bool {
    match hints.temporal_mv {
        Some(t) => {
            let mag = (t.row as i32).abs().max((t.col as i32).abs()) >> MV_FRAC_BITS;
            mag > settings.temporal_mv_th
        }
        None => spatial_deviation(&hints.spatial_mvs) > settings.spatial_dev_th,
    }
}

/// Extra nested full-pel searches for square blocks in high motion.
pub(crate) fn square_block_motion_search(
    ctx: &MotionSearchCtx,
    seed: MotionVector,
    hints: &MotionHints,
    settings: &SqMotionSearchSettings,
    use_ssd: bool,
) -> (MotionVector, u64) {
    let seed = ctx.clip(seed);
    let mut best = (seed, ctx.full_pel_cost(seed, use_ssd));
    if !settings.enabled || !is_high_motion(hints, settings) {
        return best;
    }
    for area in settings.stages.iter().flatten() {
        let r = full_pel_search(ctx, best.0, area.width, area.height, area.step, use_ssd);
        if r.1 < best.1 {
            best = r;
        }
    }
    best
}

/// Seeds a non-square block from its square and from the co-located sub-blocks,
/// then searches a small window around the best seed.
pub(crate) fn nsq_block_motion_search(
    ctx: &MotionSearchCtx,
    sq_mv: MotionVector,
    sub_mvs: &[MotionVector],
    window: SearchArea,
    use_ssd: bool,
) -> (MotionVector, u64) {
    let mut best = full_pel_search(ctx, sq_mv, 0, 0, 1, use_ssd);
    for &mv in sub_mvs.iter().take(4) {
        let r = full_pel_search(ctx, mv, 0, 0, 1, use_ssd);
        if r.1 < best.1 {
            best = r;
        }
    }
    let r = full_pel_search(ctx, best.0, window.width, window.height, window.step, use_ssd);
    if r.1 < best.1 {
        r
    } else {
        best
    }
}

/// Searches around the best vector predictor. Returns `None` when the motion
/// estimation result should be reused instead.
pub(crate) fn pme_search(
    ctx: &MotionSearchCtx,
    mvp_list: &[MotionVector],
    me_best: (MotionVector, u64),
    settings: &PmeSettings,
    subpel: &SubpelSettings,
    use_ssd: bool,
    pred: &mut Vec<pel>,
) -> Option<(MotionVector, u64)> {
    if !settings.enabled || mvp_list.is_empty() {
        return None;
    }
    let mut best: Option<(MotionVector, MotionVector, u64)> = None;
    for &mvp in mvp_list.iter() {
        let mut c = *ctx;
        c.ref_mv = mvp;
        let (mv, cost) = full_pel_search(&c, mvp, 0, 0, 1, use_ssd);
        if best.map_or(true, |b| cost < b.2) {
            best = Some((mvp, mv, cost));
        }
    }
    let (mvp, mv, cost) = best?;
    if mv.max_abs_diff(me_best.0.round_to_full_pel()) <= settings.reuse_tolerance {
        return None;
    }
    if let Some(th) = settings.reuse_cost_th {
        let me_cost = me_best.1;
        if me_cost > 0 && cost > me_cost && (cost - me_cost) * 100 > th * me_cost {
            return None;
        }
    }
    let mut c = *ctx;
    c.ref_mv = mvp;
    let w = settings.window;
    let (mv, cost) = full_pel_search(&c, mv, w.width, w.height, w.step, use_ssd);
    if settings.subpel && subpel.enabled {
        Some(sub_pel_search(&c, mv, subpel, pred))
    } else {
        Some((mv, cost))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Frame;

    fn frames(shift: isize) -> (Frame<pel>, Frame<pel>) {
        let mut cur = Frame::new(64, 64);
        let mut reference = Frame::new(64, 64);
        for y in 0..64 {
            for x in 0..64 {
                let f = |x: isize| ((x * x) / 16 + 4 * y as isize) as pel;
                cur.planes[0].set(x, y, f(x as isize + shift));
                reference.planes[0].set(x, y, f(x as isize));
            }
        }
        cur.planes[0].pad();
        reference.planes[0].pad();
        (cur, reference)
    }

    fn ctx<'a>(cur: &'a Frame<pel>, reference: &'a Frame<pel>, rates: &'a MdRateEstimation) -> MotionSearchCtx<'a> {
        MotionSearchCtx {
            src: &cur.planes[0],
            reference: &reference.planes[0],
            blk_x: 16,
            blk_y: 16,
            bw: 16,
            bh: 16,
            ref_mv: MotionVector::zero(),
            lambda_sad: fast_lambda(60),
            lambda_sse: full_lambda(60),
            rates,
            bit_depth: 8,
        }
    }

    #[test]
    fn clipped_vectors_stay_inside_padding() {
        for &(x, y, w, h) in &[(0, 0, 8, 8), (56, 56, 8, 8), (0, 0, 64, 64), (40, 8, 16, 32)] {
            for &mv in &[
                MotionVector::new(-8000, -8000),
                MotionVector::new(8000, 8000),
                MotionVector::new(MV_UPP as i16, MV_LOW as i16),
            ] {
                let c = clip_mv_on_pic_boundary(x, y, w, h, 64, 64, PIC_PAD_SIZE_L, mv);
                let (dy, dx) = c.full_pel();
                let px = x as isize + dx;
                let py = y as isize + dy;
                let pad = PIC_PAD_SIZE_L as isize;
                assert!(px >= -pad + INTERP_EXTEND);
                assert!(px + (c.col & 7 != 0) as isize <= 64 + pad - w as isize - INTERP_EXTEND);
                assert!(py >= -pad + INTERP_EXTEND);
                assert!(py <= 64 + pad - h as isize - INTERP_EXTEND);
            }
        }
    }

    #[test]
    fn degenerate_window_returns_seed_cost() {
        let (cur, reference) = frames(2);
        let rates = MdRateEstimation::new(60);
        let c = ctx(&cur, &reference, &rates);
        let seed = MotionVector::from_full_pel(1, -3);
        let (mv, cost) = full_pel_search(&c, seed, 0, 0, 1, false);
        assert_eq!(mv, seed);
        assert_eq!(cost, c.full_pel_cost(seed, false));
    }

    #[test]
    fn window_search_finds_shift() {
        let (cur, reference) = frames(2);
        let rates = MdRateEstimation::new(60);
        let c = ctx(&cur, &reference, &rates);
        let (mv, _) = full_pel_search(&c, MotionVector::zero(), 4, 4, 1, false);
        assert_eq!(mv, MotionVector::from_full_pel(0, 2));
        assert_eq!(c.full_pel_distortion(mv, false), 0);
        // a wider window never does worse
        let (_, narrow) = full_pel_search(&c, MotionVector::zero(), 1, 1, 1, true);
        let (_, wide) = full_pel_search(&c, MotionVector::zero(), 3, 3, 1, true);
        assert!(wide <= narrow);
    }

    #[test]
    fn sub_pel_never_worse_than_center() {
        let (cur, reference) = frames(2);
        let rates = MdRateEstimation::new(60);
        let c = ctx(&cur, &reference, &rates);
        let mut pred = Vec::new();
        let start = MotionVector::from_full_pel(0, 1);
        let center_cost = c.sub_pel_cost(start, &mut pred);
        let all = SubpelSettings {
            enabled: true,
            half: true,
            quarter: true,
            eighth: true,
        };
        let (mv, cost) = sub_pel_search(&c, start, &all, &mut pred);
        assert!(cost <= center_cost);
        assert!(mv.col > start.col);
    }

    #[test]
    fn high_motion_detection() {
        let sq = SqMotionSearchSettings {
            enabled: true,
            spatial_dev_th: 8,
            temporal_mv_th: 16,
            stages: [None; 3],
        };
        let calm = MotionHints {
            spatial_mvs: vec![MotionVector::new(8, 8), MotionVector::new(16, 8)],
            temporal_mv: None,
        };
        assert!(!is_high_motion(&calm, &sq));
        let spread = MotionHints {
            spatial_mvs: vec![MotionVector::new(-200, 0), MotionVector::new(200, 0)],
            temporal_mv: None,
        };
        assert!(is_high_motion(&spread, &sq));
        // a temporal vector takes precedence over the spatial spread
        let temporal = MotionHints {
            temporal_mv: Some(MotionVector::new(0, 8)),
            ..spread
        };
        assert!(!is_high_motion(&temporal, &sq));
    }

    #[test]
    fn nsq_seeds_are_considered() {
        let (cur, reference) = frames(5);
        let rates = MdRateEstimation::new(60);
        let mut c = ctx(&cur, &reference, &rates);
        c.bh = 8;
        let good = MotionVector::from_full_pel(0, 5);
        let (mv, _) = nsq_block_motion_search(
            &c,
            MotionVector::zero(),
            &[MotionVector::from_full_pel(0, -7), good],
            SearchArea::new(1, 1, 1),
            false,
        );
        assert_eq!(mv, good);
    }

    #[test]
    fn pme_reuses_close_results() {
        let (cur, reference) = frames(2);
        let rates = MdRateEstimation::new(60);
        let c = ctx(&cur, &reference, &rates);
        let settings = PmeSettings {
            enabled: true,
            window: SearchArea::new(2, 2, 1),
            reuse_tolerance: 8,
            reuse_cost_th: None,
            subpel: false,
        };
        let subpel = SubpelSettings {
            enabled: false,
            half: false,
            quarter: false,
            eighth: false,
        };
        let me = full_pel_search(&c, MotionVector::zero(), 4, 4, 1, false);
        let mut pred = Vec::new();
        assert!(pme_search(&c, &[me.0], me, &settings, &subpel, false, &mut pred).is_none());
        let far = [MotionVector::from_full_pel(6, -6)];
        let r = pme_search(&c, &far, me, &settings, &subpel, false, &mut pred);
        assert!(r.is_some());
    }
}
