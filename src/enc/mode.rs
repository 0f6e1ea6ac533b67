use std::sync::Arc;

use log::{debug, trace};

use super::cand::*;
use super::geom::BlockGeom;
use super::hme::MeSbResults;
use super::md_stage::*;
use super::me::*;
use super::mvp::*;
use super::pd::*;
use super::ref_prune::*;
use super::*;

/*****************************************************************************
 * neighbor update
 *****************************************************************************/

fn mode_info(r: &BlockResult, w: usize, h: usize) -> NeighborModeInfo {
    let mut mi = NeighborModeInfo {
        coded: true,
        skip: r.skip,
        ref_frame: [REF_FRAME_NONE; 2],
        log2_w: log2_floor(w) as u8,
        log2_h: log2_floor(h) as u8,
        ..Default::default()
    };
    match r.cand.kind {
        CandidateKind::Intra(c) => mi.mode = c.mode as u8,
        CandidateKind::Inter(c) => {
            mi.is_inter = true;
            mi.mode = c.mode as u8;
            for k in 0..2 {
                if let Some(rf) = c.ref_frame[k] {
                    mi.ref_frame[k] = rf.to_i8();
                    mi.mv[k] = c.mv[k];
                }
            }
        }
    }
    mi
}

/// Writes the winner of the block at (`x`, `y`) into the neighbor arrays.
fn commit_block(nbr: &mut NeighborArrays, r: &BlockResult, x: usize, y: usize, w: usize, h: usize) {
    for c in 0..N_C {
        let (px, py, pw, ph) = if c == Y_C {
            (x, y, w, h)
        } else {
            (x >> 1, y >> 1, w >> 1, h >> 1)
        };
        let rec = &r.recon[c];
        if pw == 0 || ph == 0 || rec.len() < pw * ph {
            continue;
        }
        let right: Vec<pel> = (0..ph).map(|j| rec[j * pw + pw - 1]).collect();
        nbr.recon[c].write(
            &rec[(ph - 1) * pw..ph * pw],
            &right,
            px,
            py,
            pw,
            ph,
            NeighborArrayMask::Complete,
        );
        nbr.dc_sign[c].write_uniform(r.dc_level[c], px, py, pw, ph);
    }
    nbr.mode_info.write_uniform(mode_info(r, w, h), x, y, w, h);
}

/// Coarse vector of the square at (`ox`, `oy`) of side `size`, or of the
/// nearest enclosing square that has one.
fn coarse_mv(me: &MeSbResults, ox: usize, oy: usize, mut size: usize, rf: RefFrame) -> MotionVector {
    while size <= me.sb_size() {
        let m = size - 1;
        if let Some(r) = me.get(ox & !m, oy & !m, size, rf) {
            return r.mv;
        }
        size <<= 1;
    }
    MotionVector::zero()
}

/*****************************************************************************
 * superblock evaluator
 *****************************************************************************/

/// Evaluates the blocks of one superblock for the partition search.
pub(crate) struct SbEncoder<'a> {
    pub(crate) md: &'a mut MdCtx,
    pub(crate) pic: &'a PictureCtx,
    pub(crate) me: &'a MeSbResults,
    pub(crate) sb_x: usize,
    pub(crate) sb_y: usize,
}

impl<'a> SbEncoder<'a> {
    #[inline]
    fn pic_pos(&self, g: &BlockGeom) -> (usize, usize) {
        (self.sb_x + g.origin_x, self.sb_y + g.origin_y)
    }

    fn mvp_block(&self, g: &BlockGeom) -> MvpBlock {
        let (x, y) = self.pic_pos(g);
        MvpBlock {
            x,
            y,
            w: g.bwidth,
            h: g.bheight,
            pic_w: self.md.cfg.aligned_width(),
            sb_top: y == self.sb_y,
        }
    }

    /// Refines the motion of every available reference for the block and
    /// decides which references each candidate group may use.
    fn prepare_motion(&mut self, g: &BlockGeom, blk: &MvpBlock) -> (Vec<InterRefInfo>, RefPruneResult) {
        let pic = self.pic;
        if !pic.is_inter {
            return (Vec::new(), RefPruneResult::default());
        }
        let me = self.me;
        let md = &mut *self.md;
        let s = &md.settings.me;
        let geom = &md.geom;
        let src = &pic.src.planes[Y_C];
        let mut infos = Vec::new();
        let mut inputs = Vec::new();

        for rf in pic.refs.available() {
            let r = match pic.refs.get_ref(rf) {
                Some(r) => r,
                None => continue,
            };
            let stack = single_ref_stack(&md.nbr, &pic.refs, blk, rf);
            let ctx = MotionSearchCtx {
                src,
                reference: &r.frame.planes[Y_C],
                blk_x: blk.x,
                blk_y: blk.y,
                bw: blk.w,
                bh: blk.h,
                ref_mv: stack.get(0)[0],
                lambda_sad: md.fast_lambda,
                lambda_sse: md.full_lambda,
                rates: &md.rates,
                bit_depth: md.cfg.bit_depth,
            };

            let (mv, _) = if g.is_square() {
                let hints = MotionHints {
                    spatial_mvs: stack.mvs[..stack.found].iter().map(|m| m[0]).collect(),
                    temporal_mv: if r.intra_only {
                        None
                    } else {
                        r.colocated_mv(blk.x + blk.w / 2, blk.y + blk.h / 2)
                    },
                };
                let seed = coarse_mv(me, g.origin_x, g.origin_y, g.bwidth, rf);
                square_block_motion_search(&ctx, seed, &hints, &s.sq, s.use_ssd)
            } else {
                let sq = geom.get(g.sqi_mds);
                let sq_mv = coarse_mv(me, sq.origin_x, sq.origin_y, sq.bwidth, rf);
                let m = g.bwidth.min(g.bheight);
                let mut sub_mvs = Vec::with_capacity(4);
                for oy in (0..g.bheight).step_by(m) {
                    for ox in (0..g.bwidth).step_by(m) {
                        if let Some(r) = me.get(g.origin_x + ox, g.origin_y + oy, m, rf) {
                            sub_mvs.push(r.mv);
                        }
                    }
                }
                if s.nsq.enabled {
                    nsq_block_motion_search(&ctx, sq_mv, &sub_mvs, s.nsq.window, s.use_ssd)
                } else {
                    full_pel_search(&ctx, sq_mv, 0, 0, 1, s.use_ssd)
                }
            };
            // one full-pel step around the search result
            let (mv, cost) = full_pel_search(&ctx, mv, 1, 1, 1, s.use_ssd);
            let me_dist = ctx.full_pel_distortion(mv, false);
            let mvp_dist = stack
                .single()
                .iter()
                .map(|p| ctx.full_pel_distortion(ctx.clip(p.round_to_full_pel()), false))
                .min();
            let me_mv = if s.subpel.enabled {
                sub_pel_search(&ctx, mv, &s.subpel, &mut md.scratch.subpel).0
            } else {
                mv
            };
            let pme_mv = pme_search(
                &ctx,
                &stack.single(),
                (mv, cost),
                &s.pme,
                &s.subpel,
                s.use_ssd,
                &mut md.scratch.subpel,
            )
            .map(|r| r.0);

            TRACE_ME(&mut md.tracer, blk.x, blk.y, blk.w, blk.h, rf, me_mv, pme_mv, me_dist);

            infos.push(InterRefInfo {
                rf,
                stack,
                me_mv,
                pme_mv,
            });
            inputs.push(RefPruneInput {
                rf,
                me_dist: Some(me_dist),
                mvp_dist,
            });
        }
        let prune = prune_references(&inputs, &md.settings.ref_pruning);
        (infos, prune)
    }

    /// Generates the candidates of a block and runs them through the stages.
    /// The winner is left in the candidate buffer pool.
    fn run_funnel(
        &mut self,
        g: &BlockGeom,
        similar: Option<ModeDecisionCandidate>,
    ) -> (Vec<ModeDecisionCandidate>, MdStageOutcome) {
        let blk = self.mvp_block(g);
        let (infos, prune) = self.prepare_motion(g, &blk);
        let pic = self.pic;
        let md = &mut *self.md;

        let bc = BlockCtx {
            src: &pic.src,
            refs: &pic.refs,
            nbr: &md.nbr,
            rates: &md.rates,
            settings: &md.settings,
            qp: md.qp,
            full_lambda: md.full_lambda,
            fast_lambda: md.fast_lambda,
            bit_depth: md.cfg.bit_depth,
            x: blk.x,
            y: blk.y,
            w: blk.w,
            h: blk.h,
            pic_w: blk.pic_w,
            sb_top: blk.sb_top,
            max_tx_depth: g.max_tx_depth,
            is_ref_pic: pic.used_as_reference,
            skip_ctx: skip_ctx(&md.nbr, blk.x, blk.y),
            is_inter_ctx: is_inter_ctx(&md.nbr, blk.x, blk.y),
            uv: None,
        };
        let uv = if md.settings.chroma.independent_uv && bc.allow_intra() {
            Some(IndependentUv::search(&bc, &mut md.scratch))
        } else {
            None
        };
        let bc = BlockCtx { uv: uv.as_ref(), ..bc };

        let cands = generate_candidates(&CandGenInput {
            settings: &md.settings,
            nbr: &md.nbr,
            blk,
            allow_intra: bc.allow_intra(),
            allow_interintra: bc.allow_interintra(),
            refs: &infos,
            prune: &prune,
            uv_best: uv.as_ref().and_then(|u| u.best()),
            similar,
        });
        md.pool.reset();
        if cands.is_empty() {
            return (cands, MdStageOutcome::default());
        }
        let out = md_stages(&bc, &cands, &mut md.pool, &mut md.scratch);
        (cands, out)
    }
}

impl<'a> BlockEvaluator for SbEncoder<'a> {
    type Checkpoint = NeighborCheckpoint;

    fn visibility(&self, mds: usize) -> BlockVisibility {
        let g = self.md.geom.get(mds);
        let (x, y) = self.pic_pos(g);
        let (w, h) = (self.md.cfg.aligned_width(), self.md.cfg.aligned_height());
        if x >= w || y >= h {
            BlockVisibility::Outside
        } else if x + g.bwidth > w || y + g.bheight > h {
            BlockVisibility::Partial
        } else {
            BlockVisibility::Inside
        }
    }

    fn evaluate_block(&mut self, mds: usize) -> u64 {
        let geom = Arc::clone(&self.md.geom);
        let g = geom.get(mds);
        let (x, y) = self.pic_pos(g);
        let (w, h) = (g.bwidth, g.bheight);
        let (redundant_blk, similar_blk) = {
            let p = &self.md.settings.partition;
            (p.redundant_blk, p.similar_blk)
        };

        // same geometry and same neighbor context: the earlier winner stands
        if redundant_blk {
            if let Some(r) = g.redund_src.and_then(|s| self.md.md_blk[s].result.clone()) {
                let cost = r.cost;
                commit_block(&mut self.md.nbr, &r, x, y, w, h);
                self.md.md_blk[mds] = MdBlkStruct {
                    cost,
                    result: Some(r),
                };
                trace!("block {}x{} at ({}, {}) copied from mds {:?}", w, h, x, y, g.redund_src);
                return cost;
            }
        }
        let similar = if similar_blk {
            g.similar_src
                .and_then(|s| self.md.md_blk[s].result.as_ref().map(|r| r.cand))
        } else {
            None
        };

        let (cands, out) = self.run_funnel(g, similar);
        let md = &mut *self.md;
        md.md_blk[mds] = MdBlkStruct {
            cost: MAX_MODE_COST,
            result: None,
        };
        let buf = match out.winner.map(|s| md.pool.get(s)) {
            Some(b) if b.full_cost < MAX_MODE_COST => b,
            _ => {
                trace!("block {}x{} at ({}, {}): no codable candidate among {}", w, h, x, y, cands.len());
                return MAX_MODE_COST;
            }
        };
        let cand = match buf.cand {
            Some(c) => c,
            None => return MAX_MODE_COST,
        };
        let result = BlockResult {
            cand,
            skip: buf.skip,
            tx_depth: buf.tx_depth,
            y_nonzero: buf.y_nonzero,
            uv_nonzero: buf.uv_nonzero,
            cost: buf.full_cost,
            recon: buf.recon.clone(),
            dc_level: buf.dc_level,
        };
        let cost = result.cost;

        TRACE_MD_STAGE(&mut md.tracer, x, y, w, h, &out.survivors, cand.pred_mode(), cost);
        trace!(
            "block {}x{} at ({}, {}): {:?} cost {} skip {}",
            w,
            h,
            x,
            y,
            cand.block_mode(),
            cost,
            result.skip
        );

        commit_block(&mut md.nbr, &result, x, y, w, h);
        md.md_blk[mds].cost = cost;
        md.md_blk[mds].result = Some(result);
        cost
    }

    fn partition_cost(&self, sq_mds: usize, shape: PartitionShape) -> u64 {
        let g = self.md.geom.get(sq_mds);
        let (x, y) = self.pic_pos(g);
        let ctx = partition_ctx(&self.md.nbr, x, y, g.bwidth);
        let rate = self.md.rates.partition_rate(ctx, g.bwidth, shape);
        RDCOST(self.md.full_lambda, rate as u64, 0)
    }

    fn checkpoint(&self) -> NeighborCheckpoint {
        self.md.nbr.checkpoint()
    }

    fn rollback(&mut self, cp: &NeighborCheckpoint) {
        self.md.nbr.rollback(cp);
    }

    fn recommit_block(&mut self, mds: usize) {
        let g = *self.md.geom.get(mds);
        let (x, y) = self.pic_pos(&g);
        let md = &mut *self.md;
        if let Some(r) = &md.md_blk[mds].result {
            commit_block(&mut md.nbr, r, x, y, g.bwidth, g.bheight);
        }
    }
}

/// Mode decision of the superblock at (`sb_x`, `sb_y`): partition, modes and
/// reconstruction of every leaf block. The reconstruction is written to the
/// picture and the neighbor arrays keep the final leaves.
pub(crate) fn mode_decision_sb(
    md: &mut MdCtx,
    pic: &mut PictureCtx,
    me: &MeSbResults,
    sb_x: usize,
    sb_y: usize,
) -> SuperblockDecision {
    md.init_sb();
    let geom = Arc::clone(&md.geom);
    let settings = md.settings.partition.clone();
    let tree = {
        let mut enc = SbEncoder {
            md: &mut *md,
            pic: &*pic,
            me,
            sb_x,
            sb_y,
        };
        decide_superblock(&geom, &settings, &mut enc)
    };

    let mut sb = SuperblockDecision {
        x: sb_x,
        y: sb_y,
        size: geom.sb_size,
        blocks: Vec::new(),
        cost: tree.cost,
    };
    for mds in tree.leaves(&geom) {
        let g = geom.get(mds);
        let r = match &md.md_blk[mds].result {
            Some(r) => r,
            None => continue,
        };
        let (x, y) = (sb_x + g.origin_x, sb_y + g.origin_y);
        for c in 0..N_C {
            let ss = (c != Y_C) as usize;
            let (pw, ph) = (g.bwidth >> ss, g.bheight >> ss);
            pic.recon.planes[c].copy_block_from(x >> ss, y >> ss, pw, ph, &r.recon[c], pw);
        }
        sb.blocks.push(BlockDecision {
            x,
            y,
            width: g.bwidth,
            height: g.bheight,
            partition: g.shape,
            sq_size: g.sq_size,
            mode: r.cand.block_mode(),
            skip: r.skip,
            tx_depth: r.tx_depth,
            y_nonzero: r.y_nonzero,
            uv_nonzero: r.uv_nonzero,
            cost: r.cost,
        });
    }
    for (sq, d) in tree.squares.iter().enumerate() {
        if let Some(d) = d {
            let g = geom.get(sq);
            TRACE_PD(&mut md.tracer, sb_x + g.origin_x, sb_y + g.origin_y, g.bwidth, d.shape, d.cost);
        }
    }
    md.nbr.clear_journal();
    debug!(
        "sb ({}, {}): {} blocks, cost {}",
        sb_x,
        sb_y,
        sb.blocks.len(),
        sb.cost
    );
    sb
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enc::hme::motion_estimate_sb;
    use std::sync::Arc;

    fn picture(cfg: &EncoderConfig, f: impl Fn(usize, usize) -> pel, refs: ReferenceList) -> PictureCtx {
        let mut src = Frame::new(cfg.width, cfg.height);
        for y in 0..cfg.height {
            for x in 0..cfg.width {
                src.planes[Y_C].set(x, y, f(x, y));
            }
        }
        for c in U_C..=V_C {
            src.planes[c].fill(128);
        }
        src.pad();
        let is_inter = !refs.is_empty();
        PictureCtx {
            src,
            refs,
            is_inter,
            used_as_reference: true,
            qindex: cfg.qindex,
            recon: Frame::new(cfg.width, cfg.height),
            decision: PictureDecision::default(),
            sb_coded: vec![false; cfg.sb_cols() * cfg.sb_rows()],
        }
    }

    fn pattern(x: usize, y: usize) -> pel {
        (((x * 3) ^ (y * 5)) % 61 * 3 + if x < 24 { 20 } else { 90 }) as pel
    }

    #[test]
    fn superblock_decision_is_deterministic_and_covers_the_area() {
        let cfg = EncoderConfig {
            width: 32,
            height: 32,
            sb_size: 64,
            preset: 8,
            ..Default::default()
        };
        let run = || {
            let mut md = MdCtx::new(cfg, EncoderSettings::from_preset(cfg.preset)).unwrap();
            let mut pic = picture(&cfg, pattern, ReferenceList::new());
            let me = MeSbResults::new(cfg.sb_size);
            mode_decision_sb(&mut md, &mut pic, &me, 0, 0)
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        let area: usize = a.blocks.iter().map(|b| b.width * b.height).sum();
        assert_eq!(area, 32 * 32);
        assert!(a.blocks.iter().all(|b| !b.is_inter()));
        assert!(a.cost < MAX_MODE_COST);
        // partition rates come on top of the block costs
        assert!(a.cost >= a.blocks.iter().map(|b| b.cost).sum::<u64>());
    }

    /// 64x64 picture predicted from a copy of itself shifted by two columns.
    fn shifted_pair(settings: EncoderSettings) -> (MdCtx, PictureCtx, MeSbResults) {
        let cfg = EncoderConfig {
            width: 64,
            height: 64,
            sb_size: 64,
            preset: 8,
            ..Default::default()
        };
        let mut md = MdCtx::new(cfg, settings).unwrap();
        let reference = picture(&cfg, |x, y| pattern(x + 2, y), ReferenceList::new());
        let mut refs = ReferenceList::new();
        refs.set(
            REF_LIST_0,
            0,
            ReferencePicture::new(Arc::new(reference.src.clone()), 0, true),
        );
        let pic = picture(&cfg, pattern, refs);
        let me = motion_estimate_sb(&pic.src.planes[Y_C], &pic.refs, 0, 0, 64, 16, 8);
        md.init_sb();
        (md, pic, me)
    }

    #[test]
    fn funnel_keeps_the_cheapest_and_picks_the_minimum() {
        let (mut md, pic, me) = shifted_pair(EncoderSettings::from_preset(8));

        let geom = Arc::clone(&md.geom);
        let c = geom.child_sq_mds(0, 1).unwrap();
        let mut enc = SbEncoder {
            md: &mut md,
            pic: &pic,
            me: &me,
            sb_x: 0,
            sb_y: 0,
        };
        let (cands, out) = enc.run_funnel(geom.get(c), None);
        assert!(!cands.is_empty());
        assert!(cands.iter().any(|c| c.is_inter()));
        let pool = &enc.md.pool;
        let winner = out.winner.unwrap();
        for &slot in out.stage3.iter() {
            assert!(pool.get(winner).full_cost <= pool.get(slot).full_cost);
        }
        assert!(out.survivors.windows(2).all(|w| w[0] >= w[1]));

        // with stages 1 and 2 off, stage 3 holds a cheapest prefix of every class
        let in_stage3: Vec<usize> = out.stage3.iter().filter_map(|&s| pool.get(s).cand_idx).collect();
        for class in CandClass::ALL.iter() {
            let worst_kept = in_stage3
                .iter()
                .filter(|&&i| cands[i].class == *class)
                .map(|&i| out.fast_costs[i])
                .max();
            let best_dropped = (0..cands.len())
                .filter(|i| cands[*i].class == *class && !in_stage3.contains(i))
                .map(|i| out.fast_costs[i])
                .min();
            if let (Some(k), Some(d)) = (worst_kept, best_dropped) {
                assert!(k <= d, "class {:?}: kept {} dropped {}", class, k, d);
            }
        }
    }

    #[test]
    fn staged_funnel_narrows_and_picks_the_minimum() {
        let mut settings = EncoderSettings::from_preset(8);
        settings.md_staging = MdStagingMode::Mode2;
        let stage3_total = settings.nic.stage3_total;
        let (mut md, pic, me) = shifted_pair(settings);

        let geom = Arc::clone(&md.geom);
        let c = geom.child_sq_mds(0, 1).unwrap();
        let mut enc = SbEncoder {
            md: &mut md,
            pic: &pic,
            me: &me,
            sb_x: 0,
            sb_y: 0,
        };
        let (cands, out) = enc.run_funnel(geom.get(c), None);
        assert!(!cands.is_empty());
        assert!(out.survivors.windows(2).all(|w| w[0] >= w[1]), "{:?}", out.survivors);
        assert!(out.survivors[2] > 0);
        assert!(out.survivors[3] <= stage3_total);
        assert_eq!(out.stage3.len(), out.survivors[3]);

        let pool = &enc.md.pool;
        let winner = out.winner.unwrap();
        assert!(out.stage3.contains(&winner));
        for &slot in out.stage3.iter() {
            assert!(pool.get(winner).full_cost <= pool.get(slot).full_cost);
        }
    }

    #[test]
    fn redundant_blocks_reuse_the_earlier_winner() {
        let cfg = EncoderConfig {
            width: 64,
            height: 64,
            sb_size: 64,
            preset: 2,
            ..Default::default()
        };
        let mut md = MdCtx::new(cfg, EncoderSettings::from_preset(cfg.preset)).unwrap();
        let mut pic = picture(&cfg, pattern, ReferenceList::new());
        let me = MeSbResults::new(64);
        mode_decision_sb(&mut md, &mut pic, &me, 0, 0);
        let geom = Arc::clone(&md.geom);
        let c0 = geom.child_sq_mds(0, 0).unwrap();
        let src = geom.get(c0).redund_src.unwrap();
        let (a, b) = (&md.md_blk[src], &md.md_blk[c0]);
        assert!(a.result.is_some() && b.result.is_some());
        assert_eq!(a.cost, b.cost);
        assert_eq!(
            a.result.as_ref().map(|r| r.cand),
            b.result.as_ref().map(|r| r.cand)
        );
    }
}
