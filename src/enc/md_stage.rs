use super::cand::ModeDecisionCandidate;
use super::cand_buf::CandidateBufferPool;
use super::dist::*;
use super::full_loop::*;
use super::rate::RDCOST;
use super::*;

/// Parameters of one cross-class pruning pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PruneParams {
    /* percent a class best may exceed the block best */
    pub(crate) class_th: Option<u64>,
    pub(crate) band_cnt: u64,
    /* percent a candidate may exceed its class best */
    pub(crate) cand_th: Option<u64>,
    pub(crate) min_count: usize,
}

/// Number of candidates each class keeps for the next stage.
///
/// `costs` holds the costs of each class sorted ascending, `budget` the
/// per-class count of the next stage. A class whose best cost deviates from
/// the block best by more than `class_th` percent keeps nothing; otherwise its
/// budget shrinks by one band per `class_th / band_cnt` of deviation and then
/// to the candidates within `cand_th` percent of the class best. A surviving
/// class keeps at least its best candidate.
pub(crate) fn interintra_class_pruning(
    costs: &[Vec<u64>; CAND_CLASS_TOTAL],
    budget: &[usize; CAND_CLASS_TOTAL],
    p: &PruneParams,
) -> [usize; CAND_CLASS_TOTAL] {
    let mut counts = [0; CAND_CLASS_TOTAL];
    let best = costs.iter().filter_map(|c| c.first()).min().copied();
    for class in 0..CAND_CLASS_TOTAL {
        let c = &costs[class];
        let cb = match c.first() {
            Some(&cb) if budget[class] > 0 => cb,
            _ => continue,
        };
        let mut count = budget[class].min(c.len());
        match (p.class_th, best) {
            (Some(th), Some(best)) if best > 0 && cb > 0 => {
                let dev = (cb - best).saturating_mul(100) / best;
                if dev > th {
                    continue;
                }
                let band = p.band_cnt.max(1);
                if band > 1 && th > 0 {
                    let band_idx = (dev * (band - 1) / th).min(band - 1);
                    count = (count as u64 * (band - band_idx) / band) as usize;
                }
            }
            _ => {}
        }
        if let Some(th) = p.cand_th {
            if cb > 0 {
                let within = c
                    .iter()
                    .take_while(|&&x| (x - cb).saturating_mul(100) <= th.saturating_mul(cb))
                    .count();
                count = count.min(within);
            }
        }
        let min = p.min_count.max(1).min(c.len()).min(budget[class]);
        counts[class] = count.max(min);
    }
    counts
}

/// Stage-0 cost: prediction distortion plus the optional fast rate.
pub(crate) fn fast_loop_core(
    bc: &BlockCtx,
    cand: &ModeDecisionCandidate,
    pred: &mut PredBuf,
    scratch: &mut MdScratch,
) -> u64 {
    let s = bc.settings;
    let with_chroma = s.chroma.stage0_chroma;
    if !cand.predict(bc, with_chroma, pred, scratch) {
        return MAX_MODE_COST;
    }
    let planes = if with_chroma { N_C } else { 1 };
    let mut dist = 0;
    for p in 0..planes {
        let (src, s_src) = bc.src_block(p);
        let (_, _, w, h) = bc.plane_rect(p);
        dist += if s.stage0_use_ssd {
            scale_distortion(ssd_16b(w, h, src, s_src, &pred.data[p], w), bc.bit_depth)
        } else {
            scale_sad(sad_16b(w, h, src, s_src, &pred.data[p], w), bc.bit_depth)
        };
    }
    let rate = if s.fast_cost_rate { cand.fast_rate(bc) } else { 0 };
    let lambda = if s.stage0_use_ssd { bc.full_lambda } else { bc.fast_lambda };
    RDCOST(lambda, rate, dist)
}

/// Result of the staged evaluation of one block.
#[derive(Clone, Debug, Default)]
pub(crate) struct MdStageOutcome {
    /* buffer holding the winner */
    pub(crate) winner: Option<usize>,
    /* stage-0 cost of every candidate, MAX_MODE_COST if never evaluated */
    pub(crate) fast_costs: Vec<u64>,
    /* buffers evaluated at stage 3, in evaluation order */
    pub(crate) stage3: Vec<usize>,
    /* number of candidates alive after stages 0, 1, 2 and 3 */
    pub(crate) survivors: [usize; 4],
}

fn sort_by_cost(kept: &mut [usize], pool: &CandidateBufferPool, full: bool) {
    kept.sort_by_key(|&slot| {
        let b = pool.get(slot);
        (if full { b.full_cost } else { b.fast_cost }, b.cand_idx)
    });
}

fn stage0(
    bc: &BlockCtx,
    cands: &[ModeDecisionCandidate],
    pool: &mut CandidateBufferPool,
    scratch: &mut MdScratch,
    fast_costs: &mut [u64],
) -> [Vec<usize>; CAND_CLASS_TOTAL] {
    let mut kept: [Vec<usize>; CAND_CLASS_TOTAL] = Default::default();
    for class in CandClass::ALL.iter() {
        let slots = pool.class_slots(*class);
        let cap = slots.len() - 1;
        if cap == 0 {
            continue;
        }
        let mut free: Vec<usize> = slots.rev().collect();
        let mut spare = match free.pop() {
            Some(s) => s,
            None => continue,
        };
        let k = &mut kept[*class as usize];
        for (i, cand) in cands.iter().enumerate().filter(|(_, c)| c.class == *class) {
            let buf = pool.get_mut(spare);
            buf.reset();
            let cost = fast_loop_core(bc, cand, &mut buf.pred, scratch);
            buf.cand_idx = Some(i);
            buf.cand = Some(*cand);
            buf.fast_cost = cost;
            fast_costs[i] = cost;
            if cost >= MAX_MODE_COST {
                continue;
            }
            if k.len() < cap {
                k.push(spare);
                spare = match free.pop() {
                    Some(s) => s,
                    None => break,
                };
            } else {
                // the spare replaces the worst kept buffer
                let mut worst = 0;
                for j in 1..k.len() {
                    let (a, b) = (pool.get(k[j]), pool.get(k[worst]));
                    if (a.fast_cost, a.cand_idx) > (b.fast_cost, b.cand_idx) {
                        worst = j;
                    }
                }
                if cost < pool.get(k[worst]).fast_cost {
                    std::mem::swap(&mut k[worst], &mut spare);
                }
            }
        }
        sort_by_cost(k, pool, false);
    }
    kept
}

fn prune(
    kept: &mut [Vec<usize>; CAND_CLASS_TOTAL],
    pool: &CandidateBufferPool,
    full: bool,
    budget: &[usize; CAND_CLASS_TOTAL],
    params: &PruneParams,
) -> usize {
    let mut costs: [Vec<u64>; CAND_CLASS_TOTAL] = Default::default();
    for (c, k) in costs.iter_mut().zip(kept.iter()) {
        *c = k
            .iter()
            .map(|&s| {
                let b = pool.get(s);
                if full {
                    b.full_cost
                } else {
                    b.fast_cost
                }
            })
            .collect();
    }
    let counts = interintra_class_pruning(&costs, budget, params);
    let mut alive = 0;
    for (k, n) in kept.iter_mut().zip(counts.iter()) {
        k.truncate(*n);
        alive += k.len();
    }
    alive
}

fn full_stage(
    bc: &BlockCtx,
    kept: &mut [Vec<usize>; CAND_CLASS_TOTAL],
    pool: &mut CandidateBufferPool,
    scratch: &mut MdScratch,
    params: &FullLoopParams,
) {
    for k in kept.iter_mut() {
        for &slot in k.iter() {
            full_loop_core(bc, pool.get_mut(slot), params, scratch);
        }
        sort_by_cost(k, pool, true);
    }
}

/// Runs the candidate funnel of one block: stage 0 on every candidate, then
/// the enabled full-loop stages on the survivors, then stage 3 on the global
/// union. The winner is the cheapest stage-3 candidate, the earlier on ties.
pub(crate) fn md_stages(
    bc: &BlockCtx,
    cands: &[ModeDecisionCandidate],
    pool: &mut CandidateBufferPool,
    scratch: &mut MdScratch,
) -> MdStageOutcome {
    let s = bc.settings;
    let np = &s.nic_pruning;
    let min_count = if bc.is_ref_pic { np.min_count_ref_pic } else { 1 };
    let params = |class_th, band_cnt, cand_th| PruneParams {
        class_th,
        band_cnt,
        cand_th,
        min_count,
    };
    let mut out = MdStageOutcome {
        fast_costs: vec![MAX_MODE_COST; cands.len()],
        ..Default::default()
    };

    let mut kept = stage0(bc, cands, pool, scratch, &mut out.fast_costs);
    out.survivors[0] = kept.iter().map(|k| k.len()).sum();

    let staging = s.md_staging;
    let mut full = false;
    if staging.runs_stage1() {
        out.survivors[1] = prune(
            &mut kept,
            pool,
            false,
            &s.nic.stage1_count,
            &params(np.mds1_class_th, np.mds1_band_cnt, np.mds1_cand_th),
        );
        full_stage(bc, &mut kept, pool, scratch, &FullLoopParams::new(FullLoopStage::Stage1, bc));
        full = true;
        if staging.runs_stage2() {
            out.survivors[2] = prune(
                &mut kept,
                pool,
                true,
                &s.nic.stage2_count,
                &params(np.mds2_class_th, np.mds2_band_cnt, np.mds2_cand_th),
            );
            full_stage(bc, &mut kept, pool, scratch, &FullLoopParams::new(FullLoopStage::Stage2, bc));
        } else {
            out.survivors[2] = out.survivors[1];
        }
        prune(
            &mut kept,
            pool,
            true,
            &s.nic.stage3_count,
            &params(np.mds3_class_th, np.mds3_band_cnt, np.mds3_cand_th),
        );
    } else {
        prune(
            &mut kept,
            pool,
            false,
            &s.nic.stage3_count,
            &params(np.mds1_class_th, np.mds1_band_cnt, np.mds1_cand_th),
        );
        out.survivors[1] = out.survivors[0];
        out.survivors[2] = out.survivors[0];
    }

    let mut union: Vec<usize> = kept.iter().flatten().copied().collect();
    sort_by_cost(&mut union, pool, full);
    union.truncate(s.nic.stage3_total);
    out.survivors[3] = union.len();

    let final_params = FullLoopParams::new(FullLoopStage::Final, bc);
    let mut best: Option<(u64, usize)> = None;
    for &slot in union.iter() {
        let cost = full_loop_core(bc, pool.get_mut(slot), &final_params, scratch);
        if best.map_or(true, |(c, _)| cost < c) {
            best = Some((cost, slot));
        }
    }
    out.winner = best.map(|(_, slot)| slot);
    out.stage3 = union;
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn params(class_th: Option<u64>, band_cnt: u64, cand_th: Option<u64>) -> PruneParams {
        PruneParams {
            class_th,
            band_cnt,
            cand_th,
            min_count: 1,
        }
    }

    fn costs(v: [&[u64]; CAND_CLASS_TOTAL]) -> [Vec<u64>; CAND_CLASS_TOTAL] {
        let mut out: [Vec<u64>; CAND_CLASS_TOTAL] = Default::default();
        for (o, c) in out.iter_mut().zip(v.iter()) {
            *o = c.to_vec();
        }
        out
    }

    #[test]
    fn far_classes_are_dropped() {
        let c = costs([&[100, 110, 400], &[130, 131], &[260], &[], &[150, 151, 152, 153]]);
        let budget = [3, 3, 3, 3, 4];
        let n = interintra_class_pruning(&c, &budget, &params(Some(100), 1, None));
        assert_eq!(n, [3, 2, 0, 0, 4]);
    }

    #[test]
    fn deviation_bands_shrink_budgets() {
        let c = costs([&[100; 4], &[180; 4], &[120; 4], &[], &[]]);
        let budget = [4; CAND_CLASS_TOTAL];
        let n = interintra_class_pruning(&c, &budget, &params(Some(100), 4, None));
        // 80% is in band 2 of 4, 20% in band 0
        assert_eq!(n[0], 4);
        assert_eq!(n[1], 2);
        assert_eq!(n[2], 4);
    }

    #[test]
    fn candidate_tolerance_keeps_class_best() {
        let c = costs([&[100, 120, 180, 400], &[50, 900], &[], &[], &[]]);
        let budget = [4, 2, 0, 0, 0];
        let n = interintra_class_pruning(&c, &budget, &params(None, 1, Some(50)));
        assert_eq!(n[0], 2);
        assert_eq!(n[1], 1);
        let mut p = params(None, 1, Some(0));
        p.min_count = 2;
        let n = interintra_class_pruning(&c, &budget, &p);
        assert_eq!(n[0], 2);
        assert_eq!(n[1], 2);
    }

    #[test]
    fn pruning_never_discards_the_best() {
        let mut ra = ChaChaRng::from_seed([3; 32]);
        for _ in 0..200 {
            let mut c: [Vec<u64>; CAND_CLASS_TOTAL] = Default::default();
            for v in c.iter_mut() {
                let n: usize = ra.gen_range(0, 5);
                *v = (0..n).map(|_| ra.gen_range(0u64, 1000)).collect();
                v.sort();
            }
            let budget = [3; CAND_CLASS_TOTAL];
            let th = [None, Some(0), Some(10), Some(300)][ra.gen_range(0usize, 4)];
            let cth = [None, Some(0), Some(25)][ra.gen_range(0usize, 3)];
            let band = ra.gen_range(1u64, 5);
            let n = interintra_class_pruning(&c, &budget, &params(th, band, cth));
            let best = c.iter().filter_map(|v| v.first()).min().copied();
            for class in 0..CAND_CLASS_TOTAL {
                assert!(n[class] <= c[class].len().min(budget[class]));
                if c[class].first().is_some() && c[class].first().copied() == best {
                    assert!(n[class] >= 1, "{:?} {:?}", c, n);
                }
            }
        }
    }

    #[test]
    fn zero_costs_skip_the_ratio_test() {
        let c = costs([&[0, 0], &[500], &[], &[], &[]]);
        let n = interintra_class_pruning(&c, &[2, 1, 0, 0, 0], &params(Some(10), 2, Some(10)));
        assert_eq!(n, [2, 1, 0, 0, 0]);
    }
}
