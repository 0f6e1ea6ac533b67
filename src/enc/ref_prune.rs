use crate::api::RefPruningSettings;
use crate::def::*;

/// Distortion measured for one reference before candidates are generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RefPruneInput {
    pub(crate) rf: RefFrame,
    pub(crate) me_dist: Option<u64>,
    pub(crate) mvp_dist: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RefPruneInfo {
    pub(crate) valid: bool,
    pub(crate) dist: u64,
    pub(crate) do_ref: [bool; REF_PRUNE_GROUPS],
}

/// Per (list, index) pruning decision of one block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct RefPruneResult {
    pub(crate) info: [[RefPruneInfo; MAX_REF_IDX]; REF_LIST_CNT],
}

impl RefPruneResult {
    #[inline]
    pub(crate) fn do_ref(&self, rf: RefFrame, group: RefPruneGroup) -> bool {
        let i = &self.info[rf.list as usize][rf.idx as usize];
        i.valid && i.do_ref[group as usize]
    }
}

/// Ranks the available references by min(predictor, motion search) distortion
/// and switches off the groups whose threshold the reference exceeds.
pub(crate) fn prune_references(inputs: &[RefPruneInput], ctrls: &RefPruningSettings) -> RefPruneResult {
    let mut res = RefPruneResult::default();
    let mut ranked = Vec::with_capacity(inputs.len());
    for inp in inputs.iter() {
        let dist = match (inp.me_dist, inp.mvp_dist) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => continue,
        };
        res.info[inp.rf.list as usize][inp.rf.idx as usize] = RefPruneInfo {
            valid: true,
            dist,
            do_ref: [true; REF_PRUNE_GROUPS],
        };
        ranked.push((dist, inp.rf));
    }
    if !ctrls.enabled || ranked.len() < 2 {
        return res;
    }
    ranked.sort();
    let best = ranked[0].0;
    // nothing to compare against
    if best == 0 {
        return res;
    }
    for (rank, &(dist, rf)) in ranked.iter().enumerate() {
        if rank < ctrls.min_kept.max(1) {
            continue;
        }
        let info = &mut res.info[rf.list as usize][rf.idx as usize];
        for g in RefPruneGroup::ALL.iter() {
            if let Some(th) = ctrls.thresholds[*g as usize] {
                if (dist - best).saturating_mul(100) > th.saturating_mul(best) {
                    info.do_ref[*g as usize] = false;
                }
            }
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(thresholds: [Option<u64>; REF_PRUNE_GROUPS]) -> RefPruningSettings {
        RefPruningSettings {
            enabled: true,
            thresholds,
            min_kept: 1,
        }
    }

    fn input(list: usize, idx: usize, d: u64) -> RefPruneInput {
        RefPruneInput {
            rf: RefFrame::new(list, idx),
            me_dist: Some(d),
            mvp_dist: Some(d + 10),
        }
    }

    #[test]
    fn far_references_are_pruned_per_group() {
        let inputs = [input(0, 0, 100), input(0, 1, 130), input(1, 0, 300)];
        let r = prune_references(&inputs, &settings([Some(50), Some(20), None, Some(100)]));
        let r01 = RefFrame::new(0, 1);
        let r10 = RefFrame::new(1, 0);
        assert!(r.do_ref(RefFrame::new(0, 0), RefPruneGroup::Bipred));
        assert!(r.do_ref(r01, RefPruneGroup::Unipred));
        assert!(!r.do_ref(r01, RefPruneGroup::Bipred));
        assert!(!r.do_ref(r10, RefPruneGroup::Unipred));
        assert!(!r.do_ref(r10, RefPruneGroup::InterIntra));
        // a disabled threshold never prunes
        assert!(r.do_ref(r10, RefPruneGroup::Global));
        assert_eq!(r.info[0][1].dist, 130);
    }

    #[test]
    fn degenerate_inputs_keep_everything() {
        let zero = [input(0, 0, 0), input(0, 1, 500)];
        let r = prune_references(&zero, &settings([Some(0); REF_PRUNE_GROUPS]));
        assert!(r.do_ref(RefFrame::new(0, 1), RefPruneGroup::Unipred));
        let mut off = settings([Some(0); REF_PRUNE_GROUPS]);
        off.enabled = false;
        let r = prune_references(&[input(0, 0, 10), input(0, 1, 500)], &off);
        assert!(r.do_ref(RefFrame::new(0, 1), RefPruneGroup::Bipred));
        // missing references are never usable
        assert!(!r.do_ref(RefFrame::new(1, 3), RefPruneGroup::Unipred));
    }
}
