use super::mvp::*;
use super::neighbor::NeighborArrays;
use super::ref_prune::RefPruneResult;
use super::*;
use crate::mc::*;

use log::{debug, trace};

/// Intra prediction parameters of a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IntraCandidate {
    pub(crate) mode: PredictionMode,
    pub(crate) angle_delta: i8,
    pub(crate) uv_mode: PredictionMode,
    pub(crate) uv_angle_delta: i8,
    pub(crate) cfl_alpha: [i8; 2],
}

/// Inter prediction parameters of a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InterCandidate {
    pub(crate) mode: PredictionMode,
    pub(crate) ref_frame: [Option<RefFrame>; 2],
    pub(crate) mv: [MotionVector; 2],
    /* predictors NEWMV vectors are coded against */
    pub(crate) ref_mv: [MotionVector; 2],
    pub(crate) drl_idx: u8,
    pub(crate) interintra: Option<PredictionMode>,
    /* vector comes from the predictive search */
    pub(crate) pme: bool,
}

impl InterCandidate {
    pub(crate) fn is_compound(&self) -> bool {
        self.ref_frame[1].is_some()
    }

    /// Reference-pruning group the candidate belongs to.
    pub(crate) fn prune_group(&self) -> RefPruneGroup {
        if self.is_compound() {
            RefPruneGroup::Bipred
        } else if self.interintra.is_some() {
            RefPruneGroup::InterIntra
        } else if self.mode == PredictionMode::GLOBALMV {
            RefPruneGroup::Global
        } else {
            RefPruneGroup::Unipred
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CandidateKind {
    Intra(IntraCandidate),
    Inter(InterCandidate),
}

/// One entry of the candidate list of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ModeDecisionCandidate {
    pub(crate) kind: CandidateKind,
    pub(crate) class: CandClass,
}

impl ModeDecisionCandidate {
    #[inline]
    pub(crate) fn is_inter(&self) -> bool {
        matches!(self.kind, CandidateKind::Inter(_))
    }

    pub(crate) fn pred_mode(&self) -> PredictionMode {
        match self.kind {
            CandidateKind::Intra(c) => c.mode,
            CandidateKind::Inter(c) => c.mode,
        }
    }

    pub(crate) fn block_mode(&self) -> BlockMode {
        match self.kind {
            CandidateKind::Intra(c) => BlockMode::Intra {
                mode: c.mode,
                angle_delta: c.angle_delta,
                uv_mode: c.uv_mode,
                uv_angle_delta: c.uv_angle_delta,
                cfl_alpha: c.cfl_alpha,
            },
            CandidateKind::Inter(c) => BlockMode::Inter {
                mode: c.mode,
                refs: c.ref_frame,
                mvs: c.mv,
                interintra: c.interintra,
            },
        }
    }

    /// Predicts the block into `pred`. Returns false when a reference is missing.
    pub(crate) fn predict(
        &self,
        bc: &BlockCtx,
        with_chroma: bool,
        pred: &mut PredBuf,
        scratch: &mut MdScratch,
    ) -> bool {
        let planes = if with_chroma { N_C } else { 1 };
        match self.kind {
            CandidateKind::Intra(c) => {
                for p in 0..planes {
                    let (mode, delta) = if p == Y_C {
                        (c.mode, c.angle_delta)
                    } else {
                        (c.uv_mode, c.uv_angle_delta)
                    };
                    predict_intra_plane(bc, p, mode, delta, &mut scratch.edges, &mut pred.data[p]);
                }
                true
            }
            CandidateKind::Inter(c) => {
                let mut frames = [None, None];
                for (f, rf) in frames.iter_mut().zip(c.ref_frame.iter()) {
                    if let Some(rf) = rf {
                        match bc.refs.get_ref(*rf) {
                            Some(r) => *f = Some(&*r.frame),
                            None => return false,
                        }
                    }
                }
                if frames[0].is_none() {
                    return false;
                }
                inter_predict(
                    frames,
                    c.mv,
                    bc.x,
                    bc.y,
                    bc.w,
                    bc.h,
                    with_chroma,
                    pred,
                    &mut scratch.pred_tmp,
                );
                if let Some(ii) = c.interintra {
                    for p in 0..planes {
                        let (_, _, w, h) = bc.plane_rect(p);
                        predict_intra_plane(bc, p, ii, 0, &mut scratch.edges, &mut scratch.intra_tmp);
                        interintra_blend(&mut pred.data[p], &scratch.intra_tmp, ii, w, h);
                    }
                }
                true
            }
        }
    }

    /// Rate of the luma-side syntax: intra/inter flag, modes, references, vectors.
    pub(crate) fn fast_rate(&self, bc: &BlockCtx) -> u64 {
        let r = bc.rates;
        match self.kind {
            CandidateKind::Intra(c) => {
                (r.is_inter[bc.is_inter_ctx][0] + r.intra_luma_rate(c.mode, c.angle_delta)) as u64
            }
            CandidateKind::Inter(c) => {
                let mut rate = r.is_inter[bc.is_inter_ctx][1] as u64;
                match c.ref_frame {
                    [Some(r0), Some(r1)] => {
                        rate += (r.comp_ref[1] + r.single_ref[r0.to_i8() as usize] + r.single_ref[r1.to_i8() as usize])
                            as u64
                    }
                    [Some(r0), None] => rate += (r.comp_ref[0] + r.single_ref[r0.to_i8() as usize]) as u64,
                    _ => {}
                }
                rate += r.inter_mode[c.mode.inter_index()] as u64;
                if matches!(c.mode, PredictionMode::NEARMV | PredictionMode::NEAR_NEARMV) || c.mode.has_newmv() {
                    rate += r.drl[c.drl_idx as usize] as u64;
                }
                if c.mode.has_newmv() {
                    let n = if c.is_compound() { 2 } else { 1 };
                    for i in 0..n {
                        rate += r.mv_rate(c.mv[i], c.ref_mv[i]) as u64;
                    }
                }
                if bc.allow_interintra() && !c.is_compound() {
                    rate += r.interintra[c.interintra.is_some() as usize] as u64;
                    if let Some(ii) = c.interintra {
                        rate += r.interintra_mode[interintra_mode_index(ii)] as u64;
                    }
                }
                rate
            }
        }
    }

    /// Rate of every mode syntax element, chroma included.
    pub(crate) fn full_mode_rate(&self, bc: &BlockCtx) -> u64 {
        let rate = self.fast_rate(bc);
        match self.kind {
            CandidateKind::Intra(c) => {
                rate + bc
                    .rates
                    .intra_chroma_rate(c.uv_mode, c.uv_angle_delta, bc.allow_cfl(), c.cfl_alpha) as u64
            }
            CandidateKind::Inter(_) => rate,
        }
    }
}

/*****************************************************************************
 * candidate generation
 *****************************************************************************/

/// Motion of one available reference after refinement.
#[derive(Clone, Debug)]
pub(crate) struct InterRefInfo {
    pub(crate) rf: RefFrame,
    pub(crate) stack: MvpStack,
    pub(crate) me_mv: MotionVector,
    pub(crate) pme_mv: Option<MotionVector>,
}

pub(crate) struct CandGenInput<'a> {
    pub(crate) settings: &'a EncoderSettings,
    pub(crate) nbr: &'a NeighborArrays,
    pub(crate) blk: MvpBlock,
    pub(crate) allow_intra: bool,
    pub(crate) allow_interintra: bool,
    pub(crate) refs: &'a [InterRefInfo],
    pub(crate) prune: &'a RefPruneResult,
    /* best chroma mode found independently of luma */
    pub(crate) uv_best: Option<(PredictionMode, i8)>,
    /* winner of an earlier block with the same geometry */
    pub(crate) similar: Option<ModeDecisionCandidate>,
}

struct CandList {
    cands: Vec<ModeDecisionCandidate>,
    /* distinct candidates refused once the list was full */
    dropped: usize,
}

impl CandList {
    fn new() -> Self {
        CandList {
            cands: Vec::with_capacity(64),
            dropped: 0,
        }
    }

    fn push(&mut self, cand: ModeDecisionCandidate) {
        if self.cands.contains(&cand) {
            return;
        }
        if self.cands.len() >= MAX_NFL {
            self.dropped += 1;
            trace!("candidate list full, dropping {:?} {:?}", cand.class, cand.kind);
            return;
        }
        self.cands.push(cand);
    }

    fn push_inter(&mut self, c: InterCandidate, class: CandClass) {
        self.push(ModeDecisionCandidate {
            kind: CandidateKind::Inter(c),
            class,
        });
    }
}

fn single_inter(mode: PredictionMode, rf: RefFrame, mv: MotionVector, ref_mv: MotionVector) -> InterCandidate {
    InterCandidate {
        mode,
        ref_frame: [Some(rf), None],
        mv: [mv, MotionVector::zero()],
        ref_mv: [ref_mv, MotionVector::zero()],
        drl_idx: 0,
        interintra: None,
        pme: false,
    }
}

fn inject_intra(list: &mut CandList, inp: &CandGenInput) {
    let s = inp.settings;
    for &mode in PredictionMode::INTRA.iter() {
        let smooth = matches!(
            mode,
            PredictionMode::SMOOTH_PRED | PredictionMode::SMOOTH_V_PRED | PredictionMode::SMOOTH_H_PRED
        );
        if (smooth && !s.intra.smooth) || (mode == PredictionMode::PAETH_PRED && !s.intra.paeth) {
            continue;
        }
        let max_delta = if mode.is_directional() && s.intra.angle_delta {
            MAX_ANGLE_DELTA
        } else {
            0
        };
        for delta in -max_delta..=max_delta {
            let (uv_mode, uv_angle_delta) = inp.uv_best.unwrap_or((mode, delta));
            list.push(ModeDecisionCandidate {
                kind: CandidateKind::Intra(IntraCandidate {
                    mode,
                    angle_delta: delta,
                    uv_mode,
                    uv_angle_delta,
                    cfl_alpha: [0, 0],
                }),
                class: CandClass::Intra,
            });
        }
    }
}

fn inject_single_ref(list: &mut CandList, inp: &CandGenInput, info: &InterRefInfo) {
    let s = inp.settings;
    let rf = info.rf;
    let nearest = info.stack.get(0)[0];
    if inp.prune.do_ref(rf, RefPruneGroup::Unipred) {
        list.push_inter(single_inter(PredictionMode::NEWMV, rf, info.me_mv, nearest), CandClass::InterNew);
        if s.inter.pme_cand {
            if let Some(pme_mv) = info.pme_mv {
                let mut c = single_inter(PredictionMode::NEWMV, rf, pme_mv, nearest);
                c.pme = true;
                if pme_mv != info.me_mv {
                    list.push_inter(c, CandClass::InterNew);
                }
            }
        }
        list.push_inter(single_inter(PredictionMode::NEARESTMV, rf, nearest, nearest), CandClass::InterPred);
        if s.inter.near {
            for idx in 1..info.stack.len.min(3) {
                let mv = info.stack.get(idx)[0];
                if mv == nearest {
                    continue;
                }
                let mut c = single_inter(PredictionMode::NEARMV, rf, mv, mv);
                c.drl_idx = idx as u8;
                list.push_inter(c, CandClass::InterPred);
            }
        }
    }
    if s.inter.global && inp.prune.do_ref(rf, RefPruneGroup::Global) {
        let z = MotionVector::zero();
        list.push_inter(single_inter(PredictionMode::GLOBALMV, rf, z, z), CandClass::InterPred);
    }
    if s.intra.interintra && inp.allow_interintra && inp.prune.do_ref(rf, RefPruneGroup::InterIntra) {
        for &ii in INTERINTRA_MODES.iter() {
            let mut c = single_inter(PredictionMode::NEWMV, rf, info.me_mv, nearest);
            c.interintra = Some(ii);
            list.push_inter(c, CandClass::InterIntra);
        }
    }
}

fn inject_compound(list: &mut CandList, inp: &CandGenInput, i0: &InterRefInfo, i1: &InterRefInfo) {
    let s = inp.settings;
    let (r0, r1) = (i0.rf, i1.rf);
    let bipred = inp.prune.do_ref(r0, RefPruneGroup::Bipred) && inp.prune.do_ref(r1, RefPruneGroup::Bipred);
    let pair = |mode, mv: [MotionVector; 2], ref_mv: [MotionVector; 2], drl_idx| InterCandidate {
        mode,
        ref_frame: [Some(r0), Some(r1)],
        mv,
        ref_mv,
        drl_idx,
        interintra: None,
        pme: false,
    };
    if bipred {
        let st = compound_stack(inp.nbr, &inp.blk, r0, r1, &i0.stack, &i1.stack);
        let nearest = st.get(0);
        list.push_inter(pair(PredictionMode::NEAREST_NEARESTMV, nearest, nearest, 0), CandClass::Compound);
        list.push_inter(
            pair(PredictionMode::NEW_NEWMV, [i0.me_mv, i1.me_mv], nearest, 0),
            CandClass::Compound,
        );
        if s.inter.near && st.len > 1 && st.get(1) != nearest {
            let near = st.get(1);
            list.push_inter(pair(PredictionMode::NEAR_NEARMV, near, near, 1), CandClass::Compound);
        }
    }
    if bipred
        && s.inter.global
        && inp.prune.do_ref(r0, RefPruneGroup::Global)
        && inp.prune.do_ref(r1, RefPruneGroup::Global)
    {
        let z = [MotionVector::zero(); 2];
        list.push_inter(pair(PredictionMode::GLOBAL_GLOBALMV, z, z, 0), CandClass::Compound);
    }
}

/// Whether reference pruning allows `cand`.
fn passes_pruning(cand: &ModeDecisionCandidate, inp: &CandGenInput) -> bool {
    match cand.kind {
        CandidateKind::Intra(_) => inp.allow_intra,
        CandidateKind::Inter(c) => {
            let g = c.prune_group();
            c.ref_frame
                .iter()
                .flatten()
                .all(|rf| inp.refs.iter().any(|i| i.rf == *rf) && inp.prune.do_ref(*rf, g))
        }
    }
}

/// Builds the candidate list of a block, at most `MAX_NFL` entries, no duplicates.
pub(crate) fn generate_candidates(inp: &CandGenInput) -> Vec<ModeDecisionCandidate> {
    let mut list = CandList::new();
    if inp.allow_intra {
        inject_intra(&mut list, inp);
    }
    for info in inp.refs.iter() {
        inject_single_ref(&mut list, inp, info);
    }
    if inp.settings.inter.compound {
        for i0 in inp.refs.iter().filter(|i| i.rf.list as usize == REF_LIST_0) {
            for i1 in inp.refs.iter().filter(|i| i.rf.list as usize == REF_LIST_1) {
                inject_compound(&mut list, inp, i0, i1);
            }
        }
    }
    if let Some(sim) = inp.similar {
        if passes_pruning(&sim, inp) {
            list.push(sim);
        }
    }
    if list.dropped > 0 {
        debug!(
            "block {}x{} at ({}, {}): {} candidates over the limit of {}",
            inp.blk.w, inp.blk.h, inp.blk.x, inp.blk.y, list.dropped, MAX_NFL
        );
    }
    list.cands
}
