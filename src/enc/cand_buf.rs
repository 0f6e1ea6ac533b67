use std::ops::Range;

use super::cand::ModeDecisionCandidate;
use super::tq::TxType;
use crate::api::{MdError, NicSettings};
use crate::def::*;
use crate::mc::PredBuf;

/// Prediction, reconstruction and costs of one candidate under evaluation.
#[derive(Clone, Debug, Default)]
pub(crate) struct CandidateBuffer {
    /* index into the candidate list of the block */
    pub(crate) cand_idx: Option<usize>,
    pub(crate) cand: Option<ModeDecisionCandidate>,
    pub(crate) pred: PredBuf,
    pub(crate) chroma_predicted: bool,
    pub(crate) recon: [Vec<pel>; N_C],
    pub(crate) fast_cost: u64,
    pub(crate) full_cost: u64,
    pub(crate) tx_depth: u8,
    pub(crate) tx_types: Vec<TxType>,
    pub(crate) y_nonzero: u32,
    pub(crate) uv_nonzero: u32,
    pub(crate) skip: bool,
    pub(crate) dc_level: [i8; N_C],
}

impl CandidateBuffer {
    pub(crate) fn reset(&mut self) {
        self.cand_idx = None;
        self.cand = None;
        self.chroma_predicted = false;
        self.fast_cost = MAX_MODE_COST;
        self.full_cost = MAX_MODE_COST;
        self.tx_depth = 0;
        self.tx_types.clear();
        self.y_nonzero = 0;
        self.uv_nonzero = 0;
        self.skip = false;
        self.dc_level = [0; N_C];
    }
}

/// Candidate buffers of a block, partitioned by class.
///
/// Each class owns `stage1_count + 1` consecutive buffers: the kept ones and
/// one spare that receives the next candidate of stage 0.
pub(crate) struct CandidateBufferPool {
    bufs: Vec<CandidateBuffer>,
    ranges: [Range<usize>; CAND_CLASS_TOTAL],
}

impl CandidateBufferPool {
    pub(crate) fn new(nic: &NicSettings, sb_size: usize) -> Result<Self, MdError> {
        let total: usize = nic.stage1_count.iter().map(|c| c + 1).sum();
        let mut bufs = Vec::new();
        bufs.try_reserve_exact(total)
            .map_err(|_| MdError::OutOfMemory("candidate buffers"))?;
        let n = sb_size.min(MAX_TX_SIZE) * sb_size.min(MAX_TX_SIZE);
        for _ in 0..total {
            let mut b = CandidateBuffer::default();
            // luma prediction of the largest intra-capable block
            b.pred.data[Y_C]
                .try_reserve_exact(n)
                .map_err(|_| MdError::OutOfMemory("candidate buffers"))?;
            b.reset();
            bufs.push(b);
        }
        let mut ranges: [Range<usize>; CAND_CLASS_TOTAL] = Default::default();
        let mut start = 0;
        for (r, c) in ranges.iter_mut().zip(nic.stage1_count.iter()) {
            *r = start..start + c + 1;
            start += c + 1;
        }
        Ok(CandidateBufferPool { bufs, ranges })
    }

    #[inline]
    pub(crate) fn class_slots(&self, class: CandClass) -> Range<usize> {
        self.ranges[class as usize].clone()
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> &CandidateBuffer {
        &self.bufs[i]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, i: usize) -> &mut CandidateBuffer {
        &mut self.bufs[i]
    }

    pub(crate) fn len(&self) -> usize {
        self.bufs.len()
    }

    pub(crate) fn reset(&mut self) {
        for b in self.bufs.iter_mut() {
            b.reset();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::EncoderSettings;

    #[test]
    fn classes_own_disjoint_slots() {
        let s = EncoderSettings::from_preset(3);
        let pool = CandidateBufferPool::new(&s.nic, 64).unwrap();
        let mut end = 0;
        for class in CandClass::ALL.iter() {
            let r = pool.class_slots(*class);
            assert_eq!(r.start, end);
            assert_eq!(r.len(), s.nic.stage1_count[*class as usize] + 1);
            end = r.end;
        }
        assert_eq!(end, pool.len());
        assert!(pool.get(0).cand.is_none());
        assert_eq!(pool.get(0).fast_cost, MAX_MODE_COST);
    }
}
