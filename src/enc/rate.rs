use super::neighbor::*;
use crate::def::*;
use crate::tbl::ac_q;

/* rates are in 1/512 bit */
pub(crate) const RATE_SHIFT: u32 = 9;
/* distortion scale inside RDCOST */
pub(crate) const RDDIV_BITS: u32 = 7;
const PROB_BITS: usize = 10;

lazy_static! {
    /* cost of a symbol of probability i / 1024; index 0 stands for 0.5 / 1024 */
    pub(crate) static ref entropy_bits: Box<[u32]> = {
        let n = 1 << PROB_BITS;
        let mut bits = vec![0u32; n].into_boxed_slice();
        for i in 0..n {
            let p = (i as f64).max(0.5) / n as f64;
            bits[i] = (-p.log2() * (1 << RATE_SHIFT) as f64).round() as u32;
        }
        bits
    };

    /* rate of one motion vector difference component, indexed by |d| */
    static ref mv_comp_bits: Box<[u32]> = {
        let n = (MV_UPP - MV_LOW) as usize + 1;
        let mut bits = vec![0u32; n].into_boxed_slice();
        for (d, b) in bits.iter_mut().enumerate() {
            *b = get_exp_golomb_bits(d as u32) << RATE_SHIFT;
        }
        bits
    };
}

#[inline]
pub(crate) fn prob_rate(p: f64) -> u32 {
    let i = (p * (1 << PROB_BITS) as f64).round() as usize;
    entropy_bits[i.min((1 << PROB_BITS) - 1)]
}

#[inline]
pub(crate) fn get_exp_golomb_bits(abs_v: u32) -> u32 {
    let mut bits = 0;

    let mut nn = (abs_v + 1) >> 1;
    let mut len_i = 0;
    while len_i < 16 && nn != 0 {
        nn >>= 1;
        len_i += 1;
    }
    bits += (len_i << 1) + 1;

    /* sign */
    if abs_v != 0 {
        bits += 1;
    }
    bits
}

/// Rate-distortion cost; `rate` in 1/512 bit, `dist` in squared 8-bit samples.
#[inline]
pub(crate) fn RDCOST(lambda: u64, rate: u64, dist: u64) -> u64 {
    (rate.saturating_mul(lambda).saturating_add(1 << (RATE_SHIFT - 1)) >> RATE_SHIFT)
        .saturating_add(dist.saturating_mul(1 << RDDIV_BITS))
}

/// Lambda used with SSE distortion.
pub(crate) fn full_lambda(qindex: u8) -> u64 {
    let q = ac_q(qindex, 8) as f64;
    (0.18 * q * q).round().max(1.0) as u64
}

/// Lambda used with SAD distortion.
pub(crate) fn fast_lambda(qindex: u8) -> u64 {
    let full = full_lambda(qindex) as f64;
    ((1u64 << RDDIV_BITS) as f64 * full).sqrt().round().max(1.0) as u64
}

/* block size class for partition rates: 8, 16, 32, 64, 128 */
const PART_SIZE_CLASSES: usize = 5;
const PART_CTXS: usize = 3;
const SKIP_CTXS: usize = 3;
const INTER_CTXS: usize = 3;
const DC_SIGN_CTXS: usize = 3;
const TXB_SKIP_CTXS: usize = 2;
pub(crate) const CFL_ALPHA_MAX: i8 = 8;
const MAX_DRL: usize = MAX_REF_MV_STACK_SIZE;
/* levels with a dedicated rate before golomb coding */
const COEFF_BASE_RANGE: usize = 15;

const INTRA_MODE_PROBS: [f64; INTRA_MODES] = [
    0.23, // DC
    0.14, // V
    0.14, // H
    0.03, // D45
    0.04, // D135
    0.04, // D113
    0.04, // D157
    0.04, // D203
    0.03, // D67
    0.11, // SMOOTH
    0.05, // SMOOTH_V
    0.05, // SMOOTH_H
    0.06, // PAETH
];

const UV_MODE_PROBS: [f64; UV_INTRA_MODES] = [
    0.24, 0.10, 0.10, 0.02, 0.03, 0.03, 0.03, 0.03, 0.02, 0.08, 0.04, 0.04, 0.04, 0.20,
];

const INTER_MODE_PROBS: [f64; INTER_MODES] = [
    0.30, // NEAREST
    0.12, // NEAR
    0.08, // GLOBAL
    0.25, // NEW
    0.10, // NEAREST_NEAREST
    0.04, // NEAR_NEAR
    0.03, // GLOBAL_GLOBAL
    0.08, // NEW_NEW
];

const ANGLE_DELTA_PROBS: [f64; 2 * MAX_ANGLE_DELTA as usize + 1] =
    [0.03, 0.05, 0.10, 0.64, 0.10, 0.05, 0.03];

const INTERINTRA_MODE_PROBS: [f64; 4] = [0.4, 0.2, 0.2, 0.2];

/// Rate tables of one picture, read-only during mode decision.
#[derive(Clone, Debug)]
pub(crate) struct MdRateEstimation {
    pub(crate) partition: [[[u32; PARTITION_SHAPES]; PART_SIZE_CLASSES]; PART_CTXS],
    pub(crate) skip: [[u32; 2]; SKIP_CTXS],
    pub(crate) is_inter: [[u32; 2]; INTER_CTXS],
    pub(crate) y_mode: [u32; INTRA_MODES],
    pub(crate) angle_delta: [u32; 2 * MAX_ANGLE_DELTA as usize + 1],
    /* indexed by cfl allowed */
    pub(crate) uv_mode: [[u32; UV_INTRA_MODES]; 2],
    pub(crate) cfl_alpha: [u32; 2 * CFL_ALPHA_MAX as usize + 1],
    pub(crate) inter_mode: [u32; INTER_MODES],
    pub(crate) single_ref: [u32; TOTAL_REFS],
    pub(crate) comp_ref: [u32; 2],
    pub(crate) drl: [u32; MAX_DRL],
    pub(crate) interintra: [u32; 2],
    pub(crate) interintra_mode: [u32; 4],
    pub(crate) mv_joint: [u32; 4],
    /* by transform depth, for blocks allowing 1 and 2 extra depths */
    pub(crate) tx_depth: [[u32; MAX_TX_DEPTH + 1]; 2],
    pub(crate) tx_type_intra: [u32; 16],
    pub(crate) tx_type_inter: [u32; 16],
    pub(crate) txb_skip: [[u32; 2]; TXB_SKIP_CTXS],
    pub(crate) dc_sign: [[u32; 2]; DC_SIGN_CTXS],
    pub(crate) coeff_base: [u32; COEFF_BASE_RANGE],
}

fn normalized_rates(probs: &[f64], out: &mut [u32]) {
    let sum: f64 = probs.iter().sum();
    for (o, &p) in out.iter_mut().zip(probs.iter()) {
        *o = prob_rate(p / sum);
    }
}

fn flag_rates(p1: f64) -> [u32; 2] {
    [prob_rate(1.0 - p1), prob_rate(p1)]
}

impl MdRateEstimation {
    pub(crate) fn new(qindex: u8) -> Self {
        let qf = qindex as f64 / 255.0;
        let mut r = MdRateEstimation {
            partition: [[[0; PARTITION_SHAPES]; PART_SIZE_CLASSES]; PART_CTXS],
            skip: [[0; 2]; SKIP_CTXS],
            is_inter: [[0; 2]; INTER_CTXS],
            y_mode: [0; INTRA_MODES],
            angle_delta: [0; 2 * MAX_ANGLE_DELTA as usize + 1],
            uv_mode: [[0; UV_INTRA_MODES]; 2],
            cfl_alpha: [0; 2 * CFL_ALPHA_MAX as usize + 1],
            inter_mode: [0; INTER_MODES],
            single_ref: [0; TOTAL_REFS],
            comp_ref: [0; 2],
            drl: [0; MAX_DRL],
            interintra: [0; 2],
            interintra_mode: [0; 4],
            mv_joint: [0; 4],
            tx_depth: [[0; MAX_TX_DEPTH + 1]; 2],
            tx_type_intra: [0; 16],
            tx_type_inter: [0; 16],
            txb_skip: [[0; 2]; TXB_SKIP_CTXS],
            dc_sign: [[0; 2]; DC_SIGN_CTXS],
            coeff_base: [0; COEFF_BASE_RANGE],
        };

        for ctx in 0..PART_CTXS {
            for sc in 0..PART_SIZE_CLASSES {
                let s = MIN_BLOCK_SIZE << sc;
                let mut probs = [0.0f64; PARTITION_SHAPES];
                probs[0] = [0.55, 0.40, 0.25][ctx] + 0.1 * qf;
                probs[1] = 0.10;
                probs[2] = 0.10;
                for p in probs.iter_mut().take(7).skip(3) {
                    *p = 0.025;
                }
                probs[7] = 0.02;
                probs[8] = 0.02;
                probs[9] = [0.12, 0.20, 0.32][ctx];
                let mut allowed = [0.0f64; PARTITION_SHAPES];
                for (i, a) in allowed.iter_mut().enumerate() {
                    let shape: Option<PartitionShape> = num_traits::FromPrimitive::from_usize(i);
                    if shape.map_or(false, |sh| sh.allowed_for(s)) {
                        *a = probs[i];
                    }
                }
                let sum: f64 = allowed.iter().sum();
                for i in 0..PARTITION_SHAPES {
                    r.partition[ctx][sc][i] = if allowed[i] == 0.0 || sum == allowed[0] {
                        0
                    } else {
                        prob_rate(allowed[i] / sum)
                    };
                }
            }
        }

        let pskip = 0.3 + 0.5 * qf;
        r.skip = [
            flag_rates(pskip * 0.6),
            flag_rates(pskip),
            flag_rates((pskip * 1.4).min(0.95)),
        ];
        r.is_inter = [flag_rates(0.85), flag_rates(0.6), flag_rates(0.25)];

        normalized_rates(&INTRA_MODE_PROBS, &mut r.y_mode);
        normalized_rates(&ANGLE_DELTA_PROBS, &mut r.angle_delta);
        normalized_rates(&UV_MODE_PROBS[..UV_INTRA_MODES - 1], &mut r.uv_mode[0]);
        normalized_rates(&UV_MODE_PROBS, &mut r.uv_mode[1]);
        r.uv_mode[0][UV_INTRA_MODES - 1] = u32::MAX >> 8;
        for (i, a) in r.cfl_alpha.iter_mut().enumerate() {
            let mag = (i as i32 - CFL_ALPHA_MAX as i32).abs() as u32;
            *a = (get_exp_golomb_bits(mag) + 1) << RATE_SHIFT;
        }

        normalized_rates(&INTER_MODE_PROBS, &mut r.inter_mode);
        for (i, v) in r.single_ref.iter_mut().enumerate() {
            let idx = i % MAX_REF_IDX;
            let list = i / MAX_REF_IDX;
            // list flag plus a truncated unary index
            *v = prob_rate(if list == 0 { 0.7 } else { 0.3 })
                + (idx as u32 + (idx + 1 < MAX_REF_IDX) as u32) * prob_rate(0.5);
        }
        r.comp_ref = flag_rates(0.2);
        for (i, d) in r.drl.iter_mut().enumerate() {
            *d = (i as u32 + 1).min(MAX_DRL as u32 - 1) * prob_rate(0.5);
        }
        r.interintra = flag_rates(0.15);
        normalized_rates(&INTERINTRA_MODE_PROBS, &mut r.interintra_mode);
        normalized_rates(&[0.05, 0.3, 0.3, 0.35], &mut r.mv_joint);

        r.tx_depth[0] = [prob_rate(0.7), prob_rate(0.3), u32::MAX >> 8];
        r.tx_depth[1] = [prob_rate(0.6), prob_rate(0.25), prob_rate(0.15)];
        for t in 0..16 {
            r.tx_type_intra[t] = if t == 0 { prob_rate(0.45) } else { prob_rate(0.55 / 15.0) };
            r.tx_type_inter[t] = if t == 0 { prob_rate(0.5) } else { prob_rate(0.5 / 15.0) };
        }

        let pz = 0.55 + 0.35 * qf;
        r.txb_skip = [flag_rates(pz * 0.7), flag_rates(pz)];
        r.dc_sign = [
            flag_rates(0.5),
            flag_rates(0.7), // mostly negative neighbors
            flag_rates(0.3),
        ];
        let nz = prob_rate(1.0 - pz);
        let cont = prob_rate(0.4);
        let stop = prob_rate(0.6);
        r.coeff_base[0] = prob_rate(pz);
        for l in 1..COEFF_BASE_RANGE {
            r.coeff_base[l] = nz + (l as u32 - 1) * cont + stop;
        }
        r
    }

    /// Rate of one quantized level; AC levels include their sign.
    #[inline]
    pub(crate) fn coeff_level_rate(&self, level: u32, is_dc: bool) -> u32 {
        let l = level as usize;
        let base = if l < COEFF_BASE_RANGE {
            self.coeff_base[l]
        } else {
            self.coeff_base[COEFF_BASE_RANGE - 1]
                + (get_exp_golomb_bits(level - COEFF_BASE_RANGE as u32 + 1) << RATE_SHIFT)
        };
        if l > 0 && !is_dc {
            base + (1 << RATE_SHIFT)
        } else {
            base
        }
    }

    /// Rate of a quantized transform block given in row-major order.
    pub(crate) fn coeff_rate(
        &self,
        qcoeff: &[i32],
        w: usize,
        h: usize,
        eob: usize,
        txb_skip_ctx: usize,
        dc_sign_ctx: usize,
    ) -> u64 {
        if eob == 0 {
            return self.txb_skip[txb_skip_ctx][1] as u64;
        }
        let scan = crate::tbl::get_scan(w, h);
        let mut rate = self.txb_skip[txb_skip_ctx][0] as u64;
        rate += ((crate::util::log2_floor(eob) as u64 * 2 + 1) << RATE_SHIFT) as u64;
        for (si, &pos) in scan.iter().take(eob).enumerate() {
            let v = qcoeff[pos as usize];
            rate += self.coeff_level_rate(v.abs() as u32, si == 0) as u64;
        }
        let dc = qcoeff[0];
        if dc != 0 {
            rate += self.dc_sign[dc_sign_ctx][(dc < 0) as usize] as u64;
        }
        rate
    }

    pub(crate) fn mv_rate(&self, mv: MotionVector, ref_mv: MotionVector) -> u32 {
        let d = mv - ref_mv;
        let joint = (d.col != 0) as usize | (((d.row != 0) as usize) << 1);
        let comp = |v: i16| if v == 0 { 0 } else { mv_comp_bits[(v as i32).abs() as usize] };
        self.mv_joint[joint] + comp(d.row) + comp(d.col)
    }

    pub(crate) fn intra_luma_rate(&self, mode: PredictionMode, angle_delta: i8) -> u32 {
        let mut r = self.y_mode[mode as usize];
        if mode.is_directional() {
            r += self.angle_delta[(angle_delta + MAX_ANGLE_DELTA) as usize];
        }
        r
    }

    pub(crate) fn intra_chroma_rate(
        &self,
        uv_mode: PredictionMode,
        uv_angle_delta: i8,
        cfl_allowed: bool,
        cfl_alpha: [i8; 2],
    ) -> u32 {
        let mut r = self.uv_mode[cfl_allowed as usize][uv_mode as usize];
        if uv_mode.is_directional() {
            r += self.angle_delta[(uv_angle_delta + MAX_ANGLE_DELTA) as usize];
        }
        if uv_mode == PredictionMode::UV_CFL_PRED {
            for &a in cfl_alpha.iter() {
                let a = a.max(-CFL_ALPHA_MAX).min(CFL_ALPHA_MAX);
                r += self.cfl_alpha[(a + CFL_ALPHA_MAX) as usize];
            }
        }
        r
    }

    pub(crate) fn partition_rate(&self, ctx: usize, sq_size: usize, shape: PartitionShape) -> u32 {
        let sc = crate::util::log2_floor(sq_size.max(MIN_BLOCK_SIZE)) - MIN_BLOCK_LOG2;
        self.partition[ctx.min(PART_CTXS - 1)][sc.min(PART_SIZE_CLASSES - 1)][shape as usize]
    }

    pub(crate) fn tx_depth_rate(&self, max_depth: usize, depth: usize) -> u32 {
        if max_depth == 0 {
            0
        } else {
            self.tx_depth[(max_depth > 1) as usize][depth.min(MAX_TX_DEPTH)]
        }
    }

    pub(crate) fn tx_type_rate(&self, tx_type: super::tq::TxType, is_inter: bool, group_len: usize) -> u32 {
        if group_len <= 1 {
            0
        } else if is_inter {
            self.tx_type_inter[tx_type as usize]
        } else {
            self.tx_type_intra[tx_type as usize]
        }
    }
}

/* contexts *******************************************************************/

/// Number of coded neighbors (above, left) smaller than the square.
pub(crate) fn partition_ctx(nbr: &NeighborArrays, x: usize, y: usize, sq_size: usize) -> usize {
    let log2 = crate::util::log2_floor(sq_size) as u8;
    let mut ctx = 0;
    if y > 0 {
        let a = nbr.mode_info.read_top(x);
        if a.coded && a.log2_w < log2 {
            ctx += 1;
        }
    }
    if x > 0 {
        let l = nbr.mode_info.read_left(y);
        if l.coded && l.log2_h < log2 {
            ctx += 1;
        }
    }
    ctx
}

pub(crate) fn skip_ctx(nbr: &NeighborArrays, x: usize, y: usize) -> usize {
    let mut ctx = 0;
    if y > 0 && nbr.mode_info.read_top(x).skip {
        ctx += 1;
    }
    if x > 0 && nbr.mode_info.read_left(y).skip {
        ctx += 1;
    }
    ctx
}

/// Number of coded intra neighbors.
pub(crate) fn is_inter_ctx(nbr: &NeighborArrays, x: usize, y: usize) -> usize {
    let mut ctx = 0;
    if y > 0 {
        let a = nbr.mode_info.read_top(x);
        if a.coded && !a.is_inter {
            ctx += 1;
        }
    }
    if x > 0 {
        let l = nbr.mode_info.read_left(y);
        if l.coded && !l.is_inter {
            ctx += 1;
        }
    }
    ctx
}

/// Sign of the summed DC levels along the block edges: 0 none, 1 negative, 2 positive.
pub(crate) fn dc_sign_ctx(nbr: &NeighborArrays, plane: usize, x: usize, y: usize, w: usize, h: usize) -> usize {
    let arr = &nbr.dc_sign[plane];
    let mut sum = 0i32;
    if y > 0 {
        sum += arr.top_slice(x, (w >> MI_SIZE_LOG2).max(1)).iter().map(|&v| v as i32).sum::<i32>();
    }
    if x > 0 {
        sum += arr.left_slice(y, (h >> MI_SIZE_LOG2).max(1)).iter().map(|&v| v as i32).sum::<i32>();
    }
    if sum < 0 {
        1
    } else if sum > 0 {
        2
    } else {
        0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::def::PredictionMode::*;

    #[test]
    fn entropy_costs() {
        assert_eq!(prob_rate(0.5), 512);
        assert!(prob_rate(0.25) > prob_rate(0.5));
        assert_eq!(prob_rate(0.25), 1024);
        assert_eq!(prob_rate(0.125), 3 << RATE_SHIFT);
        assert!(prob_rate(0.0) > prob_rate(1.0 / 1024.0));
        assert_eq!(get_exp_golomb_bits(0), 1);
        assert_eq!(get_exp_golomb_bits(1), 4);
    }

    #[test]
    fn rdcost_weights_distortion() {
        assert_eq!(RDCOST(1 << RATE_SHIFT, 10, 0), 10);
        assert_eq!(RDCOST(0, 1000, 3), 3 << RDDIV_BITS);
        assert_eq!(RDCOST(u64::MAX, u64::MAX, 0), u64::MAX >> RATE_SHIFT);
        assert!(full_lambda(200) > full_lambda(50));
        assert!(fast_lambda(200) > fast_lambda(50));
    }

    #[test]
    fn horizontal_is_cheaper_than_rivals() {
        let r = MdRateEstimation::new(100);
        assert!(r.intra_luma_rate(H_PRED, 0) < r.intra_luma_rate(PAETH_PRED, 0));
        assert!(r.intra_luma_rate(H_PRED, 0) < r.intra_luma_rate(SMOOTH_H_PRED, 0));
        assert!(r.intra_luma_rate(H_PRED, 0) < r.intra_luma_rate(H_PRED, 2));
        for &m in &[V_PRED, H_PRED] {
            assert!(r.intra_luma_rate(m, 0) < r.intra_luma_rate(PAETH_PRED, 0), "{:?}", m);
        }
    }

    #[test]
    fn partition_rates_follow_size() {
        let r = MdRateEstimation::new(100);
        // an 8x8 square has no other choice
        assert_eq!(r.partition_rate(0, 8, PartitionShape::PARTITION_NONE), 0);
        assert!(r.partition_rate(0, 64, PartitionShape::PARTITION_NONE) > 0);
        assert!(
            r.partition_rate(2, 64, PartitionShape::PARTITION_SPLIT)
                < r.partition_rate(0, 64, PartitionShape::PARTITION_SPLIT)
        );
    }

    #[test]
    fn coefficient_rates() {
        let r = MdRateEstimation::new(100);
        let mut q = vec![0i32; 16];
        assert_eq!(r.coeff_rate(&q, 4, 4, 0, 1, 0), r.txb_skip[1][1] as u64);
        q[0] = -3;
        let one = r.coeff_rate(&q, 4, 4, 1, 1, 0);
        q[4] = 1;
        let two = r.coeff_rate(&q, 4, 4, 2, 1, 0);
        assert!(two > one);
        assert!(r.coeff_level_rate(5, false) > r.coeff_level_rate(1, false));
        assert!(r.coeff_level_rate(40, false) > r.coeff_level_rate(14, false));
    }

    #[test]
    fn mv_rates() {
        let r = MdRateEstimation::new(100);
        let z = MotionVector::zero();
        assert_eq!(r.mv_rate(z, z), r.mv_joint[0]);
        assert!(r.mv_rate(MotionVector::new(64, 0), z) > r.mv_rate(MotionVector::new(8, 0), z));
    }
}
