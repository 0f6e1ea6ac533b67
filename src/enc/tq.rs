use super::rate::*;
use crate::def::*;
use crate::tbl::*;
use crate::util::*;

use num_derive::FromPrimitive;

/* precision of the transform bases */
const TX_BASIS_BITS: u32 = 12;
/* precision of the quantizer rounding offset */
const QUANT_RND_BITS: u32 = 6;
const QUANT_RND_INTRA: i64 = 21; // 1/3
const QUANT_RND_INTER: i64 = 11; // 1/6

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tx1d {
    Dct,
    Adst,
    FlipAdst,
    Idtx,
}

/// 2D transform type; the first component is vertical, the second horizontal.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum TxType {
    DCT_DCT = 0,
    ADST_DCT,
    DCT_ADST,
    ADST_ADST,
    FLIPADST_DCT,
    DCT_FLIPADST,
    FLIPADST_FLIPADST,
    ADST_FLIPADST,
    FLIPADST_ADST,
    IDTX,
    V_DCT,
    H_DCT,
    V_ADST,
    H_ADST,
    V_FLIPADST,
    H_FLIPADST,
}

pub(crate) const TX_TYPES: usize = 16;

use self::TxType::*;

impl Default for TxType {
    fn default() -> Self {
        DCT_DCT
    }
}

impl TxType {
    pub(crate) fn components(self) -> (Tx1d, Tx1d) {
        use self::Tx1d::*;
        match self {
            DCT_DCT => (Dct, Dct),
            ADST_DCT => (Adst, Dct),
            DCT_ADST => (Dct, Adst),
            ADST_ADST => (Adst, Adst),
            FLIPADST_DCT => (FlipAdst, Dct),
            DCT_FLIPADST => (Dct, FlipAdst),
            FLIPADST_FLIPADST => (FlipAdst, FlipAdst),
            ADST_FLIPADST => (Adst, FlipAdst),
            FLIPADST_ADST => (FlipAdst, Adst),
            IDTX => (Idtx, Idtx),
            V_DCT => (Dct, Idtx),
            H_DCT => (Idtx, Dct),
            V_ADST => (Adst, Idtx),
            H_ADST => (Idtx, Adst),
            V_FLIPADST => (FlipAdst, Idtx),
            H_FLIPADST => (Idtx, FlipAdst),
        }
    }
}

const TX_SET_DCT_ONLY: [TxType; 1] = [DCT_DCT];
const TX_SET_DCT_IDTX: [TxType; 2] = [DCT_DCT, IDTX];
const TX_SET_INTRA_REDUCED: [TxType; 4] = [DCT_DCT, ADST_DCT, DCT_ADST, ADST_ADST];
const TX_SET_INTER_REDUCED: [TxType; 6] = [DCT_DCT, ADST_DCT, DCT_ADST, ADST_ADST, IDTX, V_DCT];
const TX_SET_INTRA_FULL: [TxType; 7] = [
    DCT_DCT, ADST_DCT, DCT_ADST, ADST_ADST, IDTX, V_DCT, H_DCT,
];
const TX_SET_ALL: [TxType; TX_TYPES] = [
    DCT_DCT,
    ADST_DCT,
    DCT_ADST,
    ADST_ADST,
    FLIPADST_DCT,
    DCT_FLIPADST,
    FLIPADST_FLIPADST,
    ADST_FLIPADST,
    FLIPADST_ADST,
    IDTX,
    V_DCT,
    H_DCT,
    V_ADST,
    H_ADST,
    V_FLIPADST,
    H_FLIPADST,
];

/// Transform types tried for a transform block.
pub(crate) fn tx_type_group(
    level: crate::api::TxTypeSearchLevel,
    w: usize,
    h: usize,
    is_inter: bool,
) -> &'static [TxType] {
    use crate::api::TxTypeSearchLevel::*;
    let max_side = w.max(h);
    if max_side >= 64 || level == DctOnly {
        return &TX_SET_DCT_ONLY;
    }
    if max_side == 32 {
        return if is_inter { &TX_SET_DCT_IDTX } else { &TX_SET_DCT_ONLY };
    }
    match (level, is_inter) {
        (Reduced, false) => &TX_SET_INTRA_REDUCED,
        (Reduced, true) => &TX_SET_INTER_REDUCED,
        (_, false) => &TX_SET_INTRA_FULL,
        (_, true) => {
            if max_side == 16 {
                &TX_SET_ALL[..12]
            } else {
                &TX_SET_ALL
            }
        }
    }
}

fn build_basis(n: usize, kind: Tx1d) -> Box<[i32]> {
    let mut b = vec![0i32; n * n].into_boxed_slice();
    let scale = (1 << TX_BASIS_BITS) as f64;
    let nf = n as f64;
    for k in 0..n {
        for i in 0..n {
            let v = match kind {
                Tx1d::Dct => {
                    let c = if k == 0 { (1.0 / nf).sqrt() } else { (2.0 / nf).sqrt() };
                    c * (std::f64::consts::PI * (2 * i + 1) as f64 * k as f64 / (2.0 * nf)).cos()
                }
                Tx1d::Adst | Tx1d::FlipAdst => {
                    // DST-VII
                    let c = 2.0 / (2.0 * nf + 1.0).sqrt();
                    c * (std::f64::consts::PI * (2 * k + 1) as f64 * (i + 1) as f64 / (2.0 * nf + 1.0)).sin()
                }
                Tx1d::Idtx => {
                    if i == k {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            b[k * n + i] = (v * scale).round() as i32;
        }
    }
    b
}

lazy_static! {
    /* orthonormal bases indexed by log2(n) - 2, row k holds basis function k */
    static ref dct_basis_tbl: Vec<Box<[i32]>> = (2..=6).map(|l| build_basis(1 << l, Tx1d::Dct)).collect();
    static ref adst_basis_tbl: Vec<Box<[i32]>> = (2..=6).map(|l| build_basis(1 << l, Tx1d::Adst)).collect();
}

fn basis(n: usize, kind: Tx1d) -> Option<&'static [i32]> {
    let i = log2_floor(n) - 2;
    match kind {
        Tx1d::Dct => Some(&dct_basis_tbl[i]),
        Tx1d::Adst | Tx1d::FlipAdst => Some(&adst_basis_tbl[i]),
        Tx1d::Idtx => None,
    }
}

fn fwd_1d(input: &[i64], output: &mut [i64], n: usize, kind: Tx1d) {
    let shift = TX_BASIS_BITS;
    match basis(n, kind) {
        None => output[..n].copy_from_slice(&input[..n]),
        Some(b) => {
            for k in 0..n {
                let row = &b[k * n..(k + 1) * n];
                let mut acc = 0i64;
                for i in 0..n {
                    let x = if kind == Tx1d::FlipAdst { input[n - 1 - i] } else { input[i] };
                    acc += row[i] as i64 * x;
                }
                output[k] = round_shift(acc, shift);
            }
        }
    }
}

fn inv_1d(input: &[i64], output: &mut [i64], n: usize, kind: Tx1d) {
    let shift = TX_BASIS_BITS;
    match basis(n, kind) {
        None => output[..n].copy_from_slice(&input[..n]),
        Some(b) => {
            for i in 0..n {
                let mut acc = 0i64;
                for k in 0..n {
                    acc += b[k * n + i] as i64 * input[k];
                }
                let o = if kind == Tx1d::FlipAdst { n - 1 - i } else { i };
                output[o] = round_shift(acc, shift);
            }
        }
    }
}

/// Forward 2D transform of a `w`x`h` residual into `coeff` (row-major, stride `w`).
/// Coefficients outside the coded 32x32 area of 64-point transforms are zeroed.
pub(crate) fn fwd_txfm2d(residual: &[i32], s_res: usize, coeff: &mut [i32], w: usize, h: usize, tx_type: TxType) {
    let (vtx, htx) = tx_type.components();
    let mut tmp = vec![0i64; w * h];
    let mut line_in = vec![0i64; w.max(h)];
    let mut line_out = vec![0i64; w.max(h)];
    for r in 0..h {
        for c in 0..w {
            line_in[c] = residual[r * s_res + c] as i64;
        }
        fwd_1d(&line_in, &mut line_out, w, htx);
        tmp[r * w..r * w + w].copy_from_slice(&line_out[..w]);
    }
    for c in 0..w {
        for r in 0..h {
            line_in[r] = tmp[r * w + c];
        }
        fwd_1d(&line_in, &mut line_out, h, vtx);
        for r in 0..h {
            coeff[r * w + c] = line_out[r] as i32;
        }
    }
    if w > MAX_TX_CODED || h > MAX_TX_CODED {
        for r in 0..h {
            for c in 0..w {
                if r >= MAX_TX_CODED || c >= MAX_TX_CODED {
                    coeff[r * w + c] = 0;
                }
            }
        }
    }
}

/// Inverse 2D transform of `coeff`, added to `pred` and written to `recon`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn inv_txfm2d_add(
    coeff: &[i32],
    w: usize,
    h: usize,
    tx_type: TxType,
    pred: &[pel],
    s_pred: usize,
    recon: &mut [pel],
    s_recon: usize,
    bit_depth: usize,
) {
    let (vtx, htx) = tx_type.components();
    let mut tmp = vec![0i64; w * h];
    let mut line_in = vec![0i64; w.max(h)];
    let mut line_out = vec![0i64; w.max(h)];
    for c in 0..w {
        for r in 0..h {
            line_in[r] = coeff[r * w + c] as i64;
        }
        inv_1d(&line_in, &mut line_out, h, vtx);
        for r in 0..h {
            tmp[r * w + c] = line_out[r];
        }
    }
    for r in 0..h {
        line_in[..w].copy_from_slice(&tmp[r * w..r * w + w]);
        inv_1d(&line_in, &mut line_out, w, htx);
        for c in 0..w {
            let v = pred[r * s_pred + c] as i32 + line_out[c] as i32;
            recon[r * s_recon + c] = clip_pel(v, bit_depth);
        }
    }
}

/// Quantizer of one plane at one qindex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct QuantParams {
    /* steps in Q3 */
    pub(crate) dc_q: u32,
    pub(crate) ac_q: u32,
    pub(crate) bit_depth: usize,
}

impl QuantParams {
    pub(crate) fn new(qindex: u8, bit_depth: usize) -> Self {
        QuantParams {
            dc_q: dc_q(qindex, bit_depth).max(1),
            ac_q: ac_q(qindex, bit_depth).max(1),
            bit_depth,
        }
    }

    #[inline]
    fn step(&self, pos: usize) -> i64 {
        if pos == 0 {
            self.dc_q as i64
        } else {
            self.ac_q as i64
        }
    }
}

#[inline]
fn quant_level(c: i32, q: i64, rnd: i64) -> i32 {
    let a = (c as i64).abs();
    let level = (((a << (3 + QUANT_RND_BITS)) / q) + rnd) >> QUANT_RND_BITS;
    level as i32
}

#[inline]
fn dequant_level(level: i32, q: i64) -> i32 {
    ((level as i64 * q + 4) >> 3) as i32
}

/// Scalar quantization in scan order; returns the end of block.
pub(crate) fn quantize(
    coeff: &[i32],
    qcoeff: &mut [i32],
    w: usize,
    h: usize,
    qp: &QuantParams,
    is_intra: bool,
) -> usize {
    let scan = get_scan(w, h);
    let rnd = if is_intra { QUANT_RND_INTRA } else { QUANT_RND_INTER };
    for v in qcoeff[..w * h].iter_mut() {
        *v = 0;
    }
    let mut eob = 0;
    for (si, &pos) in scan.iter().enumerate() {
        let pos = pos as usize;
        let c = coeff[pos];
        let l = quant_level(c, qp.step(pos), rnd);
        if l != 0 {
            qcoeff[pos] = if c < 0 { -l } else { l };
            eob = si + 1;
        }
    }
    eob
}

pub(crate) fn dequantize(qcoeff: &[i32], dqcoeff: &mut [i32], w: usize, h: usize, qp: &QuantParams) {
    for pos in 0..w * h {
        let l = qcoeff[pos];
        dqcoeff[pos] = if l == 0 {
            0
        } else if l < 0 {
            -dequant_level(-l, qp.step(pos))
        } else {
            dequant_level(l, qp.step(pos))
        };
    }
}

/// Squared error between coefficients and their dequantized values, 8-bit scale.
pub(crate) fn transform_domain_distortion(coeff: &[i32], dqcoeff: &[i32], n: usize, bit_depth: usize) -> u64 {
    let mut d = 0u64;
    for i in 0..n {
        let e = coeff[i] as i64 - dqcoeff[i] as i64;
        d += (e * e) as u64;
    }
    super::dist::scale_distortion(d, bit_depth)
}

/// Rate-distortion optimized requantization: every level may drop by one
/// when that lowers `dist + lambda * rate`. Returns the new end of block.
#[allow(clippy::too_many_arguments)]
pub(crate) fn rdoq(
    coeff: &[i32],
    qcoeff: &mut [i32],
    w: usize,
    h: usize,
    eob: usize,
    qp: &QuantParams,
    lambda: u64,
    rates: &MdRateEstimation,
) -> usize {
    let scan = get_scan(w, h);
    let dshift = 2 * (qp.bit_depth - 8) as u32;
    let mut new_eob = 0;
    for si in 0..eob {
        let pos = scan[si] as usize;
        let l = qcoeff[pos].abs();
        if l == 0 {
            continue;
        }
        let c = (coeff[pos] as i64).abs();
        let q = qp.step(pos);
        let cost_of = |level: i32| -> u64 {
            let rec = if level == 0 { 0 } else { dequant_level(level, q) as i64 };
            let e = c - rec;
            let d = round_shift_u64((e * e) as u64, dshift);
            RDCOST(lambda, rates.coeff_level_rate(level as u32, si == 0) as u64, d)
        };
        let keep = cost_of(l);
        let lower = cost_of(l - 1);
        if lower < keep {
            let nl = l - 1;
            qcoeff[pos] = if coeff[pos] < 0 { -nl } else { nl };
        }
        if qcoeff[pos] != 0 {
            new_eob = si + 1;
        }
    }
    new_eob
}

pub(crate) fn count_nonzero(qcoeff: &[i32]) -> u32 {
    qcoeff.iter().filter(|&&v| v != 0).count() as u32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::TxTypeSearchLevel;
    use interpolate_name::interpolate_test;

    fn roundtrip(w: usize, h: usize, tx_type: TxType) {
        let mut residual = vec![0i32; w * h];
        for (i, r) in residual.iter_mut().enumerate() {
            *r = ((i * 37 + 11) % 61) as i32 - 30;
        }
        let mut coeff = vec![0i32; w * h];
        fwd_txfm2d(&residual, w, &mut coeff, w, h, tx_type);
        let pred = vec![512u16; w * h];
        let mut recon = vec![0u16; w * h];
        inv_txfm2d_add(&coeff, w, h, tx_type, &pred, w, &mut recon, w, 10);
        for i in 0..w * h {
            let got = recon[i] as i32 - 512;
            assert!((got - residual[i]).abs() <= 1, "{:?} {}x{} at {}", tx_type, w, h, i);
        }
    }

    #[interpolate_test(dct_4x4, 4, 4, TxType::DCT_DCT)]
    #[interpolate_test(adst_8x8, 8, 8, TxType::ADST_ADST)]
    #[interpolate_test(flip_16x8, 16, 8, TxType::FLIPADST_DCT)]
    #[interpolate_test(idtx_8x32, 8, 32, TxType::IDTX)]
    #[interpolate_test(hdct_16x4, 16, 4, TxType::H_DCT)]
    fn transform_roundtrip(w: usize, h: usize, tx_type: TxType) {
        roundtrip(w, h, tx_type);
    }

    #[test]
    fn dc_of_flat_block() {
        let residual = vec![10i32; 64];
        let mut coeff = vec![0i32; 64];
        fwd_txfm2d(&residual, 8, &mut coeff, 8, 8, DCT_DCT);
        // orthonormal: DC = mean * sqrt(N)
        assert!((coeff[0] - 80).abs() <= 1);
        assert!(coeff[1..].iter().all(|&c| c.abs() <= 1));
    }

    #[test]
    fn large_transforms_zero_out_high_frequencies() {
        let residual: Vec<i32> = (0..64 * 64).map(|i| ((i * 7) % 13) as i32 - 6).collect();
        let mut coeff = vec![0i32; 64 * 64];
        fwd_txfm2d(&residual, 64, &mut coeff, 64, 64, DCT_DCT);
        for r in 0..64 {
            for c in 0..64 {
                if r >= 32 || c >= 32 {
                    assert_eq!(coeff[r * 64 + c], 0);
                }
            }
        }
    }

    #[test]
    fn quantize_dequantize() {
        let qp = QuantParams::new(0, 8);
        let mut coeff = vec![0i32; 16];
        coeff[0] = 40;
        coeff[5] = -9;
        let mut q = vec![0i32; 16];
        let eob = quantize(&coeff, &mut q, 4, 4, &qp, true);
        assert!(q[0] > 0 && q[5] < 0);
        let scan = get_scan(4, 4);
        let last = scan.iter().position(|&p| p == 5).unwrap();
        assert_eq!(eob, last + 1);
        let mut dq = vec![0i32; 16];
        dequantize(&q, &mut dq, 4, 4, &qp);
        assert!((dq[0] - 40).abs() <= 1);
        assert!((dq[5] + 9).abs() <= 1);
    }

    #[test]
    fn zero_residual_gives_no_coefficients() {
        let residual = vec![0i32; 256];
        let mut coeff = vec![0i32; 256];
        fwd_txfm2d(&residual, 16, &mut coeff, 16, 16, ADST_ADST);
        let mut q = vec![0i32; 256];
        let qp = QuantParams::new(120, 8);
        assert_eq!(quantize(&coeff, &mut q, 16, 16, &qp, false), 0);
        assert_eq!(count_nonzero(&q), 0);
    }

    #[test]
    fn rdoq_never_raises_levels() {
        let rates = MdRateEstimation::new(100);
        let qp = QuantParams::new(100, 8);
        let coeff: Vec<i32> = (0..64).map(|i| if i % 3 == 0 { 300 - 4 * i } else { 7 }).collect();
        let mut q = vec![0i32; 64];
        let eob = quantize(&coeff, &mut q, 8, 8, &qp, false);
        let before = q.clone();
        let lambda = full_lambda(100);
        let new_eob = rdoq(&coeff, &mut q, 8, 8, eob, &qp, lambda, &rates);
        assert!(new_eob <= eob);
        for i in 0..64 {
            assert!(q[i].abs() <= before[i].abs());
        }
    }

    #[test]
    fn type_groups() {
        assert_eq!(tx_type_group(TxTypeSearchLevel::Full, 64, 16, false), &[DCT_DCT]);
        assert_eq!(tx_type_group(TxTypeSearchLevel::DctOnly, 8, 8, true), &[DCT_DCT]);
        assert_eq!(tx_type_group(TxTypeSearchLevel::Full, 8, 8, true).len(), TX_TYPES);
        assert!(tx_type_group(TxTypeSearchLevel::Reduced, 4, 8, false).contains(&ADST_ADST));
        assert_eq!(tx_type_group(TxTypeSearchLevel::Full, 32, 32, true), &[DCT_DCT, IDTX]);
    }
}
