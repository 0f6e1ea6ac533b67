//! Kernels exposed for the criterion benches.

use crate::def::pel;
use crate::enc::dist::sad_16b;
use crate::enc::tq::{fwd_txfm2d, inv_txfm2d_add, TxType};

pub fn sad(w: usize, h: usize, src: &[pel], s_src: usize, pred: &[pel], s_pred: usize) -> u64 {
    sad_16b(w, h, src, s_src, pred, s_pred)
}

/// Forward then inverse DCT of a `w`x`h` residual on top of `pred`.
pub fn dct_round_trip(residual: &[i32], coeff: &mut [i32], pred: &[pel], recon: &mut [pel], w: usize, h: usize) {
    fwd_txfm2d(residual, w, coeff, w, h, TxType::DCT_DCT);
    inv_txfm2d_add(coeff, w, h, TxType::DCT_DCT, pred, w, recon, w, 8);
}
