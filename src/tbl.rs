use crate::def::*;

const QINDEX_RANGE: usize = 256;

/* end points of the AV1 8-bit quantizer lookups */
const AC_Q_MIN: f64 = 4.0;
const AC_Q_MAX: f64 = 1828.0;
const DC_Q_MIN: f64 = 4.0;
const DC_Q_MAX: f64 = 1336.0;

fn build_q_lookup(min: f64, max: f64, scale: f64) -> Box<[u32]> {
    let mut tbl = vec![0u32; QINDEX_RANGE].into_boxed_slice();
    for (q, v) in tbl.iter_mut().enumerate() {
        let t = q as f64 / (QINDEX_RANGE - 1) as f64;
        *v = (min * (max / min).powf(t) * scale).round() as u32;
    }
    tbl
}

fn build_scan(w: usize, h: usize) -> Box<[u16]> {
    // up-right diagonal scan over the coded area, indices into a row-major w-stride block
    let cw = w.min(MAX_TX_CODED);
    let ch = h.min(MAX_TX_CODED);
    let mut scan = Vec::with_capacity(cw * ch);
    for d in 0..(cw + ch - 1) {
        for r in (0..ch).rev() {
            if d < r {
                continue;
            }
            let c = d - r;
            if c < cw {
                scan.push((r * w + c) as u16);
            }
        }
    }
    scan.into_boxed_slice()
}

fn build_smooth_weights(n: usize) -> Box<[u16]> {
    let mut tbl = vec![0u16; n].into_boxed_slice();
    for (i, v) in tbl.iter_mut().enumerate() {
        let d = (n - i) as f64 / n as f64;
        let w = 255.0 * d * d;
        *v = w.round().max((256 / n) as f64) as u16;
    }
    tbl[0] = 255;
    tbl
}

lazy_static! {
    /* quantizer step (Q3) indexed by qindex, 8-bit and 10-bit */
    pub(crate) static ref ac_q_tbl: [Box<[u32]>; 2] = [
        build_q_lookup(AC_Q_MIN, AC_Q_MAX, 1.0),
        build_q_lookup(AC_Q_MIN, AC_Q_MAX, 4.0),
    ];
    pub(crate) static ref dc_q_tbl: [Box<[u32]>; 2] = [
        build_q_lookup(DC_Q_MIN, DC_Q_MAX, 1.0),
        build_q_lookup(DC_Q_MIN, DC_Q_MAX, 4.0),
    ];

    /* scan orders indexed by scan_idx(w, h) */
    pub(crate) static ref scan_tbl: Vec<Box<[u16]>> = {
        let mut v = Vec::with_capacity(25);
        for lw in 2..=6 {
            for lh in 2..=6 {
                v.push(build_scan(1 << lw, 1 << lh));
            }
        }
        v
    };

    /* smooth predictor weights for sides 4..64, indexed by log2(side) - 2 */
    pub(crate) static ref sm_weights_tbl: Vec<Box<[u16]>> =
        (2..=6).map(|l| build_smooth_weights(1 << l)).collect();

    /* 64 / tan(angle) for angles 1..=89 degrees, index 0 unused */
    pub(crate) static ref dr_intra_derivative: [u16; 90] = {
        let mut t = [0u16; 90];
        for a in 1..90 {
            let rad = (a as f64).to_radians();
            t[a] = (64.0 / rad.tan()).round().min(1023.0) as u16;
        }
        t
    };
}

#[inline]
pub(crate) fn scan_idx(w: usize, h: usize) -> usize {
    let lw = crate::util::log2_floor(w) - 2;
    let lh = crate::util::log2_floor(h) - 2;
    lw * 5 + lh
}

#[inline]
pub(crate) fn get_scan(w: usize, h: usize) -> &'static [u16] {
    &scan_tbl[scan_idx(w, h)]
}

#[inline]
pub(crate) fn ac_q(qindex: u8, bit_depth: usize) -> u32 {
    ac_q_tbl[(bit_depth > 8) as usize][qindex as usize]
}

#[inline]
pub(crate) fn dc_q(qindex: u8, bit_depth: usize) -> u32 {
    dc_q_tbl[(bit_depth > 8) as usize][qindex as usize]
}

#[inline]
pub(crate) fn sm_weights(n: usize) -> &'static [u16] {
    &sm_weights_tbl[crate::util::log2_floor(n) - 2]
}
