use super::def::*;
use super::enc::neighbor::NeighborArrayUnit;
use super::tbl::*;
use super::util::*;

use crate::def::PredictionMode::*;

/// Reference samples around an intra block.
///
/// `above` and `left` hold `w + h` samples each plus one replicated guard;
/// index -1 of both is `top_left`.
#[derive(Clone, Debug, Default)]
pub(crate) struct IntraEdges {
    pub(crate) above: Vec<pel>,
    pub(crate) left: Vec<pel>,
    pub(crate) top_left: pel,
    pub(crate) have_top: bool,
    pub(crate) have_left: bool,
}

/// Where the block sits, for neighbor availability.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeAvail {
    pub(crate) pic_w: usize,
    /* the block's top edge is the top edge of its superblock */
    pub(crate) sb_top: bool,
}

impl IntraEdges {
    #[inline]
    fn a(&self, i: isize) -> i32 {
        if i < 0 {
            self.top_left as i32
        } else {
            self.above[(i as usize).min(self.above.len() - 1)] as i32
        }
    }

    #[inline]
    fn l(&self, i: isize) -> i32 {
        if i < 0 {
            self.top_left as i32
        } else {
            self.left[(i as usize).min(self.left.len() - 1)] as i32
        }
    }
}

/// Gathers the edges of the `w`x`h` block at (`x`, `y`) from a reconstruction
/// neighbor array of one plane.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_intra_edges(
    nbr: &NeighborArrayUnit<pel>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    avail: EdgeAvail,
    bit_depth: usize,
    edges: &mut IntraEdges,
) {
    let n = w + h + 1;
    let base = 1i32 << (bit_depth - 1);
    edges.have_top = y > 0;
    edges.have_left = x > 0;
    reset_buf(&mut edges.above, n);
    reset_buf(&mut edges.left, n);

    if edges.have_top {
        for i in 0..w {
            edges.above[i] = nbr.read_top(x + i);
        }
        // above-right exists only above the superblock row
        let tr = if avail.sb_top && x + w < avail.pic_w {
            (avail.pic_w - x - w).min(w)
        } else {
            0
        };
        for i in w..w + tr {
            edges.above[i] = nbr.read_top(x + i);
        }
        let last = edges.above[w + tr - 1];
        for v in edges.above[w + tr..].iter_mut() {
            *v = last;
        }
    }
    if edges.have_left {
        for j in 0..h {
            edges.left[j] = nbr.read_left(y + j);
        }
        // bottom-left is never coded yet
        let last = edges.left[h - 1];
        for v in edges.left[h..].iter_mut() {
            *v = last;
        }
    }

    match (edges.have_top, edges.have_left) {
        (true, true) => edges.top_left = nbr.read_top_left(x, y),
        (true, false) => {
            edges.top_left = edges.above[0];
            let v = edges.above[0];
            edges.left.iter_mut().for_each(|s| *s = v);
        }
        (false, true) => {
            edges.top_left = edges.left[0];
            let v = edges.left[0];
            edges.above.iter_mut().for_each(|s| *s = v);
        }
        (false, false) => {
            edges.top_left = base as pel;
            edges.above.iter_mut().for_each(|s| *s = (base - 1) as pel);
            edges.left.iter_mut().for_each(|s| *s = (base + 1) as pel);
        }
    }
}

/// Predicts a `w`x`h` block into `dst` (stride `w`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn intra_predict(
    edges: &IntraEdges,
    mode: PredictionMode,
    angle_delta: i8,
    dst: &mut [pel],
    w: usize,
    h: usize,
    bit_depth: usize,
) {
    match mode {
        DC_PRED | UV_CFL_PRED => ipred_dc(edges, dst, w, h, bit_depth),
        SMOOTH_PRED => ipred_smooth(edges, dst, w, h),
        SMOOTH_V_PRED => ipred_smooth_v(edges, dst, w, h),
        SMOOTH_H_PRED => ipred_smooth_h(edges, dst, w, h),
        PAETH_PRED => ipred_paeth(edges, dst, w, h),
        _ => {
            let p_angle = mode.base_angle() + angle_delta as i16 * ANGLE_STEP;
            ipred_directional(edges, p_angle, dst, w, h);
        }
    }
}

fn ipred_dc(e: &IntraEdges, dst: &mut [pel], w: usize, h: usize, bit_depth: usize) {
    let sum_top: u32 = e.above[..w].iter().map(|&v| v as u32).sum();
    let sum_left: u32 = e.left[..h].iter().map(|&v| v as u32).sum();
    let dc = match (e.have_top, e.have_left) {
        (true, true) => (sum_top + sum_left + ((w + h) as u32 >> 1)) / (w + h) as u32,
        (true, false) => (sum_top + (w as u32 >> 1)) / w as u32,
        (false, true) => (sum_left + (h as u32 >> 1)) / h as u32,
        (false, false) => 1 << (bit_depth - 1),
    } as pel;
    for v in dst[..w * h].iter_mut() {
        *v = dc;
    }
}

fn ipred_smooth(e: &IntraEdges, dst: &mut [pel], w: usize, h: usize) {
    let wx = sm_weights(w);
    let wy = sm_weights(h);
    let bottom_left = e.left[h - 1] as u32;
    let top_right = e.above[w - 1] as u32;
    for r in 0..h {
        for c in 0..w {
            let p = wy[r] as u32 * e.above[c] as u32
                + (256 - wy[r] as u32) * bottom_left
                + wx[c] as u32 * e.left[r] as u32
                + (256 - wx[c] as u32) * top_right;
            dst[r * w + c] = ((p + 256) >> 9) as pel;
        }
    }
}

fn ipred_smooth_v(e: &IntraEdges, dst: &mut [pel], w: usize, h: usize) {
    let wy = sm_weights(h);
    let bottom_left = e.left[h - 1] as u32;
    for r in 0..h {
        for c in 0..w {
            let p = wy[r] as u32 * e.above[c] as u32 + (256 - wy[r] as u32) * bottom_left;
            dst[r * w + c] = ((p + 128) >> 8) as pel;
        }
    }
}

fn ipred_smooth_h(e: &IntraEdges, dst: &mut [pel], w: usize, h: usize) {
    let wx = sm_weights(w);
    let top_right = e.above[w - 1] as u32;
    for r in 0..h {
        for c in 0..w {
            let p = wx[c] as u32 * e.left[r] as u32 + (256 - wx[c] as u32) * top_right;
            dst[r * w + c] = ((p + 128) >> 8) as pel;
        }
    }
}

fn ipred_paeth(e: &IntraEdges, dst: &mut [pel], w: usize, h: usize) {
    let tl = e.top_left as i32;
    for r in 0..h {
        let left = e.left[r] as i32;
        for c in 0..w {
            let top = e.above[c] as i32;
            let base = top + left - tl;
            let p_left = (base - left).abs();
            let p_top = (base - top).abs();
            let p_tl = (base - tl).abs();
            dst[r * w + c] = if p_left <= p_top && p_left <= p_tl {
                left
            } else if p_top <= p_tl {
                top
            } else {
                tl
            } as pel;
        }
    }
}

#[inline]
fn interp(a: i32, b: i32, shift: i32) -> pel {
    ((a * (32 - shift) + b * shift + 16) >> 5) as pel
}

fn ipred_directional(e: &IntraEdges, p_angle: i16, dst: &mut [pel], w: usize, h: usize) {
    if p_angle == 90 {
        for r in 0..h {
            dst[r * w..(r + 1) * w].copy_from_slice(&e.above[..w]);
        }
    } else if p_angle == 180 {
        for r in 0..h {
            let v = e.left[r];
            dst[r * w..(r + 1) * w].iter_mut().for_each(|s| *s = v);
        }
    } else if p_angle < 90 {
        // zone 1: above row only
        let dx = dr_intra_derivative[p_angle as usize] as isize;
        let max_base_x = (w + h - 1) as isize;
        for r in 0..h {
            let x = (r as isize + 1) * dx;
            let shift = ((x & 0x3f) >> 1) as i32;
            let mut base = x >> 6;
            for c in 0..w {
                dst[r * w + c] = if base < max_base_x {
                    interp(e.a(base), e.a(base + 1), shift)
                } else {
                    e.a(max_base_x) as pel
                };
                base += 1;
            }
        }
    } else if p_angle < 180 {
        // zone 2: above row and left column
        let dx = dr_intra_derivative[(180 - p_angle) as usize] as isize;
        let dy = dr_intra_derivative[(p_angle - 90) as usize] as isize;
        for r in 0..h as isize {
            for c in 0..w as isize {
                let x = (c << 6) - (r + 1) * dx;
                let base_x = x >> 6;
                let v = if base_x >= -1 {
                    interp(e.a(base_x), e.a(base_x + 1), ((x & 0x3f) >> 1) as i32)
                } else {
                    let y = (r << 6) - (c + 1) * dy;
                    let base_y = (y >> 6).max(-1);
                    interp(e.l(base_y), e.l(base_y + 1), ((y & 0x3f) >> 1) as i32)
                };
                dst[r as usize * w + c as usize] = v;
            }
        }
    } else {
        // zone 3: left column only
        let dy = dr_intra_derivative[(270 - p_angle) as usize] as isize;
        let max_base_y = (w + h - 1) as isize;
        for c in 0..w {
            let y = (c as isize + 1) * dy;
            let shift = ((y & 0x3f) >> 1) as i32;
            let mut base = y >> 6;
            for r in 0..h {
                dst[r * w + c] = if base < max_base_y {
                    interp(e.l(base), e.l(base + 1), shift)
                } else {
                    e.l(max_base_y) as pel
                };
                base += 1;
            }
        }
    }
}

/* chroma from luma ***********************************************************/

/// Subsampled luma AC in Q3 for a `w_uv`x`h_uv` chroma block.
pub(crate) fn cfl_luma_ac(luma: &[pel], s_luma: usize, w_uv: usize, h_uv: usize, ac: &mut [i32]) {
    let mut sum = 0i64;
    for r in 0..h_uv {
        for c in 0..w_uv {
            let t = &luma[2 * r * s_luma + 2 * c..];
            let b = &luma[(2 * r + 1) * s_luma + 2 * c..];
            let v = (t[0] as i32 + t[1] as i32 + b[0] as i32 + b[1] as i32) << 1;
            ac[r * w_uv + c] = v;
            sum += v as i64;
        }
    }
    let n = (w_uv * h_uv) as i64;
    let avg = ((sum + n / 2) / n) as i32;
    for v in ac[..w_uv * h_uv].iter_mut() {
        *v -= avg;
    }
}

/// Adds `alpha` (1/8 steps) times the luma AC to a DC prediction, in place.
pub(crate) fn cfl_predict(dst: &mut [pel], ac: &[i32], alpha: i8, w: usize, h: usize, bit_depth: usize) {
    for i in 0..w * h {
        let scaled = round_shift(alpha as i64 * ac[i] as i64, 6) as i32;
        dst[i] = clip_pel(dst[i] as i32 + scaled, bit_depth);
    }
}
