use super::api::frame::Plane;
use super::def::*;
use super::tbl::sm_weights;

/// Bilinear prediction of a `w`x`h` block of `plane` at (`x`, `y`) displaced by
/// (`mv_row`, `mv_col`) in units of `1 << frac_bits` of a sample.
///
/// Integer positions are clamped so that every read stays inside the padded plane.
#[allow(clippy::too_many_arguments)]
pub(crate) fn mc_bilinear(
    plane: &Plane<pel>,
    x: isize,
    y: isize,
    mv_row: i32,
    mv_col: i32,
    frac_bits: u32,
    dst: &mut [pel],
    s_dst: usize,
    w: usize,
    h: usize,
) {
    let one = 1i32 << frac_bits;
    let px = (x << frac_bits) + mv_col as isize;
    let py = (y << frac_bits) + mv_row as isize;
    let fx = (px & (one as isize - 1)) as i32;
    let fy = (py & (one as isize - 1)) as i32;

    let cfg = &plane.cfg;
    let min_x = -(cfg.xorigin as isize);
    let min_y = -(cfg.yorigin as isize);
    let max_x = (cfg.stride - cfg.xorigin) as isize - w as isize - 1;
    let max_y = (cfg.alloc_height - cfg.yorigin) as isize - h as isize - 1;
    let ix = (px >> frac_bits).max(min_x).min(max_x);
    let iy = (py >> frac_bits).max(min_y).min(max_y);

    let stride = cfg.stride;
    let src = plane.slice_at(ix, iy);
    if fx == 0 && fy == 0 {
        for r in 0..h {
            dst[r * s_dst..r * s_dst + w].copy_from_slice(&src[r * stride..r * stride + w]);
        }
        return;
    }
    let shift = 2 * frac_bits;
    let rnd = 1i32 << (shift - 1);
    for r in 0..h {
        let r0 = &src[r * stride..];
        let r1 = &src[(r + 1) * stride..];
        for c in 0..w {
            let top = r0[c] as i32 * (one - fx) + r0[c + 1] as i32 * fx;
            let bot = r1[c] as i32 * (one - fx) + r1[c + 1] as i32 * fx;
            dst[r * s_dst + c] = ((top * (one - fy) + bot * fy + rnd) >> shift) as pel;
        }
    }
}

/// Luma and chroma prediction buffers of one block, each with stride equal to its width.
#[derive(Clone, Debug, Default)]
pub(crate) struct PredBuf {
    pub(crate) data: [Vec<pel>; N_C],
}

/// Motion compensation of a `w`x`h` block at (`x`, `y`) from one or two
/// reference frames. Compound predictions are averaged.
#[allow(clippy::too_many_arguments)]
pub(crate) fn inter_predict(
    frames: [Option<&crate::api::Frame<pel>>; 2],
    mvs: [MotionVector; 2],
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    with_chroma: bool,
    pred: &mut PredBuf,
    tmp: &mut PredBuf,
) {
    let planes = if with_chroma { N_C } else { 1 };
    let mut n = 0;
    for (i, f) in frames.iter().enumerate() {
        let f = match f {
            Some(f) => f,
            None => continue,
        };
        let out = if n == 0 { &mut *pred } else { &mut *tmp };
        for c in 0..planes {
            let (ss, bw, bh) = if c == Y_C { (0, w, h) } else { (1, w >> 1, h >> 1) };
            if out.data[c].len() < bw * bh {
                out.data[c].resize(bw * bh, 0);
            }
            mc_bilinear(
                &f.planes[c],
                (x >> ss) as isize,
                (y >> ss) as isize,
                mvs[i].row as i32,
                mvs[i].col as i32,
                MV_FRAC_BITS as u32 + ss,
                &mut out.data[c],
                bw,
                bw,
                bh,
            );
        }
        n += 1;
    }
    if n == 2 {
        for c in 0..planes {
            let (bw, bh) = if c == Y_C { (w, h) } else { (w >> 1, h >> 1) };
            for (p, &q) in pred.data[c][..bw * bh].iter_mut().zip(tmp.data[c].iter()) {
                *p = ((*p as u32 + q as u32 + 1) >> 1) as pel;
            }
        }
    }
}

/* inter-intra ****************************************************************/

/// Intra weight (of 64) at (`r`, `c`) of an inter-intra blend.
#[inline]
fn ii_weight(mode: PredictionMode, r: usize, c: usize, w: usize, h: usize) -> u32 {
    match mode {
        PredictionMode::V_PRED => (sm_weights(h)[r] >> 2) as u32,
        PredictionMode::H_PRED => (sm_weights(w)[c] >> 2) as u32,
        PredictionMode::SMOOTH_PRED => {
            let size = w.min(h);
            let i = r.min(c) * size / w.max(h).max(1);
            (sm_weights(size)[i.min(size - 1)] >> 2) as u32
        }
        _ => 32,
    }
}

/// Blends an intra prediction into an inter prediction, in place.
pub(crate) fn interintra_blend(inter: &mut [pel], intra: &[pel], mode: PredictionMode, w: usize, h: usize) {
    for r in 0..h {
        for c in 0..w {
            let m = ii_weight(mode, r, c, w, h);
            let i = r * w + c;
            inter[i] = ((intra[i] as u32 * m + inter[i] as u32 * (64 - m) + 32) >> 6) as pel;
        }
    }
}

/// Intra modes usable inside an inter-intra candidate.
pub(crate) const INTERINTRA_MODES: [PredictionMode; 4] = [
    PredictionMode::DC_PRED,
    PredictionMode::V_PRED,
    PredictionMode::H_PRED,
    PredictionMode::SMOOTH_PRED,
];

pub(crate) fn interintra_mode_index(mode: PredictionMode) -> usize {
    INTERINTRA_MODES.iter().position(|&m| m == mode).unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Frame;

    fn ramp_frame() -> Frame<pel> {
        let mut f = Frame::new(64, 64);
        for c in 0..N_C {
            let p = &mut f.planes[c];
            let (w, h) = (p.cfg.width, p.cfg.height);
            for y in 0..h {
                for x in 0..w {
                    p.set(x, y, (x * 2) as pel);
                }
            }
            p.pad();
        }
        f
    }

    #[test]
    fn full_and_half_pel() {
        let f = ramp_frame();
        let mut dst = vec![0; 16];
        mc_bilinear(&f.planes[0], 8, 8, 0, 8, 3, &mut dst, 4, 4, 4);
        assert_eq!(&dst[..4], &[18, 20, 22, 24]);
        mc_bilinear(&f.planes[0], 8, 8, 0, 4, 3, &mut dst, 4, 4, 4);
        assert_eq!(&dst[..4], &[17, 19, 21, 23]);
    }

    #[test]
    fn reads_are_clamped_into_padding() {
        let f = ramp_frame();
        let mut dst = vec![0; 64];
        // far outside: clamped to the padded border, which replicates column 0
        mc_bilinear(&f.planes[0], 0, 0, 0, -8 * 4000, 3, &mut dst, 8, 8, 8);
        assert!(dst.iter().all(|&v| v == 0));
    }

    #[test]
    fn compound_averages() {
        let f = ramp_frame();
        let mut pred = PredBuf::default();
        let mut tmp = PredBuf::default();
        inter_predict(
            [Some(&f), Some(&f)],
            [MotionVector::new(0, 0), MotionVector::new(0, 16)],
            8,
            8,
            8,
            8,
            true,
            &mut pred,
            &mut tmp,
        );
        // (16 + 20) / 2
        assert_eq!(pred.data[0][0], 18);
        // chroma moves by one sample: (8 + 10) / 2
        assert_eq!(pred.data[1][0], 9);
    }

    #[test]
    fn interintra_dc_is_even_blend() {
        let mut inter = vec![100u16; 64];
        let intra = vec![50u16; 64];
        interintra_blend(&mut inter, &intra, PredictionMode::DC_PRED, 8, 8);
        assert!(inter.iter().all(|&v| v == 75));
        let mut inter = vec![100u16; 64];
        interintra_blend(&mut inter, &intra, PredictionMode::V_PRED, 8, 8);
        // rows near the top follow the intra edge
        assert!(inter[0] < inter[56]);
    }
}
