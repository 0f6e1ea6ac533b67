use crate::def::*;

/* SAD ***********************************************************************/
pub(crate) fn sad_16b(
    w: usize,
    h: usize,
    src: &[pel],
    s_src: usize,
    pred: &[pel],
    s_pred: usize,
) -> u64 {
    let mut sum = 0u64;
    for j in 0..h {
        let a = &src[j * s_src..j * s_src + w];
        let b = &pred[j * s_pred..j * s_pred + w];
        sum += a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x as i32 - y as i32).abs() as u64)
            .sum::<u64>();
    }
    sum
}

/* SSD ***********************************************************************/
pub(crate) fn ssd_16b(
    w: usize,
    h: usize,
    src: &[pel],
    s_src: usize,
    pred: &[pel],
    s_pred: usize,
) -> u64 {
    let mut sum = 0u64;
    for j in 0..h {
        let a = &src[j * s_src..j * s_src + w];
        let b = &pred[j * s_pred..j * s_pred + w];
        sum += a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let d = x as i64 - y as i64;
                (d * d) as u64
            })
            .sum::<u64>();
    }
    sum
}

/// Variance of the difference and its sum of squares: (var * n, sse).
pub(crate) fn variance_16b(
    w: usize,
    h: usize,
    src: &[pel],
    s_src: usize,
    pred: &[pel],
    s_pred: usize,
) -> (u64, u64) {
    let mut sum = 0i64;
    let mut sse = 0u64;
    for j in 0..h {
        for i in 0..w {
            let d = src[j * s_src + i] as i64 - pred[j * s_pred + i] as i64;
            sum += d;
            sse += (d * d) as u64;
        }
    }
    let n = (w * h) as i64;
    let mean_sq = ((sum * sum) / n.max(1)) as u64;
    (sse.saturating_sub(mean_sq), sse)
}

/* DIFF **********************************************************************/
pub(crate) fn diff_16b(
    w: usize,
    h: usize,
    src1: &[pel],
    s_src1: usize,
    src2: &[pel],
    s_src2: usize,
    diff: &mut [i32],
    s_diff: usize,
) {
    for j in 0..h {
        for i in 0..w {
            diff[j * s_diff + i] = src1[j * s_src1 + i] as i32 - src2[j * s_src2 + i] as i32;
        }
    }
}

/// Pixel-domain distortion between source and reconstruction, scaled to 8-bit.
#[inline]
pub(crate) fn spatial_full_distortion(
    w: usize,
    h: usize,
    src: &[pel],
    s_src: usize,
    recon: &[pel],
    s_recon: usize,
    bit_depth: usize,
) -> u64 {
    scale_distortion(ssd_16b(w, h, src, s_src, recon, s_recon), bit_depth)
}

/// Brings a squared-error distortion measured at `bit_depth` to the 8-bit scale.
#[inline]
pub(crate) fn scale_distortion(d: u64, bit_depth: usize) -> u64 {
    let shift = 2 * (bit_depth - 8);
    if shift == 0 {
        d
    } else {
        (d + (1 << (shift - 1))) >> shift
    }
}

/// Brings a SAD measured at `bit_depth` to the 8-bit scale.
#[inline]
pub(crate) fn scale_sad(d: u64, bit_depth: usize) -> u64 {
    let shift = bit_depth - 8;
    if shift == 0 {
        d
    } else {
        (d + (1 << (shift - 1))) >> shift
    }
}

/// Mean of a `w`x`h` block.
pub(crate) fn block_mean(w: usize, h: usize, src: &[pel], s_src: usize) -> u32 {
    let mut sum = 0u64;
    for j in 0..h {
        sum += src[j * s_src..j * s_src + w].iter().map(|&v| v as u64).sum::<u64>();
    }
    let n = (w * h) as u64;
    ((sum + n / 2) / n.max(1)) as u32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sad_ssd_of_constant_offset() {
        let a = vec![10u16; 16];
        let b = vec![13u16; 16];
        assert_eq!(sad_16b(4, 4, &a, 4, &b, 4), 48);
        assert_eq!(ssd_16b(4, 4, &a, 4, &b, 4), 144);
        // constant difference has no variance
        let (var, sse) = variance_16b(4, 4, &a, 4, &b, 4);
        assert_eq!(var, 0);
        assert_eq!(sse, 144);
    }

    #[test]
    fn strided_access() {
        let src: Vec<u16> = (0..32).collect();
        let pred = vec![0u16; 8];
        // rows 0 and 1 of a 2x2 block with stride 8
        assert_eq!(sad_16b(2, 2, &src, 8, &pred, 2), 0 + 1 + 8 + 9);
        let mut d = vec![0i32; 4];
        diff_16b(2, 2, &src, 8, &pred, 2, &mut d, 2);
        assert_eq!(d, vec![0, 1, 8, 9]);
        assert_eq!(block_mean(2, 2, &src, 8), 5);
    }

    #[test]
    fn bit_depth_scaling() {
        assert_eq!(scale_distortion(160, 10), 10);
        assert_eq!(scale_sad(40, 10), 10);
        assert_eq!(scale_distortion(7, 8), 7);
    }
}
