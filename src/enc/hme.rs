use super::dist::*;
use super::me::clip_mv_on_pic_boundary;
use crate::api::frame::Plane;
use crate::api::ReferenceList;
use crate::def::*;

/// Coarse motion of one square for one reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeResult {
    /// full-pel vector in 1/8 units
    pub mv: MotionVector,
    /// SAD at the 8-bit scale
    pub distortion: u64,
}

/// Coarse motion of every square of a superblock, per reference.
///
/// Squares are stored level by level: the superblock first, then its four
/// quadrants in raster order, down to 8x8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeSbResults {
    sb_size: usize,
    level_offsets: Vec<usize>,
    results: Vec<[Option<MeResult>; TOTAL_REFS]>,
}

impl MeSbResults {
    pub fn new(sb_size: usize) -> Self {
        let mut level_offsets = Vec::new();
        let mut n = 0;
        let mut s = sb_size;
        while s >= MIN_BLOCK_SIZE {
            level_offsets.push(n);
            let per_side = sb_size / s;
            n += per_side * per_side;
            s >>= 1;
        }
        MeSbResults {
            sb_size,
            level_offsets,
            results: vec![[None; TOTAL_REFS]; n],
        }
    }

    pub fn sb_size(&self) -> usize {
        self.sb_size
    }

    fn index(&self, x: usize, y: usize, size: usize) -> Option<usize> {
        if size < MIN_BLOCK_SIZE || size > self.sb_size || !size.is_power_of_two() {
            return None;
        }
        let level = crate::util::log2_floor(self.sb_size / size);
        let per_side = self.sb_size / size;
        let (cx, cy) = (x / size, y / size);
        if cx >= per_side || cy >= per_side {
            return None;
        }
        Some(self.level_offsets[level] + cy * per_side + cx)
    }

    /// Result of the square of side `size` at (`x`, `y`) inside the superblock.
    pub fn get(&self, x: usize, y: usize, size: usize, rf: RefFrame) -> Option<MeResult> {
        self.index(x, y, size)
            .and_then(|i| self.results[i][rf.to_i8() as usize])
    }

    pub fn set(&mut self, x: usize, y: usize, size: usize, rf: RefFrame, res: MeResult) {
        if let Some(i) = self.index(x, y, size) {
            self.results[i][rf.to_i8() as usize] = Some(res);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn sad_at(
    src: &Plane<pel>,
    reference: &Plane<pel>,
    x: usize,
    y: usize,
    size: usize,
    mv: MotionVector,
    bit_depth: usize,
) -> u64 {
    let (dy, dx) = mv.full_pel();
    let s = src.slice_at(x as isize, y as isize);
    let r = reference.slice_at(x as isize + dx, y as isize + dy);
    scale_sad(
        sad_16b(size, size, s, src.cfg.stride, r, reference.cfg.stride),
        bit_depth,
    )
}

#[allow(clippy::too_many_arguments)]
fn search_square(
    src: &Plane<pel>,
    reference: &Plane<pel>,
    x: usize,
    y: usize,
    size: usize,
    center: MotionVector,
    range: isize,
    step: isize,
    bit_depth: usize,
) -> MeResult {
    let clip = |mv| {
        clip_mv_on_pic_boundary(
            x,
            y,
            size,
            size,
            src.cfg.width,
            src.cfg.height,
            reference.cfg.xorigin,
            mv,
        )
    };
    let c = clip(center);
    let mut best = MeResult {
        mv: c,
        distortion: sad_at(src, reference, x, y, size, c, bit_depth),
    };
    let (cy, cx) = c.full_pel();
    let mut dy = -range;
    while dy <= range {
        let mut dx = -range;
        while dx <= range {
            let mv = clip(MotionVector::from_full_pel(cy + dy, cx + dx));
            let d = sad_at(src, reference, x, y, size, mv, bit_depth);
            // prefer shorter vectors on ties
            if d < best.distortion
                || (d == best.distortion && mv.max_abs_diff(MotionVector::zero()) < best.mv.max_abs_diff(MotionVector::zero()))
            {
                best = MeResult { mv, distortion: d };
            }
            dx += step;
        }
        dy += step;
    }
    best
}

/// Hierarchical full search of one superblock against every available reference.
///
/// The superblock square searches `range` around zero at a stride of 2 and is
/// refined at full pel; each smaller square searches a halved range around its
/// parent's vector. Squares outside the picture are skipped.
#[allow(clippy::too_many_arguments)]
pub(crate) fn motion_estimate_sb(
    src: &Plane<pel>,
    refs: &ReferenceList,
    sb_x: usize,
    sb_y: usize,
    sb_size: usize,
    range: i16,
    bit_depth: usize,
) -> MeSbResults {
    let mut out = MeSbResults::new(sb_size);
    let pic_w = src.cfg.width;
    let pic_h = src.cfg.height;
    for rf in refs.available() {
        let reference = match refs.get_ref(rf) {
            Some(r) => &r.frame.planes[Y_C],
            None => continue,
        };
        let mut size = sb_size;
        let mut r = range.max(1) as isize;
        while size >= MIN_BLOCK_SIZE {
            let per_side = sb_size / size;
            for cy in 0..per_side {
                for cx in 0..per_side {
                    let (ox, oy) = (cx * size, cy * size);
                    let (x, y) = (sb_x + ox, sb_y + oy);
                    if x + size > pic_w || y + size > pic_h {
                        continue;
                    }
                    let res = if size == sb_size {
                        let coarse = search_square(src, reference, x, y, size, MotionVector::zero(), r, 2, bit_depth);
                        search_square(src, reference, x, y, size, coarse.mv, 1, 1, bit_depth)
                    } else {
                        let parent = out
                            .get(ox & !(2 * size - 1), oy & !(2 * size - 1), 2 * size, rf)
                            .map_or(MotionVector::zero(), |p| p.mv);
                        search_square(src, reference, x, y, size, parent, r, 1, bit_depth)
                    };
                    out.set(ox, oy, size, rf, res);
                }
            }
            size >>= 1;
            r = (r >> 1).max(2);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::{Frame, ReferencePicture};
    use std::sync::Arc;

    fn textured(w: usize, h: usize, shift_x: usize) -> Frame<pel> {
        let mut f = Frame::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let xs = x + shift_x;
                // convex along x so that only the true shift matches
                let v = xs * xs / 32 + 3 * y;
                f.planes[0].set(x, y, v as pel);
            }
        }
        f.planes[0].pad();
        f
    }

    #[test]
    fn result_layout() {
        let mut me = MeSbResults::new(64);
        let rf = RefFrame::new(0, 0);
        me.set(8, 16, 8, rf, MeResult { mv: MotionVector::new(8, 0), distortion: 3 });
        assert_eq!(me.get(8, 16, 8, rf).map(|r| r.distortion), Some(3));
        assert_eq!(me.get(8, 16, 16, rf), None);
        assert_eq!(me.get(0, 0, 128, rf), None);
        assert_eq!(me.get(8, 16, 8, RefFrame::new(1, 0)), None);
    }

    #[test]
    fn finds_horizontal_shift() {
        // the current picture is the reference moved left by 3 samples
        let cur = textured(128, 64, 3);
        let reference = textured(128, 64, 0);
        let mut refs = ReferenceList::new();
        refs.set(0, 0, ReferencePicture::new(Arc::new(reference), 0, false));
        let me = motion_estimate_sb(&cur.planes[0], &refs, 0, 0, 64, 16, 8);
        let rf = RefFrame::new(0, 0);
        let sb = me.get(0, 0, 64, rf).unwrap();
        assert_eq!(sb.mv, MotionVector::new(0, 24));
        assert_eq!(sb.distortion, 0);
        let leaf = me.get(32, 32, 8, rf).unwrap();
        assert_eq!(leaf.mv, MotionVector::new(0, 24));
    }
}
