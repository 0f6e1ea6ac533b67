use super::MdError;
use crate::def::*;

use num_traits::*;

use std::fmt::{Debug, Display};

pub trait Pixel:
    PrimInt
    + Into<u32>
    + Into<i32>
    + AsPrimitive<u8>
    + AsPrimitive<u16>
    + AsPrimitive<i32>
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

impl Pixel for u8 {}
impl Pixel for u16 {}

/// Geometry of one plane buffer; the visible area starts at (`xorigin`, `yorigin`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaneConfig {
    pub stride: usize,
    pub alloc_height: usize,
    pub width: usize,
    pub height: usize,
    pub xdec: usize,
    pub ydec: usize,
    pub xpad: usize,
    pub ypad: usize,
    pub xorigin: usize,
    pub yorigin: usize,
}

impl PlaneConfig {
    pub fn new(width: usize, height: usize, xdec: usize, ydec: usize, xpad: usize, ypad: usize) -> Self {
        PlaneConfig {
            stride: xpad + width + xpad,
            alloc_height: ypad + height + ypad,
            width,
            height,
            xdec,
            ydec,
            xpad,
            ypad,
            xorigin: xpad,
            yorigin: ypad,
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Plane<T: Pixel> {
    pub data: Vec<T>,
    pub cfg: PlaneConfig,
}

impl<T: Pixel> Debug for Plane<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plane {{ data: [{}, ...], cfg: {:?} }}",
            self.data.get(0).copied().unwrap_or_default(),
            self.cfg
        )
    }
}

impl<T: Pixel> Plane<T> {
    pub fn new(width: usize, height: usize, xdec: usize, ydec: usize, xpad: usize, ypad: usize) -> Self {
        let cfg = PlaneConfig::new(width, height, xdec, ydec, xpad, ypad);
        Plane {
            data: vec![T::default(); cfg.stride * cfg.alloc_height],
            cfg,
        }
    }

    pub fn try_new(
        width: usize,
        height: usize,
        xdec: usize,
        ydec: usize,
        xpad: usize,
        ypad: usize,
    ) -> Result<Self, MdError> {
        let cfg = PlaneConfig::new(width, height, xdec, ydec, xpad, ypad);
        let len = cfg.stride * cfg.alloc_height;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| MdError::OutOfMemory("plane"))?;
        data.resize(len, T::default());
        Ok(Plane { data, cfg })
    }

    /// Index of sample (x, y) relative to the visible origin.
    #[inline]
    pub fn offset(&self, x: isize, y: isize) -> usize {
        let xo = self.cfg.xorigin as isize + x;
        let yo = self.cfg.yorigin as isize + y;
        debug_assert!(xo >= 0 && yo >= 0);
        yo as usize * self.cfg.stride + xo as usize
    }

    /// Samples from (x, y) to the end of the buffer; rows are `cfg.stride` apart.
    #[inline]
    pub fn slice_at(&self, x: isize, y: isize) -> &[T] {
        &self.data[self.offset(x, y)..]
    }

    #[inline]
    pub fn slice_at_mut(&mut self, x: isize, y: isize) -> &mut [T] {
        let o = self.offset(x, y);
        &mut self.data[o..]
    }

    #[inline]
    pub fn p(&self, x: usize, y: usize) -> T {
        self.data[self.offset(x as isize, y as isize)]
    }

    /// Sample read clamped to the allocated area.
    #[inline]
    pub fn p_clamped(&self, x: isize, y: isize) -> T {
        let xo = (self.cfg.xorigin as isize + x).max(0).min(self.cfg.stride as isize - 1);
        let yo = (self.cfg.yorigin as isize + y)
            .max(0)
            .min(self.cfg.alloc_height as isize - 1);
        self.data[yo as usize * self.cfg.stride + xo as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: T) {
        let o = self.offset(x as isize, y as isize);
        self.data[o] = v;
    }

    /// Visible row `y`.
    pub fn row(&self, y: usize) -> &[T] {
        let o = self.offset(0, y as isize);
        &self.data[o..o + self.cfg.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        let o = self.offset(0, y as isize);
        let w = self.cfg.width;
        &mut self.data[o..o + w]
    }

    /// Copies a `w`x`h` block of contiguous rows (`src_stride` apart) to (x, y).
    pub fn copy_block_from(&mut self, x: usize, y: usize, w: usize, h: usize, src: &[T], src_stride: usize) {
        for j in 0..h {
            let o = self.offset(x as isize, (y + j) as isize);
            self.data[o..o + w].copy_from_slice(&src[j * src_stride..j * src_stride + w]);
        }
    }

    pub fn fill(&mut self, v: T) {
        for s in self.data.iter_mut() {
            *s = v;
        }
    }

    /// Replicates the visible edges into the padding.
    pub fn pad(&mut self) {
        let PlaneConfig {
            stride,
            alloc_height,
            width,
            height,
            xorigin,
            yorigin,
            ..
        } = self.cfg;
        if width == 0 || height == 0 {
            return;
        }
        for y in 0..height {
            let base = (yorigin + y) * stride;
            let left = self.data[base + xorigin];
            let right = self.data[base + xorigin + width - 1];
            for x in 0..xorigin {
                self.data[base + x] = left;
            }
            for x in xorigin + width..stride {
                self.data[base + x] = right;
            }
        }
        let (top, rest) = self.data.split_at_mut(yorigin * stride);
        let first = &rest[..stride];
        for y in 0..yorigin {
            top[y * stride..(y + 1) * stride].copy_from_slice(first);
        }
        let last_row = (yorigin + height - 1) * stride;
        let (body, bottom) = self.data.split_at_mut((yorigin + height) * stride);
        let last = &body[last_row..last_row + stride];
        for y in 0..alloc_height - yorigin - height {
            bottom[y * stride..(y + 1) * stride].copy_from_slice(last);
        }
    }
}

/// A 4:2:0 picture with padded planes.
#[derive(Debug, Clone, Default)]
pub struct Frame<T: Pixel> {
    pub planes: [Plane<T>; N_C],
}

impl<T: Pixel> Frame<T> {
    pub fn new(width: usize, height: usize) -> Self {
        let pad_c = PIC_PAD_SIZE_L >> 1;
        Frame {
            planes: [
                Plane::new(width, height, 0, 0, PIC_PAD_SIZE_L, PIC_PAD_SIZE_L),
                Plane::new((width + 1) >> 1, (height + 1) >> 1, 1, 1, pad_c, pad_c),
                Plane::new((width + 1) >> 1, (height + 1) >> 1, 1, 1, pad_c, pad_c),
            ],
        }
    }

    pub fn try_new(width: usize, height: usize) -> Result<Self, MdError> {
        let pad_c = PIC_PAD_SIZE_L >> 1;
        Ok(Frame {
            planes: [
                Plane::try_new(width, height, 0, 0, PIC_PAD_SIZE_L, PIC_PAD_SIZE_L)?,
                Plane::try_new((width + 1) >> 1, (height + 1) >> 1, 1, 1, pad_c, pad_c)?,
                Plane::try_new((width + 1) >> 1, (height + 1) >> 1, 1, 1, pad_c, pad_c)?,
            ],
        })
    }

    pub fn width(&self) -> usize {
        self.planes[Y_C].cfg.width
    }

    pub fn height(&self) -> usize {
        self.planes[Y_C].cfg.height
    }

    pub fn pad(&mut self) {
        for p in self.planes.iter_mut() {
            p.pad();
        }
    }

    /// Widens the samples to `pel`.
    pub fn to_pel(&self) -> Frame<pel> {
        let mut out = Frame::<pel>::new(self.width(), self.height());
        for (dst, src) in out.planes.iter_mut().zip(self.planes.iter()) {
            for (d, s) in dst.data.iter_mut().zip(src.data.iter()) {
                *d = AsPrimitive::<u16>::as_(*s);
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pad_replicates_edges() {
        let mut p: Plane<u16> = Plane::new(4, 2, 0, 0, 2, 2);
        for y in 0..2 {
            for x in 0..4 {
                p.set(x, y, (y * 4 + x) as u16);
            }
        }
        p.pad();
        assert_eq!(p.p_clamped(-2, -2), 0);
        assert_eq!(p.p_clamped(5, 0), 3);
        assert_eq!(p.p_clamped(-1, 3), 4);
        assert_eq!(p.p_clamped(10, 10), 7);
    }

    #[test]
    fn frame_dims() {
        let f: Frame<u8> = Frame::new(66, 34);
        assert_eq!(f.planes[1].cfg.width, 33);
        assert_eq!(f.planes[2].cfg.height, 17);
        let g = f.to_pel();
        assert_eq!(g.width(), 66);
    }
}
