use crate::api::MdError;

/* clipping within min and max */
#[inline]
pub(crate) fn clip3<T: PartialOrd>(min_x: T, max_x: T, value: T) -> T {
    if value < min_x {
        min_x
    } else if value > max_x {
        max_x
    } else {
        value
    }
}

#[inline]
pub(crate) fn clip_pel(v: i32, bit_depth: usize) -> u16 {
    clip3(0, (1 << bit_depth) - 1, v) as u16
}

#[inline]
pub(crate) fn round_shift(v: i64, shift: u32) -> i64 {
    if shift == 0 {
        v
    } else {
        (v + (1 << (shift - 1))) >> shift
    }
}

#[inline]
pub(crate) fn round_shift_u64(v: u64, shift: u32) -> u64 {
    if shift == 0 {
        v
    } else {
        (v + (1 << (shift - 1))) >> shift
    }
}

#[inline]
pub(crate) fn log2_floor(v: usize) -> usize {
    debug_assert!(v > 0);
    (usize::BITS - 1 - v.leading_zeros()) as usize
}

#[inline]
pub(crate) fn divide_and_round(num: u64, den: u64) -> u64 {
    if den == 0 {
        num
    } else {
        (num + den / 2) / den
    }
}

/// Allocates a zero-initialised vector, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc<T: Copy + Default>(len: usize, what: &'static str) -> Result<Vec<T>, MdError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| MdError::OutOfMemory(what))?;
    v.resize(len, T::default());
    Ok(v)
}

/// Clears `v` and refills it with `len` default values.
#[inline]
pub(crate) fn reset_buf<T: Copy + Default>(v: &mut Vec<T>, len: usize) {
    v.clear();
    v.resize(len, T::default());
}
