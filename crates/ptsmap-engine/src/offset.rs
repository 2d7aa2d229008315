//! Wraparound-safe comparison over 32-bit stream positions.
//!
//! Offsets are rebuilt from a hardware wrap counter, so two legitimate
//! positions can be billions apart numerically while being close in the
//! stream. Every ordering decision in this crate goes through these three
//! functions; native unsigned comparison is never used on offsets.

/// `a - b` as a 32-bit two's-complement signed result.
#[inline]
pub fn diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

/// `a` lies strictly after `b`.
#[inline]
pub fn later(a: u32, b: u32) -> bool {
    diff(a, b) > 0
}

/// `a` lies at or after `b`.
#[inline]
pub fn equal_or_later(a: u32, b: u32) -> bool {
    diff(a, b) >= 0
}
