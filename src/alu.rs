//! ALU and shifter
//!
//! Every operation is a pure function from 32-bit operands to a 64-bit raw
//! result. The post-shift then selects which 32-bit window of the raw
//! result commits; for the multiplies this is what makes "multiply-high"
//! (post-shift right 32) exact.

use crate::inst::Shift;

/// Logical pre-shift applied to operand B before the operation. The amount
/// field is 5 bits, so it is always < 32.
#[inline]
pub fn pre_shift(v: u32, s: Shift) -> u32 {
    if s.right {
        v >> s.bits
    } else {
        v << s.bits
    }
}

/// Logical post-shift over the 64-bit raw result; the low 32 bits commit.
/// The amount field is 6 bits, so it is always < 64. Shifting a 32-bit-wide
/// raw value right by >= 32 naturally yields 0.
#[inline]
pub fn post_shift(raw: u64, s: Shift) -> u32 {
    let shifted = if s.right { raw >> s.bits } else { raw << s.bits };
    shifted as u32
}

/// 32-bit wraparound add, raw zero-extended.
#[inline]
pub fn add(a: u32, b: u32) -> u64 {
    a.wrapping_add(b) as u64
}

/// 32-bit wraparound A - B, raw zero-extended.
#[inline]
pub fn sub(a: u32, b: u32) -> u64 {
    a.wrapping_sub(b) as u64
}

/// Signed add: same 32-bit value as [`add`], raw sign-extended so a
/// post-shift right 32 sees the sign word.
#[inline]
pub fn iadd(a: u32, b: u32) -> u64 {
    (a as i32).wrapping_add(b as i32) as i64 as u64
}

/// Signed A - B, raw sign-extended.
#[inline]
pub fn isub(a: u32, b: u32) -> u64 {
    (a as i32).wrapping_sub(b as i32) as i64 as u64
}

/// Unsigned 64-bit product.
#[inline]
pub fn mul(a: u32, b: u32) -> u64 {
    a as u64 * b as u64
}

/// Signed 64-bit product, operands sign-extended before the multiply.
#[inline]
pub fn imul(a: u32, b: u32) -> u64 {
    ((a as i32 as i64) * (b as i32 as i64)) as u64
}

/// `max(min(value, max_bound), min_bound)` under the given signedness.
/// With inverted bounds (min > max) the result is the min bound.
#[inline]
pub fn clamp(value: u32, min_bound: u32, max_bound: u32, signed: bool) -> u64 {
    let clamped = if signed {
        (value as i32).min(max_bound as i32).max(min_bound as i32) as u32
    } else {
        value.min(max_bound).max(min_bound)
    };
    clamped as u64
}
