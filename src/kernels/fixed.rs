//! Arbitrary-width signed fixed point.
//!
//! `ApFixed<W, I>` holds a `W`-bit two's-complement value with `I` integer
//! bits (sign included) and `W - I` fractional bits. Quantization truncates
//! toward negative infinity and overflow wraps modulo 2^W, which is the
//! default behaviour of the fixed-point types synthesis flows accumulate in.
use super::numeric::{Accumulate, CastFrom, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ApFixed<const W: u32, const I: u32> {
    raw: i64,
}

impl<const W: u32, const I: u32> ApFixed<W, I> {
    const FORMAT_OK: () = assert!(W >= 1 && W <= 64 && I <= W, "ApFixed needs 1 <= W <= 64 and I <= W");
    pub const FRAC_BITS: u32 = W - I;
    pub const MIN: Self = Self { raw: i64::MIN >> (64 - W) };
    pub const MAX: Self = Self { raw: i64::MAX >> (64 - W) };

    /// Wraps an arbitrary raw integer into the `W`-bit range.
    #[inline(always)]
    pub const fn from_raw(raw: i64) -> Self {
        let () = Self::FORMAT_OK;
        Self {
            raw: wrap(raw, W),
        }
    }

    #[inline(always)]
    pub const fn raw(self) -> i64 {
        self.raw
    }

    /// Weight of the least significant bit.
    pub fn epsilon() -> f64 {
        (-(Self::FRAC_BITS as f64)).exp2()
    }

    pub fn from_f64(value: f64) -> Self {
        Self::from_raw(quantize(value, W, Self::FRAC_BITS))
    }

    pub fn to_f64(self) -> f64 {
        self.raw as f64 * Self::epsilon()
    }

    // FRAC_BITS reaches 64 for `ApFixed<64, 0>`, so shifts go through i128.
    fn from_int(value: i64) -> Self {
        Self::from_raw(((value as i128) << Self::FRAC_BITS) as i64)
    }

    fn to_int(self) -> i64 {
        ((self.raw as i128) >> Self::FRAC_BITS) as i64
    }

    /// Re-quantizes a raw value carrying `frac` fractional bits.
    fn requantize(raw: i128, frac: u32) -> Self {
        let target = Self::FRAC_BITS;
        let shifted = if frac >= target {
            raw >> (frac - target)
        } else {
            raw << (target - frac)
        };
        Self::from_raw(shifted as i64)
    }
}

/// Sign-extends the low `width` bits of `raw`.
const fn wrap(raw: i64, width: u32) -> i64 {
    let shift = 64 - width;
    (raw << shift) >> shift
}

/// Raw `width`-bit value of `value` with `frac_bits` fractional bits,
/// truncated toward negative infinity and wrapped.
pub fn quantize(value: f64, width: u32, frac_bits: u32) -> i64 {
    let scaled = (value * (frac_bits as f64).exp2()).floor();
    // Casting through i128 keeps wrap semantics for values past i64.
    wrap(scaled as i128 as i64, width)
}

impl<const W: u32, const I: u32> Zero for ApFixed<W, I> {
    const ZERO: Self = Self { raw: 0 };
}

impl<const W: u32, const I: u32> Add for ApFixed<W, I> {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::from_raw(self.raw.wrapping_add(rhs.raw))
    }
}

impl<const W: u32, const I: u32> AddAssign for ApFixed<W, I> {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<const W: u32, const I: u32> Sub for ApFixed<W, I> {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::from_raw(self.raw.wrapping_sub(rhs.raw))
    }
}

impl<const W: u32, const I: u32> Neg for ApFixed<W, I> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::from_raw(self.raw.wrapping_neg())
    }
}

impl<const W: u32, const I: u32> Mul for ApFixed<W, I> {
    type Output = Self;
    /// Full-precision product, truncated back to the operand format.
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        let product = self.raw as i128 * rhs.raw as i128;
        Self::requantize(product, 2 * Self::FRAC_BITS)
    }
}

impl<const W: u32, const I: u32> Accumulate for ApFixed<W, I> {
    #[inline(always)]
    fn acc_mul(self, rhs: Self) -> Self {
        self * rhs
    }
    #[inline(always)]
    fn acc_add(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl<const W: u32, const I: u32> fmt::Debug for ApFixed<W, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApFixed<{},{}>({})", W, I, self.to_f64())
    }
}

impl<const W: u32, const I: u32> fmt::Display for ApFixed<W, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl<const W1: u32, const I1: u32, const W2: u32, const I2: u32> CastFrom<ApFixed<W2, I2>>
    for ApFixed<W1, I1>
{
    #[inline(always)]
    fn cast_from(value: ApFixed<W2, I2>) -> Self {
        Self::requantize(value.raw as i128, ApFixed::<W2, I2>::FRAC_BITS)
    }
}

macro_rules! impl_fixed_float {
    ($($t:ty),*) => {
        $(
            impl<const W: u32, const I: u32> CastFrom<$t> for ApFixed<W, I> {
                #[inline(always)]
                fn cast_from(value: $t) -> Self {
                    Self::from_f64(value as f64)
                }
            }
            impl<const W: u32, const I: u32> CastFrom<ApFixed<W, I>> for $t {
                #[inline(always)]
                fn cast_from(value: ApFixed<W, I>) -> Self {
                    value.to_f64() as $t
                }
            }
        )*
    };
}
impl_fixed_float!(f32, f64);

macro_rules! impl_fixed_int {
    ($($t:ty),*) => {
        $(
            impl<const W: u32, const I: u32> CastFrom<$t> for ApFixed<W, I> {
                #[inline(always)]
                fn cast_from(value: $t) -> Self {
                    Self::from_int(value as i64)
                }
            }
            impl<const W: u32, const I: u32> CastFrom<ApFixed<W, I>> for $t {
                #[inline(always)]
                fn cast_from(value: ApFixed<W, I>) -> Self {
                    value.to_int() as $t
                }
            }
        )*
    };
}
impl_fixed_int!(i8, i16, i32, i64);

impl<const W: u32, const I: u32> CastFrom<half::f16> for ApFixed<W, I> {
    fn cast_from(value: half::f16) -> Self {
        Self::from_f64(value.to_f64())
    }
}

impl<const W: u32, const I: u32> CastFrom<ApFixed<W, I>> for half::f16 {
    fn cast_from(value: ApFixed<W, I>) -> Self {
        half::f16::from_f64(value.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Q16 = ApFixed<16, 6>;
    type Q8 = ApFixed<8, 3>;

    #[test]
    fn test_quantize_truncates_toward_negative_infinity() {
        // 10 fractional bits: eps = 1/1024
        assert_eq!(Q16::from_f64(0.3).raw(), 307);
        assert_eq!(Q16::from_f64(-0.3).raw(), -308);
        assert_eq!(Q16::from_f64(1.5).to_f64(), 1.5);
    }

    #[test]
    fn test_overflow_wraps() {
        // Q8 range is [-4, 4 - 1/32]
        let big = Q8::from_f64(3.5);
        let sum = big + big;
        assert_eq!(sum.to_f64(), -1.0);
        assert_eq!(Q8::MAX.to_f64(), 4.0 - 1.0 / 32.0);
        assert_eq!(Q8::MIN.to_f64(), -4.0);
    }

    #[test]
    fn test_mul_truncates() {
        let a = Q16::from_f64(1.5);
        let b = Q16::from_f64(-0.25);
        assert_eq!((a * b).to_f64(), -0.375);
        let third = Q16::from_raw(341); // ~0.333
        let p = third * third;
        // 341*341 = 116281, >> 10 = 113
        assert_eq!(p.raw(), 113);
    }

    #[test]
    fn test_cast_between_formats() {
        let x = Q16::from_f64(2.71875);
        let narrow: Q8 = CastFrom::cast_from(x);
        assert_eq!(narrow.to_f64(), 2.71875);
        let y = Q16::from_f64(0.01);
        let narrow: Q8 = CastFrom::cast_from(y);
        assert_eq!(narrow, Q8::ZERO);
        let back: Q16 = CastFrom::cast_from(Q8::from_f64(-1.25));
        assert_eq!(back.to_f64(), -1.25);
    }

    #[test]
    fn test_int_conversions() {
        let x: Q16 = CastFrom::cast_from(3i32);
        assert_eq!(x.to_f64(), 3.0);
        assert_eq!(i32::cast_from(Q16::from_f64(-1.5)), -2);
    }

    #[test]
    fn test_all_fractional_64_bit_format() {
        type F64 = ApFixed<64, 0>;
        assert_eq!(F64::FRAC_BITS, 64);
        let from_three: F64 = CastFrom::cast_from(3i64);
        assert_eq!(from_three, F64::ZERO);
        assert_eq!(i64::cast_from(F64::from_raw(-1)), -1);
        assert_eq!(i64::cast_from(F64::from_raw(5)), 0);
        assert_eq!(F64::from_f64(0.25).raw(), 1 << 62);
        assert_eq!(F64::from_f64(-0.5).to_f64(), -0.5);
    }

    #[test]
    fn test_quantize_matches_from_f64() {
        for v in [0.3, -0.3, 1.5, 31.99, -32.0, 40.0, 1e-6] {
            assert_eq!(quantize(v, 16, 10), Q16::from_f64(v).raw());
            assert_eq!(quantize(v, 8, 5), Q8::from_f64(v).raw());
        }
    }
}
