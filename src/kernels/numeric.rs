//! Scalar traits the fixed-shape kernels are generic over.
//!
//! Activations, weights, biases, accumulators and outputs may all be
//! different types. Everything is promoted into the accumulator type with
//! [`CastFrom`] before arithmetic, and the final accumulator is converted to
//! the output type with the same trait.
use half::f16;

/// Additive identity, used for zero padding and accumulator initialization.
pub trait Zero: Copy {
    const ZERO: Self;
}

/// Value conversion with the target type's rounding and overflow rules
/// (`as` semantics for primitives).
pub trait CastFrom<T>: Sized {
    fn cast_from(value: T) -> Self;
}

/// Types usable as the multiply-accumulate type.
///
/// Integer accumulators wrap on overflow in every build profile, the same
/// way [`ApFixed`](super::fixed::ApFixed) does.
pub trait Accumulate: Zero {
    fn acc_mul(self, rhs: Self) -> Self;
    fn acc_add(self, rhs: Self) -> Self;
}

macro_rules! impl_accumulate_float {
    ($($t:ty),*) => {
        $(impl Accumulate for $t {
            #[inline(always)]
            fn acc_mul(self, rhs: Self) -> Self {
                self * rhs
            }
            #[inline(always)]
            fn acc_add(self, rhs: Self) -> Self {
                self + rhs
            }
        })*
    };
}
impl_accumulate_float!(f32, f64, f16);

macro_rules! impl_accumulate_int {
    ($($t:ty),*) => {
        $(impl Accumulate for $t {
            #[inline(always)]
            fn acc_mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            #[inline(always)]
            fn acc_add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
        })*
    };
}
impl_accumulate_int!(i8, i16, i32, i64);

macro_rules! impl_zero {
    ($($t:ty => $z:expr),* $(,)?) => {
        $(impl Zero for $t {
            const ZERO: Self = $z;
        })*
    };
}
impl_zero!(
    f32 => 0.0,
    f64 => 0.0,
    i8 => 0,
    i16 => 0,
    i32 => 0,
    i64 => 0,
    f16 => f16::ZERO,
);

macro_rules! impl_cast_prim {
    ($src:ty => $($dst:ty),*) => {
        $(impl CastFrom<$src> for $dst {
            #[inline(always)]
            fn cast_from(value: $src) -> Self {
                value as $dst
            }
        })*
    };
}
impl_cast_prim!(f32 => f32, f64, i8, i16, i32, i64);
impl_cast_prim!(f64 => f32, f64, i8, i16, i32, i64);
impl_cast_prim!(i8 => f32, f64, i8, i16, i32, i64);
impl_cast_prim!(i16 => f32, f64, i8, i16, i32, i64);
impl_cast_prim!(i32 => f32, f64, i8, i16, i32, i64);
impl_cast_prim!(i64 => f32, f64, i8, i16, i32, i64);

// f16 is a storage type: conversions go through f32.
macro_rules! impl_cast_f16 {
    ($($t:ty),*) => {
        $(
            impl CastFrom<$t> for f16 {
                #[inline(always)]
                fn cast_from(value: $t) -> Self {
                    f16::from_f32(value as f32)
                }
            }
            impl CastFrom<f16> for $t {
                #[inline(always)]
                fn cast_from(value: f16) -> Self {
                    value.to_f32() as $t
                }
            }
        )*
    };
}
impl_cast_f16!(f32, f64, i8, i16, i32, i64);

impl CastFrom<f16> for f16 {
    #[inline(always)]
    fn cast_from(value: f16) -> Self {
        value
    }
}
