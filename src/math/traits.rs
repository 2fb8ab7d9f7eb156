use std::{
    fmt::{Debug, Display},
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

use num::{Float, ToPrimitive};

use super::rational::Rational;

pub trait One: Sized {
    fn one() -> Self;

    fn set_one(&mut self) {
        *self = One::one();
    }

    fn is_one(&self) -> bool;
}

pub trait Zero: Sized {
    fn zero() -> Self;

    fn set_zero(&mut self) {
        *self = Zero::zero();
    }

    /// Exact test; tolerance-aware tests live on [`Number`].
    fn is_zero(&self) -> bool;
}

pub trait Signed: Sized {
    fn abs(&self) -> Self;

    /// Returns true if the number is positive and false if the number is zero or negative.
    fn is_positive(&self) -> bool;

    /// Returns true if the number is negative and false if the number is zero or positive.
    fn is_negative(&self) -> bool;
}

/**
 * The scalar type a tableau is built over. Floating point and exact rationals both implement it.
 *
 * The comparisons taking an `eps` are the ones pivoting rules use: the floating-point implementation
 * treats anything within `eps` of zero as zero, the exact implementation ignores `eps`.
 */
pub trait Number:
    Clone
    + Debug
    + Display
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + Zero
    + One
    + Signed
    + Neg<Output = Self>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + for<'a> Add<&'a Self, Output = Self>
    + for<'a> Sub<&'a Self, Output = Self>
    + for<'a> Mul<&'a Self, Output = Self>
    + for<'a> Div<&'a Self, Output = Self>
    + for<'a> AddAssign<&'a Self>
    + for<'a> SubAssign<&'a Self>
    + for<'a> MulAssign<&'a Self>
    + for<'a> DivAssign<&'a Self>
{
    fn from_i64(value: i64) -> Self;

    fn from_rational(value: &Rational) -> Self;

    fn to_f64(&self) -> f64;

    fn is_exact() -> bool;

    fn eq_zero(&self, eps: f64) -> bool;

    fn gt_zero(&self, eps: f64) -> bool;

    fn lt_zero(&self, eps: f64) -> bool;

    fn ge_zero(&self, eps: f64) -> bool {
        !self.lt_zero(eps)
    }

    fn le_zero(&self, eps: f64) -> bool {
        !self.gt_zero(eps)
    }

    fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.clone() - other).eq_zero(eps)
    }
}

// ============ implementations ============

impl One for f64 {
    fn one() -> Self {
        1.0
    }

    fn is_one(&self) -> bool {
        *self == 1.0
    }
}

impl Zero for f64 {
    fn zero() -> Self {
        0.0
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Signed for f64 {
    fn abs(&self) -> Self {
        <f64 as Float>::abs(*self)
    }

    fn is_positive(&self) -> bool {
        *self > 0.0
    }

    fn is_negative(&self) -> bool {
        *self < 0.0
    }
}

impl Number for f64 {
    fn from_i64(value: i64) -> Self {
        value as f64
    }

    fn from_rational(value: &Rational) -> Self {
        value.to_f64()
    }

    fn to_f64(&self) -> f64 {
        *self
    }

    fn is_exact() -> bool {
        false
    }

    fn eq_zero(&self, eps: f64) -> bool {
        <f64 as Float>::abs(*self) <= eps
    }

    fn gt_zero(&self, eps: f64) -> bool {
        *self > eps
    }

    fn lt_zero(&self, eps: f64) -> bool {
        *self < -eps
    }
}

impl Number for Rational {
    fn from_i64(value: i64) -> Self {
        Rational::from(value)
    }

    fn from_rational(value: &Rational) -> Self {
        value.clone()
    }

    fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    fn is_exact() -> bool {
        true
    }

    fn eq_zero(&self, _eps: f64) -> bool {
        self.is_zero()
    }

    fn gt_zero(&self, _eps: f64) -> bool {
        self.is_positive()
    }

    fn lt_zero(&self, _eps: f64) -> bool {
        self.is_negative()
    }
}

#[cfg(test)]
mod tests {
    use crate::math::{
        rational::Rational,
        traits::{Number, Signed, Zero},
    };

    #[test]
    fn float_tolerance() {
        let tiny = 1e-12;
        assert!(tiny.eq_zero(1e-10));
        assert!(!tiny.is_zero());
        assert!(!tiny.gt_zero(1e-10));
        assert!(tiny.gt_zero(0.0));
        assert!((-0.5f64).lt_zero(1e-10));
    }

    #[test]
    fn rational_ignores_tolerance() {
        let tiny = Rational::from((1, 1_000_000_000_000i64));
        assert!(!tiny.eq_zero(1e-3));
        assert!(tiny.gt_zero(1e-3));
        assert!(tiny.is_positive());
        assert!((-tiny).lt_zero(1.0));
    }
}
