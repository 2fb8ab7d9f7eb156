use anyhow::{Error, Result, anyhow};
use fraction::{BigFraction, GenericFraction, Sign};
use num::{BigInt, Float, Integer as NumInteger, One as NumOne, Signed as NumSigned, Zero as NumZero};
use num_rational::BigRational;
use num_bigint::ToBigInt;
use std::{
    borrow::Borrow,
    cmp::Ordering,
    iter::Sum,
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use super::{
    integer::Integer,
    traits::{One, Signed, Zero},
};

/**
 * An exact rational number. The value is kept normalised at all times: the denominator is positive
 * and coprime with the numerator, so structural equality coincides with numeric equality.
 */
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rational(pub BigRational);

impl Rational {
    pub fn new(numer: Integer, denom: Integer) -> Self {
        if denom.is_zero() {
            panic!("ZeroDivide: rational with denominator zero");
        }
        Self(BigRational::new(numer, denom))
    }

    pub fn from_integer(value: Integer) -> Self {
        Self(BigRational::from_integer(value))
    }

    pub fn numer(&self) -> &Integer {
        self.0.numer()
    }

    pub fn denom(&self) -> &Integer {
        self.0.denom()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /**
     * 1/self
     */
    pub fn recip(&self) -> Self {
        if self.is_zero() {
            panic!("ZeroDivide: reciprocal of zero");
        }
        Self(self.0.recip())
    }

    pub fn floor(&self) -> Self {
        Self(self.0.floor())
    }

    /**
     * Compares against an integer by cross-multiplication, without converting either side to floating point.
     */
    pub fn cmp_integer(&self, other: &Integer) -> Ordering {
        self.numer().cmp(&(other * self.denom()))
    }

    /**
     * Recovers the exact binary fraction a finite double represents, from its mantissa and exponent.
     */
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(anyhow!("cannot represent {} as a rational", value));
        }
        let (mantissa, exponent, sign) = Float::integer_decode(value);
        let mut numer = BigInt::from(mantissa);
        if sign < 0 {
            numer = -numer;
        }
        if exponent >= 0 {
            Ok(Self::from_integer(numer << (exponent as usize)))
        } else {
            let denom = BigInt::one() << ((-exponent) as usize);
            Ok(Self::new(numer, denom))
        }
    }

    pub fn to_f64(&self) -> f64 {
        num::ToPrimitive::to_f64(&self.0).unwrap_or(f64::NAN)
    }
}

impl One for Rational {
    fn one() -> Self {
        Self(BigRational::one())
    }

    fn is_one(&self) -> bool {
        NumOne::is_one(&self.0)
    }
}

impl Zero for Rational {
    fn zero() -> Self {
        Self(BigRational::zero())
    }

    fn is_zero(&self) -> bool {
        NumZero::is_zero(&self.0)
    }
}

impl Signed for Rational {
    fn abs(&self) -> Self {
        Self(NumSigned::abs(&self.0))
    }

    fn is_positive(&self) -> bool {
        NumSigned::is_positive(&self.0)
    }

    fn is_negative(&self) -> bool {
        NumSigned::is_negative(&self.0)
    }
}

impl FromStr for Rational {
    type Err = Error;

    /// Accepts integers, fractions `a/b` and decimals `x.y`.
    fn from_str(s: &str) -> std::prelude::v1::Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = BigFraction::from_str(s).map_err(|e| anyhow!("cannot parse `{}` as a rational: {:?}", s, e))?;
        match parsed {
            GenericFraction::Rational(sign, ratio) => {
                let numer = ratio
                    .numer()
                    .to_bigint()
                    .ok_or_else(|| anyhow!("cannot parse `{}` as a rational", s))?;
                let denom = ratio
                    .denom()
                    .to_bigint()
                    .ok_or_else(|| anyhow!("cannot parse `{}` as a rational", s))?;
                if denom.is_zero() {
                    return Err(anyhow!("`{}` has a zero denominator", s));
                }
                let numer = if sign == Sign::Minus { -numer } else { numer };
                Ok(Self::new(numer, denom))
            }
            _ => Err(anyhow!("`{}` is not a finite rational", s)),
        }
    }
}

impl TryFrom<f64> for Rational {
    type Error = Error;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        Self::from_f64(value)
    }
}

impl From<BigInt> for Rational {
    fn from(value: BigInt) -> Self {
        Self::from_integer(value)
    }
}

impl From<(BigInt, BigInt)> for Rational {
    fn from(value: (BigInt, BigInt)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rational({})", self.0)
    }
}

//======================== arithmetic ========================//

impl Add<&Rational> for &Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Self::Output {
        Rational(&self.0 + &rhs.0)
    }
}

impl Add<&Rational> for Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Self::Output {
        Rational(self.0 + &rhs.0)
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Self::Output {
        Rational(self.0 + rhs.0)
    }
}

impl<T> AddAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn add_assign(&mut self, rhs: T) {
        self.0 += &rhs.borrow().0;
    }
}

impl Sub<&Rational> for &Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Self::Output {
        Rational(&self.0 - &rhs.0)
    }
}

impl Sub<&Rational> for Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Self::Output {
        Rational(self.0 - &rhs.0)
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Self::Output {
        Rational(self.0 - rhs.0)
    }
}

impl<T> SubAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn sub_assign(&mut self, rhs: T) {
        self.0 -= &rhs.borrow().0;
    }
}

impl Mul<&Rational> for &Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Self::Output {
        Rational(&self.0 * &rhs.0)
    }
}

impl Mul<&Rational> for Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Self::Output {
        Rational(self.0 * &rhs.0)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Self::Output {
        Rational(self.0 * rhs.0)
    }
}

impl<T> MulAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn mul_assign(&mut self, rhs: T) {
        self.0 *= &rhs.borrow().0;
    }
}

impl Div<&Rational> for &Rational {
    type Output = Rational;

    fn div(self, rhs: &Rational) -> Self::Output {
        if rhs.is_zero() {
            panic!("ZeroDivide: {} / 0", self);
        }
        Rational(&self.0 / &rhs.0)
    }
}

impl Div<&Rational> for Rational {
    type Output = Rational;

    fn div(self, rhs: &Rational) -> Self::Output {
        (&self).div(rhs)
    }
}

impl Div for Rational {
    type Output = Rational;

    fn div(self, rhs: Rational) -> Self::Output {
        (&self).div(&rhs)
    }
}

impl<T> DivAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn div_assign(&mut self, rhs: T) {
        let rhs = rhs.borrow();
        if rhs.is_zero() {
            panic!("ZeroDivide: {} / 0", self);
        }
        self.0 /= &rhs.0;
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational(-self.0)
    }
}

impl<'a> Neg for &'a Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational(-&self.0)
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |sum, f| sum + f)
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |sum, f| sum + f)
    }
}

impl PartialEq<Integer> for Rational {
    fn eq(&self, other: &Integer) -> bool {
        self.cmp_integer(other) == Ordering::Equal
    }
}

impl PartialOrd<Integer> for Rational {
    fn partial_cmp(&self, other: &Integer) -> Option<Ordering> {
        Some(self.cmp_integer(other))
    }
}

//======================== primitive types ========================//

macro_rules! from_signed {
    ($t:ident) => {
        impl From<$t> for Rational {
            fn from(value: $t) -> Self {
                Self::from_integer(BigInt::from(value))
            }
        }

        impl From<($t, $t)> for Rational {
            fn from(value: ($t, $t)) -> Self {
                Self::new(BigInt::from(value.0), BigInt::from(value.1))
            }
        }
    };
}

macro_rules! from_unsigned {
    ($t:ident) => {
        impl From<$t> for Rational {
            fn from(value: $t) -> Self {
                Self::from_integer(BigInt::from(value))
            }
        }
    };
}

from_signed!(i64);
from_signed!(i32);
from_unsigned!(u64);
from_unsigned!(u32);
from_unsigned!(usize);

/// Greatest common divisor of numerator and denominator; one for every normalised value.
pub fn reduced_gcd(value: &Rational) -> Integer {
    value.numer().gcd(value.denom())
}

#[cfg(test)]
mod tests {
    use std::{cmp::Ordering, str::FromStr};

    use num::BigInt;

    use crate::math::{
        rational::{Rational, reduced_gcd},
        traits::{One, Signed, Zero},
    };

    #[test]
    fn normalised_after_every_operation() {
        let a = Rational::from((6, -4));
        assert_eq!(a.numer(), &BigInt::from(-3));
        assert_eq!(a.denom(), &BigInt::from(2));

        let b = Rational::from((5, 6));
        let values = [&a + &b, &a - &b, &a * &b, &a / &b];
        for v in values {
            assert!(v.denom() > &BigInt::from(0));
            assert!(reduced_gcd(&v) == BigInt::from(1) || v.is_zero());
        }
    }

    #[test]
    fn in_place_matches_functional() {
        let a = Rational::from((7, 12));
        let b = Rational::from((-5, 18));

        let mut c = a.clone();
        c += &b;
        assert_eq!(c, &a + &b);

        let mut c = a.clone();
        c -= &b;
        assert_eq!(c, &a - &b);

        let mut c = a.clone();
        c *= &b;
        assert_eq!(c, &a * &b);

        let mut c = a.clone();
        c /= &b;
        assert_eq!(c, &a / &b);
        assert_eq!(c, Rational::from((-21, 10)));
    }

    #[test]
    fn exact_from_double() {
        assert_eq!(Rational::from_f64(0.5).unwrap(), Rational::from((1, 2)));
        assert_eq!(Rational::from_f64(-3.0).unwrap(), Rational::from(-3));
        assert_eq!(Rational::from_f64(0.0).unwrap(), Rational::zero());
        // 0.1 is not a binary fraction; the exact value has a power-of-two denominator
        let tenth = Rational::from_f64(0.1).unwrap();
        assert_ne!(tenth, Rational::from((1, 10)));
        let power = BigInt::from(1) << (tenth.denom().bits() - 1);
        assert_eq!(tenth.denom(), &power);
        assert_eq!(tenth.to_f64(), 0.1);
        assert!(Rational::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn parse() {
        assert_eq!(Rational::from_str("3/4").unwrap(), Rational::from((3, 4)));
        assert_eq!(Rational::from_str("-2").unwrap(), Rational::from(-2));
        assert_eq!(Rational::from_str("0.25").unwrap(), Rational::from((1, 4)));
        assert!(Rational::from_str("abc").is_err());
    }

    #[test]
    fn integer_comparison_by_cross_multiplication() {
        let a = Rational::from((7, 2));
        assert_eq!(a.cmp_integer(&BigInt::from(3)), Ordering::Greater);
        assert_eq!(a.cmp_integer(&BigInt::from(4)), Ordering::Less);
        assert!(Rational::from((8, 2)) == BigInt::from(4));
    }

    #[test]
    #[should_panic(expected = "ZeroDivide")]
    fn division_by_zero_panics() {
        let _ = Rational::one() / Rational::zero();
    }

    #[test]
    fn signs() {
        assert!(Rational::from((-1, 3)).is_negative());
        assert!(Rational::from((1, 3)).is_positive());
        assert!(!Rational::zero().is_positive());
        assert_eq!(Rational::from((-1, 3)).abs(), Rational::from((1, 3)));
    }
}
