use num_bigint::BigInt;
use num_integer::Integer as NumInteger;
use num_traits::{Signed as NumSigned, Zero as NumZero};

use super::rational::Rational;

/// Arbitrary-precision signed integer.
pub type Integer = BigInt;

pub fn gcd(a: &Integer, b: &Integer) -> Integer {
    a.gcd(b)
}

/// Least common multiple; always non-negative, zero if either argument is zero.
pub fn lcm(a: &Integer, b: &Integer) -> Integer {
    if a.is_zero() || b.is_zero() {
        return Integer::zero();
    }
    a.lcm(b).abs()
}

/**
 * Division that is known to leave no remainder, as in fraction-free elimination.
 * A remainder indicates a broken invariant in the caller.
 */
pub fn exact_div(numer: &Integer, denom: &Integer) -> Integer {
    let (quotient, remainder) = numer.div_rem(denom);
    debug_assert!(remainder.is_zero(), "inexact division {} / {}", numer, denom);
    quotient
}

/// The smallest positive integer that turns every value into an integer when multiplied with it.
pub fn lcm_of_denominators<'a>(values: impl IntoIterator<Item = &'a Rational>) -> Integer {
    values
        .into_iter()
        .fold(Integer::from(1), |acc, value| lcm(&acc, value.denom()))
}

#[cfg(test)]
mod tests {
    use num::BigInt;

    use crate::math::{
        integer::{exact_div, gcd, lcm, lcm_of_denominators},
        rational::Rational,
    };

    #[test]
    fn gcd_lcm() {
        let a = BigInt::from(12);
        let b = BigInt::from(-18);
        assert_eq!(gcd(&a, &b), BigInt::from(6));
        assert_eq!(lcm(&a, &b), BigInt::from(36));
        assert_eq!(lcm(&a, &BigInt::from(0)), BigInt::from(0));
    }

    #[test]
    fn exact_division() {
        assert_eq!(exact_div(&BigInt::from(-42), &BigInt::from(7)), BigInt::from(-6));
    }

    #[test]
    fn denominators() {
        let values = vec![
            Rational::from((1, 4)),
            Rational::from((5, 6)),
            Rational::from(3),
        ];
        assert_eq!(lcm_of_denominators(&values), BigInt::from(12));
        assert_eq!(lcm_of_denominators(&Vec::<Rational>::new()), BigInt::from(1));
    }
}
