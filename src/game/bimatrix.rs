use anyhow::{Context, Result, anyhow};

use crate::math::{matrix::Matrix, traits::Number};

use super::mixed_profile::MixedProfile;

/**
 * A two-player game in normal form: the row player receives `a[(i, j)]` and the column player
 * `b[(i, j)]` when they play `i` and `j`.
 */
#[derive(Clone, Debug)]
pub struct BimatrixGame<T> {
    a: Matrix<T>,
    b: Matrix<T>,
}

impl<T: Number> BimatrixGame<T> {
    pub fn new(a: Matrix<T>, b: Matrix<T>) -> Result<Self> {
        if a.rows() != b.rows() || a.cols() != b.cols() {
            return Err(anyhow!(
                "payoff matrices have different shapes: {}x{} and {}x{}",
                a.rows(),
                a.cols(),
                b.rows(),
                b.cols()
            ));
        }
        if a.rows() == 0 || a.cols() == 0 {
            return Err(anyhow!("a player has no strategies"));
        }
        Ok(Self { a, b })
    }

    pub fn from_rows(a: Vec<Vec<T>>, b: Vec<Vec<T>>) -> Result<Self> {
        Self::new(Matrix::from_rows(a)?, Matrix::from_rows(b)?)
    }

    /// Both matrices in the `"3,0;0,3"` text form of [`Matrix::parse`].
    pub fn parse(a: &str, b: &str) -> Result<Self> {
        let a = Matrix::parse(a).context("parsing the payoffs of the row player")?;
        let b = Matrix::parse(b).context("parsing the payoffs of the column player")?;
        Self::new(a, b)
    }

    pub fn row_payoffs(&self) -> &Matrix<T> {
        &self.a
    }

    pub fn column_payoffs(&self) -> &Matrix<T> {
        &self.b
    }

    pub fn num_strategies(&self) -> [usize; 2] {
        [self.a.rows(), self.a.cols()]
    }

    /**
     * Both payoff matrices shifted by a constant so that every entry is at least one. Equilibria are
     * unchanged, and the best-response polytopes become bounded.
     */
    pub fn positive_payoffs(&self) -> (Matrix<T>, Matrix<T>) {
        let mut a = self.a.clone();
        a.shift(&positive_shift(&self.a));
        let mut b = self.b.clone();
        b.shift(&positive_shift(&self.b));
        (a, b)
    }

    /// The expected payoffs `(x^T A y, x^T B y)`.
    pub fn payoffs(&self, profile: &MixedProfile<T>) -> (T, T) {
        let x = profile.player(0);
        let y = profile.player(1);
        (dot(x, &self.a.mul_vector(y)), dot(x, &self.b.mul_vector(y)))
    }

    /// Whether no player gains more than `eps` by deviating to a pure strategy.
    pub fn is_nash(&self, profile: &MixedProfile<T>, eps: f64) -> bool {
        if profile.num_strategies() != self.num_strategies() {
            return false;
        }
        let (u, v) = self.payoffs(profile);
        let row_best = self.a.mul_vector(profile.player(1));
        let column_best = self.b.vector_mul(profile.player(0));
        row_best.iter().all(|p| (p.clone() - &u).le_zero(eps))
            && column_best.iter().all(|p| (p.clone() - &v).le_zero(eps))
    }
}

/// The shift `1 - min` if some entry is below one, else zero.
pub fn positive_shift<T: Number>(matrix: &Matrix<T>) -> T {
    match matrix.min_entry() {
        Some(min) if *min < T::one() => T::one() - min,
        _ => T::zero(),
    }
}

fn dot<T: Number>(x: &[T], y: &[T]) -> T {
    x.iter().zip(y).fold(T::zero(), |sum, (a, b)| sum + &(a.clone() * b))
}
