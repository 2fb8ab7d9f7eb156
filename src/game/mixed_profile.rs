use std::fmt::Display;

use anyhow::{Result, anyhow};

use crate::math::traits::Number;

/**
 * A mixed strategy for every player: `player(i)[s]` is the probability player `i` puts on strategy `s`.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct MixedProfile<T> {
    players: Vec<Vec<T>>,
}

impl<T: Number> MixedProfile<T> {
    pub fn new(players: Vec<Vec<T>>) -> Self {
        Self { players }
    }

    /// The profile playing `strategies[i]` with certainty for each player `i`.
    pub fn pure(num_strategies: &[usize], strategies: &[usize]) -> Self {
        let players = num_strategies
            .iter()
            .zip(strategies)
            .map(|(n, s)| (0..*n).map(|k| if k == *s { T::one() } else { T::zero() }).collect())
            .collect();
        Self { players }
    }

    /**
     * Splits a solution vector into consecutive blocks of `num_strategies[i]` entries and scales each
     * block to sum to one. Fails if the vector is too short or a block has no positive mass.
     */
    pub fn from_lcp_solution(z: &[T], num_strategies: &[usize]) -> Result<Self> {
        let needed: usize = num_strategies.iter().sum();
        if z.len() < needed {
            return Err(anyhow!(
                "solution has {} entries, while the players have {} strategies",
                z.len(),
                needed
            ));
        }

        let mut players = Vec::with_capacity(num_strategies.len());
        let mut start = 0;
        for (player, n) in num_strategies.iter().enumerate() {
            let block = &z[start..start + n];
            let total = block.iter().fold(T::zero(), |sum, x| sum + x);
            if !total.is_positive() {
                return Err(anyhow!("the strategy of player {} has no positive mass", player));
            }
            players.push(block.iter().map(|x| x.clone() / &total).collect());
            start += n;
        }
        Ok(Self { players })
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player: usize) -> &[T] {
        &self.players[player]
    }

    pub fn num_strategies(&self) -> Vec<usize> {
        self.players.iter().map(|p| p.len()).collect()
    }

    /// Whether every player plays a single strategy with probability one.
    pub fn is_pure(&self, eps: f64) -> bool {
        self.players
            .iter()
            .all(|p| p.iter().filter(|x| !x.eq_zero(eps)).count() == 1)
    }

    /// The strategies played with positive probability.
    pub fn support(&self, player: usize, eps: f64) -> Vec<usize> {
        self.players[player]
            .iter()
            .enumerate()
            .filter(|(_, x)| x.gt_zero(eps))
            .map(|(s, _)| s)
            .collect()
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.num_strategies() == other.num_strategies()
            && self
                .players
                .iter()
                .flatten()
                .zip(other.players.iter().flatten())
                .all(|(x, y)| x.approx_eq(y, eps))
    }
}

impl<T: Display> Display for MixedProfile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, player) in self.players.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "(")?;
            for (j, x) in player.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", x)?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use crate::{game::mixed_profile::MixedProfile, math::rational::Rational};

    fn r(n: i64, d: i64) -> Rational {
        Rational::from((n, d))
    }

    #[test]
    fn normalises_blocks() {
        let z = vec![r(1, 3), r(2, 3), r(0, 1), r(1, 5), r(7, 1)];
        let profile = MixedProfile::from_lcp_solution(&z, &[2, 2]).unwrap();
        assert_eq!(profile.player(0), &[r(1, 3), r(2, 3)]);
        assert_eq!(profile.player(1), &[r(0, 1), r(1, 1)]);
        assert!(!profile.is_pure(0.0));
        assert_eq!(profile.support(1, 0.0), vec![1]);
        assert_eq!(profile.to_string(), "((1/3, 2/3), (0, 1))");
    }

    #[test]
    fn zero_block() {
        assert!(MixedProfile::from_lcp_solution(&[1.0, 0.0, 0.0], &[1, 2]).is_err());
        assert!(MixedProfile::from_lcp_solution(&[1.0], &[1, 2]).is_err());
    }

    #[test]
    fn pure_profiles() {
        let profile = MixedProfile::<f64>::pure(&[2, 3], &[1, 2]);
        assert_eq!(profile.player(1), &[0.0, 0.0, 1.0]);
        assert!(profile.is_pure(1e-9));
        assert!(profile.approx_eq(&MixedProfile::new(vec![vec![0.0, 1.0], vec![0.0, 1e-12, 1.0]]), 1e-9));
    }
}
