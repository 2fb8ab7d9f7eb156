use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;

use crate::{
    game::{bimatrix::BimatrixGame, mixed_profile::MixedProfile},
    math::matrix::Matrix,
};

use super::{
    basis::Label,
    bfs::BasicFeasibleSolution,
    config::{PivotConfig, Status},
    tableau::{PivotNumber, TableauError},
    vertex_enum::{EnumerationStatus, VertexEnum},
};

/**
 * Vertex enumeration of both best-response polytopes of a bimatrix game with positive payoffs `A`
 * and `B` (both `m x n`):
 *
 * `P = {x >= 0 : B^T x <= 1}` and `Q = {y >= 0 : A y <= 1}`.
 *
 * A pair of vertices is completely labelled if, for every row strategy `i`, `x_i = 0` or
 * `(A y)_i = 1`, and for every column strategy `j`, `(B^T x)_j = 1` or `y_j = 0`. Apart from the
 * pair of origins, these pairs are the extreme equilibria of the game, up to scaling.
 */
#[derive(Clone, Debug)]
pub struct DoubleVertexEnum<T: PivotNumber> {
    num_rows: usize,
    num_columns: usize,
    p: VertexEnum<T>,
    q: VertexEnum<T>,
}

impl<T: PivotNumber> DoubleVertexEnum<T> {
    /// Shifts the payoffs of the game to be positive first.
    pub fn new(game: &BimatrixGame<T>, config: PivotConfig, status: Status) -> Result<Self, TableauError> {
        let (a, b) = game.positive_payoffs();
        Self::with_matrices(&a, &b, config, status)
    }

    pub fn with_matrices(
        a: &Matrix<T>,
        b: &Matrix<T>,
        config: PivotConfig,
        status: Status,
    ) -> Result<Self, TableauError> {
        if a.rows() != b.rows() {
            return Err(TableauError::BadDim {
                what: "rows of the column player's payoffs",
                expected: a.rows(),
                found: b.rows(),
            });
        }
        if a.cols() != b.cols() {
            return Err(TableauError::BadDim {
                what: "columns of the column player's payoffs",
                expected: a.cols(),
                found: b.cols(),
            });
        }
        let (m, n) = (a.rows(), a.cols());
        let p = VertexEnum::new(&b.transpose(), &vec![-T::one(); n], config.clone(), status.clone())?;
        let q = VertexEnum::new(a, &vec![-T::one(); m], config, status)?;
        Ok(Self {
            num_rows: m,
            num_columns: n,
            p,
            q,
        })
    }

    /// Enumerates both polytopes; aborted if either search was.
    pub fn search(&mut self) -> Result<EnumerationStatus, TableauError> {
        let p = self.p.search()?;
        if p != EnumerationStatus::Complete {
            return Ok(p);
        }
        let q = self.q.search()?;
        debug!(
            "double vertex enumeration: {} and {} vertices",
            self.p.vertex_list().len(),
            self.q.vertex_list().len()
        );
        Ok(q)
    }

    pub fn status(&self) -> EnumerationStatus {
        match (self.p.status(), self.q.status()) {
            (EnumerationStatus::Complete, q) => q,
            (p, _) => p,
        }
    }

    pub fn vertex_lists(&self) -> (&[BasicFeasibleSolution<T>], &[BasicFeasibleSolution<T>]) {
        (self.p.vertex_list(), self.q.vertex_list())
    }

    pub fn num_pivots(&self) -> usize {
        self.p.num_pivots() + self.q.num_pivots()
    }

    /// The completely labelled pairs other than the origins, as indices into [`Self::vertex_lists`].
    pub fn enumerate_complementary_faces(&self) -> Vec<(usize, usize)> {
        let (p, q) = self.vertex_lists();
        (0..p.len())
            .cartesian_product(0..q.len())
            .filter(|(i, j)| self.is_complementary(&p[*i], &q[*j]))
            .collect()
    }

    fn is_complementary(&self, x: &BasicFeasibleSolution<T>, y: &BasicFeasibleSolution<T>) -> bool {
        let origin = |v: &BasicFeasibleSolution<T>| !v.labels().any(Label::is_structural);
        if origin(x) || origin(y) {
            return false;
        }
        (0..self.num_rows).all(|i| !(x.is_defined(Label::Structural(i)) && y.is_defined(Label::Slack(i))))
            && (0..self.num_columns)
                .all(|j| !(x.is_defined(Label::Slack(j)) && y.is_defined(Label::Structural(j))))
    }

    /// The complementary pairs, scaled to probabilities.
    pub fn equilibria(&self) -> Result<Vec<MixedProfile<T>>> {
        let (p, q) = self.vertex_lists();
        self.enumerate_complementary_faces()
            .into_iter()
            .map(|(i, j)| {
                let mut z = p[i].structural_vector(self.num_rows);
                z.extend(q[j].structural_vector(self.num_columns));
                MixedProfile::from_lcp_solution(&z, &[self.num_rows, self.num_columns])
                    .context("scaling a complementary vertex pair")
            })
            .collect()
    }
}

/// All extreme equilibria of the game.
pub fn enum_mixed<T: PivotNumber>(
    game: &BimatrixGame<T>,
    config: PivotConfig,
    status: Status,
) -> Result<(Vec<MixedProfile<T>>, EnumerationStatus)> {
    let mut enumeration = DoubleVertexEnum::new(game, config, status)?;
    let status = enumeration.search()?;
    Ok((enumeration.equilibria()?, status))
}

#[cfg(test)]
mod tests {
    use crate::{
        game::{bimatrix::BimatrixGame, mixed_profile::MixedProfile},
        math::{matrix::Matrix, rational::Rational},
        optimisation_algorithms::{
            config::{PivotConfig, Status},
            double_vertex_enum::{DoubleVertexEnum, enum_mixed},
            tableau::TableauError,
            vertex_enum::EnumerationStatus,
        },
    };

    fn half() -> Rational {
        Rational::from((1, 2))
    }

    #[test]
    fn coordination_game_has_three_equilibria() {
        let game = BimatrixGame::<Rational>::parse("3,0;0,3", "3,0;0,3").unwrap();
        let mut enumeration = DoubleVertexEnum::new(&game, PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(enumeration.search().unwrap(), EnumerationStatus::Complete);
        let (p, q) = enumeration.vertex_lists();
        assert_eq!((p.len(), q.len()), (4, 4));

        let equilibria = enumeration.equilibria().unwrap();
        assert_eq!(equilibria.len(), 3);
        for expected in [
            MixedProfile::pure(&[2, 2], &[0, 0]),
            MixedProfile::pure(&[2, 2], &[1, 1]),
            MixedProfile::new(vec![vec![half(), half()], vec![half(), half()]]),
        ] {
            assert!(equilibria.contains(&expected), "missing {}", expected);
        }
        assert!(equilibria.iter().all(|e| game.is_nash(e, 0.0)));
    }

    #[test]
    fn dominance_leaves_one_equilibrium() {
        let game = BimatrixGame::<f64>::parse("3,0;5,1", "3,5;0,1").unwrap();
        let (equilibria, status) = enum_mixed(&game, PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(status, EnumerationStatus::Complete);
        assert_eq!(equilibria.len(), 1);
        assert!(equilibria[0].approx_eq(&MixedProfile::pure(&[2, 2], &[1, 1]), 1e-9));
    }

    #[test]
    fn rectangular_game() {
        // matching pennies with a dominated third row
        let game = BimatrixGame::<Rational>::parse("1,-1;-1,1;-2,-2", "-1,1;1,-1;0,0").unwrap();
        let (equilibria, _) = enum_mixed(&game, PivotConfig::default(), Status::new()).unwrap();
        assert_eq!(equilibria.len(), 1);
        assert_eq!(equilibria[0].player(0), &[half(), half(), Rational::from(0)]);
        assert_eq!(equilibria[0].player(1), &[half(), half()]);
    }

    #[test]
    fn mismatched_matrices() {
        let a = Matrix::<f64>::identity(2);
        let b = Matrix::<f64>::identity(3);
        assert!(matches!(
            DoubleVertexEnum::with_matrices(&a, &b, PivotConfig::default(), Status::new()),
            Err(TableauError::BadDim { .. })
        ));
    }
}
