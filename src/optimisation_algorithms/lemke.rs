use anyhow::{Context, Result, anyhow};
use log::{debug, trace, warn};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use strum_macros::{Display, EnumIter};

use crate::{
    game::{
        bimatrix::{BimatrixGame, positive_shift},
        mixed_profile::MixedProfile,
    },
    math::{matrix::Matrix, traits::Number},
};

use super::{
    basis::Label,
    bfs::BasicFeasibleSolution,
    config::{PivotConfig, Status},
    tableau::{PivotNumber, RatioDirection, TableauOps, lexicographic_min_ratio, lexicographic_tie_break, min_ratio_rows},
};

/// Largest violation of `B x_B = b` still accepted from a floating-point run.
const RESIDUAL_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum LemkeOutcome {
    /// The artificial variable left the basis: the basis is complementary.
    Equilibrium,
    /// The entering column is unblocked; no solution is reachable from this start.
    SecondaryRay,
    PivotLimit,
    Aborted,
}

/**
 * The linear complementarity problem: find `z >= 0` with `w = q + M z >= 0` and `w^T z = 0`.
 * Lemke's algorithm extends it with the covering vector `d` and the artificial variable `z0`:
 * `w = q + M z + d z0`.
 */
#[derive(Clone, Debug)]
pub struct Lcp<T> {
    m: Matrix<T>,
    q: Vec<T>,
    d: Vec<T>,
}

impl<T: Number> Lcp<T> {
    /// The covering vector is all ones.
    pub fn new(m: Matrix<T>, q: Vec<T>) -> Result<Self> {
        let d = vec![T::one(); q.len()];
        Self::with_covering(m, q, d)
    }

    pub fn with_covering(m: Matrix<T>, q: Vec<T>, d: Vec<T>) -> Result<Self> {
        if m.rows() != m.cols() {
            return Err(anyhow!("M must be square, but is {}x{}", m.rows(), m.cols()));
        }
        if q.len() != m.rows() || d.len() != m.rows() {
            return Err(anyhow!(
                "M has {} rows, q has {} entries and d has {}",
                m.rows(),
                q.len(),
                d.len()
            ));
        }
        for (i, (qi, di)) in q.iter().zip(d.iter()).enumerate() {
            if di.is_negative() {
                return Err(anyhow!("covering vector entry d[{}] = {} is negative", i, di));
            }
            if qi.is_negative() && di.is_zero() {
                return Err(anyhow!("covering vector entry d[{}] is zero while q[{}] = {} is negative", i, i, qi));
            }
        }
        Ok(Self { m, q, d })
    }

    pub fn size(&self) -> usize {
        self.q.len()
    }

    pub fn m(&self) -> &Matrix<T> {
        &self.m
    }

    pub fn q(&self) -> &[T] {
        &self.q
    }
}

#[derive(Clone, Debug)]
pub struct LemkeResult<T> {
    pub outcome: LemkeOutcome,
    /// The terminal basis: `Structural(j)` is `z_j`, `Slack(i)` is `w_i`, `Artificial(0)` is `z0`.
    pub bfs: BasicFeasibleSolution<T>,
    pub z: Vec<T>,
    /// Set for game formulations that reached an equilibrium.
    pub profile: Option<MixedProfile<T>>,
    pub pivots: usize,
    pub numerically_unstable: bool,
}

impl<T: Number> LemkeResult<T> {
    pub fn is_equilibrium(&self) -> bool {
        self.outcome == LemkeOutcome::Equilibrium
    }
}

pub struct Lemke;

impl Lemke {
    /**
     * Lemke's algorithm. `z0` enters at the lexicographically most infeasible row, after which the
     * complement of the leaving variable enters, until `z0` leaves or a ray is found. Ties in the
     * ratio test go to `z0` if possible and are otherwise broken lexicographically.
     *
     * ```
     * # use gambit_pivoting::{math::{matrix::Matrix, rational::Rational}, optimisation_algorithms::{config::{PivotConfig, Status}, lemke::{Lcp, Lemke, LemkeOutcome}}};
     * let r = |n: i64| Rational::from(n);
     * let m = Matrix::from_rows(vec![vec![r(2), r(1)], vec![r(1), r(2)]]).unwrap();
     * let lcp = Lcp::new(m, vec![r(-5), r(-6)]).unwrap();
     * let result = Lemke::solve_lcp(&lcp, PivotConfig::default(), &Status::new()).unwrap();
     * assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
     * assert_eq!(result.z, vec![Rational::from((4, 3)), Rational::from((7, 3))]);
     * ```
     */
    pub fn solve_lcp<T: PivotNumber>(lcp: &Lcp<T>, config: PivotConfig, status: &Status) -> Result<LemkeResult<T>> {
        let n = lcp.size();
        let a = lcp.m.map(|x| -x.clone());
        let art = Matrix::from_rows(lcp.d.iter().map(|x| vec![-x.clone()]).collect())?;
        let mut tab = T::Tableau::with_artificials(&a, &art, &lcp.q, config)?;
        debug!("Lemke on an LCP of size {}", n);

        if tab.is_feasible() {
            debug!("q >= 0: z = 0 solves the LCP");
            return Ok(finish(&tab, &lcp.q, LemkeOutcome::Equilibrium, n));
        }

        let z0 = Label::Artificial(0);
        let row = lexicographic_min_ratio(&tab, z0, RatioDirection::Increasing)
            .ok_or_else(|| anyhow!("the artificial variable cannot enter"))?;
        let leaving = tab.pivot(row, z0)?;
        let entering = complement(leaving).ok_or_else(|| anyhow!("{} has no complement", leaving))?;

        let outcome = complementary_pivoting::<T>(&mut tab, entering, Some(z0), |label| label == z0, status)?;
        Ok(finish(&tab, &lcp.q, outcome, n))
    }
}

/// `Structural(i)` and `Slack(i)` are complementary.
fn complement(label: Label) -> Option<Label> {
    match label {
        Label::Structural(i) => Some(Label::Slack(i)),
        Label::Slack(i) => Some(Label::Structural(i)),
        Label::Artificial(_) => None,
    }
}

/**
 * Pivots `entering` in, then the complement of whatever left, until `is_terminal` accepts a leaving
 * label. Ratio ties go to the row of `prefer` if it is among them.
 */
fn complementary_pivoting<T: PivotNumber>(
    tab: &mut T::Tableau,
    mut entering: Label,
    prefer: Option<Label>,
    is_terminal: impl Fn(Label) -> bool,
    status: &Status,
) -> Result<LemkeOutcome> {
    loop {
        if status.is_cancelled() {
            debug!("complementary pivoting cancelled after {} pivots", tab.num_pivots());
            return Ok(LemkeOutcome::Aborted);
        }
        if tab.config().pivot_limit_reached(tab.num_pivots()) {
            warn!("complementary pivoting stopped at the pivot limit of {}", tab.num_pivots());
            return Ok(LemkeOutcome::PivotLimit);
        }

        let rows = min_ratio_rows(&*tab, entering, RatioDirection::Decreasing);
        if rows.is_empty() {
            debug!("secondary ray in the direction of {}", entering);
            return Ok(LemkeOutcome::SecondaryRay);
        }
        let preferred = prefer.and_then(|label| tab.basis().find(label)).filter(|row| rows.contains(row));
        let row = match preferred {
            Some(row) => row,
            None => lexicographic_tie_break(&*tab, entering, rows)
                .ok_or_else(|| anyhow!("no row left after the lexicographic tie break"))?,
        };

        let leaving = tab.pivot(row, entering)?;
        trace!("pivot {}: {} in, {} out", tab.num_pivots(), entering, leaving);
        if is_terminal(leaving) {
            return Ok(LemkeOutcome::Equilibrium);
        }
        entering = complement(leaving).ok_or_else(|| anyhow!("{} left the basis", leaving))?;
    }
}

fn finish<T: PivotNumber>(tab: &T::Tableau, b: &[T], outcome: LemkeOutcome, n: usize) -> LemkeResult<T> {
    let bfs = tab.get_bfs();
    let mut unstable = tab.numerically_unstable();
    if !T::is_exact() {
        let residual = residual(tab, b);
        if residual > RESIDUAL_TOLERANCE {
            warn!("complementary basis violates its equations by {:e}", residual);
            unstable = true;
        }
    }
    debug!("complementary pivoting: {} after {} pivots", outcome, tab.num_pivots());
    LemkeResult {
        outcome,
        z: bfs.structural_vector(n),
        bfs,
        profile: None,
        pivots: tab.num_pivots(),
        numerically_unstable: unstable,
    }
}

/// `max_i |(B x_B - b)_i|`
fn residual<T: PivotNumber>(tab: &T::Tableau, b: &[T]) -> f64 {
    let mut lhs = vec![T::zero(); b.len()];
    for (row, value) in tab.basis_vector().into_iter().enumerate() {
        let column = tab.original_column(tab.basis().label(row));
        for (l, a) in lhs.iter_mut().zip(column) {
            *l += &(a * &value);
        }
    }
    lhs.into_iter()
        .zip(b)
        .map(|(l, b)| (l - b).to_f64().abs())
        .fold(0.0, f64::max)
}

/**
 * Lemke's algorithm on the LCP of a bimatrix game in cost form. With `C` and `D` the payoffs
 * turned into costs of at least one, and `u`, `v` the least costs of the players:
 *
 * `C y - u 1 >= 0 ⟂ x`, `D^T x - v 1 >= 0 ⟂ y`, `1^T x - 1 >= 0 ⟂ u`, `1^T y - 1 >= 0 ⟂ v`.
 */
pub fn lemke<T: PivotNumber>(game: &BimatrixGame<T>, config: PivotConfig, status: &Status) -> Result<LemkeResult<T>> {
    let [rows, columns] = game.num_strategies();
    let c = cost_matrix(game.row_payoffs());
    let d = cost_matrix(game.column_payoffs());
    let size = rows + columns + 2;
    let (u, v) = (rows + columns, rows + columns + 1);

    let mut m = Matrix::new_sized(size, size, T::zero());
    let mut q = vec![T::zero(); size];
    for i in 0..rows {
        for j in 0..columns {
            m[(i, rows + j)] = c[(i, j)].clone();
            m[(rows + j, i)] = d[(i, j)].clone();
        }
        m[(i, u)] = -T::one();
        m[(u, i)] = T::one();
    }
    for j in 0..columns {
        m[(rows + j, v)] = -T::one();
        m[(v, rows + j)] = T::one();
    }
    q[u] = -T::one();
    q[v] = -T::one();

    let lcp = Lcp::new(m, q)?;
    let mut result = Lemke::solve_lcp(&lcp, config, status)?;
    if result.is_equilibrium() {
        result.profile = Some(
            MixedProfile::from_lcp_solution(&result.z, &[rows, columns])
                .context("reading the equilibrium off the LCP solution")?,
        );
    }
    Ok(result)
}

/// `1 + max - a`: the payoffs as costs of at least one.
fn cost_matrix<T: Number>(payoffs: &Matrix<T>) -> Matrix<T> {
    let mut costs = payoffs.map(|x| -x.clone());
    costs.shift(&positive_shift(&costs));
    costs
}

/**
 * The Lemke-Howson algorithm: complementary pivoting on the best-response polytopes
 * `{x >= 0 : B^T x <= 1}` and `{y >= 0 : A y <= 1}` of the shifted game, starting from the
 * artificial equilibrium `(0, 0)` by dropping `label`. Labels `0..m` are the strategies of the row
 * player, `m..m+n` those of the column player.
 *
 * In the tableau, `Structural(i)` is `x_i`, `Structural(m + j)` is `y_j`, and `Slack(k)` is the slack
 * of the best-response constraint with label `k`.
 */
pub fn lemke_howson<T: PivotNumber>(
    game: &BimatrixGame<T>,
    label: usize,
    config: PivotConfig,
    status: &Status,
) -> Result<LemkeResult<T>> {
    let [rows, columns] = game.num_strategies();
    let size = rows + columns;
    if label >= size {
        return Err(anyhow!("label {} does not exist; the game has {} strategies", label, size));
    }

    let (a, b) = game.positive_payoffs();
    let mut tableau_matrix = Matrix::new_sized(size, size, T::zero());
    for i in 0..rows {
        for j in 0..columns {
            tableau_matrix[(i, rows + j)] = a[(i, j)].clone();
            tableau_matrix[(rows + j, i)] = b[(i, j)].clone();
        }
    }
    let ones = vec![T::one(); size];
    let mut tab = T::Tableau::new(&tableau_matrix, &ones, config)?;
    debug!("Lemke-Howson on a {}x{} game, dropping label {}", rows, columns, label);

    let missing = Label::Structural(label);
    let outcome = complementary_pivoting::<T>(
        &mut tab,
        missing,
        None,
        |leaving| leaving == missing || leaving == Label::Slack(label),
        status,
    )?;

    let mut result = finish(&tab, &ones, outcome, size);
    if result.is_equilibrium() {
        result.profile = Some(
            MixedProfile::from_lcp_solution(&result.z, &[rows, columns])
                .context("reading the equilibrium off the Lemke-Howson basis")?,
        );
    }
    Ok(result)
}

/// Lemke-Howson from every label, one worker and one tableau per label. Distinct equilibria, in order of the first label reaching them.
pub fn all_lemke_howson<T: PivotNumber>(
    game: &BimatrixGame<T>,
    config: PivotConfig,
    status: &Status,
) -> Result<Vec<MixedProfile<T>>> {
    let [rows, columns] = game.num_strategies();
    let eps = config.eps2;
    let results = (0..rows + columns)
        .into_par_iter()
        .map(|label| lemke_howson(game, label, config.clone(), status))
        .collect::<Result<Vec<_>>>()?;

    let mut profiles: Vec<MixedProfile<T>> = vec![];
    for profile in results.into_iter().filter_map(|result| result.profile) {
        if !profiles.iter().any(|p| p.approx_eq(&profile, eps)) {
            profiles.push(profile);
        }
    }
    debug!("Lemke-Howson from {} labels found {} equilibria", rows + columns, profiles.len());
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use crate::{
        game::{bimatrix::BimatrixGame, mixed_profile::MixedProfile},
        math::{matrix::Matrix, rational::Rational},
        optimisation_algorithms::{
            basis::Label,
            config::{PivotConfig, Status},
            lemke::{Lcp, Lemke, LemkeOutcome, all_lemke_howson, lemke, lemke_howson},
        },
    };

    fn r(n: i64) -> Rational {
        Rational::from(n)
    }

    fn coordination<T: crate::math::traits::Number>() -> BimatrixGame<T> {
        BimatrixGame::parse("3,0;0,3", "3,0;0,3").unwrap()
    }

    fn prisoners_dilemma() -> BimatrixGame<Rational> {
        BimatrixGame::parse("3,0;5,1", "3,5;0,1").unwrap()
    }

    #[test]
    fn positive_definite_lcp() {
        let m = Matrix::from_rows(vec![vec![r(2), r(1)], vec![r(1), r(2)]]).unwrap();
        let lcp = Lcp::new(m, vec![r(-5), r(-6)]).unwrap();
        let result = Lemke::solve_lcp(&lcp, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
        assert_eq!(result.z, vec![Rational::from((4, 3)), Rational::from((7, 3))]);
        assert!(!result.bfs.is_defined(Label::Artificial(0)));
        assert!(!result.numerically_unstable);

        let m = Matrix::from_rows(vec![vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
        let lcp = Lcp::new(m, vec![-5.0, -6.0]).unwrap();
        let result = Lemke::solve_lcp(&lcp, PivotConfig::default(), &Status::new()).unwrap();
        assert!((result.z[0] - 4.0 / 3.0).abs() < 1e-9);
        assert!((result.z[1] - 7.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn trivial_lcp() {
        let m = Matrix::from_rows(vec![vec![r(1)]]).unwrap();
        let lcp = Lcp::new(m, vec![r(2)]).unwrap();
        let result = Lemke::solve_lcp(&lcp, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
        assert_eq!(result.pivots, 0);
        assert_eq!(result.z, vec![r(0)]);
    }

    #[test]
    fn secondary_ray() {
        // w = -1 - z has no solution
        let m = Matrix::from_rows(vec![vec![r(-1)]]).unwrap();
        let lcp = Lcp::new(m, vec![r(-1)]).unwrap();
        let result = Lemke::solve_lcp(&lcp, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::SecondaryRay);
    }

    #[test]
    fn invalid_covering_vector() {
        let m = Matrix::from_rows(vec![vec![r(1), r(0)], vec![r(0), r(1)]]).unwrap();
        assert!(Lcp::with_covering(m.clone(), vec![r(-1), r(1)], vec![r(0), r(1)]).is_err());
        assert!(Lcp::with_covering(m.clone(), vec![r(1), r(1)], vec![r(-1), r(1)]).is_err());
        assert!(Lcp::new(m, vec![r(1)]).is_err());
    }

    #[test]
    fn lemke_howson_on_coordination_game() {
        let game = coordination::<Rational>();
        let first = MixedProfile::pure(&[2, 2], &[0, 0]);
        let second = MixedProfile::pure(&[2, 2], &[1, 1]);
        for (label, expected) in [(0, &first), (1, &second), (2, &first), (3, &second)] {
            let result = lemke_howson(&game, label, PivotConfig::default(), &Status::new()).unwrap();
            assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
            assert_eq!(result.profile.as_ref(), Some(expected));
            assert_eq!(result.pivots, 2);
        }
        assert!(lemke_howson(&game, 4, PivotConfig::default(), &Status::new()).is_err());
    }

    #[test]
    fn float_lemke_howson_agrees() {
        let game = coordination::<f64>();
        let result = lemke_howson(&game, 1, PivotConfig::default(), &Status::new()).unwrap();
        let profile = result.profile.unwrap();
        assert!(profile.approx_eq(&MixedProfile::pure(&[2, 2], &[1, 1]), 1e-9));
        assert!(!result.numerically_unstable);
    }

    #[test]
    fn dominant_strategies() {
        let game = prisoners_dilemma();
        let defect = MixedProfile::pure(&[2, 2], &[1, 1]);
        let result = lemke_howson(&game, 0, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.profile.as_ref(), Some(&defect));

        let result = lemke(&game, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
        assert_eq!(result.profile, Some(defect));
    }

    #[test]
    fn lemke_finds_an_equilibrium() {
        let game = coordination::<Rational>();
        let result = lemke(&game, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
        let profile = result.profile.unwrap();
        assert!(game.is_nash(&profile, 0.0));
        assert_eq!(profile, MixedProfile::pure(&[2, 2], &[1, 1]));
        assert_eq!(profile.to_string(), "((0, 1), (0, 1))");

        let game = coordination::<f64>();
        let result = lemke(&game, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Equilibrium);
        assert!(result.profile.unwrap().approx_eq(&MixedProfile::pure(&[2, 2], &[1, 1]), 1e-9));
    }

    #[test]
    fn all_labels() {
        let game = coordination::<Rational>();
        let profiles = all_lemke_howson(&game, PivotConfig::default(), &Status::new()).unwrap();
        assert_eq!(
            profiles,
            vec![MixedProfile::pure(&[2, 2], &[0, 0]), MixedProfile::pure(&[2, 2], &[1, 1])]
        );
    }

    #[test]
    fn limits() {
        let game = prisoners_dilemma();
        let status = Status::new();
        status.cancel();
        let result = lemke_howson(&game, 0, PivotConfig::default(), &status).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::Aborted);
        assert!(result.profile.is_none());

        let config = PivotConfig::default().with_max_pivots(1);
        let result = lemke_howson(&game, 0, config, &Status::new()).unwrap();
        assert_eq!(result.outcome, LemkeOutcome::PivotLimit);
        assert_eq!(result.pivots, 1);
    }

    #[test]
    fn outcome_names() {
        assert_eq!(
            LemkeOutcome::iter().map(|o| o.to_string()).collect::<Vec<_>>(),
            vec!["Equilibrium", "SecondaryRay", "PivotLimit", "Aborted"]
        );
    }
}
