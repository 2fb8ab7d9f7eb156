use log::{debug, warn};
use strum_macros::{Display, EnumIter};

use crate::math::matrix::Matrix;

use super::{
    basis::Label,
    bfs::BasicFeasibleSolution,
    config::{PivotConfig, Status},
    lp_tableau::LpTableau,
    tableau::{PivotNumber, RatioDirection, TableauError, TableauOps, lexicographic_min_ratio},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Aborted,
}

enum Phase {
    One,
    Two,
}

enum Outcome {
    Optimal,
    Unbounded,
    Aborted,
}

/**
 * Two-phase simplex for
 *
 * maximise `c x` subject to `A x <= b` (first `m - nequals` rows), `A x = b` (last `nequals` rows),
 * `x >= 0`.
 *
 * Phase one brings a single artificial column of `-1`s in at the most infeasible row and minimises
 * the artificial plus the slacks of the equality rows. Phase two fixes those at zero and optimises
 * the objective. Entering labels are chosen by most negative reduced cost, leaving rows by the
 * lexicographic ratio test.
 *
 * ```
 * # use gambit_pivoting::{math::{matrix::Matrix, rational::Rational}, optimisation_algorithms::{config::{PivotConfig, Status}, lp_solve::{LpSolve, LpStatus}}};
 * let r = |n: i64| Rational::from(n);
 * let a = Matrix::from_rows(vec![vec![r(1), r(2)], vec![r(3), r(1)]]).unwrap();
 * let lp = LpSolve::new(&a, &[r(4), r(6)], &[r(1), r(1)], 0, PivotConfig::default(), Status::new()).unwrap();
 * assert_eq!(lp.status(), LpStatus::Optimal);
 * assert_eq!(lp.optimum(), &Rational::from((14, 5)));
 * ```
 */
#[derive(Clone, Debug)]
pub struct LpSolve<T: PivotNumber> {
    tab: LpTableau<T>,
    status: LpStatus,
    num_structural: usize,
    optimum: T,
    bfs: BasicFeasibleSolution<T>,
}

impl<T: PivotNumber> LpSolve<T> {
    pub fn new(
        a: &Matrix<T>,
        b: &[T],
        c: &[T],
        nequals: usize,
        config: PivotConfig,
        status: Status,
    ) -> Result<Self, TableauError> {
        Self::check_dimensions(a, b, c, nequals)?;
        let m = a.rows();
        let n = a.cols();
        let art = Matrix::new_sized(m, 1, -T::one());
        let mut tab = LpTableau::with_artificials(a, &art, b, config)?;
        debug!("simplex on {} rows, {} columns, {} equalities", m, n, nequals);

        // phase one
        let artificial = Label::Artificial(0);
        let equalities: Vec<Label> = (m - nequals..m).map(Label::Slack).collect();
        tab.set_art_cost(vec![T::one()])?;
        let mut unit_cost = vec![T::zero(); m];
        for label in &equalities {
            unit_cost[label.index()] = T::one();
        }
        tab.set_unit_cost(unit_cost)?;

        let eps2 = tab.config().eps2;
        if !tab.tableau().is_feasible() {
            if let Some(row) = lexicographic_min_ratio(tab.tableau(), artificial, RatioDirection::Increasing) {
                tab.pivot(row, artificial)?;
            }
        }
        match Self::simplex(&mut tab, &status, Phase::One)? {
            Outcome::Aborted => return Ok(Self::finish(tab, LpStatus::Aborted, n)),
            Outcome::Optimal | Outcome::Unbounded => {}
        }
        let infeasibility = tab.objective_value();
        if infeasibility.gt_zero(eps2) {
            debug!("phase one ended with infeasibility {}", infeasibility);
            return Ok(Self::finish(tab, LpStatus::Infeasible, n));
        }

        // phase two
        let fixed: Vec<Label> = std::iter::once(artificial).chain(equalities).collect();
        for label in &fixed {
            tab.fix_at_zero(*label);
        }
        for label in fixed {
            Self::drive_out(&mut tab, label)?;
        }
        tab.set_art_cost(vec![T::zero()])?;
        tab.set_unit_cost(vec![T::zero(); m])?;
        tab.set_cost(c.iter().map(|x| -x.clone()).collect())?;

        let status = match Self::simplex(&mut tab, &status, Phase::Two)? {
            Outcome::Optimal => LpStatus::Optimal,
            Outcome::Unbounded => LpStatus::Unbounded,
            Outcome::Aborted => LpStatus::Aborted,
        };
        Ok(Self::finish(tab, status, n))
    }

    pub fn check_dimensions(a: &Matrix<T>, b: &[T], c: &[T], nequals: usize) -> Result<(), TableauError> {
        if b.len() != a.rows() {
            return Err(TableauError::BadDim {
                what: "right-hand side",
                expected: a.rows(),
                found: b.len(),
            });
        }
        if c.len() != a.cols() {
            return Err(TableauError::BadDim {
                what: "objective",
                expected: a.cols(),
                found: c.len(),
            });
        }
        if nequals > a.rows() {
            return Err(TableauError::BadDim {
                what: "number of equalities",
                expected: a.rows(),
                found: nequals,
            });
        }
        Ok(())
    }

    fn simplex(tab: &mut LpTableau<T>, status: &Status, phase: Phase) -> Result<Outcome, TableauError> {
        let phase_name = match phase {
            Phase::One => "phase one",
            Phase::Two => "phase two",
        };
        for iter in 0.. {
            if status.is_cancelled() {
                debug!("{} cancelled after {} iterations", phase_name, iter);
                return Ok(Outcome::Aborted);
            }
            if tab.config().pivot_limit_reached(tab.num_pivots()) {
                warn!("{} stopped at the pivot limit of {}", phase_name, tab.num_pivots());
                return Ok(Outcome::Aborted);
            }

            let Some(entering) = Self::enter(tab)? else {
                debug!(
                    "{} optimal after {} iterations, obj.: {}",
                    phase_name,
                    iter,
                    tab.objective_value()
                );
                return Ok(Outcome::Optimal);
            };
            let Some(row) = lexicographic_min_ratio(tab.tableau(), entering, RatioDirection::Decreasing) else {
                debug!("{} unbounded in the direction of {}", phase_name, entering);
                return Ok(Outcome::Unbounded);
            };
            tab.pivot(row, entering)?;
        }
        Ok(Outcome::Optimal)
    }

    /// The candidate with the most negative reduced cost; ties go to the smallest label.
    fn enter(tab: &LpTableau<T>) -> Result<Option<Label>, TableauError> {
        let eps = tab.config().eps1;
        let costs = tab.relative_costs()?;
        let mut best: Option<(Label, &T)> = None;
        for (label, rc) in tab.basis().all_labels().zip(costs.iter()) {
            if !tab.is_candidate(label) || !rc.lt_zero(eps) {
                continue;
            }
            if best.as_ref().is_none_or(|(_, b)| rc < *b) {
                best = Some((label, rc));
            }
        }
        Ok(best.map(|(label, _)| label))
    }

    /// Replaces a degenerate basic `label` by any nonbasic label with a nonzero entry in its row.
    fn drive_out(tab: &mut LpTableau<T>, label: Label) -> Result<(), TableauError> {
        let Some(row) = tab.basis().find(label) else {
            return Ok(());
        };
        let eps = tab.config().eps1;
        let entries = tab.tableau().tableau_row(row);
        let replacement = tab
            .basis()
            .all_labels()
            .filter(|k| !k.is_artificial() && tab.is_candidate(*k))
            .find(|k| !entries[tab.basis().ordinal(*k)].eq_zero(eps));
        if let Some(replacement) = replacement {
            tab.pivot(row, replacement)?;
        }
        Ok(())
    }

    fn finish(tab: LpTableau<T>, status: LpStatus, num_structural: usize) -> Self {
        let optimum = -tab.objective_value();
        debug!(
            "simplex finished: {} after {} pivots, value {}",
            status,
            tab.num_pivots(),
            optimum
        );
        Self {
            bfs: tab.get_bfs(),
            tab,
            status,
            num_structural,
            optimum,
        }
    }

    pub fn status(&self) -> LpStatus {
        self.status
    }

    /// Malformed dimensions are rejected by the constructor.
    pub fn is_well_formed(&self) -> bool {
        true
    }

    pub fn is_feasible(&self) -> bool {
        self.status != LpStatus::Infeasible
    }

    pub fn is_bounded(&self) -> bool {
        self.status != LpStatus::Unbounded
    }

    pub fn is_aborted(&self) -> bool {
        self.status == LpStatus::Aborted
    }

    /// The maximum of `c x`; meaningful when the status is [`LpStatus::Optimal`].
    pub fn optimum(&self) -> &T {
        &self.optimum
    }

    pub fn optimum_vector(&self) -> Vec<T> {
        self.bfs.structural_vector(self.num_structural)
    }

    /// The shadow prices of the rows, `y` with `y^T b` equal to the optimum.
    pub fn dual_vector(&self) -> Result<Vec<T>, TableauError> {
        Ok(self.tab.dual_vector()?.into_iter().map(|y| -y).collect())
    }

    pub fn bfs(&self) -> &BasicFeasibleSolution<T> {
        &self.bfs
    }

    pub fn num_pivots(&self) -> usize {
        self.tab.num_pivots()
    }

    pub fn tableau(&self) -> &LpTableau<T> {
        &self.tab
    }
}
