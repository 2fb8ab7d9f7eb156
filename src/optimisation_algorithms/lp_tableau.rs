use std::cmp::Ordering;

use crate::math::matrix::Matrix;

use super::{
    basis::{Basis, Label},
    bfs::BasicFeasibleSolution,
    config::PivotConfig,
    tableau::{
        PivotNumber, RatioDirection, TableauError, TableauOps, first_nonzero_sign, lexicographic_compare,
        lexicographic_min_ratio, lexicographic_sign,
    },
};

/**
 * A tableau with a linear objective, to be minimised. Costs are kept per kind of label: `cost` for the
 * structural variables, `unit_cost` for the slacks and `art_cost` for the artificials.
 *
 * Labels blocked in the underlying basis are fixed at zero: they are never chosen to enter, and they
 * do not count when judging optimality.
 */
#[derive(Clone, Debug)]
pub struct LpTableau<T: PivotNumber> {
    tableau: T::Tableau,
    cost: Vec<T>,
    unit_cost: Vec<T>,
    art_cost: Vec<T>,
}

impl<T: PivotNumber> LpTableau<T> {
    pub fn new(a: &Matrix<T>, b: &[T], config: PivotConfig) -> Result<Self, TableauError> {
        Ok(Self::from_tableau(T::Tableau::new(a, b, config)?))
    }

    pub fn with_artificials(
        a: &Matrix<T>,
        art: &Matrix<T>,
        b: &[T],
        config: PivotConfig,
    ) -> Result<Self, TableauError> {
        Ok(Self::from_tableau(T::Tableau::with_artificials(a, art, b, config)?))
    }

    /// All costs start at zero.
    pub fn from_tableau(tableau: T::Tableau) -> Self {
        let cost = vec![T::zero(); tableau.num_structural()];
        let unit_cost = vec![T::zero(); tableau.num_rows()];
        let art_cost = vec![T::zero(); tableau.num_artificial()];
        Self {
            tableau,
            cost,
            unit_cost,
            art_cost,
        }
    }

    pub fn tableau(&self) -> &T::Tableau {
        &self.tableau
    }

    pub fn basis(&self) -> &Basis {
        self.tableau.basis()
    }

    pub fn config(&self) -> &PivotConfig {
        self.tableau.config()
    }

    pub fn num_rows(&self) -> usize {
        self.tableau.num_rows()
    }

    pub fn num_pivots(&self) -> usize {
        self.tableau.num_pivots()
    }

    pub fn set_cost(&mut self, cost: Vec<T>) -> Result<(), TableauError> {
        if cost.len() != self.cost.len() {
            return Err(TableauError::BadDim {
                what: "cost vector",
                expected: self.cost.len(),
                found: cost.len(),
            });
        }
        self.cost = cost;
        Ok(())
    }

    pub fn set_unit_cost(&mut self, unit_cost: Vec<T>) -> Result<(), TableauError> {
        if unit_cost.len() != self.unit_cost.len() {
            return Err(TableauError::BadDim {
                what: "slack cost vector",
                expected: self.unit_cost.len(),
                found: unit_cost.len(),
            });
        }
        self.unit_cost = unit_cost;
        Ok(())
    }

    pub fn set_art_cost(&mut self, art_cost: Vec<T>) -> Result<(), TableauError> {
        if art_cost.len() != self.art_cost.len() {
            return Err(TableauError::BadDim {
                what: "artificial cost vector",
                expected: self.art_cost.len(),
                found: art_cost.len(),
            });
        }
        self.art_cost = art_cost;
        Ok(())
    }

    pub fn cost_of(&self, label: Label) -> T {
        match label {
            Label::Structural(j) => self.cost[j].clone(),
            Label::Slack(i) => self.unit_cost[i].clone(),
            Label::Artificial(k) => self.art_cost[k].clone(),
        }
    }

    /// The costs of the basic variables, in row order.
    pub fn basic_costs(&self) -> Vec<T> {
        self.basis().labels().iter().map(|label| self.cost_of(*label)).collect()
    }

    /// The simplex multipliers `y` with `y^T B = c_B^T`.
    pub fn dual_vector(&self) -> Result<Vec<T>, TableauError> {
        self.tableau.solve_transpose(&self.basic_costs())
    }

    /// `c_label - y^T a_label`; zero for basic labels.
    pub fn relative_cost(&self, label: Label) -> Result<T, TableauError> {
        let dual = self.dual_vector()?;
        Ok(self.relative_cost_with(label, &dual))
    }

    fn relative_cost_with(&self, label: Label, dual: &[T]) -> T {
        if self.basis().is_member(label) {
            return T::zero();
        }
        let priced = match label {
            Label::Slack(i) => dual[i].clone(),
            _ => self
                .tableau
                .original_column(label)
                .iter()
                .zip(dual.iter())
                .filter(|(a, _)| !a.is_zero())
                .fold(T::zero(), |sum, (a, y)| sum + &(a.clone() * y)),
        };
        self.cost_of(label) - &priced
    }

    /// The reduced costs of all labels, indexed by label ordinal.
    pub fn relative_costs(&self) -> Result<Vec<T>, TableauError> {
        let dual = self.dual_vector()?;
        Ok(self
            .basis()
            .all_labels()
            .map(|label| self.relative_cost_with(label, &dual))
            .collect())
    }

    pub fn objective_value(&self) -> T {
        self.basic_costs()
            .into_iter()
            .zip(self.tableau.basis_vector())
            .fold(T::zero(), |sum, (c, x)| sum + &(c * &x))
    }

    pub fn fix_at_zero(&mut self, label: Label) {
        self.tableau.block(label);
    }

    pub fn release(&mut self, label: Label) {
        self.tableau.unblock(label);
    }

    pub fn is_fixed(&self, label: Label) -> bool {
        self.basis().is_blocked(label)
    }

    /// Whether `label` is a nonbasic label that may enter.
    pub fn is_candidate(&self, label: Label) -> bool {
        !self.basis().is_member(label) && !self.is_fixed(label)
    }

    pub fn is_dual_feasible(&self) -> Result<bool, TableauError> {
        let eps = self.config().eps1;
        let costs = self.relative_costs()?;
        Ok(self
            .basis()
            .all_labels()
            .zip(costs.iter())
            .all(|(label, rc)| !self.is_candidate(label) || rc.ge_zero(eps)))
    }

    pub fn is_optimal(&self) -> Result<bool, TableauError> {
        Ok(self.tableau.is_feasible() && self.is_dual_feasible()?)
    }

    pub fn pivot(&mut self, row: usize, label: Label) -> Result<Label, TableauError> {
        self.tableau.pivot(row, label)
    }

    pub fn refactor(&mut self) -> Result<(), TableauError> {
        self.tableau.refactor()
    }

    pub fn get_bfs(&self) -> BasicFeasibleSolution<T> {
        self.tableau.get_bfs()
    }

    /// The nonzero reduced costs of the nonbasic labels: the basic solution of the dual.
    pub fn get_dual_bfs(&self) -> Result<BasicFeasibleSolution<T>, TableauError> {
        let eps = self.config().eps2;
        let costs = self.relative_costs()?;
        let mut bfs = BasicFeasibleSolution::new();
        for (label, rc) in self.basis().all_labels().zip(costs) {
            if !self.basis().is_member(label) {
                bfs.insert(label, rc, eps);
            }
        }
        Ok(bfs)
    }
}

/**
 * The primal simplex pivot leading from the current basis towards the optimum: Bland's rule picks the
 * smallest label with negative reduced cost, the lexicographic ratio test picks its row. `None` at an
 * optimal basis, and when the entering column is unbounded.
 */
pub fn parent_pivot<T: PivotNumber>(
    tab: &LpTableau<T>,
) -> Result<Option<(usize, Label)>, TableauError> {
    let eps = tab.config().eps1;
    let costs = tab.relative_costs()?;
    let entering = tab
        .basis()
        .all_labels()
        .zip(costs.iter())
        .find(|(label, rc)| tab.is_candidate(*label) && rc.lt_zero(eps))
        .map(|(label, _)| label);
    Ok(entering.and_then(|label| {
        lexicographic_min_ratio(tab.tableau(), label, RatioDirection::Decreasing).map(|row| (row, label))
    }))
}

/**
 * Whether pivoting `label` into `row` leads to a basis whose [`parent_pivot`] leads back here. Reverse
 * search follows exactly these pivots.
 */
pub fn is_reverse_pivot<T: PivotNumber>(
    tab: &LpTableau<T>,
    row: usize,
    label: Label,
) -> Result<bool, TableauError> {
    let eps1 = tab.config().eps1;
    if !tab.is_candidate(label) {
        return Ok(false);
    }
    let leaving = tab.basis().label(row);
    if tab.is_fixed(leaving) {
        return Ok(false);
    }

    let alpha = tab.tableau().entry(row, label);
    if !alpha.gt_zero(eps1) {
        return Ok(false);
    }
    let costs = tab.relative_costs()?;
    let rc_entering = &costs[tab.basis().ordinal(label)];
    if !rc_entering.gt_zero(eps1) {
        return Ok(false);
    }
    if lexicographic_min_ratio(tab.tableau(), label, RatioDirection::Decreasing) != Some(row) {
        return Ok(false);
    }

    // in the new basis, `leaving` has reduced cost -rc/alpha < 0 and must be the smallest such label
    let ratio = rc_entering.clone() / &alpha;
    let entries = tab.tableau().tableau_row(row);
    for k in tab.basis().all_labels() {
        if k >= leaving {
            break;
        }
        if k == label || !tab.is_candidate(k) {
            continue;
        }
        let ordinal = tab.basis().ordinal(k);
        let rc_new = costs[ordinal].clone() - &(ratio.clone() * &entries[ordinal]);
        if rc_new.lt_zero(eps1) {
            return Ok(false);
        }
    }
    Ok(true)
}

/**
 * The dual simplex pivot leading from a lexicographically dual feasible basis towards the optimum.
 * Both sides are perturbed: the right-hand side as in [`lexicographic_min_ratio`], and the costs by
 * `c_l + e^(1 + ordinal(l))`. The row of the smallest basic label whose perturbed value is negative
 * leaves; the entering label minimises the perturbed ratio `rc / |entry|` over the negative entries of
 * that row, which is never tied. Under both perturbations the optimal basis is unique, so every
 * lexicographically dual feasible basis leads to the same root.
 */
pub fn dual_parent_pivot<T: PivotNumber>(
    tab: &LpTableau<T>,
) -> Result<Option<(usize, Label)>, TableauError> {
    let eps1 = tab.config().eps1;
    let eps2 = tab.config().eps2;
    let values = tab.tableau().basis_vector();
    let row = (0..values.len())
        .filter(|row| lexicographic_sign(tab.tableau(), *row, &values[*row]) == Ordering::Less)
        .min_by_key(|row| tab.basis().label(*row));
    let Some(row) = row else {
        return Ok(None);
    };

    let costs = tab.relative_costs()?;
    let entries = tab.tableau().tableau_row(row);
    let mut best: Option<(Label, Vec<T>)> = None;
    for label in tab.basis().all_labels() {
        let ordinal = tab.basis().ordinal(label);
        if !tab.is_candidate(label) || !entries[ordinal].lt_zero(eps1) {
            continue;
        }
        let scale = entries[ordinal].abs();
        let ratio: Vec<T> = tab
            .perturbed_cost(label, &costs[ordinal])
            .into_iter()
            .map(|x| x / &scale)
            .collect();
        let better = match &best {
            None => true,
            Some((_, b)) => lexicographic_compare(&ratio, b, eps2) == Ordering::Less,
        };
        if better {
            best = Some((label, ratio));
        }
    }
    Ok(best.map(|(label, _)| (row, label)))
}

/**
 * Whether pivoting `label` into `row` leads to a lexicographically dual feasible basis whose
 * [`dual_parent_pivot`] leads back here. The pivot is tried on a copy of the tableau.
 */
pub fn is_dual_reverse_pivot<T: PivotNumber>(
    tab: &LpTableau<T>,
    row: usize,
    label: Label,
) -> Result<bool, TableauError> {
    let eps1 = tab.config().eps1;
    if !tab.is_candidate(label) {
        return Ok(false);
    }
    let leaving = tab.basis().label(row);
    if tab.is_fixed(leaving) {
        return Ok(false);
    }
    // the parent pivot needs a negative entry of `leaving` in the row of `label`, which is 1/alpha
    let alpha = tab.tableau().entry(row, label);
    if !alpha.lt_zero(eps1) {
        return Ok(false);
    }
    // dividing by alpha must turn the row lexicographically negative
    let value = tab.tableau().basis_vector().swap_remove(row);
    if lexicographic_sign(tab.tableau(), row, &value) != Ordering::Greater {
        return Ok(false);
    }

    let mut child = tab.clone();
    child.pivot(row, label)?;
    Ok(child.is_lexicographically_dual_feasible()? && dual_parent_pivot(&child)? == Some((row, leaving)))
}

impl<T: PivotNumber> LpTableau<T> {
    /**
     * The reduced cost of nonbasic `label` under the perturbed costs `c_l + e^(1 + ordinal(l))`, as its
     * coefficients: `rc` first, then one entry per label ordinal. The entry of `label` itself is one,
     * the entry of the basic label of row `p` is `-(B^-1 a_label)[p]`.
     */
    fn perturbed_cost(&self, label: Label, rc: &T) -> Vec<T> {
        let mut result = vec![T::zero(); self.basis().num_labels() + 1];
        result[0] = rc.clone();
        result[1 + self.basis().ordinal(label)] = T::one();
        for (p, alpha) in self.tableau().column(label).into_iter().enumerate() {
            result[1 + self.basis().ordinal(self.basis().label(p))] = -alpha;
        }
        result
    }

    /// Whether every label that may enter has a lexicographically positive perturbed reduced cost.
    pub fn is_lexicographically_dual_feasible(&self) -> Result<bool, TableauError> {
        let eps1 = self.config().eps1;
        let costs = self.relative_costs()?;
        for label in self.basis().all_labels() {
            if !self.is_candidate(label) {
                continue;
            }
            let rc = &costs[self.basis().ordinal(label)];
            if rc.gt_zero(eps1) {
                continue;
            }
            if rc.lt_zero(eps1) || first_nonzero_sign(&self.perturbed_cost(label, rc), eps1) != Ordering::Greater {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        math::{matrix::Matrix, rational::Rational},
        optimisation_algorithms::{
            basis::Label,
            config::PivotConfig,
            lp_tableau::{
                LpTableau, dual_parent_pivot, is_dual_reverse_pivot, is_reverse_pivot, parent_pivot,
            },
            tableau::TableauOps,
        },
    };

    fn r(n: i64) -> Rational {
        Rational::from(n)
    }

    /// min -x0 - x1 s.t. x0 + 2 x1 <= 4, 3 x0 + x1 <= 6
    fn example() -> LpTableau<Rational> {
        let a = Matrix::from_rows(vec![vec![r(1), r(2)], vec![r(3), r(1)]]).unwrap();
        let mut tab = LpTableau::new(&a, &[r(4), r(6)], PivotConfig::default()).unwrap();
        tab.set_cost(vec![r(-1), r(-1)]).unwrap();
        tab
    }

    #[test]
    fn reduced_costs_and_duals() {
        let mut tab = example();
        assert_eq!(tab.relative_cost(Label::Structural(0)).unwrap(), r(-1));
        assert!(!tab.is_optimal().unwrap());

        tab.pivot(1, Label::Structural(0)).unwrap();
        tab.pivot(0, Label::Structural(1)).unwrap();
        assert!(tab.is_optimal().unwrap());
        assert_eq!(tab.objective_value(), Rational::from((-14, 5)));
        // y^T A = c^T on the basic columns
        let y = tab.dual_vector().unwrap();
        assert_eq!(y, vec![Rational::from((-2, 5)), Rational::from((-1, 5))]);
        assert_eq!(tab.relative_cost(Label::Slack(0)).unwrap(), Rational::from((2, 5)));
        let dual = tab.get_dual_bfs().unwrap();
        assert_eq!(dual.len(), 2);
    }

    #[test]
    fn fixed_labels_do_not_enter() {
        let mut tab = example();
        tab.fix_at_zero(Label::Structural(0));
        assert_eq!(parent_pivot(&tab).unwrap().map(|(_, l)| l), Some(Label::Structural(1)));
        tab.release(Label::Structural(0));
        assert_eq!(parent_pivot(&tab).unwrap(), Some((1, Label::Structural(0))));
    }

    #[test]
    fn reverse_pivot_inverts_parent() {
        // cost 1 on the structurals: the slack basis is the root
        let a = Matrix::from_rows(vec![vec![r(1), r(0)], vec![r(0), r(1)]]).unwrap();
        let mut tab = LpTableau::new(&a, &[r(1), r(1)], PivotConfig::default()).unwrap();
        tab.set_cost(vec![r(1), r(1)]).unwrap();
        assert_eq!(parent_pivot(&tab).unwrap(), None);

        assert!(is_reverse_pivot(&tab, 0, Label::Structural(0)).unwrap());
        assert!(!is_reverse_pivot(&tab, 1, Label::Structural(0)).unwrap());
        tab.pivot(0, Label::Structural(0)).unwrap();
        assert_eq!(parent_pivot(&tab).unwrap(), Some((0, Label::Slack(0))));

        // from {x0, s1}, bringing in x1 leaves {x0, x1}, whose parent removes x0 first
        assert!(!is_reverse_pivot(&tab, 1, Label::Structural(1)).unwrap());
    }

    #[test]
    fn dual_reverse_pivot_inverts_dual_parent() {
        // -y <= 1, y <= 2, cost y
        let a = Matrix::from_rows(vec![vec![r(-1)], vec![r(1)]]).unwrap();
        let mut tab = LpTableau::new(&a, &[r(1), r(2)], PivotConfig::default()).unwrap();
        tab.set_cost(vec![r(1)]).unwrap();
        assert!(tab.is_dual_feasible().unwrap());
        assert_eq!(dual_parent_pivot(&tab).unwrap(), None);

        assert!(is_dual_reverse_pivot(&tab, 0, Label::Structural(0)).unwrap());
        assert!(!is_dual_reverse_pivot(&tab, 1, Label::Structural(0)).unwrap());

        tab.pivot(0, Label::Structural(0)).unwrap();
        assert!(tab.is_dual_feasible().unwrap());
        assert_eq!(dual_parent_pivot(&tab).unwrap(), Some((0, Label::Slack(0))));
    }

    #[test]
    fn zero_costs_are_perturbed() {
        // 2 y0 - y2 <= 1 with cost (0, 3, 2): {s0} and {y0} are both optimal
        let a = Matrix::from_rows(vec![vec![r(2), r(0), r(-1)]]).unwrap();
        let mut tab = LpTableau::new(&a, &[r(1)], PivotConfig::default()).unwrap();
        tab.set_cost(vec![r(0), r(3), r(2)]).unwrap();
        assert!(tab.is_lexicographically_dual_feasible().unwrap());
        assert_eq!(dual_parent_pivot(&tab).unwrap(), None);
        assert!(!is_dual_reverse_pivot(&tab, 0, Label::Structural(0)).unwrap());
        assert!(is_dual_reverse_pivot(&tab, 0, Label::Structural(2)).unwrap());

        let mut other = tab.clone();
        other.pivot(0, Label::Structural(0)).unwrap();
        assert!(other.is_dual_feasible().unwrap());
        assert!(!other.is_lexicographically_dual_feasible().unwrap());

        // y2 = -1 + 2 y0 + s0: the tie between y0 and s0 goes to s0
        tab.pivot(0, Label::Structural(2)).unwrap();
        assert_eq!(dual_parent_pivot(&tab).unwrap(), Some((0, Label::Slack(0))));
    }

    #[test]
    fn zero_rhs_is_perturbed() {
        // -y + s = 0: y can enter at value zero
        let a = Matrix::from_rows(vec![vec![r(-1)]]).unwrap();
        let mut tab = LpTableau::new(&a, &[r(0)], PivotConfig::default()).unwrap();
        tab.set_cost(vec![r(1)]).unwrap();
        assert_eq!(dual_parent_pivot(&tab).unwrap(), None);
        assert!(is_dual_reverse_pivot(&tab, 0, Label::Structural(0)).unwrap());

        tab.pivot(0, Label::Structural(0)).unwrap();
        assert!(tab.tableau().is_feasible());
        assert_eq!(dual_parent_pivot(&tab).unwrap(), Some((0, Label::Slack(0))));
    }
}
