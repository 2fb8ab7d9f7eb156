use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
};

use crate::math::{matrix::Matrix, rational::Rational, traits::Number};

use super::{
    basis::{Basis, Label},
    bfs::BasicFeasibleSolution,
    config::PivotConfig,
    tableau_exact::RationalTableau,
    tableau_f64::FloatTableau,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableauError {
    /// A matrix or vector does not have the size the tableau expects.
    BadDim {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// The pivot element is zero, or the label cannot enter.
    BadPivot { row: usize, label: Label },
    /// The basis matrix could not be factorised.
    Singular,
}

impl Display for TableauError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableauError::BadDim {
                what,
                expected,
                found,
            } => write!(f, "{} has dimension {}, while {} was expected", what, found, expected),
            TableauError::BadPivot { row, label } => {
                write!(f, "cannot pivot {} into row {}", label, row)
            }
            TableauError::Singular => write!(f, "basis matrix is singular"),
        }
    }
}

impl std::error::Error for TableauError {}

pub(crate) fn check_dimensions<T: Number>(
    a: &Matrix<T>,
    art: &Matrix<T>,
    b: &[T],
) -> Result<(), TableauError> {
    if b.len() != a.rows() {
        return Err(TableauError::BadDim {
            what: "right-hand side",
            expected: a.rows(),
            found: b.len(),
        });
    }
    if art.rows() != a.rows() && art.cols() > 0 {
        return Err(TableauError::BadDim {
            what: "artificial columns",
            expected: a.rows(),
            found: art.rows(),
        });
    }
    Ok(())
}

/**
 * The representation of a basis of the linear system `A x + s + Art a = b`, where `s` are the slack
 * variables and `a` the (optional) artificial variables. Implementations differ in how they keep
 * `B^-1` available; all quantities they return are in terms of the original system.
 */
pub trait TableauOps<T: Number>: Clone + Debug + Send + Sized {
    /// A tableau for `A x + s = b` at the slack basis.
    fn new(a: &Matrix<T>, b: &[T], config: PivotConfig) -> Result<Self, TableauError> {
        Self::with_artificials(a, &Matrix::new_sized(a.rows(), 0, T::zero()), b, config)
    }

    /// A tableau for `A x + s + Art a = b` at the slack basis.
    fn with_artificials(
        a: &Matrix<T>,
        art: &Matrix<T>,
        b: &[T],
        config: PivotConfig,
    ) -> Result<Self, TableauError>;

    fn num_rows(&self) -> usize {
        self.basis().num_rows()
    }

    fn num_structural(&self) -> usize {
        self.basis().num_structural()
    }

    fn num_artificial(&self) -> usize {
        self.basis().num_artificial()
    }

    fn basis(&self) -> &Basis;

    fn config(&self) -> &PivotConfig;

    fn num_pivots(&self) -> usize;

    /// The column of `label` in the original system.
    fn original_column(&self, label: Label) -> Vec<T>;

    /// `(B^-1 a_label)[row]`
    fn entry(&self, row: usize, label: Label) -> T;

    /// `B^-1 a_label`
    fn column(&self, label: Label) -> Vec<T> {
        (0..self.num_rows()).map(|row| self.entry(row, label)).collect()
    }

    /// `B^-1 b`, the values of the basic variables in row order.
    fn basis_vector(&self) -> Vec<T>;

    /// Row `row` of `B^-1`.
    fn inverse_row(&self, row: usize) -> Vec<T> {
        (0..self.num_rows()).map(|k| self.entry(row, Label::Slack(k))).collect()
    }

    /// Row `row` of `B^-1 [A I Art]`, indexed by label ordinal.
    fn tableau_row(&self, row: usize) -> Vec<T> {
        self.basis()
            .all_labels()
            .map(|label| self.entry(row, label))
            .collect()
    }

    /// `x` such that `B x = rhs`.
    fn solve(&self, rhs: &[T]) -> Result<Vec<T>, TableauError>;

    /// `y` such that `y^T B = rhs^T`.
    fn solve_transpose(&self, rhs: &[T]) -> Result<Vec<T>, TableauError>;

    /// Whether `label` can enter the basis in `row`: it is nonbasic and the pivot element is nonzero.
    fn can_pivot(&self, row: usize, label: Label) -> bool {
        row < self.num_rows()
            && self.basis().contains(label)
            && !self.basis().is_member(label)
            && !self.entry(row, label).eq_zero(self.config().eps1)
    }

    /// Exchanges the basic label of `row` for `label`; returns the label that left.
    fn pivot(&mut self, row: usize, label: Label) -> Result<Label, TableauError>;

    /// Recomputes the representation of the current basis from the original columns.
    fn refactor(&mut self) -> Result<(), TableauError>;

    /// Replaces the right-hand side `b`, keeping the basis.
    fn set_rhs(&mut self, b: &[T]) -> Result<(), TableauError>;

    fn block(&mut self, label: Label);

    fn unblock(&mut self, label: Label);

    /// Set when a floating-point pivot or factorisation was close to singular.
    fn numerically_unstable(&self) -> bool {
        false
    }

    fn get_bfs(&self) -> BasicFeasibleSolution<T> {
        let eps = self.config().eps2;
        let mut bfs = BasicFeasibleSolution::new();
        for (row, value) in self.basis_vector().into_iter().enumerate() {
            bfs.insert(self.basis().label(row), value, eps);
        }
        bfs
    }

    fn is_feasible(&self) -> bool {
        let eps = self.config().eps2;
        self.basis_vector().iter().all(|x| x.ge_zero(eps))
    }
}

/// Selects the tableau specialisation for a number type.
pub trait PivotNumber: Number {
    type Tableau: TableauOps<Self>;
}

impl PivotNumber for f64 {
    type Tableau = FloatTableau;
}

impl PivotNumber for Rational {
    type Tableau = RationalTableau;
}

/// How the basic variables move when the entering variable increases from zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatioDirection {
    /// Rows with a positive column entry decrease and block at zero (ordinary ratio test).
    Decreasing,
    /// Rows with a negative column entry increase; the row that reaches zero last is chosen. Used to
    /// bring an artificial variable in at an infeasible starting basis.
    Increasing,
}

impl RatioDirection {
    fn is_candidate<T: Number>(&self, alpha: &T, eps: f64) -> bool {
        match self {
            RatioDirection::Decreasing => alpha.gt_zero(eps),
            RatioDirection::Increasing => alpha.lt_zero(eps),
        }
    }
}

/**
 * The rows that attain the minimum of `x_i / |alpha_i|` over the candidate rows of the entering
 * column, where ties are judged with `eps2`.
 */
pub fn min_ratio_rows<T: Number>(
    tableau: &impl TableauOps<T>,
    entering: Label,
    direction: RatioDirection,
) -> Vec<usize> {
    let eps1 = tableau.config().eps1;
    let eps2 = tableau.config().eps2;
    let column = tableau.column(entering);
    let values = tableau.basis_vector();

    let mut best: Option<T> = None;
    let mut rows = vec![];
    for (row, alpha) in column.iter().enumerate() {
        if !direction.is_candidate(alpha, eps1) {
            continue;
        }
        let ratio = values[row].clone() / &alpha.abs();
        let improves = match &best {
            Some(b) if ratio.approx_eq(b, eps2) => {
                rows.push(row);
                false
            }
            Some(b) => ratio < *b,
            None => true,
        };
        if improves {
            best = Some(ratio);
            rows = vec![row];
        }
    }
    rows
}

/**
 * The anti-cycling rule shared by every pivoting algorithm of this crate: among the rows attaining the
 * minimum ratio, choose the one whose row `(x_i, B^-1_i) / |alpha_i|` is lexicographically smallest.
 * As the rows of `B^-1` are linearly independent, the choice is unique, which amounts to ratio testing
 * against the perturbed right-hand side `b + (e, e^2, ..., e^m)`.
 *
 * Returns `None` if no row is a candidate (the entering variable is unblocked).
 */
pub fn lexicographic_min_ratio<T: Number>(
    tableau: &impl TableauOps<T>,
    entering: Label,
    direction: RatioDirection,
) -> Option<usize> {
    let mut rows = min_ratio_rows(tableau, entering, direction);
    if rows.len() <= 1 {
        return rows.pop();
    }
    lexicographic_tie_break(tableau, entering, rows)
}

/// Resolves a tie between candidate rows of the ratio test by the lexicographic rule.
pub fn lexicographic_tie_break<T: Number>(
    tableau: &impl TableauOps<T>,
    entering: Label,
    rows: Vec<usize>,
) -> Option<usize> {
    let eps2 = tableau.config().eps2;
    let column = tableau.column(entering);
    let mut candidates: Vec<(usize, Vec<T>)> = rows
        .into_iter()
        .map(|row| {
            let scale = column[row].abs();
            let inverse = tableau
                .inverse_row(row)
                .into_iter()
                .map(|x| x / &scale)
                .collect();
            (row, inverse)
        })
        .collect();

    for k in 0..tableau.num_rows() {
        if candidates.len() <= 1 {
            break;
        }
        let min = candidates
            .iter()
            .map(|(_, inverse)| &inverse[k])
            .fold(None, |min: Option<&T>, x| match min {
                Some(m) if compare(m, x, eps2) != Ordering::Greater => Some(m),
                _ => Some(x),
            })?
            .clone();
        candidates.retain(|(_, inverse)| inverse[k].approx_eq(&min, eps2));
    }
    candidates.first().map(|(row, _)| *row)
}

/**
 * The sign of row `row` under the perturbed right-hand side `b + (e, e^2, ..., e^m)`: the sign of the
 * first nonzero entry of `(x_row, B^-1_row)`. `value` is `x_row`.
 */
pub fn lexicographic_sign<T: Number>(tableau: &impl TableauOps<T>, row: usize, value: &T) -> Ordering {
    let eps2 = tableau.config().eps2;
    match compare(value, &T::zero(), eps2) {
        Ordering::Equal => first_nonzero_sign(&tableau.inverse_row(row), eps2),
        sign => sign,
    }
}

/// The sign of the first entry of `vector` that is not zero up to `eps`.
pub fn first_nonzero_sign<T: Number>(vector: &[T], eps: f64) -> Ordering {
    vector
        .iter()
        .map(|x| compare(x, &T::zero(), eps))
        .find(|sign| *sign != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Lexicographic comparison of two vectors of the same length, entries judged with `eps`.
pub fn lexicographic_compare<T: Number>(a: &[T], b: &[T], eps: f64) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| compare(x, y, eps))
        .find(|order| *order != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Three-way comparison with tolerance `eps`.
pub(crate) fn compare<T: Number>(a: &T, b: &T, eps: f64) -> Ordering {
    let difference = a.clone() - b;
    if difference.lt_zero(eps) {
        Ordering::Less
    } else if difference.gt_zero(eps) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::{
        math::{matrix::Matrix, rational::Rational},
        optimisation_algorithms::{
            basis::Label,
            config::PivotConfig,
            tableau::{
                PivotNumber, RatioDirection, TableauError, TableauOps, first_nonzero_sign, lexicographic_compare,
                lexicographic_min_ratio, lexicographic_sign, min_ratio_rows,
            },
            tableau_exact::RationalTableau,
            tableau_f64::FloatTableau,
        },
    };

    fn degenerate<T: PivotNumber>() -> T::Tableau {
        // x0 + x1 + s0 = 1, x0 + s1 = 1, x0 - x1 + s2 = 2
        let a = Matrix::from_rows(vec![
            vec![T::from_i64(1), T::from_i64(1)],
            vec![T::from_i64(1), T::from_i64(0)],
            vec![T::from_i64(1), T::from_i64(-1)],
        ])
        .unwrap();
        let b = vec![T::from_i64(1), T::from_i64(1), T::from_i64(2)];
        T::Tableau::new(&a, &b, PivotConfig::default()).unwrap()
    }

    #[test]
    fn ratio_tie_is_broken_lexicographically() {
        let tableau = degenerate::<f64>();
        let rows = min_ratio_rows(&tableau, Label::Structural(0), RatioDirection::Decreasing);
        assert_eq!(rows, vec![0, 1]);
        // rows of B^-1 are e_0 and e_1; (0, 1) < (1, 0)
        assert_eq!(
            lexicographic_min_ratio(&tableau, Label::Structural(0), RatioDirection::Decreasing),
            Some(1)
        );

        let tableau = degenerate::<Rational>();
        assert_eq!(
            lexicographic_min_ratio(&tableau, Label::Structural(0), RatioDirection::Decreasing),
            Some(1)
        );
    }

    #[test]
    fn unblocked_column() {
        let a = Matrix::from_rows(vec![vec![-1.0]]).unwrap();
        let tableau = FloatTableau::new(&a, &[1.0], PivotConfig::default()).unwrap();
        assert_eq!(
            lexicographic_min_ratio(&tableau, Label::Structural(0), RatioDirection::Decreasing),
            None
        );
    }

    #[test]
    fn increasing_direction() {
        // s0 = -2 + y, s1 = -5 + y: y must rise to 5
        let a = Matrix::from_rows(vec![vec![1.0], vec![1.0]]).unwrap();
        let art = Matrix::from_rows(vec![vec![-1.0], vec![-1.0]]).unwrap();
        let tableau = FloatTableau::with_artificials(&a, &art, &[-2.0, -5.0], PivotConfig::default()).unwrap();
        assert_eq!(
            lexicographic_min_ratio(&tableau, Label::Artificial(0), RatioDirection::Increasing),
            Some(1)
        );
    }

    #[test]
    fn lexicographic_signs() {
        // x0 + s0 = 0, x0 + s1 = 1
        let a = Matrix::from_rows(vec![vec![Rational::from(1)], vec![Rational::from(1)]]).unwrap();
        let mut tableau = RationalTableau::new(&a, &[Rational::from(0), Rational::from(1)], PivotConfig::default()).unwrap();
        assert_eq!(lexicographic_sign(&tableau, 0, &Rational::from(0)), Ordering::Greater);

        // x0 = -s0, s1 = 1 + s0
        tableau.pivot(0, Label::Structural(0)).unwrap();
        let values = tableau.basis_vector();
        assert_eq!(values, vec![Rational::from(0), Rational::from(1)]);
        assert_eq!(lexicographic_sign(&tableau, 0, &values[0]), Ordering::Greater);
        assert_eq!(lexicographic_sign(&tableau, 1, &values[1]), Ordering::Greater);

        let a = Matrix::from_rows(vec![vec![Rational::from(-1)]]).unwrap();
        let mut tableau = RationalTableau::new(&a, &[Rational::from(0)], PivotConfig::default()).unwrap();
        tableau.pivot(0, Label::Structural(0)).unwrap();
        assert_eq!(lexicographic_sign(&tableau, 0, &Rational::from(0)), Ordering::Less);

        assert_eq!(lexicographic_compare(&[0.0, 1.0], &[0.0, 2.0], 1e-9), Ordering::Less);
        assert_eq!(first_nonzero_sign(&[0.0, -1e-12, 3.0], 1e-9), Ordering::Greater);
    }

    #[test]
    fn bad_dimensions() {
        let a = Matrix::from_rows(vec![vec![1.0], vec![1.0]]).unwrap();
        match FloatTableau::new(&a, &[1.0], PivotConfig::default()) {
            Err(TableauError::BadDim { expected, found, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            _ => panic!("expected BadDim"),
        }
    }
}
