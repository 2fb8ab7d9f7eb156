use std::iter;

use log::{debug, trace, warn};
use num::{Signed as NumSigned, Zero as NumZero};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};

use crate::math::{
    integer::{Integer, exact_div, lcm_of_denominators},
    matrix::Matrix,
    rational::Rational,
    traits::{One, Zero},
};

use super::{
    basis::{Basis, Label},
    config::PivotConfig,
    tableau::{TableauError, TableauOps, check_dimensions},
};

/// Above this many tableau cells, pivots update the rows in parallel.
const PARALLEL_THRESHOLD: usize = 10_000;

/**
 * Exact tableau in fraction-free form.
 *
 * Every row `i` of `[A I Art | b]` is first multiplied by the smallest integer `scale[i]` that clears
 * its denominators; the slack of that row becomes `scale[i] * s_i`. The scaled system is kept as an
 * integer matrix `tabdat` (with the right-hand side in `coeff`) over a common positive denominator
 * `denom`, the absolute determinant of the scaled basis matrix. Pivots are Bareiss updates, whose
 * divisions are exact, so the entries never leave the integers.
 *
 * All accessors undo the row scaling and report entries of the original system.
 */
#[derive(Clone, Debug)]
pub struct RationalTableau {
    a: Matrix<Rational>,
    art: Matrix<Rational>,
    b: Vec<Rational>,
    scale: Vec<Integer>,
    basis: Basis,
    config: PivotConfig,
    tabdat: Vec<Vec<Integer>>,
    coeff: Vec<Integer>,
    denom: Integer,
    pivots: usize,
}

fn scaled(value: &Rational, factor: &Integer) -> Integer {
    exact_div(&(value.numer() * factor), value.denom())
}

fn row_scales(a: &Matrix<Rational>, art: &Matrix<Rational>, b: &[Rational]) -> Vec<Integer> {
    (0..a.rows())
        .map(|i| {
            let art_row: &[Rational] = if art.cols() > 0 { art.row(i) } else { &[] };
            lcm_of_denominators(a.row(i).iter().chain(art_row.iter()).chain(iter::once(&b[i])))
        })
        .collect()
}

impl RationalTableau {
    pub fn denominator(&self) -> &Integer {
        &self.denom
    }

    /// The integer entry of the scaled tableau, over [`Self::denominator`].
    pub fn numerator(&self, row: usize, label: Label) -> &Integer {
        &self.tabdat[row][self.column_index(label)]
    }

    fn num_columns(&self) -> usize {
        self.a.cols() + self.a.rows() + self.art.cols()
    }

    fn column_index(&self, label: Label) -> usize {
        match label {
            Label::Structural(j) => j,
            Label::Slack(i) => self.a.cols() + i,
            Label::Artificial(k) => self.a.cols() + self.a.rows() + k,
        }
    }

    /// Undoes the row scaling of the basic variable of `row`.
    fn row_factor(&self, row: usize) -> Rational {
        match self.basis.label(row) {
            Label::Slack(k) => Rational::new(Integer::from(1), self.scale[k].clone()),
            _ => Rational::one(),
        }
    }

    fn column_factor(&self, label: Label) -> Rational {
        match label {
            Label::Slack(k) => Rational::from_integer(self.scale[k].clone()),
            _ => Rational::one(),
        }
    }

    fn check_length(&self, what: &'static str, v: &[Rational]) -> Result<(), TableauError> {
        if v.len() != self.basis.num_rows() {
            return Err(TableauError::BadDim {
                what,
                expected: self.basis.num_rows(),
                found: v.len(),
            });
        }
        Ok(())
    }

    fn into_integer(value: Rational) -> Result<Integer, TableauError> {
        if value.is_integer() {
            Ok(value.numer().clone())
        } else {
            warn!("fraction-free tableau produced the non-integral entry {}", value);
            Err(TableauError::Singular)
        }
    }

    /// The rows of `B^-1`, from the integer tableau.
    fn inverse(&self) -> Vec<Vec<Rational>> {
        (0..self.basis.num_rows()).map(|row| self.inverse_row(row)).collect()
    }

    /// Stores a fraction-free representation of the slack basis.
    fn reset(&mut self) {
        let n = self.a.cols();
        let m = self.a.rows();
        let columns = self.num_columns();
        self.tabdat = (0..m)
            .map(|i| {
                let mut row = vec![Integer::zero(); columns];
                for j in 0..n {
                    row[j] = scaled(&self.a[(i, j)], &self.scale[i]);
                }
                row[n + i] = Integer::from(1);
                for k in 0..self.art.cols() {
                    row[n + m + k] = scaled(&self.art[(i, k)], &self.scale[i]);
                }
                row
            })
            .collect();
        self.coeff = (0..m).map(|i| scaled(&self.b[i], &self.scale[i])).collect();
        self.denom = Integer::from(1);
    }
}

impl TableauOps<Rational> for RationalTableau {
    fn with_artificials(
        a: &Matrix<Rational>,
        art: &Matrix<Rational>,
        b: &[Rational],
        config: PivotConfig,
    ) -> Result<Self, TableauError> {
        check_dimensions(a, art, b)?;
        let m = a.rows();
        let art = if art.cols() == 0 {
            Matrix::new_sized(m, 0, Rational::zero())
        } else {
            art.clone()
        };
        let scale = row_scales(a, &art, b);
        debug!(
            "exact tableau with {} rows, {} structural and {} artificial columns",
            m,
            a.cols(),
            art.cols()
        );
        let mut result = Self {
            a: a.clone(),
            basis: Basis::slack_basis(m, a.cols(), art.cols()),
            art,
            b: b.to_vec(),
            scale,
            config,
            tabdat: vec![],
            coeff: vec![],
            denom: Integer::from(1),
            pivots: 0,
        };
        result.reset();
        Ok(result)
    }

    fn basis(&self) -> &Basis {
        &self.basis
    }

    fn config(&self) -> &PivotConfig {
        &self.config
    }

    fn num_pivots(&self) -> usize {
        self.pivots
    }

    fn original_column(&self, label: Label) -> Vec<Rational> {
        match label {
            Label::Structural(j) => self.a.column(j),
            Label::Slack(i) => {
                let mut column = vec![Rational::zero(); self.basis.num_rows()];
                column[i] = Rational::one();
                column
            }
            Label::Artificial(k) => self.art.column(k),
        }
    }

    fn entry(&self, row: usize, label: Label) -> Rational {
        match self.basis.find(label) {
            Some(r) if r == row => Rational::one(),
            Some(_) => Rational::zero(),
            None => {
                let value = &self.tabdat[row][self.column_index(label)];
                if value.is_zero() {
                    return Rational::zero();
                }
                Rational::new(value.clone(), self.denom.clone())
                    * self.row_factor(row)
                    * self.column_factor(label)
            }
        }
    }

    fn basis_vector(&self) -> Vec<Rational> {
        (0..self.basis.num_rows())
            .map(|row| Rational::new(self.coeff[row].clone(), self.denom.clone()) * self.row_factor(row))
            .collect()
    }

    fn solve(&self, rhs: &[Rational]) -> Result<Vec<Rational>, TableauError> {
        self.check_length("right-hand side", rhs)?;
        Ok(self
            .inverse()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(rhs.iter())
                    .filter(|(x, _)| !x.is_zero())
                    .map(|(x, b)| x * b)
                    .sum::<Rational>()
            })
            .collect())
    }

    fn solve_transpose(&self, rhs: &[Rational]) -> Result<Vec<Rational>, TableauError> {
        self.check_length("cost vector", rhs)?;
        let m = self.basis.num_rows();
        let mut y = vec![Rational::zero(); m];
        for (row, c) in rhs.iter().enumerate() {
            if c.is_zero() {
                continue;
            }
            for (k, y_k) in y.iter_mut().enumerate() {
                *y_k += self.entry(row, Label::Slack(k)) * c;
            }
        }
        Ok(y)
    }

    fn pivot(&mut self, row: usize, label: Label) -> Result<Label, TableauError> {
        if row >= self.basis.num_rows() || !self.basis.contains(label) || self.basis.is_member(label) {
            return Err(TableauError::BadPivot { row, label });
        }
        let column = self.column_index(label);
        let p = self.tabdat[row][column].clone();
        if p.is_zero() {
            return Err(TableauError::BadPivot { row, label });
        }

        let pivot_row = self.tabdat[row].clone();
        let pivot_coeff = self.coeff[row].clone();
        let denom = self.denom.clone();
        let update = |(i, (tab_row, coeff)): (usize, (&mut Vec<Integer>, &mut Integer))| {
            if i == row {
                return;
            }
            let factor = tab_row[column].clone();
            for (x, y) in tab_row.iter_mut().zip(pivot_row.iter()) {
                let mut value = &*x * &p;
                if !factor.is_zero() && !y.is_zero() {
                    value -= &factor * y;
                }
                *x = exact_div(&value, &denom);
            }
            *coeff = exact_div(&(&*coeff * &p - &factor * &pivot_coeff), &denom);
        };
        if self.tabdat.len() * self.num_columns() > PARALLEL_THRESHOLD {
            let mut rows: Vec<_> = self.tabdat.iter_mut().zip(self.coeff.iter_mut()).collect();
            rows.par_iter_mut()
                .enumerate()
                .for_each(|(i, (tab_row, coeff))| update((i, (&mut **tab_row, &mut **coeff))));
        } else {
            self.tabdat
                .iter_mut()
                .zip(self.coeff.iter_mut())
                .enumerate()
                .for_each(update);
        }

        if p.is_negative() {
            self.tabdat
                .iter_mut()
                .flat_map(|row| row.iter_mut())
                .chain(self.coeff.iter_mut())
                .for_each(|x| *x = -&*x);
            self.denom = -p;
        } else {
            self.denom = p;
        }

        let leaving = self.basis.pivot(row, label);
        self.pivots += 1;
        trace!(
            "pivot {}: {} enters, {} leaves row {}, denominator {}",
            self.pivots, label, leaving, row, self.denom
        );

        if self.pivots % self.config.refactor_interval.max(1) == 0 {
            self.refactor()?;
        }
        Ok(leaving)
    }

    /**
     * Re-derives the integer tableau of the current basis from the original data: the basis matrix is
     * inverted exactly, and the determinant of the scaled basis matrix becomes the new denominator.
     */
    fn refactor(&mut self) -> Result<(), TableauError> {
        let m = self.basis.num_rows();
        let mut basis_matrix = Matrix::new_sized(m, m, Rational::zero());
        for (c, label) in self.basis.labels().iter().enumerate() {
            for (r, value) in self.original_column(*label).into_iter().enumerate() {
                basis_matrix[(r, c)] = value;
            }
        }
        let (inverse, determinant) = basis_matrix.solve_exact().map_err(|e| {
            warn!("exact refactorisation failed: {}", e);
            TableauError::Singular
        })?;

        let mut scaled_determinant = determinant;
        for (row, scale) in self.scale.iter().enumerate() {
            scaled_determinant *= Rational::from_integer(scale.clone());
            if let Label::Slack(k) = self.basis.label(row) {
                scaled_determinant /= Rational::from_integer(self.scale[k].clone());
            }
        }
        let denom = Self::into_integer(scaled_determinant)?.abs();
        let denom_rational = Rational::from_integer(denom.clone());

        let row_factors: Vec<Rational> = (0..m).map(|row| self.row_factor(row)).collect();
        let labels: Vec<Label> = self.basis.all_labels().collect();
        let mut tabdat = vec![vec![Integer::zero(); self.num_columns()]; m];
        for label in labels {
            let c = self.column_index(label);
            let column = inverse.mul_vector(&self.original_column(label));
            let column_factor = self.column_factor(label);
            for (row, value) in column.into_iter().enumerate() {
                if value.is_zero() {
                    continue;
                }
                let value = value / &row_factors[row] / &column_factor * &denom_rational;
                tabdat[row][c] = Self::into_integer(value)?;
            }
        }
        let mut coeff = vec![Integer::zero(); m];
        for (row, value) in inverse.mul_vector(&self.b).into_iter().enumerate() {
            coeff[row] = Self::into_integer(value / &row_factors[row] * &denom_rational)?;
        }

        self.tabdat = tabdat;
        self.coeff = coeff;
        self.denom = denom;
        Ok(())
    }

    fn set_rhs(&mut self, b: &[Rational]) -> Result<(), TableauError> {
        self.check_length("right-hand side", b)?;
        self.b = b.to_vec();
        self.scale = row_scales(&self.a, &self.art, &self.b);
        self.refactor()
    }

    fn block(&mut self, label: Label) {
        self.basis.block(label);
    }

    fn unblock(&mut self, label: Label) {
        self.basis.unblock(label);
    }
}
