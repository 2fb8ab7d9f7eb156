use log::{debug, trace, warn};

use crate::math::matrix::Matrix;

use super::{
    basis::{Basis, Label},
    config::PivotConfig,
    tableau::{TableauError, TableauOps, check_dimensions},
};

/// Pivots smaller than this fraction of the largest column entry are reported as near-singular.
const STABILITY_RATIO: f64 = 1e-7;

/**
 * Dense LU factors of a square matrix with partial pivoting: `P B = L U`, where row `i` of `P B` is row
 * `perm[i]` of `B`. `L` (unit diagonal, not stored) and `U` share one array.
 */
#[derive(Clone, Debug)]
struct LuFactors {
    lu: Vec<Vec<f64>>,
    perm: Vec<usize>,
    smallest_pivot: f64,
}

impl LuFactors {
    fn factorise(mut lu: Vec<Vec<f64>>, eps: f64) -> Result<Self, TableauError> {
        let n = lu.len();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut smallest_pivot = f64::INFINITY;

        for k in 0..n {
            let p = (k..n)
                .max_by(|&i, &j| lu[i][k].abs().total_cmp(&lu[j][k].abs()))
                .unwrap_or(k);
            if lu[p][k].abs() <= eps {
                return Err(TableauError::Singular);
            }
            lu.swap(k, p);
            perm.swap(k, p);
            smallest_pivot = smallest_pivot.min(lu[k][k].abs());

            let (upper, lower) = lu.split_at_mut(k + 1);
            let pivot_row = &upper[k];
            for row in lower.iter_mut() {
                let factor = row[k] / pivot_row[k];
                row[k] = factor;
                if factor != 0.0 {
                    for j in k + 1..n {
                        row[j] -= factor * pivot_row[j];
                    }
                }
            }
        }

        Ok(Self {
            lu,
            perm,
            smallest_pivot,
        })
    }

    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        let mut x: Vec<f64> = self.perm.iter().map(|&i| rhs[i]).collect();
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i][j] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                x[i] -= self.lu[i][j] * x[j];
            }
            x[i] /= self.lu[i][i];
        }
        x
    }

    fn solve_transpose(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        // U^T z = c
        let mut z = rhs.to_vec();
        for i in 0..n {
            for j in 0..i {
                z[i] -= self.lu[j][i] * z[j];
            }
            z[i] /= self.lu[i][i];
        }
        // L^T w = z
        for i in (0..n).rev() {
            for j in i + 1..n {
                z[i] -= self.lu[j][i] * z[j];
            }
        }
        let mut y = vec![0.0; n];
        for (i, &p) in self.perm.iter().enumerate() {
            y[p] = z[i];
        }
        y
    }
}

/// One product-form update: the basis column `row` was replaced; `column` is the entering column
/// expressed in the previous basis.
#[derive(Clone, Debug)]
struct Eta {
    row: usize,
    column: Vec<f64>,
}

impl Eta {
    fn apply(&self, x: &mut [f64]) {
        let t = x[self.row] / self.column[self.row];
        for (i, alpha) in self.column.iter().enumerate() {
            if i != self.row {
                x[i] -= alpha * t;
            }
        }
        x[self.row] = t;
    }

    fn apply_transpose(&self, c: &mut [f64]) {
        let mut sum = c[self.row];
        for (i, alpha) in self.column.iter().enumerate() {
            if i != self.row {
                sum -= c[i] * alpha;
            }
        }
        c[self.row] = sum / self.column[self.row];
    }
}

/**
 * Floating-point tableau. The basis is kept as an LU factorisation of the basis matrix at the last
 * refactorisation plus a file of eta matrices, one per pivot since then. Once the eta file reaches
 * the configured refactorisation interval the basis is factorised afresh from the original columns.
 */
#[derive(Clone, Debug)]
pub struct FloatTableau {
    a: Matrix<f64>,
    art: Matrix<f64>,
    b: Vec<f64>,
    basis: Basis,
    config: PivotConfig,
    lu: LuFactors,
    etas: Vec<Eta>,
    values: Vec<f64>,
    pivots: usize,
    unstable: bool,
}

impl FloatTableau {
    fn basis_matrix(&self) -> Vec<Vec<f64>> {
        let m = self.basis.num_rows();
        let mut rows = vec![vec![0.0; m]; m];
        for (c, label) in self.basis.labels().iter().enumerate() {
            for (r, value) in self.original_column(*label).into_iter().enumerate() {
                rows[r][c] = value;
            }
        }
        rows
    }

    fn solve_unchecked(&self, rhs: &[f64]) -> Vec<f64> {
        let mut x = self.lu.solve(rhs);
        for eta in &self.etas {
            eta.apply(&mut x);
        }
        x
    }

    fn check_length(&self, what: &'static str, v: &[f64]) -> Result<(), TableauError> {
        if v.len() != self.basis.num_rows() {
            return Err(TableauError::BadDim {
                what,
                expected: self.basis.num_rows(),
                found: v.len(),
            });
        }
        Ok(())
    }

    /// Number of eta matrices since the last refactorisation.
    pub fn num_updates(&self) -> usize {
        self.etas.len()
    }
}

impl TableauOps<f64> for FloatTableau {
    fn with_artificials(
        a: &Matrix<f64>,
        art: &Matrix<f64>,
        b: &[f64],
        config: PivotConfig,
    ) -> Result<Self, TableauError> {
        check_dimensions(a, art, b)?;
        let m = a.rows();
        let basis = Basis::slack_basis(m, a.cols(), art.cols());
        let identity = (0..m)
            .map(|i| {
                let mut row = vec![0.0; m];
                row[i] = 1.0;
                row
            })
            .collect();
        let lu = LuFactors::factorise(identity, 0.0)?;
        debug!(
            "float tableau with {} rows, {} structural and {} artificial columns",
            m,
            a.cols(),
            art.cols()
        );
        Ok(Self {
            a: a.clone(),
            art: art.clone(),
            b: b.to_vec(),
            basis,
            config,
            lu,
            etas: vec![],
            values: b.to_vec(),
            pivots: 0,
            unstable: false,
        })
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

    fn original_column(&self, label: Label) -> Vec<f64> {
        match label {
            Label::Structural(j) => self.a.column(j),
            Label::Slack(i) => {
                let mut column = vec![0.0; self.basis.num_rows()];
                column[i] = 1.0;
                column
            }
            Label::Artificial(k) => self.art.column(k),
        }
    }

    fn entry(&self, row: usize, label: Label) -> f64 {
        match self.basis.find(label) {
            Some(r) if r == row => 1.0,
            Some(_) => 0.0,
            None => self.column(label)[row],
        }
    }

    fn column(&self, label: Label) -> Vec<f64> {
        if let Some(r) = self.basis.find(label) {
            let mut column = vec![0.0; self.basis.num_rows()];
            column[r] = 1.0;
            return column;
        }
        self.solve_unchecked(&self.original_column(label))
    }

    fn basis_vector(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn inverse_row(&self, row: usize) -> Vec<f64> {
        let mut unit = vec![0.0; self.basis.num_rows()];
        unit[row] = 1.0;
        // row of B^-1 = e_row^T B^-1
        let mut c = unit;
        for eta in self.etas.iter().rev() {
            eta.apply_transpose(&mut c);
        }
        self.lu.solve_transpose(&c)
    }

    fn tableau_row(&self, row: usize) -> Vec<f64> {
        let inverse = self.inverse_row(row);
        self.basis
            .all_labels()
            .map(|label| match label {
                Label::Slack(i) => inverse[i],
                _ => self
                    .original_column(label)
                    .iter()
                    .zip(inverse.iter())
                    .map(|(a, y)| a * y)
                    .sum(),
            })
            .collect()
    }

    fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, TableauError> {
        self.check_length("right-hand side", rhs)?;
        Ok(self.solve_unchecked(rhs))
    }

    fn solve_transpose(&self, rhs: &[f64]) -> Result<Vec<f64>, TableauError> {
        self.check_length("cost vector", rhs)?;
        let mut c = rhs.to_vec();
        for eta in self.etas.iter().rev() {
            eta.apply_transpose(&mut c);
        }
        Ok(self.lu.solve_transpose(&c))
    }

    fn pivot(&mut self, row: usize, label: Label) -> Result<Label, TableauError> {
        if row >= self.basis.num_rows() || !self.basis.contains(label) || self.basis.is_member(label) {
            return Err(TableauError::BadPivot { row, label });
        }
        let column = self.column(label);
        let alpha = column[row];
        if alpha.abs() <= self.config.eps1 {
            return Err(TableauError::BadPivot { row, label });
        }
        let largest = column.iter().fold(0.0f64, |m, x| m.max(x.abs()));
        if alpha.abs() < STABILITY_RATIO * largest {
            warn!(
                "near-singular pivot {} on {} in row {} (largest entry {})",
                alpha, label, row, largest
            );
            self.unstable = true;
        }

        let eta = Eta { row, column };
        eta.apply(&mut self.values);
        self.etas.push(eta);
        let leaving = self.basis.pivot(row, label);
        self.pivots += 1;
        trace!("pivot {}: {} enters, {} leaves row {}", self.pivots, label, leaving, row);

        // the pivot stands; a failed refactorisation leaves the eta file in place
        if self.etas.len() >= self.config.refactor_interval && self.refactor().is_err() {
            warn!("keeping {} product-form updates after pivot {}", self.etas.len(), self.pivots);
        }
        Ok(leaving)
    }

    fn refactor(&mut self) -> Result<(), TableauError> {
        let lu = match LuFactors::factorise(self.basis_matrix(), self.config.eps1) {
            Ok(lu) => lu,
            Err(e) => {
                warn!("refactorisation after {} pivots failed: {}", self.pivots, e);
                self.unstable = true;
                return Err(e);
            }
        };
        if lu.smallest_pivot < self.config.eps1.sqrt() {
            warn!(
                "near-singular basis at refactorisation, smallest pivot {}",
                lu.smallest_pivot
            );
            self.unstable = true;
        }
        self.lu = lu;
        self.etas.clear();
        self.values = self.lu.solve(&self.b);
        Ok(())
    }

    fn set_rhs(&mut self, b: &[f64]) -> Result<(), TableauError> {
        self.check_length("right-hand side", b)?;
        self.b = b.to_vec();
        self.values = self.solve_unchecked(&self.b);
        Ok(())
    }

    fn block(&mut self, label: Label) {
        self.basis.block(label);
    }

    fn unblock(&mut self, label: Label) {
        self.basis.unblock(label);
    }

    fn numerically_unstable(&self) -> bool {
        self.unstable
    }
}
