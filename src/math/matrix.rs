use std::ops::{Index, IndexMut};

use anyhow::{Result, anyhow};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};

use super::{
    rational::Rational,
    traits::{Number, One, Zero},
};

/**
 * A dense, row-major matrix over any pivoting number type.
 */
#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
    rows: Vec<Vec<T>>,
    columns: usize,
}

impl<T: Number> Matrix<T> {
    pub fn new_sized(rows: usize, columns: usize, value: T) -> Self {
        Self {
            rows: vec![vec![value; columns]; rows],
            columns,
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut result = Self::new_sized(size, size, T::zero());
        for i in 0..size {
            result.rows[i][i] = T::one();
        }
        result
    }

    /// Fails if the rows do not all have the same length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let columns = rows.first().map_or(0, |row| row.len());
        if let Some((r, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != columns) {
            return Err(anyhow!(
                "row {} has {} columns, while the first row has {}",
                r,
                row.len(),
                columns
            ));
        }
        Ok(Self { rows, columns })
    }

    /// Reads `"1,2;3,4"`: rows separated by semicolons, entries by commas. Entries may be fractions.
    pub fn parse(text: &str) -> Result<Self> {
        let rows = text
            .split(';')
            .map(|row| {
                row.split(',')
                    .map(|entry| Ok(T::from_rational(&entry.parse::<Rational>()?)))
                    .collect::<Result<Vec<T>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_rows(rows)
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.columns
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.rows[row]
    }

    pub fn column(&self, column: usize) -> Vec<T> {
        self.rows.iter().map(|row| row[column].clone()).collect()
    }

    pub fn transpose(&self) -> Self {
        let mut rows = vec![Vec::with_capacity(self.rows()); self.columns];
        for row in &self.rows {
            for (j, value) in row.iter().enumerate() {
                rows[j].push(value.clone());
            }
        }
        Self {
            rows,
            columns: self.rows(),
        }
    }

    pub fn mul_vector(&self, vector: &[T]) -> Vec<T> {
        assert_eq!(self.columns, vector.len());
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(vector.iter())
                    .fold(T::zero(), |sum, (a, x)| sum + &(a.clone() * x))
            })
            .collect()
    }

    /// `vector^T * self`
    pub fn vector_mul(&self, vector: &[T]) -> Vec<T> {
        assert_eq!(self.rows(), vector.len());
        let mut result = vec![T::zero(); self.columns];
        for (row, y) in self.rows.iter().zip(vector.iter()) {
            if y.is_zero() {
                continue;
            }
            for (r, a) in result.iter_mut().zip(row.iter()) {
                *r += &(a.clone() * y);
            }
        }
        result
    }

    pub fn min_entry(&self) -> Option<&T> {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .fold(None, |min: Option<&T>, x| match min {
                Some(m) if m <= x => Some(m),
                _ => Some(x),
            })
    }

    /// Adds `value` to every entry.
    pub fn shift(&mut self, value: &T) {
        if self.rows() * self.columns > 100 {
            self.rows.par_iter_mut().for_each(|row| {
                row.iter_mut().for_each(|x| *x += value);
            });
        } else {
            self.rows.iter_mut().for_each(|row| row.iter_mut().for_each(|x| *x += value));
        }
    }

    pub fn map<U: Number>(&self, f: impl Fn(&T) -> U) -> Matrix<U> {
        Matrix {
            rows: self.rows.iter().map(|row| row.iter().map(&f).collect()).collect(),
            columns: self.columns,
        }
    }
}

impl Matrix<Rational> {
    /**
     * Exact Gauss-Jordan elimination of a square matrix. Returns the inverse together with the
     * determinant, or an error if the matrix is singular.
     */
    pub fn solve_exact(&self) -> Result<(Self, Rational)> {
        let n = self.rows();
        if n != self.columns {
            return Err(anyhow!("cannot invert a {}x{} matrix", n, self.columns));
        }

        //extend the rows with the identity matrix
        let mut rows: Vec<Vec<Rational>> = self
            .rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let mut row = row.clone();
                row.extend(vec![Rational::zero(); n]);
                row[n + r] = Rational::one();
                row
            })
            .collect();

        let mut determinant = Rational::one();
        for i in 0..n {
            let pivot = (i..n)
                .find(|&r| !rows[r][i].is_zero())
                .ok_or_else(|| anyhow!("matrix is not invertible"))?;
            if pivot != i {
                rows.swap(pivot, i);
                determinant = -determinant;
            }

            let factor = rows[i][i].clone();
            determinant *= &factor;
            rows[i].iter_mut().for_each(|x| *x /= &factor);

            let pivot_row = rows[i].clone();
            let eliminate = |(r, row): (usize, &mut Vec<Rational>)| {
                if r == i || row[i].is_zero() {
                    return;
                }
                let factor = row[i].clone();
                for (x, p) in row.iter_mut().zip(pivot_row.iter()).skip(i) {
                    if !p.is_zero() {
                        *x -= &(p * &factor);
                    }
                }
            };
            if n > 100 {
                rows.par_iter_mut().enumerate().for_each(eliminate);
            } else {
                rows.iter_mut().enumerate().for_each(eliminate);
            }
        }

        //reduce the rows
        rows.iter_mut().for_each(|row| {
            row.drain(0..n);
        });

        Ok((Self { rows, columns: n }, determinant))
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.rows[index.0][index.1]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.rows[index.0][index.1]
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{{")?;
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                write!(f, "{}", value)?;
                if j < row.len() - 1 {
                    write!(f, ", ")?;
                }
            }
            if i < self.rows.len() - 1 {
                write!(f, "}}, {{")?;
            }
        }
        write!(f, "}}}}")
    }
}

impl<T> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} matrix", self.rows.len(), self.columns)
    }
}
