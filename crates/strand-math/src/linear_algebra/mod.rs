//! Linear algebra utilities.
//!
//! Segment-local calibration systems are small (one row per basis function,
//! or basis plus constraint count for the constrained least-squares form), so
//! a dense LU factorization with partial pivoting is all that is needed. The
//! factorization is kept around because the sensitivity pass reuses the
//! inverse that the value pass produced.

use crate::error::{MathError, MathResult};
use nalgebra::{DMatrix, DVector};

/// Relative pivot size below which a matrix is treated as singular.
pub const DEFAULT_PIVOT_TOLERANCE: f64 = 1e-12;

/// LU decomposition with partial (row) pivoting: `P·A = L·U`.
///
/// `L` (unit lower triangular) and `U` are packed into a single matrix.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: DMatrix<f64>,
    /// `permutation[i]` is the row of `A` that ended up in row `i`.
    permutation: Vec<usize>,
    /// +1 or -1 depending on the parity of the row swaps.
    sign: f64,
}

impl LuDecomposition {
    /// Factorizes a square matrix using the default pivot tolerance.
    pub fn new(matrix: &DMatrix<f64>) -> MathResult<Self> {
        Self::with_tolerance(matrix, DEFAULT_PIVOT_TOLERANCE)
    }

    /// Factorizes a square matrix.
    ///
    /// A pivot smaller than `tolerance` times the largest absolute entry of
    /// the matrix is reported as [`MathError::SingularMatrix`].
    pub fn with_tolerance(matrix: &DMatrix<f64>, tolerance: f64) -> MathResult<Self> {
        let n = matrix.nrows();
        if n != matrix.ncols() {
            return Err(MathError::invalid_input("Matrix must be square for LU decomposition"));
        }
        if n == 0 {
            return Err(MathError::insufficient_data(1, 0));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(MathError::invalid_input("Matrix contains non-finite entries"));
        }

        let scale = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let threshold = tolerance * scale.max(f64::MIN_POSITIVE);

        let mut lu = matrix.clone();
        let mut permutation: Vec<usize> = (0..n).collect();
        let mut sign = 1.0;

        for k in 0..n {
            // Partial pivoting: bring the largest remaining entry of column k up.
            let mut pivot_row = k;
            let mut pivot = lu[(k, k)].abs();
            for i in k + 1..n {
                let candidate = lu[(i, k)].abs();
                if candidate > pivot {
                    pivot = candidate;
                    pivot_row = i;
                }
            }

            if pivot <= threshold {
                log::debug!("LU breakdown at column {k}: pivot {pivot:.3e} <= {threshold:.3e}");
                return Err(MathError::SingularMatrix { column: k, pivot });
            }

            if pivot_row != k {
                lu.swap_rows(k, pivot_row);
                permutation.swap(k, pivot_row);
                sign = -sign;
            }

            for i in k + 1..n {
                let factor = lu[(i, k)] / lu[(k, k)];
                lu[(i, k)] = factor;
                for j in k + 1..n {
                    let u_kj = lu[(k, j)];
                    lu[(i, j)] -= factor * u_kj;
                }
            }
        }

        Ok(Self {
            lu,
            permutation,
            sign,
        })
    }

    /// Dimension of the factorized matrix.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Solves `A·x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> MathResult<DVector<f64>> {
        let n = self.dim();
        if b.len() != n {
            return Err(MathError::DimensionMismatch {
                rows1: n,
                cols1: n,
                rows2: b.len(),
                cols2: 1,
            });
        }

        // Forward substitution on the permuted right-hand side (L has unit diagonal).
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let mut sum = b[self.permutation[i]];
            for j in 0..i {
                sum -= self.lu[(i, j)] * y[j];
            }
            y[i] = sum;
        }

        // Back substitution.
        let mut x = DVector::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in i + 1..n {
                sum -= self.lu[(i, j)] * x[j];
            }
            x[i] = sum / self.lu[(i, i)];
        }

        Ok(x)
    }

    /// Returns `A⁻¹`, built column by column from unit right-hand sides.
    pub fn inverse(&self) -> MathResult<DMatrix<f64>> {
        let n = self.dim();
        let mut inverse = DMatrix::zeros(n, n);
        for j in 0..n {
            let mut e = DVector::zeros(n);
            e[j] = 1.0;
            let column = self.solve(&e)?;
            inverse.set_column(j, &column);
        }
        Ok(inverse)
    }

    /// Determinant of the factorized matrix.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        (0..self.dim()).fold(self.sign, |acc, i| acc * self.lu[(i, i)])
    }
}

/// Solves a linear system `A·x = b` using LU decomposition with partial pivoting.
pub fn solve_linear_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    if a.nrows() != a.ncols() {
        return Err(MathError::invalid_input("Matrix must be square"));
    }
    LuDecomposition::new(a)?.solve(b)
}

/// Inverts a square matrix.
pub fn invert(a: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    LuDecomposition::new(a)?.inverse()
}
