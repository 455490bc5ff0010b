//! Labelled dense Jacobians.
//!
//! A [`Jacobian`] holds `∂output_i / ∂parameter_j` for a fixed number of
//! outputs and a set of named parameters (typically calibration quotes).
//! Constituent Jacobians built by different stretches cover only partially
//! overlapping parameter sets, so combination goes through
//! [`Jacobian::cumulative_merge`], which aligns columns by label.

use std::fmt;

use nalgebra::DMatrix;

use crate::error::{MathError, MathResult};

/// Dense `outputs × parameters` sensitivity matrix with labelled columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    labels: Vec<String>,
    matrix: DMatrix<f64>,
}

impl Jacobian {
    /// Creates a zero Jacobian.
    pub fn new(outputs: usize, labels: Vec<String>) -> MathResult<Self> {
        check_unique(&labels)?;
        let matrix = DMatrix::zeros(outputs, labels.len());
        Ok(Self { labels, matrix })
    }

    /// Wraps an existing matrix; its column count must equal the label count.
    pub fn from_matrix(matrix: DMatrix<f64>, labels: Vec<String>) -> MathResult<Self> {
        if matrix.ncols() != labels.len() {
            return Err(MathError::DimensionMismatch {
                rows1: matrix.nrows(),
                cols1: matrix.ncols(),
                rows2: 1,
                cols2: labels.len(),
            });
        }
        check_unique(&labels)?;
        Ok(Self { labels, matrix })
    }

    /// Single-output Jacobian from a row of sensitivities.
    pub fn from_row(row: &[f64], labels: Vec<String>) -> MathResult<Self> {
        Self::from_matrix(DMatrix::from_row_slice(1, row.len(), row), labels)
    }

    /// Number of outputs (rows).
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of parameters (columns).
    #[must_use]
    pub fn parameters(&self) -> usize {
        self.labels.len()
    }

    /// Parameter labels in column order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The underlying matrix.
    #[must_use]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Column index of a parameter label.
    #[must_use]
    pub fn column(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Entry at `(output, column)`.
    pub fn get(&self, output: usize, column: usize) -> MathResult<f64> {
        self.check_entry(output, column)?;
        Ok(self.matrix[(output, column)])
    }

    /// Entry for a labelled parameter, `None` when the label is not tracked.
    #[must_use]
    pub fn get_labelled(&self, output: usize, label: &str) -> Option<f64> {
        let column = self.column(label)?;
        (output < self.outputs()).then(|| self.matrix[(output, column)])
    }

    /// Overwrites an entry.
    pub fn set(&mut self, output: usize, column: usize, value: f64) -> MathResult<()> {
        self.check_entry(output, column)?;
        self.matrix[(output, column)] = value;
        Ok(())
    }

    /// Adds `value` to an entry.
    pub fn accumulate(&mut self, output: usize, column: usize, value: f64) -> MathResult<()> {
        self.check_entry(output, column)?;
        self.matrix[(output, column)] += value;
        Ok(())
    }

    /// Multiplies every entry by `factor` in place.
    pub fn scale(&mut self, factor: f64) {
        self.matrix *= factor;
    }

    /// Returns a copy multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = self.clone();
        out.scale(factor);
        out
    }

    /// Adds `other` into `self`, aligning columns by label.
    ///
    /// Labels present only in `other` are appended as new columns, so the
    /// merged parameter set is the union in first-seen order.
    pub fn cumulative_merge(&mut self, other: &Jacobian) -> MathResult<()> {
        if other.outputs() != self.outputs() {
            return Err(MathError::DimensionMismatch {
                rows1: self.outputs(),
                cols1: self.parameters(),
                rows2: other.outputs(),
                cols2: other.parameters(),
            });
        }

        for (source, label) in other.labels.iter().enumerate() {
            let target = match self.column(label) {
                Some(target) => target,
                None => {
                    let at = self.labels.len();
                    self.matrix = std::mem::replace(&mut self.matrix, DMatrix::zeros(0, 0))
                        .insert_column(at, 0.0);
                    self.labels.push(label.clone());
                    at
                }
            };
            for row in 0..self.outputs() {
                self.matrix[(row, target)] += other.matrix[(row, source)];
            }
        }
        Ok(())
    }

    fn check_entry(&self, output: usize, column: usize) -> MathResult<()> {
        if output < self.outputs() && column < self.parameters() {
            Ok(())
        } else {
            Err(MathError::invalid_input(format!(
                "jacobian entry ({output}, {column}) outside {}x{}",
                self.outputs(),
                self.parameters()
            )))
        }
    }
}

impl fmt::Display for Jacobian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Jacobian [{}]", self.labels.join(", "))?;
        for row in self.matrix.row_iter() {
            let cells: Vec<String> = row.iter().map(|v| format!("{v:.6e}")).collect();
            writeln!(f, "  {}", cells.join("  "))?;
        }
        Ok(())
    }
}

fn check_unique(labels: &[String]) -> MathResult<()> {
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].contains(label) {
            return Err(MathError::invalid_input(format!(
                "duplicate jacobian parameter label '{label}'"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_new_is_zero() {
        let jac = Jacobian::new(2, labels(&["a", "b", "c"])).unwrap();
        assert_eq!(jac.outputs(), 2);
        assert_eq!(jac.parameters(), 3);
        assert_relative_eq!(jac.matrix().norm(), 0.0);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        assert!(Jacobian::new(1, labels(&["a", "a"])).is_err());
    }

    #[test]
    fn test_from_matrix_shape_checked() {
        let m = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        assert!(matches!(
            Jacobian::from_matrix(m, labels(&["a"])),
            Err(MathError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_accumulate_and_scale() {
        let mut jac = Jacobian::new(1, labels(&["q0", "q1"])).unwrap();
        jac.accumulate(0, 1, 0.5).unwrap();
        jac.accumulate(0, 1, 0.25).unwrap();
        jac.scale(2.0);
        assert_relative_eq!(jac.get(0, 1).unwrap(), 1.5);
        assert_eq!(jac.get_labelled(0, "q1"), Some(1.5));
        assert_eq!(jac.get_labelled(0, "missing"), None);
        assert!(jac.set(1, 0, 1.0).is_err());
    }

    #[test]
    fn test_cumulative_merge_aligns_labels() {
        let mut left = Jacobian::from_row(&[1.0, 2.0], labels(&["a", "b"])).unwrap();
        let right = Jacobian::from_row(&[10.0, 20.0], labels(&["c", "a"])).unwrap();

        left.cumulative_merge(&right).unwrap();

        assert_eq!(left.labels(), &labels(&["a", "b", "c"])[..]);
        assert_relative_eq!(left.get(0, 0).unwrap(), 21.0);
        assert_relative_eq!(left.get(0, 1).unwrap(), 2.0);
        assert_relative_eq!(left.get(0, 2).unwrap(), 10.0);
    }

    #[test]
    fn test_merge_into_empty() {
        let mut total = Jacobian::new(1, Vec::new()).unwrap();
        let part = Jacobian::from_row(&[0.3], labels(&["x"])).unwrap();
        total.cumulative_merge(&part.scaled(0.5)).unwrap();
        assert_relative_eq!(total.get_labelled(0, "x").unwrap(), 0.15);
    }

    #[test]
    fn test_merge_output_mismatch() {
        let mut one = Jacobian::new(1, labels(&["a"])).unwrap();
        let two = Jacobian::new(2, labels(&["a"])).unwrap();
        assert!(one.cumulative_merge(&two).is_err());
    }

    #[test]
    fn test_display_lists_labels() {
        let jac = Jacobian::from_row(&[1.0], labels(&["swap_5y"])).unwrap();
        assert!(jac.to_string().contains("swap_5y"));
    }
}
