//! A single basis-function piece of a stretch.
//!
//! A [`Segment`] covers `[left, right]` and represents the response as
//! `r(x) = Σ cᵢ gᵢ(x)`, where `gᵢ` is basis function `i` evaluated at the
//! local ordinate `u = (x - left) / width`, optionally multiplied by a shape
//! control rescaled to unit mean.
//!
//! Calibration is a pure function: an empty segment plus its edge
//! conditions produces a new calibrated segment. The stretch arena stores
//! segments behind `Arc`, so a recalibration never disturbs views handed
//! out earlier.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use strand_math::basis::{binomial, BasisFamily, BasisFunctionSet};
use strand_math::linear_algebra::LuDecomposition;
use strand_math::quadrature::GaussLegendre;
use strand_math::shape::ShapeControl;
use strand_math::solvers::{brent, SolverConfig};
use strand_math::MathError;
use tracing::debug;

use crate::constraint::{BestFitResponse, ResponseConstraint};
use crate::error::{SplineError, SplineResult};
use crate::params::{RoughnessPenalty, SegmentControl, StretchConfig};

/// Relative slope magnitude treated as zero by the monotonicity checks.
const STATIONARY_TOLERANCE: f64 = 1e-10;

/// Shape of a calibrated response over one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Monotonicity {
    /// No interior stationary point (a constant response also counts).
    Monotonic,
    /// One interior minimum.
    Minima,
    /// One interior maximum.
    Maxima,
    /// A stationary point that is not an extremum.
    Inflection,
    /// Several interior stationary points.
    NonMonotonic,
}

impl Monotonicity {
    /// True for [`Monotonicity::Monotonic`].
    pub fn is_monotonic(self) -> bool {
        self == Self::Monotonic
    }
}

/// Response value and derivatives `1..ck-1` imposed at a segment's left edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LeftEdge {
    /// Response at the left edge.
    pub value: f64,
    /// `derivatives[k - 1]` is the derivative of order `k`.
    pub derivatives: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Calibration {
    coefficients: DVector<f64>,
    /// `∂c / ∂b` where `b` are the equality targets, `num_basis × rows`.
    edge_jacobian: DMatrix<f64>,
    edge_targets: DVector<f64>,
}

/// One piece of a stretch over `[left, right]`.
#[derive(Debug, Clone)]
pub struct Segment {
    index: usize,
    left: f64,
    right: f64,
    basis: Arc<BasisFunctionSet>,
    shape: Option<ShapeControl>,
    /// `width / normalizer`, so the shaped basis keeps unit mean multiplier.
    shape_scale: f64,
    ck: usize,
    roughness: Option<RoughnessPenalty>,
    quadrature_points: usize,
    monotonicity_samples: usize,
    calibration: Option<Calibration>,
}

impl Segment {
    /// Creates an empty segment.
    pub fn new(
        index: usize,
        left: f64,
        right: f64,
        basis: Arc<BasisFunctionSet>,
        control: &SegmentControl,
        config: &StretchConfig,
    ) -> SplineResult<Self> {
        if !(left.is_finite() && right.is_finite() && left < right) {
            return Err(SplineError::invalid_argument(format!(
                "segment {index} needs finite left < right, got [{left}, {right}]"
            )));
        }
        control.validate()?;

        let (shape, shape_scale) = match control.shape {
            Some(shape) if !shape.is_identity() => {
                let shape = shape.with_support(left, right)?;
                let normalizer = shape.normalizer()?;
                (Some(shape), (right - left) / normalizer)
            }
            _ => (None, 1.0),
        };

        Ok(Self {
            index,
            left,
            right,
            basis,
            shape,
            shape_scale,
            ck: control.ck,
            roughness: control.roughness,
            quadrature_points: config.quadrature_points,
            monotonicity_samples: config.monotonicity_samples,
            calibration: None,
        })
    }

    /// Position of the segment in its stretch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// `right - left`.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Continuity order.
    pub fn ck(&self) -> usize {
        self.ck
    }

    /// Number of basis functions.
    pub fn num_basis(&self) -> usize {
        self.basis.num_basis()
    }

    /// The shared basis set.
    pub fn basis(&self) -> &Arc<BasisFunctionSet> {
        &self.basis
    }

    /// The shape control re-supported on this segment, if any.
    pub fn shape(&self) -> Option<&ShapeControl> {
        self.shape.as_ref()
    }

    /// True once coefficients have been solved.
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// True when `left <= x <= right`.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.left && x <= self.right
    }

    /// Solved coefficients.
    pub fn coefficients(&self) -> Option<&DVector<f64>> {
        self.calibration.as_ref().map(|c| &c.coefficients)
    }

    /// Equality targets the segment was calibrated against.
    pub fn edge_targets(&self) -> Option<&DVector<f64>> {
        self.calibration.as_ref().map(|c| &c.edge_targets)
    }

    /// Derivatives of order `order` of every shaped basis function at `x`.
    ///
    /// Shaped functions use the Leibniz rule
    /// `gᵢ⁽ᵏ⁾ = scale · Σⱼ C(k,j) w⁻ʲ fᵢ⁽ʲ⁾(u) s⁽ᵏ⁻ʲ⁾(x)`.
    pub fn basis_row(&self, x: f64, order: usize) -> SplineResult<DVector<f64>> {
        self.check_ordinate(x)?;
        let w = self.width();
        let u = (x - self.left) / w;
        let n = self.num_basis();
        let mut row = DVector::zeros(n);

        match &self.shape {
            None => {
                let scale = w.powi(-(order as i32));
                for i in 0..n {
                    row[i] = scale * self.basis.derivative(i, u, order)?;
                }
            }
            Some(shape) => {
                let s = shape.derivatives_through(x, order)?;
                for i in 0..n {
                    let mut total = 0.0;
                    let mut inv_width = 1.0;
                    for j in 0..=order {
                        total += binomial(order, j)
                            * inv_width
                            * self.basis.derivative(i, u, j)?
                            * s[order - j];
                        inv_width /= w;
                    }
                    row[i] = self.shape_scale * total;
                }
            }
        }
        Ok(row)
    }

    /// Calibrates a leading segment from a response value and slope.
    ///
    /// Derivatives of order two and above are pinned to zero at the left edge.
    pub fn calibrate_leading(
        &self,
        leading_value: f64,
        left_slope: f64,
        trailing: &[ResponseConstraint],
        best_fit: Option<&BestFitResponse>,
    ) -> SplineResult<Segment> {
        let derivatives = (1..self.ck)
            .map(|k| if k == 1 { left_slope } else { 0.0 })
            .collect();
        self.calibrate_with(
            &LeftEdge {
                value: leading_value,
                derivatives,
            },
            trailing,
            best_fit,
        )
    }

    /// Calibrates against the trailing state of the preceding segment.
    pub fn calibrate_from(
        &self,
        preceding: &Segment,
        trailing: &[ResponseConstraint],
        best_fit: Option<&BestFitResponse>,
    ) -> SplineResult<Segment> {
        let value = preceding.response_value(self.left)?;
        let derivatives = (1..self.ck)
            .map(|k| preceding.response_value_derivative(self.left, k))
            .collect::<SplineResult<Vec<_>>>()?;
        self.calibrate_with(&LeftEdge { value, derivatives }, trailing, best_fit)
    }

    /// Solves the coefficients for explicit edge conditions.
    ///
    /// Equality rows are the left value, the left derivatives `1..ck-1` and
    /// one row per trailing constraint. Without best-fit points or a
    /// roughness penalty the system must be square. Otherwise the
    /// constrained least-squares problem is solved through its KKT system.
    pub fn calibrate_with(
        &self,
        edge: &LeftEdge,
        trailing: &[ResponseConstraint],
        best_fit: Option<&BestFitResponse>,
    ) -> SplineResult<Segment> {
        if edge.derivatives.len() + 1 != self.ck {
            return Err(SplineError::invalid_argument(format!(
                "segment {} expects {} left derivatives, got {}",
                self.index,
                self.ck - 1,
                edge.derivatives.len()
            )));
        }

        let n = self.num_basis();
        let rows = self.ck + trailing.len();
        let mut a = DMatrix::zeros(rows, n);
        let mut b = DVector::zeros(rows);

        a.set_row(0, &self.basis_row(self.left, 0)?.transpose());
        b[0] = edge.value;
        for (k, &d) in edge.derivatives.iter().enumerate() {
            a.set_row(k + 1, &self.basis_row(self.left, k + 1)?.transpose());
            b[k + 1] = d;
        }
        for (r, constraint) in trailing.iter().enumerate() {
            a.set_row(self.ck + r, &self.constraint_row(constraint)?.transpose());
            b[self.ck + r] = constraint.target();
        }

        let penalised = best_fit.is_some()
            || self.roughness.is_some_and(|p| p.amplitude > 0.0);
        let (coefficients, edge_jacobian) = if penalised {
            self.solve_constrained_least_squares(&a, &b, best_fit)?
        } else {
            self.solve_exact(&a, &b)?
        };

        debug!(
            segment = self.index,
            left = self.left,
            right = self.right,
            constraints = rows,
            basis = n,
            penalised,
            "segment calibrated"
        );

        Ok(Segment {
            calibration: Some(Calibration {
                coefficients,
                edge_jacobian,
                edge_targets: b,
            }),
            ..self.clone()
        })
    }

    /// Response at `x`.
    pub fn response_value(&self, x: f64) -> SplineResult<f64> {
        self.response_value_derivative(x, 0)
    }

    /// Response derivative of the given order at `x` (0 = value).
    pub fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        let coefficients = &self.calibration()?.coefficients;
        Ok(self.basis_row(x, order)?.dot(coefficients))
    }

    /// `∂c / ∂b`: coefficients with respect to the equality targets.
    pub fn jack_d_coeff_d_edge_params(&self) -> Option<&DMatrix<f64>> {
        self.calibration.as_ref().map(|c| &c.edge_jacobian)
    }

    /// `∂r⁽ᵒʳᵈᵉʳ⁾(x) / ∂b` for the equality targets `b`.
    pub fn jack_d_response_d_edge_params(&self, x: f64, order: usize) -> SplineResult<DVector<f64>> {
        let edge_jacobian = &self.calibration()?.edge_jacobian;
        Ok(edge_jacobian.transpose() * self.basis_row(x, order)?)
    }

    /// Integral of the response over `[a, b]` inside the segment.
    pub fn integrate(&self, a: f64, b: f64) -> SplineResult<f64> {
        if a > b {
            return Ok(-self.integrate(b, a)?);
        }
        self.check_ordinate(a)?;
        self.check_ordinate(b)?;
        let coefficients = &self.calibration()?.coefficients;

        if self.shape.is_some() {
            let rule = GaussLegendre::new(self.quadrature_points)?;
            return rule.try_integrate(|x| self.response_value(x), a, b);
        }

        let w = self.width();
        let ua = (a - self.left) / w;
        let ub = (b - self.left) / w;
        let mut total = 0.0;
        for (i, c) in coefficients.iter().enumerate() {
            total += c * self.basis.integrate(i, ua, ub)?;
        }
        Ok(w * total)
    }

    /// Classifies the response shape over the segment.
    ///
    /// Unshaped polynomial segments of degree three or less use the
    /// closed-form roots of the derivative; everything else samples the
    /// derivative.
    pub fn monotone_type(&self) -> SplineResult<Monotonicity> {
        let coefficients = &self.calibration()?.coefficients;
        if self.shape.is_none() {
            if let BasisFamily::Polynomial { num_basis } = self.basis.family() {
                if num_basis <= 4 {
                    return Ok(polynomial_monotone_type(coefficients));
                }
            }
        }
        let slopes = self.sampled_slopes()?;
        Ok(classify_slopes(&slopes.1))
    }

    /// Interior ordinates where the slope changes sign or touches zero.
    ///
    /// Sign changes between samples are refined with Brent's method.
    pub fn stationary_points(&self) -> SplineResult<Vec<f64>> {
        let (xs, slopes) = self.sampled_slopes()?;
        let tolerance = slope_tolerance(&slopes);
        if tolerance == 0.0 {
            return Ok(Vec::new());
        }

        let config = SolverConfig::default().with_tolerance(1e-12 * self.width().max(1.0));
        let mut points = Vec::new();
        let mut last: Option<usize> = None;
        for (k, &s) in slopes.iter().enumerate() {
            if s.abs() <= tolerance {
                continue;
            }
            if let Some(j) = last {
                if k == j + 1 {
                    if s.signum() != slopes[j].signum() {
                        let root = brent(
                            |x| self.response_value_derivative(x, 1).unwrap_or(f64::NAN),
                            xs[j],
                            xs[k],
                            &config,
                        )?;
                        points.push(root.root);
                    }
                } else {
                    points.push(xs[(j + k) / 2]);
                }
            }
            last = Some(k);
        }
        Ok(points)
    }

    fn sampled_slopes(&self) -> SplineResult<(Vec<f64>, Vec<f64>)> {
        let samples = self.monotonicity_samples.max(2);
        let xs: Vec<f64> = (0..=samples)
            .map(|k| {
                if k == samples {
                    self.right
                } else {
                    self.left + self.width() * k as f64 / samples as f64
                }
            })
            .collect();
        let slopes = xs
            .iter()
            .map(|&x| self.response_value_derivative(x, 1))
            .collect::<SplineResult<Vec<_>>>()?;
        Ok((xs, slopes))
    }

    fn constraint_row(&self, constraint: &ResponseConstraint) -> SplineResult<DVector<f64>> {
        let mut row = DVector::zeros(self.num_basis());
        for (x, w) in constraint.pairs() {
            row += w * self.basis_row(x, 0)?;
        }
        Ok(row)
    }

    fn solve_exact(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
    ) -> SplineResult<(DVector<f64>, DMatrix<f64>)> {
        let rows = a.nrows();
        let n = a.ncols();
        if rows != n {
            return Err(self.failure(
                rows,
                format!("{rows} equality constraints cannot determine {n} coefficients"),
            ));
        }
        let inverse = LuDecomposition::new(a)
            .and_then(|lu| lu.inverse())
            .map_err(|e| self.failure(rows, e))?;
        let coefficients = &inverse * b;
        Ok((coefficients, inverse))
    }

    /// Minimises `Σ w (r(x) - y)² + λ ∫ (r⁽ᵐ⁾)²` subject to `A·c = b`.
    fn solve_constrained_least_squares(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        best_fit: Option<&BestFitResponse>,
    ) -> SplineResult<(DVector<f64>, DMatrix<f64>)> {
        let n = a.ncols();
        let m = a.nrows();
        let mut hessian = DMatrix::zeros(n, n);
        let mut gradient = DVector::zeros(n);

        if let Some(fit) = best_fit {
            for (x, y, w) in fit.points() {
                let row = self.basis_row(x, 0)?;
                hessian += (2.0 * w) * (&row * row.transpose());
                gradient += (2.0 * w * y) * row;
            }
        }
        if let Some(penalty) = self.roughness.filter(|p| p.amplitude > 0.0) {
            hessian += (2.0 * penalty.amplitude) * self.roughness_gram(penalty.order)?;
        }

        let mut kkt = DMatrix::zeros(n + m, n + m);
        kkt.view_mut((0, 0), (n, n)).copy_from(&hessian);
        kkt.view_mut((0, n), (n, m)).copy_from(&a.transpose());
        kkt.view_mut((n, 0), (m, n)).copy_from(a);

        let mut rhs = DVector::zeros(n + m);
        rhs.rows_mut(0, n).copy_from(&gradient);
        rhs.rows_mut(n, m).copy_from(b);

        let inverse = LuDecomposition::new(&kkt)
            .and_then(|lu| lu.inverse())
            .map_err(|e| self.failure(m, e))?;
        let solution = &inverse * rhs;
        let coefficients = solution.rows(0, n).into_owned();
        let edge_jacobian = inverse.view((0, n), (n, m)).into_owned();
        Ok((coefficients, edge_jacobian))
    }

    /// `Pᵢⱼ = ∫ gᵢ⁽ᵐ⁾ gⱼ⁽ᵐ⁾ dx` over the segment.
    fn roughness_gram(&self, order: usize) -> SplineResult<DMatrix<f64>> {
        let n = self.num_basis();
        let rule = GaussLegendre::new(self.quadrature_points)?;
        let mut gram = DMatrix::zeros(n, n);
        for (x, w) in rule.mapped(self.left, self.right)? {
            let row = self.basis_row(x, order)?;
            gram += w * (&row * row.transpose());
        }
        Ok(gram)
    }

    fn failure(&self, constraints: usize, reason: impl ToString) -> SplineError {
        SplineError::calibration_failed(
            self.index,
            constraints,
            self.num_basis(),
            reason.to_string(),
        )
    }

    fn calibration(&self) -> SplineResult<&Calibration> {
        self.calibration.as_ref().ok_or_else(|| {
            SplineError::invalid_argument(format!("segment {} is not calibrated", self.index))
        })
    }

    fn check_ordinate(&self, x: f64) -> SplineResult<()> {
        if !x.is_finite() {
            return Err(MathError::invalid_input(format!("non-finite ordinate {x}")).into());
        }
        if self.contains(x) {
            Ok(())
        } else {
            Err(SplineError::out_of_domain(x, self.left, self.right))
        }
    }
}

fn slope_tolerance(slopes: &[f64]) -> f64 {
    STATIONARY_TOLERANCE * slopes.iter().fold(0.0_f64, |m, s| m.max(s.abs()))
}

/// Classifies a sampled slope profile by its sign pattern.
fn classify_slopes(slopes: &[f64]) -> Monotonicity {
    let tolerance = slope_tolerance(slopes);
    if tolerance == 0.0 {
        return Monotonicity::Monotonic;
    }

    let mut extrema = Vec::new();
    let mut touches = false;
    let mut last: Option<(usize, f64)> = None;
    for (k, &s) in slopes.iter().enumerate() {
        if s.abs() <= tolerance {
            continue;
        }
        if let Some((j, previous)) = last {
            if previous.signum() != s.signum() {
                extrema.push(if s > 0.0 {
                    Monotonicity::Minima
                } else {
                    Monotonicity::Maxima
                });
            } else if k > j + 1 {
                touches = true;
            }
        }
        last = Some((k, s));
    }

    match (extrema.as_slice(), touches) {
        ([], false) => Monotonicity::Monotonic,
        ([], true) => Monotonicity::Inflection,
        ([single], false) => *single,
        _ => Monotonicity::NonMonotonic,
    }
}

/// Closed-form classification for `c₀ + c₁u + c₂u² + c₃u³` on `(0, 1)`.
fn polynomial_monotone_type(coefficients: &DVector<f64>) -> Monotonicity {
    let c = |i: usize| coefficients.get(i).copied().unwrap_or(0.0);
    // r'(u) ∝ p0 + p1 u + p2 u²
    let (p0, p1, p2) = (c(1), 2.0 * c(2), 3.0 * c(3));
    let scale = p0.abs().max(p1.abs()).max(p2.abs());
    if scale == 0.0 {
        return Monotonicity::Monotonic;
    }
    let eps = STATIONARY_TOLERANCE * scale;
    let interior = |u: f64| u > 0.0 && u < 1.0;
    let extremum = |u: f64| {
        if p1 + 2.0 * p2 * u > 0.0 {
            Monotonicity::Minima
        } else {
            Monotonicity::Maxima
        }
    };

    if p2.abs() <= eps {
        if p1.abs() <= eps {
            return Monotonicity::Monotonic;
        }
        let root = -p0 / p1;
        return if interior(root) {
            extremum(root)
        } else {
            Monotonicity::Monotonic
        };
    }

    let discriminant = p1 * p1 - 4.0 * p2 * p0;
    if discriminant.abs() <= eps * scale {
        let root = -p1 / (2.0 * p2);
        return if interior(root) {
            Monotonicity::Inflection
        } else {
            Monotonicity::Monotonic
        };
    }
    if discriminant < 0.0 {
        return Monotonicity::Monotonic;
    }

    let sq = discriminant.sqrt();
    let roots: Vec<f64> = [(-p1 - sq) / (2.0 * p2), (-p1 + sq) / (2.0 * p2)]
        .into_iter()
        .filter(|&u| interior(u))
        .collect();
    match roots.as_slice() {
        [] => Monotonicity::Monotonic,
        [root] => extremum(*root),
        _ => Monotonicity::NonMonotonic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strand_math::shape::ShapeControlKind;

    fn segment(basis: BasisFunctionSet, ck: usize, left: f64, right: f64) -> Segment {
        let control = SegmentControl::new(basis, ck).unwrap();
        Segment::new(0, left, right, Arc::new(basis), &control, &StretchConfig::default()).unwrap()
    }

    fn node(x: f64, y: f64) -> ResponseConstraint {
        ResponseConstraint::node(x, y).unwrap()
    }

    #[test]
    fn test_invalid_layout() {
        let basis = BasisFunctionSet::polynomial(2).unwrap();
        let control = SegmentControl::new(basis, 1).unwrap();
        let config = StretchConfig::default();
        assert!(Segment::new(0, 1.0, 1.0, Arc::new(basis), &control, &config).is_err());
        assert!(Segment::new(0, f64::NAN, 1.0, Arc::new(basis), &control, &config).is_err());
    }

    #[test]
    fn test_leading_quadratic() {
        // r(x) = 1 + s(x-1) + c2 (x-1)² through r(2) = 4 with s = 1.
        let seg = segment(BasisFunctionSet::polynomial(3).unwrap(), 2, 1.0, 2.0);
        let fitted = seg.calibrate_leading(1.0, 1.0, &[node(2.0, 4.0)], None).unwrap();

        assert!(fitted.is_calibrated());
        assert!(!seg.is_calibrated());
        assert_relative_eq!(fitted.response_value(1.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fitted.response_value_derivative(1.0, 1).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fitted.response_value(2.0).unwrap(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(fitted.response_value(1.5).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_continuity_from_preceding() {
        let basis = BasisFunctionSet::polynomial(4).unwrap();
        let first = segment(basis, 3, 0.0, 1.0)
            .calibrate_leading(0.0, 0.5, &[node(1.0, 1.0)], None)
            .unwrap();
        let control = SegmentControl::new(basis, 3).unwrap();
        let second = Segment::new(1, 1.0, 2.5, Arc::new(basis), &control, &StretchConfig::default())
            .unwrap()
            .calibrate_from(&first, &[node(2.5, 0.2)], None)
            .unwrap();

        for order in 0..3 {
            assert_relative_eq!(
                first.response_value_derivative(1.0, order).unwrap(),
                second.response_value_derivative(1.0, order).unwrap(),
                epsilon = 1e-10
            );
        }
        assert_relative_eq!(second.response_value(2.5).unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_underdetermined_system_fails() {
        let seg = segment(BasisFunctionSet::polynomial(4).unwrap(), 2, 0.0, 1.0);
        let err = seg.calibrate_leading(0.0, 0.0, &[node(1.0, 1.0)], None).unwrap_err();
        match err {
            SplineError::CalibrationFailure {
                segment,
                constraints,
                basis,
                ..
            } => {
                assert_eq!(segment, 0);
                assert_eq!(constraints, 3);
                assert_eq!(basis, 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_singular_system_fails() {
        // Two node constraints at the same ordinate are linearly dependent.
        let seg = segment(BasisFunctionSet::polynomial(3).unwrap(), 1, 0.0, 1.0);
        let err = seg
            .calibrate_with(
                &LeftEdge {
                    value: 0.0,
                    derivatives: vec![],
                },
                &[node(1.0, 1.0), node(1.0, 1.0)],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, SplineError::CalibrationFailure { .. }));
    }

    #[test]
    fn test_wrong_edge_derivative_count() {
        let seg = segment(BasisFunctionSet::polynomial(3).unwrap(), 2, 0.0, 1.0);
        let edge = LeftEdge {
            value: 0.0,
            derivatives: vec![],
        };
        assert!(matches!(
            seg.calibrate_with(&edge, &[node(1.0, 1.0)], None),
            Err(SplineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_uncalibrated_queries_fail() {
        let seg = segment(BasisFunctionSet::polynomial(2).unwrap(), 1, 0.0, 1.0);
        assert!(seg.response_value(0.5).is_err());
        assert!(seg.jack_d_coeff_d_edge_params().is_none());
    }

    #[test]
    fn test_out_of_segment_ordinate() {
        let seg = segment(BasisFunctionSet::polynomial(2).unwrap(), 1, 0.0, 1.0)
            .calibrate_leading(0.0, 0.0, &[node(1.0, 1.0)], None)
            .unwrap();
        assert!(matches!(
            seg.response_value(1.5),
            Err(SplineError::OutOfDomain { .. })
        ));
        assert!(matches!(
            seg.response_value(f64::NAN),
            Err(SplineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_edge_jacobian_matches_finite_difference() {
        let basis = BasisFunctionSet::hyperbolic_tension(1.5).unwrap();
        let seg = segment(basis, 3, 0.0, 2.0);
        let edge = LeftEdge {
            value: 1.0,
            derivatives: vec![0.3, -0.1],
        };
        let trailing = [node(2.0, 2.0)];
        let base = seg.calibrate_with(&edge, &trailing, None).unwrap();
        let jacobian = base.jack_d_response_d_edge_params(1.3, 0).unwrap();

        let h = 1e-6;
        let bumped_edge = LeftEdge {
            derivatives: vec![0.3 + h, -0.1],
            ..edge.clone()
        };
        let bumped = seg.calibrate_with(&bumped_edge, &trailing, None).unwrap();
        let numeric = (bumped.response_value(1.3).unwrap() - base.response_value(1.3).unwrap()) / h;
        assert_relative_eq!(jacobian[1], numeric, epsilon = 1e-6);

        let bumped = seg.calibrate_with(&edge, &[node(2.0, 2.0 + h)], None).unwrap();
        let numeric = (bumped.response_value(1.3).unwrap() - base.response_value(1.3).unwrap()) / h;
        assert_relative_eq!(jacobian[3], numeric, epsilon = 1e-6);
    }

    #[test]
    fn test_shaped_basis_reproduces_constraints() {
        let basis = BasisFunctionSet::polynomial(3).unwrap();
        let shape = ShapeControl::new(ShapeControlKind::RationalQuadratic, 2.0).unwrap();
        let control = SegmentControl::new(basis, 2).unwrap().with_shape(shape);
        let seg = Segment::new(0, 1.0, 3.0, Arc::new(basis), &control, &StretchConfig::default())
            .unwrap()
            .calibrate_leading(0.5, 0.2, &[node(3.0, 1.5)], None)
            .unwrap();

        assert!(seg.shape().is_some());
        assert_relative_eq!(seg.response_value(1.0).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(seg.response_value_derivative(1.0, 1).unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(seg.response_value(3.0).unwrap(), 1.5, epsilon = 1e-12);

        let h = 1e-6;
        for order in 1..=2 {
            let x = 2.1;
            let analytic = seg.response_value_derivative(x, order).unwrap();
            let numeric = (seg.response_value_derivative(x + h, order - 1).unwrap()
                - seg.response_value_derivative(x - h, order - 1).unwrap())
                / (2.0 * h);
            assert_relative_eq!(analytic, numeric, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_integrate_matches_closed_form() {
        // r(x) = x² on [1, 2] via r(1)=1, r'(1)=2, r(2)=4.
        let seg = segment(BasisFunctionSet::polynomial(3).unwrap(), 2, 1.0, 2.0)
            .calibrate_leading(1.0, 2.0, &[node(2.0, 4.0)], None)
            .unwrap();
        assert_relative_eq!(seg.integrate(1.0, 2.0).unwrap(), 7.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(seg.integrate(2.0, 1.5).unwrap(), -(8.0 - 3.375) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roughness_penalty_selects_minimum_curvature() {
        // Cubic with only value and trailing constraints: the curvature
        // penalty picks the straight line.
        let basis = BasisFunctionSet::polynomial(4).unwrap();
        let control = SegmentControl::new(basis, 1)
            .unwrap()
            .with_roughness(RoughnessPenalty::curvature(1.0).unwrap());
        let seg = Segment::new(0, 0.0, 2.0, Arc::new(basis), &control, &StretchConfig::default())
            .unwrap()
            .calibrate_leading(1.0, 0.0, &[node(2.0, 3.0)], None)
            .unwrap();
        assert_relative_eq!(seg.response_value(1.0).unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(seg.response_value_derivative(0.7, 2).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_best_fit_with_equalities() {
        let basis = BasisFunctionSet::polynomial(3).unwrap();
        let seg = segment(basis, 1, 0.0, 1.0);
        let fit = BestFitResponse::equally_weighted(vec![0.5], vec![0.75]).unwrap();
        let fitted = seg
            .calibrate_leading(0.0, 0.0, &[node(1.0, 1.0)], Some(&fit))
            .unwrap();
        assert_relative_eq!(fitted.response_value(0.0).unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(fitted.response_value(1.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fitted.response_value(0.5).unwrap(), 0.75, epsilon = 1e-10);
        assert_eq!(fitted.jack_d_coeff_d_edge_params().unwrap().shape(), (3, 2));
    }

    #[test]
    fn test_monotone_closed_form() {
        let quadratic = segment(BasisFunctionSet::polynomial(3).unwrap(), 2, 0.0, 1.0);

        let rising = quadratic.calibrate_leading(0.0, 1.0, &[node(1.0, 2.0)], None).unwrap();
        assert_eq!(rising.monotone_type().unwrap(), Monotonicity::Monotonic);

        let valley = quadratic.calibrate_leading(0.0, -1.0, &[node(1.0, 0.0)], None).unwrap();
        assert_eq!(valley.monotone_type().unwrap(), Monotonicity::Minima);

        let hill = quadratic.calibrate_leading(0.0, 1.0, &[node(1.0, 0.0)], None).unwrap();
        assert_eq!(hill.monotone_type().unwrap(), Monotonicity::Maxima);

        let flat = quadratic.calibrate_leading(2.0, 0.0, &[node(1.0, 2.0)], None).unwrap();
        assert_eq!(flat.monotone_type().unwrap(), Monotonicity::Monotonic);
    }

    #[test]
    fn test_polynomial_classification() {
        // (u - 1/2)³ has a stationary inflection at 1/2.
        let c = DVector::from_vec(vec![-0.125, 0.75, -1.5, 1.0]);
        assert_eq!(polynomial_monotone_type(&c), Monotonicity::Inflection);
        // u³ - u²·1.5 + u·0.5: r' = 3u² - 3u + 0.5 has two interior roots.
        let c = DVector::from_vec(vec![0.0, 0.5, -1.5, 1.0]);
        assert_eq!(polynomial_monotone_type(&c), Monotonicity::NonMonotonic);
    }

    #[test]
    fn test_sampled_monotone_type_and_stationary_points() {
        let basis = BasisFunctionSet::hyperbolic_tension(2.0).unwrap();
        let seg = segment(basis, 3, 0.0, 1.0);
        let valley = seg
            .calibrate_with(
                &LeftEdge {
                    value: 1.0,
                    derivatives: vec![-1.0, 0.0],
                },
                &[node(1.0, 1.0)],
                None,
            )
            .unwrap();
        assert_eq!(valley.monotone_type().unwrap(), Monotonicity::Minima);

        let points = valley.stationary_points().unwrap();
        assert_eq!(points.len(), 1);
        assert_relative_eq!(
            valley.response_value_derivative(points[0], 1).unwrap(),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_classify_slopes() {
        assert_eq!(classify_slopes(&[1.0, 2.0, 3.0]), Monotonicity::Monotonic);
        assert_eq!(classify_slopes(&[0.0, 0.0]), Monotonicity::Monotonic);
        assert_eq!(classify_slopes(&[1.0, 0.0, 1.0]), Monotonicity::Inflection);
        assert_eq!(classify_slopes(&[-1.0, 1.0]), Monotonicity::Minima);
        assert_eq!(classify_slopes(&[1.0, -1.0, 1.0]), Monotonicity::NonMonotonic);
    }
}
