//! Segment controls, boundary settings and stretch configuration.

use serde::{Deserialize, Serialize};
use strand_math::basis::BasisFunctionSet;
use strand_math::shape::ShapeControl;
use strand_math::solvers::SolverConfig;

use crate::error::{SplineError, SplineResult};

/// Roughness penalty `amplitude · ∫ (r⁽ᵐ⁾)² dx` over a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoughnessPenalty {
    /// Derivative order `m` being penalised.
    pub order: usize,
    /// Non-negative amplitude.
    pub amplitude: f64,
}

impl RoughnessPenalty {
    /// Creates a penalty on the derivative of the given order.
    pub fn new(order: usize, amplitude: f64) -> SplineResult<Self> {
        let penalty = Self { order, amplitude };
        penalty.validate()?;
        Ok(penalty)
    }

    /// Curvature penalty, `order = 2`.
    pub fn curvature(amplitude: f64) -> SplineResult<Self> {
        Self::new(2, amplitude)
    }

    fn validate(&self) -> SplineResult<()> {
        if self.order == 0 {
            return Err(SplineError::invalid_argument(
                "roughness penalty order must be at least 1",
            ));
        }
        if !(self.amplitude.is_finite() && self.amplitude >= 0.0) {
            return Err(SplineError::invalid_argument(format!(
                "roughness amplitude must be finite and non-negative, got {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}

/// Per-segment calibration controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentControl {
    /// Basis function set.
    pub basis: BasisFunctionSet,
    /// Optional shape control, specified on the unit support.
    pub shape: Option<ShapeControl>,
    /// Continuity order: value and derivatives up to `ck - 1` match at joins.
    pub ck: usize,
    /// Optional roughness penalty.
    pub roughness: Option<RoughnessPenalty>,
}

impl SegmentControl {
    /// Creates an unshaped, unpenalised control.
    pub fn new(basis: BasisFunctionSet, ck: usize) -> SplineResult<Self> {
        let control = Self {
            basis,
            shape: None,
            ck,
            roughness: None,
        };
        control.validate()?;
        Ok(control)
    }

    /// Sets the shape control.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeControl) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the roughness penalty.
    #[must_use]
    pub fn with_roughness(mut self, penalty: RoughnessPenalty) -> Self {
        self.roughness = Some(penalty);
        self
    }

    /// Checks continuity order against the basis size and nested records.
    pub fn validate(&self) -> SplineResult<()> {
        if self.ck == 0 {
            return Err(SplineError::invalid_argument(
                "continuity order must be at least 1",
            ));
        }
        if self.ck > self.basis.num_basis() {
            return Err(SplineError::invalid_argument(format!(
                "continuity order {} exceeds {} basis functions",
                self.ck,
                self.basis.num_basis()
            )));
        }
        if let Some(shape) = &self.shape {
            shape.validate()?;
        }
        if let Some(penalty) = &self.roughness {
            penalty.validate()?;
        }
        Ok(())
    }
}

/// Outer boundary policy for a stretch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundarySettings {
    /// Leading slope supplied by the caller.
    #[default]
    Floating,
    /// Zero second derivative at the trailing edge; leading slope solved for.
    Natural,
    /// Trailing first derivative fixed; leading slope solved for.
    Financial {
        /// Required trailing-edge slope.
        right_slope: f64,
    },
}

impl BoundarySettings {
    /// Derivative order and target imposed at the trailing edge, if any.
    pub(crate) fn trailing_condition(self) -> Option<(usize, f64)> {
        match self {
            Self::Floating => None,
            Self::Natural => Some((2, 0.0)),
            Self::Financial { right_slope } => Some((1, right_slope)),
        }
    }
}

/// Configuration for stretch construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    /// Relative step size below which the leading-slope polish stops.
    pub slope_tolerance: f64,
    /// Step cap for the leading-slope solve, the exact affine step included.
    pub max_slope_iterations: u32,
    /// Whether to propagate manifest-measure sensitivities after calibration.
    pub compute_sensitivity: bool,
    /// Whether lookups outside the stretch extrapolate linearly from the edge.
    pub allow_extrapolation: bool,
    /// Gauss-Legendre points for shaped integrals and roughness Gram matrices.
    pub quadrature_points: usize,
    /// Derivative samples per segment for non-closed-form monotonicity scans.
    pub monotonicity_samples: usize,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            slope_tolerance: 1e-12,
            max_slope_iterations: 50,
            compute_sensitivity: true,
            allow_extrapolation: false,
            quadrature_points: 32,
            monotonicity_samples: 64,
        }
    }
}

impl StretchConfig {
    /// Creates a new configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slope solve tolerance.
    #[must_use]
    pub fn with_slope_tolerance(mut self, tolerance: f64) -> Self {
        self.slope_tolerance = tolerance;
        self
    }

    /// Sets the slope solve iteration cap.
    #[must_use]
    pub fn with_max_slope_iterations(mut self, iterations: u32) -> Self {
        self.max_slope_iterations = iterations;
        self
    }

    /// Enables or disables sensitivity propagation.
    #[must_use]
    pub fn with_sensitivity(mut self, enabled: bool) -> Self {
        self.compute_sensitivity = enabled;
        self
    }

    /// Enables or disables edge extrapolation.
    #[must_use]
    pub fn with_extrapolation(mut self, enabled: bool) -> Self {
        self.allow_extrapolation = enabled;
        self
    }

    /// Sets the quadrature order.
    #[must_use]
    pub fn with_quadrature_points(mut self, points: usize) -> Self {
        self.quadrature_points = points;
        self
    }

    /// Sets the monotonicity sample count.
    #[must_use]
    pub fn with_monotonicity_samples(mut self, samples: usize) -> Self {
        self.monotonicity_samples = samples;
        self
    }

    /// Checks that every field is usable.
    pub fn validate(&self) -> SplineResult<()> {
        if !(self.slope_tolerance.is_finite() && self.slope_tolerance > 0.0) {
            return Err(SplineError::invalid_argument("slope tolerance must be positive"));
        }
        if self.max_slope_iterations == 0 {
            return Err(SplineError::invalid_argument(
                "slope solve needs at least one iteration",
            ));
        }
        if self.quadrature_points == 0 {
            return Err(SplineError::invalid_argument(
                "quadrature needs at least one point",
            ));
        }
        if self.monotonicity_samples < 2 {
            return Err(SplineError::invalid_argument(
                "monotonicity scan needs at least two samples",
            ));
        }
        Ok(())
    }

    pub(crate) fn slope_solver(&self) -> SolverConfig {
        SolverConfig::new(self.slope_tolerance, self.max_slope_iterations)
    }
}
