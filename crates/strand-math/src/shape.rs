//! Rational shape controls.
//!
//! A shape control is a positive scalar multiplier `s(x)` applied on top of a
//! basis function set to pull a segment's response towards its edges without
//! changing which constraints it can satisfy. Each kind is the reciprocal of
//! a simple denominator in the local ordinate `u = (x - left) / (right - left)`:
//!
//! | Kind | `s(u)` |
//! |------|--------|
//! | [`ShapeControlKind::None`] | `1` |
//! | [`ShapeControlKind::RationalLinear`] | `1 / (1 + τu)` |
//! | [`ShapeControlKind::RationalQuadratic`] | `1 / (1 + τu(1 - u))` |
//! | [`ShapeControlKind::RationalExponential`] | `1 / (1 + τ(e^u - 1))` |
//!
//! Outside its support the control is zero together with all of its
//! derivatives; integration clamps to the support.

use serde::{Deserialize, Serialize};

use crate::basis::binomial;
use crate::error::{ensure_finite, MathError, MathResult};

/// The closed set of shape control kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeControlKind {
    /// Identity multiplier.
    None,
    /// `1 / (1 + τu)`.
    RationalLinear,
    /// `1 / (1 + τu(1 - u))`.
    RationalQuadratic,
    /// `1 / (1 + τ(e^u - 1))`.
    RationalExponential,
}

/// A shape control: kind, tension and support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeControl {
    kind: ShapeControlKind,
    tension: f64,
    left: f64,
    right: f64,
}

impl ShapeControl {
    /// Creates a control on the unit support `[0, 1]`.
    pub fn new(kind: ShapeControlKind, tension: f64) -> MathResult<Self> {
        let control = Self {
            kind,
            tension,
            left: 0.0,
            right: 1.0,
        };
        control.validate()?;
        Ok(control)
    }

    /// The identity control.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            kind: ShapeControlKind::None,
            tension: 0.0,
            left: 0.0,
            right: 1.0,
        }
    }

    /// Returns the same control re-supported on `[left, right]`.
    pub fn with_support(self, left: f64, right: f64) -> MathResult<Self> {
        let control = Self {
            left,
            right,
            ..self
        };
        control.validate()?;
        Ok(control)
    }

    /// Checks the tension and support invariants.
    ///
    /// Deserialized controls bypass [`ShapeControl::new`], so consumers call
    /// this before use.
    pub fn validate(&self) -> MathResult<()> {
        if !(self.tension.is_finite() && self.tension >= 0.0) {
            return Err(MathError::invalid_input(format!(
                "shape tension must be finite and non-negative, got {}",
                self.tension
            )));
        }
        ensure_finite(self.left, "shape support left")?;
        ensure_finite(self.right, "shape support right")?;
        if self.left >= self.right {
            return Err(MathError::invalid_input(format!(
                "shape support [{}, {}] is empty",
                self.left, self.right
            )));
        }
        Ok(())
    }

    /// The control kind.
    #[must_use]
    pub fn kind(&self) -> ShapeControlKind {
        self.kind
    }

    /// The tension.
    #[must_use]
    pub fn tension(&self) -> f64 {
        self.tension
    }

    /// Left edge of the support.
    #[must_use]
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge of the support.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.right
    }

    /// True when the control is identically one on its support.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.kind == ShapeControlKind::None || self.tension == 0.0
    }

    /// Value at `x`; zero outside the support.
    pub fn evaluate(&self, x: f64) -> MathResult<f64> {
        ensure_finite(x, "shape ordinate")?;
        Ok(match self.local(x) {
            Some(u) => 1.0 / self.denominator(u, 0),
            None => 0.0,
        })
    }

    /// Derivative of the given order at `x`; zero outside the support.
    ///
    /// `order` must be at least one.
    pub fn derivative(&self, x: f64, order: usize) -> MathResult<f64> {
        if order == 0 {
            return Err(MathError::invalid_input(
                "shape control derivative order must be at least 1",
            ));
        }
        Ok(self.derivatives_through(x, order)?[order])
    }

    /// Value followed by derivatives of order `1..=max_order` at `x`.
    ///
    /// Uses the Leibniz recurrence on `s·q = 1`:
    /// `s⁽ⁿ⁾ = -(Σ_{k=1..n} C(n,k) q⁽ᵏ⁾ s⁽ⁿ⁻ᵏ⁾) / q`.
    pub fn derivatives_through(&self, x: f64, max_order: usize) -> MathResult<Vec<f64>> {
        ensure_finite(x, "shape ordinate")?;
        let mut out = vec![0.0; max_order + 1];
        let Some(u) = self.local(x) else {
            return Ok(out);
        };

        let q: Vec<f64> = (0..=max_order).map(|k| self.denominator(u, k)).collect();
        let inv_width = 1.0 / self.width();
        out[0] = 1.0 / q[0];
        for n in 1..=max_order {
            let sum: f64 = (1..=n).map(|k| binomial(n, k) * q[k] * out[n - k]).sum();
            out[n] = -sum / q[0];
        }
        // Convert u-derivatives to x-derivatives.
        let mut scale = 1.0;
        for value in out.iter_mut().skip(1) {
            scale *= inv_width;
            *value *= scale;
        }
        Ok(out)
    }

    /// Integral over `[begin, end]` intersected with the support.
    pub fn integrate(&self, begin: f64, end: f64) -> MathResult<f64> {
        ensure_finite(begin, "integration begin")?;
        ensure_finite(end, "integration end")?;
        if begin > end {
            return Ok(-self.integrate(end, begin)?);
        }
        let a = begin.max(self.left);
        let b = end.min(self.right);
        if a >= b {
            return Ok(0.0);
        }
        let ua = (a - self.left) / self.width();
        let ub = (b - self.left) / self.width();
        Ok(self.width() * (self.antiderivative(ub) - self.antiderivative(ua)))
    }

    /// Integral of the control over its whole support.
    pub fn normalizer(&self) -> MathResult<f64> {
        self.integrate(self.left, self.right)
    }

    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn local(&self, x: f64) -> Option<f64> {
        (x >= self.left && x <= self.right).then(|| (x - self.left) / self.width())
    }

    /// k-th u-derivative of the denominator `q(u)`.
    fn denominator(&self, u: f64, k: usize) -> f64 {
        let t = self.tension;
        match self.kind {
            ShapeControlKind::None => {
                if k == 0 {
                    1.0
                } else {
                    0.0
                }
            }
            ShapeControlKind::RationalLinear => match k {
                0 => 1.0 + t * u,
                1 => t,
                _ => 0.0,
            },
            ShapeControlKind::RationalQuadratic => match k {
                0 => 1.0 + t * u * (1.0 - u),
                1 => t * (1.0 - 2.0 * u),
                2 => -2.0 * t,
                _ => 0.0,
            },
            ShapeControlKind::RationalExponential => {
                if k == 0 {
                    1.0 + t * (u.exp() - 1.0)
                } else {
                    t * u.exp()
                }
            }
        }
    }

    /// An antiderivative of `s` in the local ordinate.
    fn antiderivative(&self, u: f64) -> f64 {
        let t = self.tension;
        if self.is_identity() {
            return u;
        }
        match self.kind {
            ShapeControlKind::None => u,
            ShapeControlKind::RationalLinear => (t * u).ln_1p() / t,
            ShapeControlKind::RationalQuadratic => {
                // 1 + τu(1-u) = (1 + τ/4) - τ(u - 1/2)², roots outside [0, 1].
                let d = (t * t + 4.0 * t).sqrt();
                2.0 * (t * (2.0 * u - 1.0) / d).atanh() / d
            }
            ShapeControlKind::RationalExponential => {
                // u - ln(a + τeᵘ) = -ln(1 + a(e⁻ᵘ - 1)), exact as a → 0.
                let a = 1.0 - t;
                if a.abs() < f64::MIN_POSITIVE {
                    -(-u).exp_m1()
                } else {
                    -(a * (-u).exp_m1()).ln_1p() / a
                }
            }
        }
    }
}

impl Default for ShapeControl {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use crate::quadrature::GaussLegendre;

    const KINDS: [ShapeControlKind; 4] = [
        ShapeControlKind::None,
        ShapeControlKind::RationalLinear,
        ShapeControlKind::RationalQuadratic,
        ShapeControlKind::RationalExponential,
    ];

    #[test]
    fn test_zero_tension_is_identity() {
        for kind in KINDS {
            let control = ShapeControl::new(kind, 0.0).unwrap();
            assert!(control.is_identity());
            assert_relative_eq!(control.evaluate(0.37).unwrap(), 1.0);
            assert_relative_eq!(control.derivative(0.37, 1).unwrap(), 0.0);
            assert_relative_eq!(control.normalizer().unwrap(), 1.0);
        }
    }

    #[test]
    fn test_outside_support_is_zero() {
        let control = ShapeControl::new(ShapeControlKind::RationalQuadratic, 2.0)
            .unwrap()
            .with_support(1.0, 3.0)
            .unwrap();
        assert_relative_eq!(control.evaluate(0.5).unwrap(), 0.0);
        assert_relative_eq!(control.evaluate(3.5).unwrap(), 0.0);
        assert_relative_eq!(control.derivative(3.5, 2).unwrap(), 0.0);
        assert_relative_eq!(
            control.integrate(0.0, 10.0).unwrap(),
            control.normalizer().unwrap(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(ShapeControl::new(ShapeControlKind::RationalLinear, -0.5).is_err());
        assert!(ShapeControl::identity().with_support(2.0, 2.0).is_err());
        let control = ShapeControl::new(ShapeControlKind::RationalLinear, 1.0).unwrap();
        assert!(matches!(
            control.derivative(0.5, 0),
            Err(MathError::InvalidInput { .. })
        ));
        assert!(control.evaluate(f64::NAN).is_err());
    }

    #[test]
    fn test_rational_linear_closed_form() {
        let control = ShapeControl::new(ShapeControlKind::RationalLinear, 2.0).unwrap();
        assert_relative_eq!(control.evaluate(0.5).unwrap(), 0.5);
        assert_relative_eq!(control.derivative(0.5, 1).unwrap(), -0.5, epsilon = 1e-14);
        assert_relative_eq!(control.normalizer().unwrap(), 3.0_f64.ln() / 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_exponential_unit_tension() {
        let control = ShapeControl::new(ShapeControlKind::RationalExponential, 1.0).unwrap();
        assert_relative_eq!(control.evaluate(0.3).unwrap(), (-0.3_f64).exp(), epsilon = 1e-14);
        assert_relative_eq!(
            control.normalizer().unwrap(),
            1.0 - (-1.0_f64).exp(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_integrals_match_quadrature() {
        let rule = GaussLegendre::new(32).unwrap();
        for kind in KINDS {
            for tension in [0.3, 1.0, 4.0] {
                let control = ShapeControl::new(kind, tension)
                    .unwrap()
                    .with_support(-1.0, 2.0)
                    .unwrap();
                let exact = control.integrate(-0.5, 1.7).unwrap();
                let numeric = rule
                    .integrate(|x| control.evaluate(x).unwrap(), -0.5, 1.7)
                    .unwrap();
                assert_relative_eq!(exact, numeric, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_exponential_integral_near_unit_tension() {
        let rule = GaussLegendre::new(32).unwrap();
        for tension in [1.0 - 1e-6, 1.0 - 1e-9, 1.0 + 1e-11, 1.0 + 1e-9, 1.0 + 1e-6] {
            let control = ShapeControl::new(ShapeControlKind::RationalExponential, tension).unwrap();
            let exact = control.integrate(0.1, 0.9).unwrap();
            let numeric = rule
                .integrate(|x| control.evaluate(x).unwrap(), 0.1, 0.9)
                .unwrap();
            assert_relative_eq!(exact, numeric, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_higher_derivatives_match_differences() {
        let h = 1e-5;
        for kind in KINDS {
            let control = ShapeControl::new(kind, 1.8)
                .unwrap()
                .with_support(0.0, 2.0)
                .unwrap();
            let x = 0.9;
            let d = control.derivatives_through(x, 3).unwrap();
            for order in 1..=3 {
                let up = control.derivatives_through(x + h, order - 1).unwrap()[order - 1];
                let down = control.derivatives_through(x - h, order - 1).unwrap()[order - 1];
                let numeric = (up - down) / (2.0 * h);
                assert!(
                    (d[order] - numeric).abs() < 1e-6 * (1.0 + d[order].abs()),
                    "{kind:?} order {order}: {} vs {numeric}",
                    d[order]
                );
            }
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let control = ShapeControl::new(ShapeControlKind::RationalExponential, 0.75).unwrap();
        let json = serde_json::to_string(&control).unwrap();
        assert!(json.contains("rational_exponential"));
        let back: ShapeControl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, control);
    }

    proptest! {
        #[test]
        fn prop_control_bounded_by_one(u in 0.0f64..=1.0, tension in 0.0f64..10.0) {
            for kind in KINDS {
                let value = ShapeControl::new(kind, tension).unwrap().evaluate(u).unwrap();
                prop_assert!(value > 0.0 && value <= 1.0 + 1e-15);
            }
        }

        #[test]
        fn prop_normalizer_positive(tension in 0.0f64..20.0) {
            for kind in KINDS {
                let n = ShapeControl::new(kind, tension).unwrap().normalizer().unwrap();
                prop_assert!(n > 0.0 && n <= 1.0 + 1e-12);
            }
        }
    }
}
