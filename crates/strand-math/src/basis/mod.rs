//! Basis function sets for segment-local response representation.
//!
//! Every family acts on the segment-local ordinate `u = (x - left) / width`
//! and exposes closed-form values, derivatives of any order and definite
//! integrals. The three must agree exactly: calibration solves a linear
//! system assembled from values and derivatives, and the sensitivity pass
//! differentiates that same system.
//!
//! | Family | Functions | Parameter |
//! |--------|-----------|-----------|
//! | [`BasisFamily::Polynomial`] | `u^i` | number of functions |
//! | [`BasisFamily::Bernstein`] | `C(n,i) u^i (1-u)^(n-i)` | degree |
//! | [`BasisFamily::ExponentialTension`] | `1, u, e^(τu), e^(-τu)` | tension |
//! | [`BasisFamily::HyperbolicTension`] | `1, u, cosh τu, sinh τu` | tension |
//! | [`BasisFamily::HyperbolicHat`] | `1, u, sinh(τ(1-u))/sinh τ, sinh(τu)/sinh τ` | tension |

mod bernstein;
mod polynomial;
mod tension;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, MathError, MathResult};

/// Family tag plus parameter record identifying a basis function set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum BasisFamily {
    /// Monomials `1, u, u², …` with the given number of functions.
    Polynomial {
        /// Number of basis functions (polynomial degree + 1).
        num_basis: usize,
    },
    /// Bernstein polynomials of the given degree.
    Bernstein {
        /// Polynomial degree; the set has `degree + 1` functions.
        degree: usize,
    },
    /// `{1, u, e^(τu), e^(-τu)}`.
    ExponentialTension {
        /// Tension `τ > 0`.
        tension: f64,
    },
    /// `{1, u, cosh τu, sinh τu}`.
    HyperbolicTension {
        /// Tension `τ > 0`.
        tension: f64,
    },
    /// Koch–Lyche–Kvasov hyperbolic tension hats plus the linear functions.
    HyperbolicHat {
        /// Tension `τ > 0`.
        tension: f64,
    },
}

/// An immutable, validated family of basis functions.
///
/// Built once per segment control specification and shared read-only
/// (typically behind an `Arc`) by every segment that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BasisFamily", into = "BasisFamily")]
pub struct BasisFunctionSet {
    family: BasisFamily,
    num_basis: usize,
}

impl BasisFunctionSet {
    /// Validates a family record and builds the set.
    pub fn new(family: BasisFamily) -> MathResult<Self> {
        let num_basis = match family {
            BasisFamily::Polynomial { num_basis } => {
                if num_basis == 0 {
                    return Err(MathError::invalid_input(
                        "polynomial basis needs at least one function",
                    ));
                }
                num_basis
            }
            BasisFamily::Bernstein { degree } => degree + 1,
            BasisFamily::ExponentialTension { tension }
            | BasisFamily::HyperbolicTension { tension } => {
                validate_tension(tension)?;
                4
            }
            BasisFamily::HyperbolicHat { tension } => {
                validate_tension(tension)?;
                if !tension.sinh().is_finite() {
                    return Err(MathError::invalid_input(format!(
                        "hat tension {tension} overflows sinh"
                    )));
                }
                4
            }
        };
        Ok(Self { family, num_basis })
    }

    /// Monomial set with `num_basis` functions.
    pub fn polynomial(num_basis: usize) -> MathResult<Self> {
        Self::new(BasisFamily::Polynomial { num_basis })
    }

    /// Bernstein set of the given degree.
    pub fn bernstein(degree: usize) -> MathResult<Self> {
        Self::new(BasisFamily::Bernstein { degree })
    }

    /// Exponential tension set.
    pub fn exponential_tension(tension: f64) -> MathResult<Self> {
        Self::new(BasisFamily::ExponentialTension { tension })
    }

    /// Hyperbolic tension set.
    pub fn hyperbolic_tension(tension: f64) -> MathResult<Self> {
        Self::new(BasisFamily::HyperbolicTension { tension })
    }

    /// Hyperbolic tension hat set.
    pub fn hyperbolic_hat(tension: f64) -> MathResult<Self> {
        Self::new(BasisFamily::HyperbolicHat { tension })
    }

    /// The family record.
    #[must_use]
    pub fn family(&self) -> BasisFamily {
        self.family
    }

    /// Number of basis functions.
    #[must_use]
    pub fn num_basis(&self) -> usize {
        self.num_basis
    }

    /// Value of basis function `index` at `u`.
    pub fn evaluate(&self, index: usize, u: f64) -> MathResult<f64> {
        self.derivative(index, u, 0)
    }

    /// Derivative of the given order (0 = value) of basis function `index` at `u`.
    pub fn derivative(&self, index: usize, u: f64, order: usize) -> MathResult<f64> {
        self.check_index(index)?;
        ensure_finite(u, "basis ordinate")?;
        Ok(match self.family {
            BasisFamily::Polynomial { .. } => polynomial::derivative(index, u, order),
            BasisFamily::Bernstein { degree } => bernstein::derivative(index, degree, u, order),
            BasisFamily::ExponentialTension { tension } => {
                tension::exponential_derivative(index, tension, u, order)
            }
            BasisFamily::HyperbolicTension { tension } => {
                tension::hyperbolic_derivative(index, tension, u, order)
            }
            BasisFamily::HyperbolicHat { tension } => {
                tension::hat_derivative(index, tension, u, order)
            }
        })
    }

    /// Definite integral of basis function `index` over `[begin, end]`.
    pub fn integrate(&self, index: usize, begin: f64, end: f64) -> MathResult<f64> {
        self.check_index(index)?;
        ensure_finite(begin, "integration begin")?;
        ensure_finite(end, "integration end")?;
        Ok(match self.family {
            BasisFamily::Polynomial { .. } => polynomial::integrate(index, begin, end),
            BasisFamily::Bernstein { degree } => bernstein::integrate(index, degree, begin, end),
            BasisFamily::ExponentialTension { tension } => {
                tension::exponential_integrate(index, tension, begin, end)
            }
            BasisFamily::HyperbolicTension { tension } => {
                tension::hyperbolic_integrate(index, tension, begin, end)
            }
            BasisFamily::HyperbolicHat { tension } => {
                tension::hat_integrate(index, tension, begin, end)
            }
        })
    }

    /// Derivatives of the given order of every basis function at `u`.
    pub fn derivative_row(&self, u: f64, order: usize) -> MathResult<Vec<f64>> {
        (0..self.num_basis)
            .map(|i| self.derivative(i, u, order))
            .collect()
    }

    /// Integrals of every basis function over `[begin, end]`.
    pub fn integral_row(&self, begin: f64, end: f64) -> MathResult<Vec<f64>> {
        (0..self.num_basis)
            .map(|i| self.integrate(i, begin, end))
            .collect()
    }

    fn check_index(&self, index: usize) -> MathResult<()> {
        if index < self.num_basis {
            Ok(())
        } else {
            Err(MathError::invalid_input(format!(
                "basis index {index} out of range for {} functions",
                self.num_basis
            )))
        }
    }
}

impl TryFrom<BasisFamily> for BasisFunctionSet {
    type Error = MathError;

    fn try_from(family: BasisFamily) -> Result<Self, Self::Error> {
        Self::new(family)
    }
}

impl From<BasisFunctionSet> for BasisFamily {
    fn from(set: BasisFunctionSet) -> Self {
        set.family
    }
}

fn validate_tension(tension: f64) -> MathResult<()> {
    if tension.is_finite() && tension > 0.0 {
        Ok(())
    } else {
        Err(MathError::invalid_input(format!(
            "tension must be positive and finite, got {tension}"
        )))
    }
}

/// `n! / (n - k)!` as a float; zero when `k > n`.
#[must_use]
pub fn falling_factorial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    ((n - k + 1)..=n).fold(1.0, |acc, m| acc * m as f64)
}

/// Binomial coefficient `C(n, k)` as a float; zero when `k > n`.
#[must_use]
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, j| acc * (n - j) as f64 / (j + 1) as f64)
}
