//! Gauss-Legendre quadrature.
//!
//! Used wherever a closed-form antiderivative is not available: integrals of
//! shape-controlled segment responses and the Gram matrices of roughness
//! penalties. An `n`-point rule integrates polynomials of degree `2n - 1`
//! exactly.

use crate::error::{ensure_finite, MathError, MathResult};

/// Nodes and weights of a Gauss-Legendre rule on `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Builds an `n`-point rule.
    ///
    /// Nodes are the roots of the Legendre polynomial `P_n`, found by Newton
    /// iteration from the Chebyshev-like initial guesses.
    pub fn new(n: usize) -> MathResult<Self> {
        if n == 0 {
            return Err(MathError::insufficient_data(1, 0));
        }

        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        let m = n.div_ceil(2);
        let nf = n as f64;

        for i in 0..m {
            let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();

            for _ in 0..100 {
                let (p, d) = legendre_with_derivative(n, z);
                let step = p / d;
                z -= step;
                if step.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre_with_derivative(n, z);

            let w = 2.0 / ((1.0 - z * z) * dp * dp);
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            weights[i] = w;
            weights[n - 1 - i] = w;
        }

        Ok(Self { nodes, weights })
    }

    /// Number of points in the rule.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a rule has at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes on `[-1, 1]`.
    #[must_use]
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Weights on `[-1, 1]`.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Returns the `(abscissa, weight)` pairs mapped onto `[a, b]`.
    pub fn mapped(&self, a: f64, b: f64) -> MathResult<Vec<(f64, f64)>> {
        ensure_finite(a, "lower limit")?;
        ensure_finite(b, "upper limit")?;
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        Ok(self
            .nodes
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| (mid + half * x, half * w))
            .collect())
    }

    /// Integrates `f` over `[a, b]`.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64) -> MathResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        Ok(self.mapped(a, b)?.into_iter().map(|(x, w)| w * f(x)).sum())
    }

    /// Integrates a fallible integrand over `[a, b]`, stopping at the first error.
    pub fn try_integrate<F, E>(&self, f: F, a: f64, b: f64) -> Result<f64, E>
    where
        F: Fn(f64) -> Result<f64, E>,
        E: From<MathError>,
    {
        let mut total = 0.0;
        for (x, w) in self.mapped(a, b)? {
            total += w * f(x)?;
        }
        Ok(total)
    }
}

/// Evaluates `P_n(z)` and `P_n'(z)` by the three-term recurrence.
fn legendre_with_derivative(n: usize, z: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = z;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p_next = ((2.0 * kf - 1.0) * z * p - (kf - 1.0) * p_prev) / kf;
        p_prev = p;
        p = p_next;
    }
    let nf = n as f64;
    let dp = nf * (z * p - p_prev) / (z * z - 1.0);
    (p, dp)
}
