//! Linear response constraints and best-fit response sets.

use serde::{Deserialize, Serialize};

use crate::error::{SplineError, SplineResult};

/// A linear functional on the response: `Σ weight · r(predictor) = target`.
///
/// A node constraint is the single pair `(x, 1)`; instrument constraints
/// carry one pair per ordinate the instrument depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseConstraint {
    predictors: Vec<f64>,
    weights: Vec<f64>,
    target: f64,
}

impl ResponseConstraint {
    /// Creates a constraint from parallel predictor and weight arrays.
    pub fn new(predictors: Vec<f64>, weights: Vec<f64>, target: f64) -> SplineResult<Self> {
        if predictors.is_empty() {
            return Err(SplineError::invalid_argument(
                "constraint needs at least one predictor",
            ));
        }
        if predictors.len() != weights.len() {
            return Err(SplineError::invalid_argument(format!(
                "constraint has {} predictors but {} weights",
                predictors.len(),
                weights.len()
            )));
        }
        if predictors.iter().chain(&weights).any(|v| !v.is_finite()) || !target.is_finite() {
            return Err(SplineError::invalid_argument(
                "constraint predictors, weights and target must be finite",
            ));
        }
        Ok(Self {
            predictors,
            weights,
            target,
        })
    }

    /// Creates the node constraint `r(x) = value`.
    pub fn node(predictor: f64, value: f64) -> SplineResult<Self> {
        Self::new(vec![predictor], vec![1.0], value)
    }

    /// Creates a constraint from `(predictor, weight)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)], target: f64) -> SplineResult<Self> {
        let (predictors, weights) = pairs.iter().copied().unzip();
        Self::new(predictors, weights, target)
    }

    /// Predictor ordinates.
    pub fn predictors(&self) -> &[f64] {
        &self.predictors
    }

    /// Response weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Target value.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// `(predictor, weight)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.predictors.iter().copied().zip(self.weights.iter().copied())
    }

    /// Smallest and largest predictor.
    pub fn predictor_range(&self) -> (f64, f64) {
        self.predictors
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            })
    }

    /// Residual `Σ w·r(x) - target` for a response function.
    pub fn residual<F>(&self, response: F) -> SplineResult<f64>
    where
        F: Fn(f64) -> SplineResult<f64>,
    {
        let mut total = -self.target;
        for (x, w) in self.pairs() {
            total += w * response(x)?;
        }
        Ok(total)
    }
}

/// Weighted least-squares response targets.
///
/// Weights are normalised to sum to one on construction and again on every
/// per-segment slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestFitResponse {
    predictors: Vec<f64>,
    responses: Vec<f64>,
    weights: Vec<f64>,
}

impl BestFitResponse {
    /// Creates a best-fit set; weights must be non-negative with a positive sum.
    pub fn new(predictors: Vec<f64>, responses: Vec<f64>, weights: Vec<f64>) -> SplineResult<Self> {
        if predictors.is_empty() {
            return Err(SplineError::invalid_argument("best-fit set is empty"));
        }
        if predictors.len() != responses.len() || predictors.len() != weights.len() {
            return Err(SplineError::invalid_argument(format!(
                "best-fit arrays have lengths {}, {}, {}",
                predictors.len(),
                responses.len(),
                weights.len()
            )));
        }
        if predictors
            .iter()
            .chain(&responses)
            .chain(&weights)
            .any(|v| !v.is_finite())
        {
            return Err(SplineError::invalid_argument("best-fit values must be finite"));
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(SplineError::invalid_argument("best-fit weights must be non-negative"));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(SplineError::invalid_argument("best-fit weights sum to zero"));
        }
        let weights = weights.into_iter().map(|w| w / total).collect();
        Ok(Self {
            predictors,
            responses,
            weights,
        })
    }

    /// Equal-weight best-fit set.
    pub fn equally_weighted(predictors: Vec<f64>, responses: Vec<f64>) -> SplineResult<Self> {
        let weights = vec![1.0; predictors.len()];
        Self::new(predictors, responses, weights)
    }

    /// Predictor ordinates.
    pub fn predictors(&self) -> &[f64] {
        &self.predictors
    }

    /// Target responses.
    pub fn responses(&self) -> &[f64] {
        &self.responses
    }

    /// Normalised weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.predictors.len()
    }

    /// True when the set has no points.
    pub fn is_empty(&self) -> bool {
        self.predictors.is_empty()
    }

    /// `(predictor, response, weight)` triples.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.predictors
            .iter()
            .zip(&self.responses)
            .zip(&self.weights)
            .map(|((&x, &y), &w)| (x, y, w))
    }

    /// Points in `(left, right]` (or `[left, right]` when `include_left`),
    /// renormalised; `None` when no positive-weight point falls inside.
    pub fn slice(&self, left: f64, right: f64, include_left: bool) -> Option<Self> {
        let inside = |x: f64| (x > left || (include_left && x == left)) && x <= right;
        let mut predictors = Vec::new();
        let mut responses = Vec::new();
        let mut weights = Vec::new();
        for (x, y, w) in self.points().filter(|(x, _, w)| inside(*x) && *w > 0.0) {
            predictors.push(x);
            responses.push(y);
            weights.push(w);
        }
        Self::new(predictors, responses, weights).ok()
    }
}
