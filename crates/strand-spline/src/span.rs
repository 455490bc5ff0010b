//! Spans: several stretches queried as one response surface.

use std::sync::Arc;

use strand_math::jacobian::Jacobian;

use crate::error::{SplineError, SplineResult};
use crate::stretch::Stretch;

/// A queryable response over a predictor range.
///
/// Implemented by [`Stretch`], [`Span`] and [`AggregatedSpan`]; builders use
/// it to resolve constraint pairs that lie beyond the segment being
/// calibrated.
pub trait ResponseSurface: Send + Sync {
    /// Left edge of the covered range.
    fn left_edge(&self) -> f64;

    /// Right edge of the covered range.
    fn right_edge(&self) -> f64;

    /// True when `x` lies within the covered range.
    fn contains(&self, x: f64) -> bool {
        x >= self.left_edge() && x <= self.right_edge()
    }

    /// Response at `x`.
    fn response_value(&self, x: f64) -> SplineResult<f64>;

    /// Response derivative of the given order at `x`.
    fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64>;

    /// Quote sensitivities of the response at `x` for one manifest measure.
    fn jack_d_response_d_manifest_measure(
        &self,
        measure: &str,
        x: f64,
        order: usize,
    ) -> SplineResult<Option<Jacobian>>;
}

impl ResponseSurface for Stretch {
    fn left_edge(&self) -> f64 {
        Stretch::left_edge(self)
    }

    fn right_edge(&self) -> f64 {
        Stretch::right_edge(self)
    }

    fn contains(&self, x: f64) -> bool {
        Stretch::contains(self, x)
    }

    fn response_value(&self, x: f64) -> SplineResult<f64> {
        Stretch::response_value(self, x)
    }

    fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        Stretch::response_value_derivative(self, x, order)
    }

    fn jack_d_response_d_manifest_measure(
        &self,
        measure: &str,
        x: f64,
        order: usize,
    ) -> SplineResult<Option<Jacobian>> {
        Stretch::jack_d_response_d_manifest_measure(self, measure, x, order)
    }
}

// ============================================================================
// Span
// ============================================================================

/// Ordered stretches with unique names; lookups go to the first stretch
/// containing the ordinate.
#[derive(Debug, Clone, Default)]
pub struct Span {
    stretches: Vec<Arc<Stretch>>,
}

impl Span {
    /// Creates an empty span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stretch; its name must be new to the span.
    pub fn add_stretch(&mut self, stretch: Arc<Stretch>) -> SplineResult<()> {
        if self.stretch(stretch.name()).is_some() {
            return Err(SplineError::invalid_argument(format!(
                "span already holds a stretch named '{}'",
                stretch.name()
            )));
        }
        self.stretches.push(stretch);
        Ok(())
    }

    /// Builder-style [`Span::add_stretch`].
    pub fn with_stretch(mut self, stretch: Arc<Stretch>) -> SplineResult<Self> {
        self.add_stretch(stretch)?;
        Ok(self)
    }

    /// Stretch by name.
    pub fn stretch(&self, name: &str) -> Option<&Arc<Stretch>> {
        self.stretches.iter().find(|s| s.name() == name)
    }

    /// Stretches in insertion order.
    pub fn stretches(&self) -> &[Arc<Stretch>] {
        &self.stretches
    }

    /// Number of stretches.
    pub fn len(&self) -> usize {
        self.stretches.len()
    }

    /// True when the span holds no stretch.
    pub fn is_empty(&self) -> bool {
        self.stretches.is_empty()
    }

    /// Response from the first stretch containing `x`.
    pub fn calc_response_value(&self, x: f64) -> SplineResult<f64> {
        self.covering(x)?.response_value(x)
    }

    /// Response derivative from the first stretch containing `x`.
    pub fn calc_response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        self.covering(x)?.response_value_derivative(x, order)
    }

    /// True when any stretch recorded `label` over a range containing `x`.
    pub fn is_merge_state(&self, x: f64, label: &str) -> bool {
        self.stretches.iter().any(|s| s.is_merge_state(x, label))
    }

    fn covering(&self, x: f64) -> SplineResult<&Stretch> {
        if !x.is_finite() {
            return Err(SplineError::invalid_argument(format!("non-finite ordinate {x}")));
        }
        self.stretches
            .iter()
            .find(|s| s.contains(x))
            .map(|s| &**s)
            .ok_or_else(|| {
                SplineError::out_of_domain(
                    x,
                    ResponseSurface::left_edge(self),
                    ResponseSurface::right_edge(self),
                )
            })
    }
}

impl ResponseSurface for Span {
    fn left_edge(&self) -> f64 {
        self.stretches
            .iter()
            .map(|s| s.left_edge())
            .fold(f64::INFINITY, f64::min)
    }

    fn right_edge(&self) -> f64 {
        self.stretches
            .iter()
            .map(|s| s.right_edge())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn contains(&self, x: f64) -> bool {
        self.stretches.iter().any(|s| s.contains(x))
    }

    fn response_value(&self, x: f64) -> SplineResult<f64> {
        self.calc_response_value(x)
    }

    fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        self.calc_response_value_derivative(x, order)
    }

    fn jack_d_response_d_manifest_measure(
        &self,
        measure: &str,
        x: f64,
        order: usize,
    ) -> SplineResult<Option<Jacobian>> {
        self.covering(x)?
            .jack_d_response_d_manifest_measure(measure, x, order)
    }
}

// ============================================================================
// AggregatedSpan
// ============================================================================

/// Weighted combination `Σ wᵢ · rᵢ(x)` of stretches.
#[derive(Debug, Clone)]
pub struct AggregatedSpan {
    stretches: Vec<Arc<Stretch>>,
    weights: Vec<f64>,
}

impl AggregatedSpan {
    /// Creates an aggregated span; weights run parallel to stretches.
    pub fn new(stretches: Vec<Arc<Stretch>>, weights: Vec<f64>) -> SplineResult<Self> {
        if stretches.is_empty() {
            return Err(SplineError::invalid_argument(
                "aggregated span needs at least one stretch",
            ));
        }
        if stretches.len() != weights.len() {
            return Err(SplineError::invalid_argument(format!(
                "{} stretches but {} weights",
                stretches.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
            return Err(SplineError::invalid_argument(format!("non-finite weight {w}")));
        }
        Ok(Self { stretches, weights })
    }

    /// Constituent stretches.
    pub fn stretches(&self) -> &[Arc<Stretch>] {
        &self.stretches
    }

    /// Constituent weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Weighted response at `x`.
    pub fn calc_response_value(&self, x: f64) -> SplineResult<f64> {
        self.calc_response_value_derivative(x, 0)
    }

    /// Weighted response derivative at `x`.
    pub fn calc_response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        self.stretches
            .iter()
            .zip(&self.weights)
            .try_fold(0.0, |total, (stretch, &w)| -> SplineResult<f64> {
                Ok(total + w * stretch.response_value_derivative(x, order)?)
            })
    }

    /// Weighted Jacobian, merged across constituents by label.
    ///
    /// `None` when no constituent tracks `measure`.
    pub fn jacobian(&self, measure: &str, x: f64, order: usize) -> SplineResult<Option<Jacobian>> {
        let mut merged: Option<Jacobian> = None;
        for (stretch, &w) in self.stretches.iter().zip(&self.weights) {
            let Some(jacobian) = stretch.jack_d_response_d_manifest_measure(measure, x, order)? else {
                continue;
            };
            let scaled = jacobian.scaled(w);
            match merged.as_mut() {
                Some(total) => total.cumulative_merge(&scaled)?,
                None => merged = Some(scaled),
            }
        }
        Ok(merged)
    }
}

impl ResponseSurface for AggregatedSpan {
    /// Left edge of the range shared by every constituent.
    fn left_edge(&self) -> f64 {
        self.stretches
            .iter()
            .map(|s| s.left_edge())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Right edge of the range shared by every constituent.
    fn right_edge(&self) -> f64 {
        self.stretches
            .iter()
            .map(|s| s.right_edge())
            .fold(f64::INFINITY, f64::min)
    }

    fn response_value(&self, x: f64) -> SplineResult<f64> {
        self.calc_response_value(x)
    }

    fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        self.calc_response_value_derivative(x, order)
    }

    fn jack_d_response_d_manifest_measure(
        &self,
        measure: &str,
        x: f64,
        order: usize,
    ) -> SplineResult<Option<Jacobian>> {
        self.jacobian(measure, x, order)
    }
}
