//! Calibrated stretches.
//!
//! A [`Stretch`] is the product of a [`SegmentSequenceBuilder`] run: a named,
//! contiguous arena of calibrated segments together with the calibration
//! state needed to recalibrate from any node and the quote sensitivities of
//! every segment.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use strand_math::jacobian::Jacobian;
use tracing::{debug, info};

use crate::builder::SegmentSequenceBuilder;
use crate::constraint::ResponseConstraint;
use crate::error::{SplineError, SplineResult};
use crate::instruments::{CalibrationInstrument, NodeInstrument, WeightedSumInstrument};
use crate::params::{BoundarySettings, SegmentControl, StretchConfig};
use crate::segment::{Monotonicity, Segment};

/// Replacement for the constraint at one node, see [`Stretch::reset_node`].
#[derive(Debug, Clone, PartialEq)]
pub enum NodeReset {
    /// Pin the response at the node.
    Response(f64),
    /// Replace the constraint of the segment ending at the node.
    Constraint(ResponseConstraint),
}

/// A calibrated sequence of contiguous segments.
#[derive(Debug, Clone)]
pub struct Stretch {
    sequence: SegmentSequenceBuilder,
}

impl Stretch {
    pub(crate) fn from_builder(sequence: SegmentSequenceBuilder) -> Self {
        Self { sequence }
    }

    /// Builds a stretch through `(predictors[k], responses[k])` nodes.
    ///
    /// The first node supplies the leading value; every other node becomes
    /// a [`NodeInstrument`] named `{name}_node_{k}`.
    pub fn from_nodes(
        name: impl Into<String>,
        predictors: Vec<f64>,
        responses: &[f64],
        control: SegmentControl,
        boundary: BoundarySettings,
        config: StretchConfig,
    ) -> SplineResult<Self> {
        if predictors.len() != responses.len() {
            return Err(SplineError::invalid_argument(format!(
                "{} predictors but {} responses",
                predictors.len(),
                responses.len()
            )));
        }
        let Some((&leading, rest)) = responses.split_first() else {
            return Err(SplineError::invalid_argument("a stretch needs at least two nodes"));
        };
        let name = name.into();
        let instruments = predictors
            .iter()
            .skip(1)
            .zip(rest)
            .enumerate()
            .map(|(k, (&x, &y))| {
                NodeInstrument::new(format!("{name}_node_{}", k + 1), x, y)
                    .map(|node| Arc::new(node) as Arc<dyn CalibrationInstrument>)
            })
            .collect::<SplineResult<Vec<_>>>()?;

        SegmentSequenceBuilder::new(name, predictors, leading, instruments, control)?
            .with_boundary(boundary)
            .with_config(config)
            .build()
    }

    /// Stretch name.
    pub fn name(&self) -> &str {
        &self.sequence.name
    }

    /// Calibrated segments, left to right.
    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.sequence.segments
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.sequence.segments.len()
    }

    /// Node ordinates.
    pub fn predictors(&self) -> &[f64] {
        &self.sequence.predictors
    }

    /// First node ordinate.
    pub fn left_edge(&self) -> f64 {
        self.sequence.predictors[0]
    }

    /// Last node ordinate.
    pub fn right_edge(&self) -> f64 {
        self.sequence.predictors[self.sequence.predictors.len() - 1]
    }

    /// Leading slope the stretch was calibrated with.
    pub fn left_slope(&self) -> f64 {
        self.sequence.left_slope
    }

    /// Boundary policy.
    pub fn boundary(&self) -> BoundarySettings {
        self.sequence.boundary
    }

    /// Configuration.
    pub fn config(&self) -> &StretchConfig {
        &self.sequence.config
    }

    /// Calibration instruments, one per segment.
    pub fn instruments(&self) -> &[Arc<dyn CalibrationInstrument>] {
        &self.sequence.instruments
    }

    /// True when `x` lies within `[left_edge, right_edge]`.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.left_edge() && x <= self.right_edge()
    }

    /// Index of the segment whose `[left, right)` holds `x`; the last
    /// segment also owns its right edge.
    pub fn segment_index(&self, x: f64) -> SplineResult<usize> {
        self.check_domain(x)?;
        let above = self.sequence.predictors.partition_point(|&p| p <= x);
        Ok(above.saturating_sub(1).min(self.num_segments() - 1))
    }

    /// Response at `x`.
    pub fn response_value(&self, x: f64) -> SplineResult<f64> {
        self.response_value_derivative(x, 0)
    }

    /// Response derivative of the given order at `x` (0 = value).
    ///
    /// With extrapolation enabled, ordinates beyond an edge continue the
    /// edge value along the edge slope.
    pub fn response_value_derivative(&self, x: f64, order: usize) -> SplineResult<f64> {
        if x.is_finite() && !self.contains(x) && self.sequence.config.allow_extrapolation {
            let edge = if x < self.left_edge() {
                self.left_edge()
            } else {
                self.right_edge()
            };
            let segment = &self.segments()[self.segment_index(edge)?];
            return match order {
                0 => Ok(segment.response_value(edge)?
                    + segment.response_value_derivative(edge, 1)? * (x - edge)),
                1 => segment.response_value_derivative(edge, 1),
                _ => Ok(0.0),
            };
        }
        let segment = &self.segments()[self.segment_index(x)?];
        segment.response_value_derivative(x, order)
    }

    /// Integral of the response over `[a, b]` within the stretch.
    pub fn integrate(&self, a: f64, b: f64) -> SplineResult<f64> {
        if a > b {
            return Ok(-self.integrate(b, a)?);
        }
        self.check_domain(a)?;
        self.check_domain(b)?;
        let mut total = 0.0;
        for segment in self.segments() {
            let lo = a.max(segment.left());
            let hi = b.min(segment.right());
            if lo < hi {
                total += segment.integrate(lo, hi)?;
            }
        }
        Ok(total)
    }

    /// True when every segment is monotonic.
    pub fn is_locally_monotone(&self) -> SplineResult<bool> {
        for segment in self.segments() {
            if !segment.monotone_type()?.is_monotonic() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shape of the segment containing `x`.
    pub fn monotone_type(&self, x: f64) -> SplineResult<Monotonicity> {
        self.segments()[self.segment_index(x)?].monotone_type()
    }

    /// True when consecutive node differences of the fitted response have
    /// the same signs as those of `measured`.
    pub fn is_co_monotone(&self, measured: &[f64]) -> SplineResult<bool> {
        let predictors = self.predictors();
        if measured.len() != predictors.len() {
            return Err(SplineError::invalid_argument(format!(
                "{} measured responses for {} nodes",
                measured.len(),
                predictors.len()
            )));
        }
        let fitted = predictors
            .iter()
            .map(|&x| self.response_value(x))
            .collect::<SplineResult<Vec<_>>>()?;

        let scale = fitted
            .iter()
            .chain(measured)
            .fold(1.0_f64, |m, v| m.max(v.abs()));
        let tolerance = 1e-12 * scale;
        let sign = |d: f64| {
            if d.abs() <= tolerance {
                0
            } else if d > 0.0 {
                1
            } else {
                -1
            }
        };
        Ok(fitted
            .windows(2)
            .zip(measured.windows(2))
            .all(|(f, m)| sign(f[1] - f[0]) == sign(m[1] - m[0])))
    }

    /// Manifest measures the stretch's instruments are quoted in, sorted.
    pub fn manifest_measures(&self) -> Vec<&str> {
        let mut measures: Vec<&str> = self
            .instruments()
            .iter()
            .map(|i| i.manifest_measure())
            .collect();
        measures.sort_unstable();
        measures.dedup();
        measures
    }

    /// True when `x` was calibrated by constraints under `label`.
    pub fn is_merge_state(&self, x: f64, label: &str) -> bool {
        self.sequence.merge_state.is_merge_state(x, label)
    }

    /// `∂r⁽ᵒʳᵈᵉʳ⁾(x) / ∂(quote)` for every instrument quoted in `measure`.
    ///
    /// `None` when no instrument is quoted in `measure` or sensitivities were
    /// not computed. Extrapolated ordinates differentiate the linear
    /// continuation used by [`Stretch::response_value_derivative`].
    pub fn jack_d_response_d_manifest_measure(
        &self,
        measure: &str,
        x: f64,
        order: usize,
    ) -> SplineResult<Option<Jacobian>> {
        let Some(sensitivities) = &self.sequence.sensitivities else {
            return Ok(None);
        };
        let columns: Vec<usize> = self
            .instruments()
            .iter()
            .enumerate()
            .filter(|(_, i)| i.manifest_measure() == measure)
            .map(|(k, _)| k)
            .collect();
        if columns.is_empty() {
            return Ok(None);
        }

        let (index, basis) = self.sensitivity_basis_row(x, order)?;
        let full = basis.transpose() * &sensitivities[index];
        let row: Vec<f64> = columns.iter().map(|&k| full[k]).collect();
        let labels = columns
            .iter()
            .map(|&k| self.instruments()[k].id().to_string())
            .collect();
        Ok(Some(Jacobian::from_row(&row, labels)?))
    }

    /// Segment index and basis row mapping its coefficients onto `r⁽ᵒʳᵈᵉʳ⁾(x)`.
    fn sensitivity_basis_row(&self, x: f64, order: usize) -> SplineResult<(usize, DVector<f64>)> {
        if x.is_finite() && !self.contains(x) && self.sequence.config.allow_extrapolation {
            let edge = if x < self.left_edge() {
                self.left_edge()
            } else {
                self.right_edge()
            };
            let index = self.segment_index(edge)?;
            let segment = &self.segments()[index];
            let row = match order {
                0 => segment.basis_row(edge, 0)? + segment.basis_row(edge, 1)? * (x - edge),
                1 => segment.basis_row(edge, 1)?,
                _ => DVector::zeros(segment.num_basis()),
            };
            return Ok((index, row));
        }
        let index = self.segment_index(x)?;
        Ok((index, self.segments()[index].basis_row(x, order)?))
    }

    /// Coefficient sensitivities `∂c / ∂(quotes)` per segment, if computed.
    pub fn coefficient_sensitivities(&self) -> Option<&[DMatrix<f64>]> {
        self.sequence.sensitivities.as_deref()
    }

    /// Replaces the constraint at node `node` and recalibrates from there.
    ///
    /// Node `k` is the right edge of segment `k - 1`; segments `0..k-1` keep
    /// their storage. The leading slope is not re-solved and is held fixed in
    /// the recomputed sensitivities. On failure the stretch is left unchanged.
    pub fn reset_node(&mut self, node: usize, reset: NodeReset) -> SplineResult<()> {
        let nodes = self.predictors().len();
        if node == 0 || node >= nodes {
            return Err(SplineError::invalid_argument(format!(
                "node {node} cannot be reset; expected 1..={}",
                nodes - 1
            )));
        }
        let segment = node - 1;
        let previous = &self.sequence.instruments[segment];
        let replacement: Arc<dyn CalibrationInstrument> = match reset {
            NodeReset::Response(value) => Arc::new(NodeInstrument::new(
                previous.id(),
                self.sequence.predictors[node],
                value,
            )?),
            NodeReset::Constraint(constraint) => Arc::new(
                WeightedSumInstrument::from_constraint(
                    previous.id(),
                    previous.manifest_measure(),
                    &constraint,
                )?
                .with_latent_state(previous.latent_state()),
            ),
        };

        let mut sequence = self.sequence.clone();
        sequence.replace_instrument(segment, replacement)?;
        sequence.calibrate_segment_sequence(segment)?;
        if sequence.config.compute_sensitivity {
            sequence.propagate_sensitivity_from(segment)?;
        }
        self.sequence = sequence;

        info!(stretch = %self.name(), node, "node reset");
        debug!(stretch = %self.name(), recalibrated = self.num_segments() - segment, "segments recalibrated");
        Ok(())
    }

    fn check_domain(&self, x: f64) -> SplineResult<()> {
        if !x.is_finite() {
            return Err(SplineError::invalid_argument(format!("non-finite ordinate {x}")));
        }
        if self.contains(x) {
            Ok(())
        } else {
            Err(SplineError::out_of_domain(x, self.left_edge(), self.right_edge()))
        }
    }
}
