//! Segment-by-segment stretch calibration.
//!
//! The [`SegmentSequenceBuilder`] lays out one segment per pair of adjacent
//! predictor nodes and one calibration instrument per segment, then runs
//! two passes:
//!
//! 1. **Value calibration**: segment 0 against the leading response and
//!    slope, segments `1..N-1` against their predecessor's trailing state.
//! 2. **Sensitivity propagation**: the coefficient Jacobian of every segment
//!    with respect to the instrument quotes, chained through the same
//!    linear systems.
//!
//! Each instrument's constraint is netted before it reaches its segment:
//! pairs at or before the segment's left edge are evaluated on segments
//! already built (or the leading value), pairs beyond the right edge are
//! evaluated on an optional lookahead surface, and the rest become the
//! segment's trailing constraint.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strand_math::basis::BasisFunctionSet;
//! use strand_spline::prelude::*;
//!
//! let basis = BasisFunctionSet::polynomial(3).unwrap();
//! let control = SegmentControl::new(basis, 2).unwrap();
//! let instruments: Vec<Arc<dyn CalibrationInstrument>> = vec![
//!     Arc::new(NodeInstrument::new("n1", 2.0, 4.0).unwrap()),
//!     Arc::new(NodeInstrument::new("n2", 3.0, 9.0).unwrap()),
//! ];
//!
//! let stretch = SegmentSequenceBuilder::new("quadratic", vec![1.0, 2.0, 3.0], 1.0, instruments, control)
//!     .unwrap()
//!     .with_boundary(BoundarySettings::Natural)
//!     .build()
//!     .unwrap();
//!
//! assert!((stretch.response_value(3.0).unwrap() - 9.0).abs() < 1e-10);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, RowDVector};
use strand_math::basis::BasisFunctionSet;
use tracing::{debug, info, warn};

use crate::constraint::{BestFitResponse, ResponseConstraint};
use crate::error::{SplineError, SplineResult};
use crate::instruments::{CalibrationInstrument, CalibrationTarget};
use crate::merge::MergeState;
use crate::params::{BoundarySettings, SegmentControl, StretchConfig};
use crate::segment::Segment;
use crate::span::ResponseSurface;
use crate::stretch::Stretch;

/// Where a netted constraint pair takes its response from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PairSource {
    Leading,
    Segment(usize),
    Lookahead,
}

#[derive(Debug, Clone)]
struct NettedPair {
    ordinate: f64,
    weight: f64,
    source: PairSource,
}

/// Instrument constraint split against the segment layout.
#[derive(Debug, Clone)]
struct SegmentPlan {
    own: Vec<(f64, f64)>,
    netted: Vec<NettedPair>,
    target: CalibrationTarget,
}

/// Drives calibration and sensitivity propagation across a stretch.
#[derive(Clone)]
pub struct SegmentSequenceBuilder {
    pub(crate) name: String,
    pub(crate) predictors: Vec<f64>,
    pub(crate) leading_value: f64,
    pub(crate) instruments: Vec<Arc<dyn CalibrationInstrument>>,
    controls: Vec<SegmentControl>,
    pub(crate) boundary: BoundarySettings,
    best_fit: Option<BestFitResponse>,
    pub(crate) config: StretchConfig,
    lookahead: Option<Arc<dyn ResponseSurface>>,
    pub(crate) segments: Vec<Arc<Segment>>,
    plans: Vec<SegmentPlan>,
    built: usize,
    pub(crate) left_slope: f64,
    pub(crate) left_slope_sensitivity: Vec<f64>,
    pub(crate) merge_state: MergeState,
    pub(crate) sensitivities: Option<Vec<DMatrix<f64>>>,
}

impl fmt::Debug for SegmentSequenceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentSequenceBuilder")
            .field("name", &self.name)
            .field("predictors", &self.predictors)
            .field("boundary", &self.boundary)
            .field("built", &self.built)
            .field("has_lookahead", &self.lookahead.is_some())
            .finish()
    }
}

impl SegmentSequenceBuilder {
    /// Creates a builder with one control applied to every segment.
    ///
    /// # Arguments
    ///
    /// * `name` - Stretch name
    /// * `predictors` - Strictly increasing node ordinates, `N + 1` of them
    /// * `leading_value` - Response at the first node
    /// * `instruments` - One calibration instrument per segment, `N` of them
    /// * `control` - Segment control used for every segment
    pub fn new(
        name: impl Into<String>,
        predictors: Vec<f64>,
        leading_value: f64,
        instruments: Vec<Arc<dyn CalibrationInstrument>>,
        control: SegmentControl,
    ) -> SplineResult<Self> {
        if predictors.len() < 2 {
            return Err(SplineError::invalid_argument(format!(
                "a stretch needs at least two predictors, got {}",
                predictors.len()
            )));
        }
        for (i, pair) in predictors.windows(2).enumerate() {
            if !(pair[0].is_finite() && pair[1].is_finite() && pair[0] < pair[1]) {
                return Err(SplineError::invalid_argument(format!(
                    "predictors must be finite and strictly increasing at index {}: {} then {}",
                    i + 1,
                    pair[0],
                    pair[1]
                )));
            }
        }
        if !leading_value.is_finite() {
            return Err(SplineError::invalid_argument("leading value must be finite"));
        }
        let segments = predictors.len() - 1;
        if instruments.len() != segments {
            return Err(SplineError::invalid_argument(format!(
                "{segments} segments need {segments} instruments, got {}",
                instruments.len()
            )));
        }
        let mut seen = HashSet::new();
        for instrument in &instruments {
            if !seen.insert(instrument.id().to_string()) {
                return Err(SplineError::invalid_argument(format!(
                    "duplicate instrument id '{}'",
                    instrument.id()
                )));
            }
        }
        control.validate()?;

        Ok(Self {
            name: name.into(),
            predictors,
            leading_value,
            instruments,
            controls: vec![control; segments],
            boundary: BoundarySettings::default(),
            best_fit: None,
            config: StretchConfig::default(),
            lookahead: None,
            segments: Vec::new(),
            plans: Vec::new(),
            built: 0,
            left_slope: 0.0,
            left_slope_sensitivity: Vec::new(),
            merge_state: MergeState::new(),
            sensitivities: None,
        })
    }

    /// Sets one control per segment.
    pub fn with_segment_controls(mut self, controls: Vec<SegmentControl>) -> SplineResult<Self> {
        if controls.len() != self.num_segments() {
            return Err(SplineError::invalid_argument(format!(
                "{} segments need {} controls, got {}",
                self.num_segments(),
                self.num_segments(),
                controls.len()
            )));
        }
        for control in &controls {
            control.validate()?;
        }
        self.controls = controls;
        self.reset_layout();
        Ok(self)
    }

    /// Sets the boundary policy.
    #[must_use]
    pub fn with_boundary(mut self, boundary: BoundarySettings) -> Self {
        self.boundary = boundary;
        self
    }

    /// Sets the stretch-level best-fit responses, sliced onto segments.
    #[must_use]
    pub fn with_best_fit(mut self, best_fit: BestFitResponse) -> Self {
        self.best_fit = Some(best_fit);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StretchConfig) -> Self {
        self.config = config;
        self.reset_layout();
        self
    }

    /// Sets the surface that resolves constraint pairs beyond a segment's right edge.
    #[must_use]
    pub fn with_lookahead(mut self, surface: Arc<dyn ResponseSurface>) -> Self {
        self.lookahead = Some(surface);
        self
    }

    /// Sets the leading slope used by [`BoundarySettings::Floating`] and as
    /// the initial guess for the other policies.
    #[must_use]
    pub fn with_left_slope(mut self, slope: f64) -> Self {
        self.left_slope = slope;
        self
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.predictors.len() - 1
    }

    /// Segments in their current state.
    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    /// Merge-state bookkeeping recorded so far.
    pub fn merge_state(&self) -> &MergeState {
        &self.merge_state
    }

    /// Calibrates segment 0 against the leading value and `left_slope`.
    pub fn calibrate_starting_segment(&mut self, left_slope: f64) -> SplineResult<()> {
        self.ensure_layout()?;
        if !left_slope.is_finite() {
            return Err(SplineError::invalid_argument("leading slope must be finite"));
        }
        let mut segments = std::mem::take(&mut self.segments);
        let result = self.calibrate_one(&mut segments, 0, left_slope);
        self.segments = segments;
        result?;

        self.left_slope = left_slope;
        self.built = self.built.max(1);
        self.record_merge_state(0);
        Ok(())
    }

    /// Calibrates segments `start..N` against their predecessors.
    ///
    /// Stops at the first failure; segments before the failing one keep
    /// their newly calibrated state. `start == 0` recalibrates the starting
    /// segment with the stored leading slope first.
    pub fn calibrate_segment_sequence(&mut self, start: usize) -> SplineResult<()> {
        self.ensure_layout()?;
        let mut start = start;
        if start == 0 {
            self.calibrate_starting_segment(self.left_slope)?;
            start = 1;
        }
        if start > self.built {
            return Err(SplineError::invalid_argument(format!(
                "segment {} has no calibrated predecessor",
                start
            )));
        }

        for i in start..self.num_segments() {
            let mut segments = std::mem::take(&mut self.segments);
            let result = self.calibrate_one(&mut segments, i, self.left_slope);
            self.segments = segments;
            result?;
            self.built = self.built.max(i + 1);
            self.record_merge_state(i);
        }
        Ok(())
    }

    /// Propagates quote sensitivities through the calibrated sequence.
    ///
    /// `left_slope_sensitivity[j]` is `∂(leading slope) / ∂(quote j)`; it is
    /// zero for a caller-supplied slope.
    pub fn manifest_measure_sensitivity(&mut self, left_slope_sensitivity: &[f64]) -> SplineResult<()> {
        if left_slope_sensitivity.len() != self.instruments.len() {
            return Err(SplineError::invalid_argument(format!(
                "leading slope sensitivity has {} entries for {} instruments",
                left_slope_sensitivity.len(),
                self.instruments.len()
            )));
        }
        self.require_calibrated()?;
        let sensitivities = self.propagate(
            &self.segments,
            0,
            self.placeholder_sensitivities(left_slope_sensitivity.len()),
            left_slope_sensitivity,
            true,
        )?;
        self.left_slope_sensitivity = left_slope_sensitivity.to_vec();
        self.sensitivities = Some(sensitivities);
        Ok(())
    }

    /// Runs the full protocol and returns the calibrated stretch.
    pub fn build(mut self) -> SplineResult<Stretch> {
        self.config.validate()?;
        self.ensure_layout()?;
        info!(
            stretch = %self.name,
            segments = self.num_segments(),
            boundary = ?self.boundary,
            "building stretch"
        );

        let left_slope = match self.boundary.trailing_condition() {
            None => self.left_slope,
            Some((order, target)) => {
                if self.controls[0].ck < 2 {
                    return Err(SplineError::invalid_argument(format!(
                        "{:?} boundary needs continuity order of at least 2",
                        self.boundary
                    )));
                }
                self.solve_left_slope(order, target)?
            }
        };

        self.calibrate_starting_segment(left_slope)?;
        self.calibrate_segment_sequence(1)?;

        if self.config.compute_sensitivity {
            let slope_sensitivity = self.boundary_slope_sensitivity()?;
            self.manifest_measure_sensitivity(&slope_sensitivity)?;
        }

        info!(stretch = %self.name, left_slope, "stretch calibrated");
        Ok(Stretch::from_builder(self))
    }

    /// Swaps the instrument of one segment; the segment must be recalibrated.
    pub(crate) fn replace_instrument(
        &mut self,
        segment: usize,
        instrument: Arc<dyn CalibrationInstrument>,
    ) -> SplineResult<()> {
        if self
            .instruments
            .iter()
            .enumerate()
            .any(|(i, other)| i != segment && other.id() == instrument.id())
        {
            return Err(SplineError::invalid_argument(format!(
                "duplicate instrument id '{}'",
                instrument.id()
            )));
        }
        self.instruments[segment] = instrument;
        self.plans[segment] = self.plan(segment)?;
        Ok(())
    }

    /// Re-propagates sensitivities from `start` with the leading slope held fixed.
    ///
    /// A recalibrated segment no longer satisfies the trailing boundary solve,
    /// so the leading slope stops depending on the quotes. When the stored
    /// slope sensitivity is non-zero every segment is re-propagated.
    pub(crate) fn propagate_sensitivity_from(&mut self, start: usize) -> SplineResult<()> {
        let m = self.instruments.len();
        let held = vec![0.0; m];
        let (start, prior) = match self.sensitivities.take() {
            Some(prior) if self.left_slope_sensitivity.iter().all(|v| *v == 0.0) => (start, prior),
            Some(_) => (0, self.placeholder_sensitivities(m)),
            None => return self.manifest_measure_sensitivity(&held),
        };
        let sensitivities = self.propagate(&self.segments, start, prior, &held, true)?;
        self.left_slope_sensitivity = held;
        self.sensitivities = Some(sensitivities);
        Ok(())
    }

    fn reset_layout(&mut self) {
        self.segments.clear();
        self.plans.clear();
        self.built = 0;
        self.merge_state = MergeState::new();
        self.sensitivities = None;
    }

    fn ensure_layout(&mut self) -> SplineResult<()> {
        if !self.segments.is_empty() {
            return Ok(());
        }
        let mut bases: Vec<(BasisFunctionSet, Arc<BasisFunctionSet>)> = Vec::new();
        let mut segments = Vec::with_capacity(self.num_segments());
        for (i, control) in self.controls.iter().enumerate() {
            let basis = match bases.iter().find(|(b, _)| *b == control.basis) {
                Some((_, shared)) => Arc::clone(shared),
                None => {
                    let shared = Arc::new(control.basis);
                    bases.push((control.basis, Arc::clone(&shared)));
                    shared
                }
            };
            segments.push(Arc::new(Segment::new(
                i,
                self.predictors[i],
                self.predictors[i + 1],
                basis,
                control,
                &self.config,
            )?));
        }
        let plans = (0..self.num_segments())
            .map(|i| self.plan(i))
            .collect::<SplineResult<Vec<_>>>()?;
        self.segments = segments;
        self.plans = plans;
        Ok(())
    }

    /// Splits instrument `i`'s pairs into own rows and netted pairs.
    fn plan(&self, i: usize) -> SplineResult<SegmentPlan> {
        let instrument = &self.instruments[i];
        let measure = instrument.manifest_measure();
        let target = instrument.calibration_target(measure).ok_or_else(|| {
            SplineError::invalid_argument(format!(
                "instrument '{}' has no target for its own measure '{measure}'",
                instrument.id()
            ))
        })?;

        let first = self.predictors[0];
        let (left, right) = (self.predictors[i], self.predictors[i + 1]);
        let mut own = Vec::new();
        let mut netted = Vec::new();
        for (ordinate, weight) in instrument.predictor_weights() {
            if !(ordinate.is_finite() && weight.is_finite()) {
                return Err(SplineError::invalid_argument(format!(
                    "instrument '{}' has a non-finite pair",
                    instrument.id()
                )));
            }
            let source = if ordinate > left && ordinate <= right {
                own.push((ordinate, weight));
                continue;
            } else if i == 0 && ordinate == first {
                PairSource::Leading
            } else if ordinate >= first && ordinate <= left {
                let above = self.predictors.partition_point(|&p| p < ordinate);
                PairSource::Segment(above.saturating_sub(1))
            } else {
                PairSource::Lookahead
            };
            netted.push(NettedPair {
                ordinate,
                weight,
                source,
            });
        }

        Ok(SegmentPlan { own, netted, target })
    }

    /// Calibrates segment `i` inside `segments`.
    fn calibrate_one(
        &self,
        segments: &mut [Arc<Segment>],
        i: usize,
        left_slope: f64,
    ) -> SplineResult<()> {
        let plan = &self.plans[i];
        let constraints = self.controls[i].ck + 1;
        let basis = segments[i].num_basis();
        if plan.own.is_empty() {
            let err = SplineError::calibration_failed(
                i,
                constraints,
                basis,
                format!(
                    "instrument '{}' has no predictor inside ({}, {}]",
                    self.instruments[i].id(),
                    segments[i].left(),
                    segments[i].right()
                ),
            );
            warn!(stretch = %self.name, segment = i, error = %err, "calibration failed");
            return Err(err);
        }

        let mut target = plan.target.value;
        for pair in &plan.netted {
            target -= pair.weight * self.netted_response(segments, pair, i, constraints, basis)?;
        }
        let trailing = [ResponseConstraint::from_pairs(&plan.own, target)?];
        let best_fit = self
            .best_fit
            .as_ref()
            .and_then(|fit| fit.slice(segments[i].left(), segments[i].right(), i == 0));

        let calibrated = if i == 0 {
            segments[0].calibrate_leading(self.leading_value, left_slope, &trailing, best_fit.as_ref())
        } else {
            segments[i].calibrate_from(&segments[i - 1], &trailing, best_fit.as_ref())
        };

        match calibrated {
            Ok(segment) => {
                segments[i] = Arc::new(segment);
                Ok(())
            }
            Err(err) => {
                warn!(stretch = %self.name, segment = i, error = %err, "calibration failed");
                Err(err)
            }
        }
    }

    fn netted_response(
        &self,
        segments: &[Arc<Segment>],
        pair: &NettedPair,
        i: usize,
        constraints: usize,
        basis: usize,
    ) -> SplineResult<f64> {
        match pair.source {
            PairSource::Leading => Ok(self.leading_value),
            PairSource::Segment(k) => segments[k].response_value(pair.ordinate),
            PairSource::Lookahead => {
                let uncovered = || {
                    SplineError::calibration_failed(
                        i,
                        constraints,
                        basis,
                        format!("no lookahead covers ordinate {}", pair.ordinate),
                    )
                };
                let surface = self.lookahead.as_ref().ok_or_else(uncovered)?;
                if !surface.contains(pair.ordinate) {
                    return Err(uncovered());
                }
                surface.response_value(pair.ordinate)
            }
        }
    }

    fn record_merge_state(&mut self, i: usize) {
        let label = self.instruments[i].latent_state().to_string();
        let (left, right) = (self.predictors[i], self.predictors[i + 1]);
        self.merge_state.record(&label, left, right);
        debug!(stretch = %self.name, segment = i, latent_state = %label, "merge state recorded");
    }

    fn require_calibrated(&self) -> SplineResult<()> {
        match self.segments.iter().find(|s| !s.is_calibrated()) {
            Some(segment) => Err(SplineError::invalid_argument(format!(
                "segment {} is not calibrated",
                segment.index()
            ))),
            None if self.segments.is_empty() => {
                Err(SplineError::invalid_argument("stretch has not been calibrated"))
            }
            None => Ok(()),
        }
    }

    fn placeholder_sensitivities(&self, parameters: usize) -> Vec<DMatrix<f64>> {
        self.segments
            .iter()
            .map(|s| DMatrix::zeros(s.num_basis(), parameters))
            .collect()
    }

    /// Chains coefficient sensitivities `Dᵢ = Eᵢ · ∂bᵢ/∂θ` from `start` onwards.
    ///
    /// Entries of `sensitivities` before `start` must already be valid.
    /// `slope_seed` is `∂(leading slope)/∂θ`; with `quote_columns`, column `i`
    /// is the quote of instrument `i`.
    fn propagate(
        &self,
        segments: &[Arc<Segment>],
        start: usize,
        mut sensitivities: Vec<DMatrix<f64>>,
        slope_seed: &[f64],
        quote_columns: bool,
    ) -> SplineResult<Vec<DMatrix<f64>>> {
        let m = slope_seed.len();
        for i in start..segments.len() {
            let segment = &segments[i];
            let ck = segment.ck();
            let plan = &self.plans[i];
            let mut d_targets = DMatrix::zeros(ck + 1, m);

            if i == 0 {
                if ck > 1 {
                    d_targets.set_row(1, &RowDVector::from_row_slice(slope_seed));
                }
            } else {
                let preceding = &segments[i - 1];
                for order in 0..ck {
                    let row = preceding.basis_row(segment.left(), order)?.transpose()
                        * &sensitivities[i - 1];
                    d_targets.set_row(order, &row);
                }
            }

            let mut trailing = RowDVector::zeros(m);
            if quote_columns {
                trailing[i] = plan.target.d_value_d_quote;
            }
            for pair in &plan.netted {
                if let PairSource::Segment(k) = pair.source {
                    let row =
                        segments[k].basis_row(pair.ordinate, 0)?.transpose() * &sensitivities[k];
                    trailing -= pair.weight * row;
                }
            }
            d_targets.set_row(ck, &trailing);

            let edge_jacobian = segment.jack_d_coeff_d_edge_params().ok_or_else(|| {
                SplineError::invalid_argument(format!("segment {i} is not calibrated"))
            })?;
            sensitivities[i] = edge_jacobian * d_targets;
        }
        Ok(sensitivities)
    }

    /// Calibrates a throwaway copy of every segment with the given leading slope.
    fn trial(&self, left_slope: f64) -> SplineResult<Vec<Arc<Segment>>> {
        let mut segments = self.segments.clone();
        for i in 0..segments.len() {
            self.calibrate_one(&mut segments, i, left_slope)?;
        }
        Ok(segments)
    }

    fn trailing_row(&self, segments: &[Arc<Segment>], order: usize) -> SplineResult<RowDVector<f64>> {
        let last = segments
            .last()
            .ok_or_else(|| SplineError::invalid_argument("stretch has no segments"))?;
        Ok(last.basis_row(last.right(), order)?.transpose())
    }

    fn trailing_residual(&self, left_slope: f64, order: usize, target: f64) -> SplineResult<f64> {
        let segments = self.trial(left_slope)?;
        let last = segments.len() - 1;
        Ok(segments[last].response_value_derivative(segments[last].right(), order)? - target)
    }

    fn trailing_slope_derivative(&self, left_slope: f64, order: usize) -> SplineResult<f64> {
        let segments = self.trial(left_slope)?;
        let slope = self.propagate(&segments, 0, self.placeholder_sensitivities(1), &[1.0], false)?;
        let last = segments.len() - 1;
        Ok((self.trailing_row(&segments, order)? * &slope[last])[0])
    }

    /// Solves the leading slope so the trailing edge meets the boundary condition.
    ///
    /// The trailing residual is affine in the leading slope, so a single step
    /// with the analytic slope derivative lands on the root. Further steps only
    /// polish round-off and are kept while they shrink the residual.
    fn solve_left_slope(&self, order: usize, target: f64) -> SplineResult<f64> {
        let solver = self.config.slope_solver();
        let start = self.left_slope;
        let derivative = self.trailing_slope_derivative(start, order)?;
        if !derivative.is_finite() || derivative.abs() < f64::EPSILON {
            return Err(self.slope_failure(&format!("trailing slope derivative is {derivative}")));
        }

        let mut slope = start - self.trailing_residual(start, order, target)? / derivative;
        let mut residual = self.trailing_residual(slope, order, target)?;
        let mut iterations = 1;
        while iterations < solver.max_iterations {
            let step = residual / derivative;
            if !step.is_finite() || step.abs() <= solver.tolerance * slope.abs().max(1.0) {
                break;
            }
            let candidate = slope - step;
            let candidate_residual = self.trailing_residual(candidate, order, target)?;
            if candidate_residual.abs() >= residual.abs() {
                break;
            }
            slope = candidate;
            residual = candidate_residual;
            iterations += 1;
        }

        if !slope.is_finite() {
            return Err(self.slope_failure(&format!("slope is {slope}")));
        }
        debug!(
            stretch = %self.name,
            slope,
            residual,
            iterations,
            "leading slope solved"
        );
        Ok(slope)
    }

    fn slope_failure(&self, reason: &str) -> SplineError {
        let last = self.num_segments() - 1;
        let err = SplineError::calibration_failed(
            last,
            self.controls[last].ck + 1,
            self.segments[last].num_basis(),
            format!("leading slope solve failed: {reason}"),
        );
        warn!(stretch = %self.name, error = %err, "boundary solve failed");
        err
    }

    /// `∂(leading slope)/∂(quotes)` implied by the boundary policy.
    ///
    /// For a solved slope the trailing condition `R(s, θ) = 0` gives
    /// `ds/dθ = -(∂R/∂θ) / (∂R/∂s)`.
    fn boundary_slope_sensitivity(&self) -> SplineResult<Vec<f64>> {
        let m = self.instruments.len();
        let Some((order, _)) = self.boundary.trailing_condition() else {
            return Ok(vec![0.0; m]);
        };

        let last = self.num_segments() - 1;
        let row = self.trailing_row(&self.segments, order)?;
        let fixed = self.propagate(
            &self.segments,
            0,
            self.placeholder_sensitivities(m),
            &vec![0.0; m],
            true,
        )?;
        let slope = self.propagate(&self.segments, 0, self.placeholder_sensitivities(1), &[1.0], false)?;
        let d_r_d_theta = &row * &fixed[last];
        let d_r_d_s = (&row * &slope[last])[0];
        if d_r_d_s.abs() < f64::EPSILON {
            return Ok(vec![0.0; m]);
        }
        Ok(d_r_d_theta.iter().map(|v| -v / d_r_d_s).collect())
    }
}
