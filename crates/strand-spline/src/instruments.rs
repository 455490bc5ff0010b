//! Calibration instrument abstraction.
//!
//! The engine never prices anything. An instrument tells it two things:
//!
//! - the `(predictor ordinate, response weight)` pairs its calibration
//!   constraint touches, and
//! - the calibration target implied for a named manifest measure, together
//!   with the derivative of that target with respect to the quote.
//!
//! Two implementations ship with the crate: [`NodeInstrument`] pins the
//! response at a single ordinate, [`WeightedSumInstrument`] constrains an
//! arbitrary weighted sum (e.g. all cashflow dates of a swap).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::ResponseConstraint;
use crate::error::{SplineError, SplineResult};

/// Latent-state label used when an instrument does not name one.
pub const DEFAULT_LATENT_STATE: &str = "Response";

/// Manifest measure quoted by node instruments.
pub const RESPONSE_MEASURE: &str = "Response";

/// Target value implied by an instrument for one manifest measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTarget {
    /// Right-hand side of the constraint.
    pub value: f64,
    /// Derivative of the target with respect to the instrument's quote.
    pub d_value_d_quote: f64,
}

// ============================================================================
// CalibrationInstrument Trait
// ============================================================================

/// An instrument used to calibrate one segment of a stretch.
pub trait CalibrationInstrument: Send + Sync + fmt::Debug {
    /// Unique identifier; used as the Jacobian column label.
    fn id(&self) -> &str;

    /// Latent state this instrument's constraint calibrates.
    fn latent_state(&self) -> &str {
        DEFAULT_LATENT_STATE
    }

    /// The manifest measure the instrument is quoted in.
    fn manifest_measure(&self) -> &str;

    /// `(predictor ordinate, response weight)` pairs of the constraint.
    fn predictor_weights(&self) -> Vec<(f64, f64)>;

    /// Calibration target for a manifest measure, `None` if not supported.
    fn calibration_target(&self, measure: &str) -> Option<CalibrationTarget>;

    /// Largest predictor ordinate the constraint touches.
    fn maturity(&self) -> f64 {
        self.predictor_weights()
            .iter()
            .map(|(x, _)| *x)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Description for logs.
    fn description(&self) -> String {
        format!("{} [{}] @ {:.4}", self.id(), self.manifest_measure(), self.maturity())
    }
}

// ============================================================================
// Node Instrument
// ============================================================================

/// Pins the response at one ordinate: `r(x) = quote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstrument {
    id: String,
    ordinate: f64,
    quote: f64,
}

impl NodeInstrument {
    /// Creates a node instrument.
    pub fn new(id: impl Into<String>, ordinate: f64, quote: f64) -> SplineResult<Self> {
        if !ordinate.is_finite() || !quote.is_finite() {
            return Err(SplineError::invalid_argument(
                "node ordinate and quote must be finite",
            ));
        }
        Ok(Self {
            id: id.into(),
            ordinate,
            quote,
        })
    }

    /// The pinned ordinate.
    pub fn ordinate(&self) -> f64 {
        self.ordinate
    }

    /// The quoted response.
    pub fn quote(&self) -> f64 {
        self.quote
    }
}

impl CalibrationInstrument for NodeInstrument {
    fn id(&self) -> &str {
        &self.id
    }

    fn manifest_measure(&self) -> &str {
        RESPONSE_MEASURE
    }

    fn predictor_weights(&self) -> Vec<(f64, f64)> {
        vec![(self.ordinate, 1.0)]
    }

    fn calibration_target(&self, measure: &str) -> Option<CalibrationTarget> {
        (measure == RESPONSE_MEASURE).then_some(CalibrationTarget {
            value: self.quote,
            d_value_d_quote: 1.0,
        })
    }

    fn maturity(&self) -> f64 {
        self.ordinate
    }
}

// ============================================================================
// Weighted Sum Instrument
// ============================================================================

/// Affine map from a quote to a constraint target: `intercept + slope · quote`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteMapping {
    /// Constant part of the target.
    pub intercept: f64,
    /// Target per unit of quote.
    pub slope: f64,
}

impl QuoteMapping {
    /// Identity mapping.
    pub const IDENTITY: Self = Self {
        intercept: 0.0,
        slope: 1.0,
    };
}

/// Constrains `Σ weight · r(ordinate)` to an affine function of the quote.
///
/// Each supported manifest measure has its own [`QuoteMapping`]; the
/// instrument is calibrated against the one it is quoted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSumInstrument {
    id: String,
    latent_state: String,
    measure: String,
    quote: f64,
    pairs: Vec<(f64, f64)>,
    mappings: BTreeMap<String, QuoteMapping>,
}

impl WeightedSumInstrument {
    /// Creates an instrument quoted in `measure` with an identity mapping.
    pub fn new(
        id: impl Into<String>,
        measure: impl Into<String>,
        quote: f64,
        pairs: Vec<(f64, f64)>,
    ) -> SplineResult<Self> {
        if pairs.is_empty() {
            return Err(SplineError::invalid_argument(
                "weighted-sum instrument needs at least one pair",
            ));
        }
        if !quote.is_finite() || pairs.iter().any(|(x, w)| !x.is_finite() || !w.is_finite()) {
            return Err(SplineError::invalid_argument(
                "weighted-sum quote and pairs must be finite",
            ));
        }
        let measure = measure.into();
        let mut mappings = BTreeMap::new();
        mappings.insert(measure.clone(), QuoteMapping::IDENTITY);
        Ok(Self {
            id: id.into(),
            latent_state: DEFAULT_LATENT_STATE.to_string(),
            measure,
            quote,
            pairs,
            mappings,
        })
    }

    /// Wraps an explicit constraint; its target becomes the quote.
    pub fn from_constraint(
        id: impl Into<String>,
        measure: impl Into<String>,
        constraint: &ResponseConstraint,
    ) -> SplineResult<Self> {
        Self::new(id, measure, constraint.target(), constraint.pairs().collect())
    }

    /// Sets the latent-state label.
    #[must_use]
    pub fn with_latent_state(mut self, label: impl Into<String>) -> Self {
        self.latent_state = label.into();
        self
    }

    /// Sets (or adds) the quote mapping for a measure.
    #[must_use]
    pub fn with_mapping(mut self, measure: impl Into<String>, mapping: QuoteMapping) -> Self {
        self.mappings.insert(measure.into(), mapping);
        self
    }

    /// The quote.
    pub fn quote(&self) -> f64 {
        self.quote
    }
}

impl CalibrationInstrument for WeightedSumInstrument {
    fn id(&self) -> &str {
        &self.id
    }

    fn latent_state(&self) -> &str {
        &self.latent_state
    }

    fn manifest_measure(&self) -> &str {
        &self.measure
    }

    fn predictor_weights(&self) -> Vec<(f64, f64)> {
        self.pairs.clone()
    }

    fn calibration_target(&self, measure: &str) -> Option<CalibrationTarget> {
        self.mappings.get(measure).map(|m| CalibrationTarget {
            value: m.intercept + m.slope * self.quote,
            d_value_d_quote: m.slope,
        })
    }
}
