//! # Strand Spline
//!
//! Multi-segment spline calibration with analytic sensitivity propagation.
//!
//! This crate provides:
//!
//! - **Segments**: basis-function pieces calibrated against edge conditions,
//!   best-fit points and roughness penalties
//! - **Builder**: segment-by-segment calibration of a stretch from one
//!   instrument per segment, with natural and financial boundary policies
//! - **Stretch**: contiguous calibrated segments with lookup, integration,
//!   monotonicity checks and single-node recalibration
//! - **Span**: several stretches (optionally weighted) behind one response surface
//! - **Sensitivities**: exact Jacobians of the response with respect to the
//!   calibration quotes
//!
//! ## Quick Start
//!
//! ```rust
//! use strand_math::basis::BasisFunctionSet;
//! use strand_spline::prelude::*;
//!
//! let control = SegmentControl::new(BasisFunctionSet::polynomial(4).unwrap(), 3).unwrap();
//! let stretch = Stretch::from_nodes(
//!     "curve",
//!     vec![0.0, 1.0, 2.0, 5.0],
//!     &[0.01, 0.015, 0.02, 0.025],
//!     control,
//!     BoundarySettings::Natural,
//!     StretchConfig::default(),
//! )
//! .unwrap();
//!
//! let rate = stretch.response_value(3.0).unwrap();
//! let jacobian = stretch
//!     .jack_d_response_d_manifest_measure("Response", 3.0, 0)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(jacobian.parameters(), 3);
//! assert!(rate > 0.02 && rate < 0.025);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::many_single_char_names)]

pub mod builder;
pub mod constraint;
pub mod error;
pub mod instruments;
pub mod merge;
pub mod params;
pub mod segment;
pub mod span;
pub mod stretch;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::SegmentSequenceBuilder;
    pub use crate::constraint::{BestFitResponse, ResponseConstraint};
    pub use crate::error::{SplineError, SplineResult};
    pub use crate::instruments::{
        CalibrationInstrument, CalibrationTarget, NodeInstrument, QuoteMapping,
        WeightedSumInstrument,
    };
    pub use crate::merge::MergeState;
    pub use crate::params::{BoundarySettings, RoughnessPenalty, SegmentControl, StretchConfig};
    pub use crate::segment::{LeftEdge, Monotonicity, Segment};
    pub use crate::span::{AggregatedSpan, ResponseSurface, Span};
    pub use crate::stretch::{NodeReset, Stretch};
}

pub use builder::SegmentSequenceBuilder;
pub use error::{SplineError, SplineResult};
pub use span::{AggregatedSpan, ResponseSurface, Span};
pub use stretch::{NodeReset, Stretch};
