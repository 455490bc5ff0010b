//! Error types for spline calibration and lookup.

use strand_math::MathError;
use thiserror::Error;

/// A specialized Result type for spline operations.
pub type SplineResult<T> = Result<T, SplineError>;

/// Error types for spline operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    /// Malformed input detected before any computation.
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of what's wrong with the input.
        reason: String,
    },

    /// Ordinate outside the range covered by the response surface.
    #[error("Ordinate {ordinate:.6} out of range [{min:.6}, {max:.6}]")]
    OutOfDomain {
        /// The requested ordinate.
        ordinate: f64,
        /// Left edge of the covered range.
        min: f64,
        /// Right edge of the covered range.
        max: f64,
    },

    /// A segment could not be calibrated against its constraints.
    #[error(
        "Calibration failed for segment {segment} ({constraints} constraints, {basis} basis functions): {reason}"
    )]
    CalibrationFailure {
        /// Index of the failing segment.
        segment: usize,
        /// Number of equality constraints.
        constraints: usize,
        /// Number of basis functions.
        basis: usize,
        /// Description of the failure.
        reason: String,
    },

    /// Numerical failure that is not a calibration failure.
    #[error("Math error: {reason}")]
    MathError {
        /// Description of the mathematical error.
        reason: String,
    },
}

impl SplineError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an out of domain error.
    #[must_use]
    pub fn out_of_domain(ordinate: f64, min: f64, max: f64) -> Self {
        Self::OutOfDomain { ordinate, min, max }
    }

    /// Creates a calibration failure error.
    #[must_use]
    pub fn calibration_failed(
        segment: usize,
        constraints: usize,
        basis: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::CalibrationFailure {
            segment,
            constraints,
            basis,
            reason: reason.into(),
        }
    }

    /// Creates a math error.
    #[must_use]
    pub fn math_error(reason: impl Into<String>) -> Self {
        Self::MathError {
            reason: reason.into(),
        }
    }
}

impl From<MathError> for SplineError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InvalidInput { reason } => Self::InvalidArgument { reason },
            MathError::OutOfDomain { x, min, max } => Self::OutOfDomain {
                ordinate: x,
                min,
                max,
            },
            other => Self::MathError {
                reason: other.to_string(),
            },
        }
    }
}
