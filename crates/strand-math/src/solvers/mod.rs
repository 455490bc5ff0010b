//! Root-finding algorithms.
//!
//! [`brent`] refines bracketed stationary points of a fitted segment.
//!
//! # Example
//!
//! ```rust
//! use strand_math::solvers::{brent, SolverConfig};
//!
//! // r'(u) = 3u^2 - 3u vanishes at u = 1 inside (0.5, 1.5).
//! let slope = |u: f64| 3.0 * u * u - 3.0 * u;
//!
//! let result = brent(slope, 0.5, 1.5, &SolverConfig::default()).unwrap();
//! assert!((result.root - 1.0).abs() < 1e-10);
//! ```

mod brent;

pub use brent::brent;

/// Default tolerance for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Final residual (function value at root).
    pub residual: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solver_config() {
        let config = SolverConfig::default()
            .with_tolerance(1e-8)
            .with_max_iterations(50);

        assert!((config.tolerance - 1e-8).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 50);
    }

    #[test]
    fn test_stationary_point_of_cubic_derivative() {
        let slope = |u: f64| 3.0 * u * u - 3.0 * u;

        let bracketed = brent(slope, 0.5, 1.5, &SolverConfig::default()).unwrap();

        assert_relative_eq!(bracketed.root, 1.0, epsilon = 1e-10);
        assert!(bracketed.residual.abs() < 1e-10);
    }
}
