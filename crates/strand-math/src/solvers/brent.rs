//! Brent's root-finding algorithm.

use crate::error::{MathError, MathResult};
use crate::solvers::{SolverConfig, SolverResult};

/// Brent's root-finding algorithm.
///
/// Combines bisection with the secant method and inverse quadratic
/// interpolation. Requires `f(a) * f(b) <= 0`.
///
/// # Example
///
/// ```rust
/// use strand_math::solvers::{brent, SolverConfig};
///
/// let f = |x: f64| x * x * x - x - 2.0;
///
/// let result = brent(f, 1.0, 2.0, &SolverConfig::default()).unwrap();
/// assert!((f(result.root)).abs() < 1e-10);
/// ```
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa * fb > 0.0 {
        return Err(MathError::InvalidBracket { a, b, fa, fb });
    }

    // Keep |f(a)| >= |f(b)| so that b is the best estimate.
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for iteration in 0..config.max_iterations {
        if fb.abs() < config.tolerance || (b - a).abs() < config.tolerance {
            return Ok(SolverResult {
                root: b,
                iterations: iteration,
                residual: fb,
            });
        }

        let m = (a + b) / 2.0;

        let candidate = if (fa - fc).abs() > 1e-15 && (fb - fc).abs() > 1e-15 {
            // Inverse quadratic interpolation
            let r = fb / fc;
            let p_val = fa / fc;
            let q = fa / fb;

            Some(
                b - (q * (q - r) * (b - a) + (1.0 - r) * (b - c) * p_val)
                    / ((q - 1.0) * (r - 1.0) * (p_val - 1.0)),
            )
        } else if (fb - fa).abs() > 1e-15 {
            // Secant step
            Some(b - fb * (b - a) / (fb - fa))
        } else {
            None
        };

        let accepted = candidate
            .filter(|&s| s > m.min(b) && s < m.max(b) && (s - b).abs() < e.abs() / 2.0);

        let s = match accepted {
            Some(s) => {
                e = d;
                d = s - b;
                s
            }
            None => {
                e = b - a;
                d = e;
                m
            }
        };

        c = b;
        fc = fb;

        let fs = f(s);

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    log::trace!("brent exhausted {} iterations on [{a}, {b}]", config.max_iterations);
    Err(MathError::convergence_failed(
        config.max_iterations,
        fb.abs(),
    ))
}
