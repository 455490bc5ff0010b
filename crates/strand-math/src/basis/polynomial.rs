//! Monomial basis `u^i`.

use super::falling_factorial;

pub(super) fn derivative(index: usize, u: f64, order: usize) -> f64 {
    if order > index {
        return 0.0;
    }
    falling_factorial(index, order) * u.powi((index - order) as i32)
}

pub(super) fn integrate(index: usize, begin: f64, end: f64) -> f64 {
    let p = (index + 1) as i32;
    (end.powi(p) - begin.powi(p)) / f64::from(p)
}
