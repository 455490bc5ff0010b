//! Bernstein polynomial basis `B_{i,n}(u) = C(n,i) u^i (1-u)^(n-i)`.

use super::{binomial, falling_factorial};

/// `B_{i,n}(u)`, zero for indices outside `0..=n`.
fn bernstein(i: isize, n: usize, u: f64) -> f64 {
    if i < 0 || i as usize > n {
        return 0.0;
    }
    let i = i as usize;
    binomial(n, i) * u.powi(i as i32) * (1.0 - u).powi((n - i) as i32)
}

/// `D^k B_{i,n} = n!/(n-k)! Σ_j (-1)^j C(k,j) B_{i-k+j, n-k}`.
pub(super) fn derivative(index: usize, degree: usize, u: f64, order: usize) -> f64 {
    if order > degree {
        return 0.0;
    }
    let lower = degree - order;
    let sum: f64 = (0..=order)
        .map(|j| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            let shifted = index as isize - order as isize + j as isize;
            sign * binomial(order, j) * bernstein(shifted, lower, u)
        })
        .sum();
    falling_factorial(degree, order) * sum
}

/// Uses `∫₀^u B_{i,n} = (1/(n+1)) Σ_{j=i+1}^{n+1} B_{j,n+1}(u)`.
pub(super) fn integrate(index: usize, degree: usize, begin: f64, end: f64) -> f64 {
    let antiderivative = |u: f64| {
        ((index + 1)..=(degree + 1))
            .map(|j| bernstein(j as isize, degree + 1, u))
            .sum::<f64>()
            / (degree + 1) as f64
    };
    antiderivative(end) - antiderivative(begin)
}
