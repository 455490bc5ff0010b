//! Tension families: the linear pair `{1, u}` plus two transcendental functions.

/// Derivatives shared by every tension family for the linear pair.
fn linear(index: usize, u: f64, order: usize) -> f64 {
    match (index, order) {
        (0, 0) => 1.0,
        (1, 0) => u,
        (1, 1) => 1.0,
        _ => 0.0,
    }
}

fn linear_integral(index: usize, begin: f64, end: f64) -> f64 {
    if index == 0 {
        end - begin
    } else {
        0.5 * (end * end - begin * begin)
    }
}

fn signed_power(tension: f64, order: usize, negate: bool) -> f64 {
    let t = if negate { -tension } else { tension };
    t.powi(order as i32)
}

pub(super) fn exponential_derivative(index: usize, tension: f64, u: f64, order: usize) -> f64 {
    match index {
        2 => signed_power(tension, order, false) * (tension * u).exp(),
        3 => signed_power(tension, order, true) * (-tension * u).exp(),
        _ => linear(index, u, order),
    }
}

pub(super) fn exponential_integrate(index: usize, tension: f64, begin: f64, end: f64) -> f64 {
    match index {
        2 => ((tension * end).exp() - (tension * begin).exp()) / tension,
        3 => ((-tension * begin).exp() - (-tension * end).exp()) / tension,
        _ => linear_integral(index, begin, end),
    }
}

pub(super) fn hyperbolic_derivative(index: usize, tension: f64, u: f64, order: usize) -> f64 {
    let scale = tension.powi(order as i32);
    let even = order % 2 == 0;
    let x = tension * u;
    match index {
        2 => scale * if even { x.cosh() } else { x.sinh() },
        3 => scale * if even { x.sinh() } else { x.cosh() },
        _ => linear(index, u, order),
    }
}

pub(super) fn hyperbolic_integrate(index: usize, tension: f64, begin: f64, end: f64) -> f64 {
    match index {
        2 => ((tension * end).sinh() - (tension * begin).sinh()) / tension,
        3 => ((tension * end).cosh() - (tension * begin).cosh()) / tension,
        _ => linear_integral(index, begin, end),
    }
}

/// Left hat `sinh(τ(1-u))/sinh τ` and right hat `sinh(τu)/sinh τ`.
pub(super) fn hat_derivative(index: usize, tension: f64, u: f64, order: usize) -> f64 {
    let norm = tension.sinh();
    let even = order % 2 == 0;
    match index {
        2 => {
            let x = tension * (1.0 - u);
            signed_power(tension, order, true) * if even { x.sinh() } else { x.cosh() } / norm
        }
        3 => {
            let x = tension * u;
            tension.powi(order as i32) * if even { x.sinh() } else { x.cosh() } / norm
        }
        _ => linear(index, u, order),
    }
}

pub(super) fn hat_integrate(index: usize, tension: f64, begin: f64, end: f64) -> f64 {
    let norm = tension * tension.sinh();
    match index {
        2 => ((tension * (1.0 - begin)).cosh() - (tension * (1.0 - end)).cosh()) / norm,
        3 => ((tension * end).cosh() - (tension * begin).cosh()) / norm,
        _ => linear_integral(index, begin, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_pair_second_derivative() {
        let tau = 1.3;
        for u in [0.0, 0.4, 1.0] {
            assert_relative_eq!(
                exponential_derivative(2, tau, u, 2),
                tau * tau * exponential_derivative(2, tau, u, 0),
                epsilon = 1e-12
            );
            assert_relative_eq!(
                exponential_derivative(3, tau, u, 1),
                -tau * exponential_derivative(3, tau, u, 0),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_hyperbolic_cycle() {
        let tau = 0.8;
        let u = 0.6;
        assert_relative_eq!(
            hyperbolic_derivative(2, tau, u, 1),
            tau * (tau * u).sinh(),
            epsilon = 1e-14
        );
        assert_relative_eq!(
            hyperbolic_derivative(3, tau, u, 3),
            tau.powi(3) * (tau * u).cosh(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_hats_sum_against_symmetry() {
        // L(u) = R(1 - u)
        let tau = 2.0;
        for u in [0.1, 0.35, 0.8] {
            assert_relative_eq!(
                hat_derivative(2, tau, u, 0),
                hat_derivative(3, tau, 1.0 - u, 0),
                epsilon = 1e-14
            );
        }
        assert_relative_eq!(
            hat_integrate(2, tau, 0.0, 1.0),
            hat_integrate(3, tau, 0.0, 1.0),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_linear_pair_vanishes_above_first_order() {
        assert_relative_eq!(hat_derivative(0, 1.0, 0.3, 1), 0.0);
        assert_relative_eq!(hat_derivative(1, 1.0, 0.3, 2), 0.0);
        assert_relative_eq!(exponential_integrate(1, 1.0, 0.0, 1.0), 0.5);
    }
}
