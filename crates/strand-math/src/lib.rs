//! # Strand Math
//!
//! Numerical kernel for the Strand spline calibration engine.
//!
//! This crate provides:
//!
//! - **Basis functions**: polynomial, Bernstein and tension families with
//!   closed-form values, derivatives and integrals
//! - **Shape controls**: rational multipliers applied on top of a basis
//! - **Linear Algebra**: pivoted LU decomposition for segment-local systems
//! - **Solvers**: Brent root finding for bracketed stationary points
//! - **Quadrature**: Gauss-Legendre rules
//! - **Jacobians**: labelled sensitivity matrices with merge support
//!
//! ## Design Philosophy
//!
//! - **Exactness**: every derivative and integral is the exact counterpart of
//!   the evaluated function
//! - **Numerical Stability**: careful handling of degenerate tensions
//! - **Typed failures**: every fallible operation returns [`MathResult`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::float_cmp)]
#![allow(clippy::uninlined_format_args)]

pub mod basis;
pub mod error;
pub mod jacobian;
pub mod linear_algebra;
pub mod quadrature;
pub mod shape;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::basis::{BasisFamily, BasisFunctionSet};
    pub use crate::error::{MathError, MathResult};
    pub use crate::jacobian::Jacobian;
    pub use crate::linear_algebra::{solve_linear_system, LuDecomposition};
    pub use crate::quadrature::GaussLegendre;
    pub use crate::shape::{ShapeControl, ShapeControlKind};
    pub use crate::solvers::{brent, SolverConfig, SolverResult};
}

pub use error::{MathError, MathResult};
