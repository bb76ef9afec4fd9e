//! Reference solver implementations.
//!
//! The estimation core only speaks the [`Solver`](crate::core::Solver)
//! contract; problem-specific solvers live with the caller. The 2D line
//! estimator here is the bundled reference implementation, used by the tests
//! and the example program and small enough to read as documentation of the
//! contract.

pub mod line;

pub use line::{Line, LineEstimator};
