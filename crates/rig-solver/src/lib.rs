//! Component G: the recursive/redirect version solver.

mod solver;

pub use solver::{SolveResult, Solver};
