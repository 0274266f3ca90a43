//! neurocube-sat: solver layer for the neurocube actor fleet
//!
//! This crate provides what the actors need from a SAT solver:
//! - [`ProblemInstance`]: immutable DIMACS CNF instances
//! - [`Var`] / [`Lit`]: variables and signed literals
//! - [`Solver`]: incremental CDCL with assumptions, conflict budgets and
//!   failed-assumption cores
//! - [`Query`]: the residual formula under a set of assumptions, in the
//!   sparse literal/clause form consumed by the inference layer
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use neurocube_sat::{Lit, ProblemInstance, SolveResult, Solver, SolverOptions};
//!
//! let instance = ProblemInstance::from_dimacs_clauses(2, &[vec![1, 2], vec![-1, 2]]).unwrap();
//! let mut solver = Solver::new(Arc::new(instance), SolverOptions::default());
//!
//! let result = solver.solve_limited(&[Lit::from_dimacs(-2)]);
//! assert!(matches!(result, SolveResult::Unsat { .. }));
//!
//! let query = solver.to_query(&[Lit::from_dimacs(1)]);
//! assert!(query.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dimacs;
pub mod error;
pub mod literal;
pub mod query;
pub mod solver;

pub use dimacs::{Clause, ProblemInstance};
pub use error::ParseError;
pub use literal::{LBool, Lit, Var};
pub use query::Query;
pub use solver::{SolveResult, Solver, SolverOptions, SolverStats};
