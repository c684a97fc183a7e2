#![forbid(unsafe_code)]

//! The SMT layer of the assertion checker: sorts and terms, lowering from
//! semantic types, SSA symbolic variables, and the solver portfolio.

pub mod expr;
pub mod smtlib2;
pub mod solver;
pub mod symbolic;
pub mod types;
#[cfg(feature = "z3")]
pub mod z3_solver;

pub use expr::{SmtExpr, SmtOp, SmtSort};
pub use smtlib2::Smtlib2Solver;
pub use solver::{CheckResult, Portfolio, SmtSolver, SolverConfig};
pub use symbolic::SymbolicVar;
pub use types::{range_constraints, smt_sort_of, zero_value};
#[cfg(feature = "z3")]
pub use z3_solver::Z3Solver;
