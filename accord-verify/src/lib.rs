#![forbid(unsafe_code)]

//! Symbolic assertion checker for the Accord language.
//!
//! Consumes a type-checked, name-resolved AST ([`accord_ast`]) and reports
//! reachable assertion violations, arithmetic overflow and underflow,
//! division by zero, and trivially constant conditions, each with a
//! counterexample model when the solver provides one.

pub mod engine;
pub mod format;
pub mod report;
pub mod usage;

pub use engine::{analyze, analyze_with_portfolio, CheckerConfig, SmtChecker};
pub use format::format_number_readable;
pub use report::{write_check_report, CheckReport, Note, Reporter, Warning};
pub use usage::VariableUsage;
