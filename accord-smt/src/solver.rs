//! The solver abstraction and the portfolio combining several backends.

use std::collections::BTreeMap;

use tracing::debug;

use crate::expr::{SmtExpr, SmtSort};

/// Outcome of a satisfiability query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckResult {
    Satisfiable,
    Unsatisfiable,
    Unknown,
    /// Two backends gave contradicting definitive answers.
    Conflicting,
    Error,
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckResult::Satisfiable => write!(f, "sat"),
            CheckResult::Unsatisfiable => write!(f, "unsat"),
            CheckResult::Unknown => write!(f, "unknown"),
            CheckResult::Conflicting => write!(f, "conflicting"),
            CheckResult::Error => write!(f, "error"),
        }
    }
}

impl CheckResult {
    fn is_definitive(&self) -> bool {
        matches!(self, CheckResult::Satisfiable | CheckResult::Unsatisfiable)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Per-query timeout handed to live backends, in milliseconds.
    pub timeout_ms: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// One assertion-stack backend. Assertions added between `push` and the
/// matching `pop` are discarded by the `pop`; declarations persist until
/// `reset`.
pub trait SmtSolver {
    fn push(&mut self);
    fn pop(&mut self);
    fn declare_var(&mut self, name: &str, sort: &SmtSort);
    fn add(&mut self, assertion: &SmtExpr);
    /// Decide satisfiability of the current stack. On sat, returns one model
    /// value string per evaluation term.
    fn check(&mut self, eval: &[SmtExpr]) -> (CheckResult, Vec<String>);
    fn reset(&mut self);
}

/// Normalize a solver value string to the checker's integer syntax:
/// `(- 5)` becomes `-5`, other strings pass through.
pub fn normalize_model_value(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed.strip_prefix("(-").and_then(|s| s.strip_suffix(')')) {
        return format!("-{}", inner.trim());
    }
    trimmed.to_string()
}

/// A collection of backends driven in lockstep. Answers are combined: the
/// first definitive answer wins, disagreement is reported as conflicting,
/// and a portfolio with no definitive answer is unknown unless every backend
/// failed outright.
pub struct Portfolio {
    backends: Vec<Box<dyn SmtSolver>>,
}

impl Portfolio {
    pub fn with_backends(backends: Vec<Box<dyn SmtSolver>>) -> Self {
        Self { backends }
    }

    /// The backends a default build talks to: the SMT-LIB2 replay backend,
    /// or the live solver when one is compiled in (replay responses are then
    /// ignored).
    pub fn default_backends(
        smtlib2_responses: BTreeMap<String, String>,
        config: &SolverConfig,
    ) -> Self {
        #[cfg(feature = "z3")]
        {
            let _ = smtlib2_responses;
            Self::with_backends(vec![Box::new(crate::z3_solver::Z3Solver::new(config))])
        }
        #[cfg(not(feature = "z3"))]
        {
            let _ = config;
            Self::with_backends(vec![Box::new(crate::smtlib2::Smtlib2Solver::new(
                smtlib2_responses,
            ))])
        }
    }

    /// Whether this build links a live solver.
    pub fn has_live_solver() -> bool {
        cfg!(feature = "z3")
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl SmtSolver for Portfolio {
    fn push(&mut self) {
        for b in &mut self.backends {
            b.push();
        }
    }

    fn pop(&mut self) {
        for b in &mut self.backends {
            b.pop();
        }
    }

    fn declare_var(&mut self, name: &str, sort: &SmtSort) {
        for b in &mut self.backends {
            b.declare_var(name, sort);
        }
    }

    fn add(&mut self, assertion: &SmtExpr) {
        for b in &mut self.backends {
            b.add(assertion);
        }
    }

    fn check(&mut self, eval: &[SmtExpr]) -> (CheckResult, Vec<String>) {
        let mut combined = CheckResult::Error;
        let mut values = Vec::new();
        let mut answered = false;
        for b in &mut self.backends {
            let (result, model) = b.check(eval);
            if result.is_definitive() {
                if !answered {
                    combined = result;
                    values = model;
                    answered = true;
                } else if result != combined {
                    combined = CheckResult::Conflicting;
                    values.clear();
                }
            } else if !answered && result == CheckResult::Unknown {
                combined = CheckResult::Unknown;
            }
        }
        if self.backends.is_empty() {
            combined = CheckResult::Unknown;
        }
        debug!(result = %combined, "portfolio check");
        (combined, values)
    }

    fn reset(&mut self) {
        for b in &mut self.backends {
            b.reset();
        }
    }
}
