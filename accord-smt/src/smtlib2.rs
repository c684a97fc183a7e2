//! SMT-LIB2 replay backend.
//!
//! Serializes the current assertion stack to an SMT-LIB2 script, hashes it,
//! and looks the digest up in a map of pre-supplied responses. This gives
//! fully deterministic checker runs with no solver installed: the response
//! map is produced offline by running the dumped scripts through any
//! SMT-LIB2 solver.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::expr::{quoted_symbol, SmtExpr, SmtSort};
use crate::solver::{normalize_model_value, CheckResult, SmtSolver};

pub struct Smtlib2Solver {
    responses: BTreeMap<String, String>,
    // Declarations are kept global rather than scoped: terms introduced
    // inside a popped scope may still be referenced by later merges, which
    // is how live backends behave as well.
    declarations: Vec<(String, SmtSort)>,
    declared: BTreeSet<String>,
    frames: Vec<Vec<SmtExpr>>,
    queries: Vec<String>,
}

impl Smtlib2Solver {
    pub fn new(responses: BTreeMap<String, String>) -> Self {
        Self {
            responses,
            declarations: Vec::new(),
            declared: BTreeSet::new(),
            frames: vec![Vec::new()],
            queries: Vec::new(),
        }
    }

    /// Every query rendered so far, in order.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn digest(script: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(script.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn render_query(&self, eval: &[SmtExpr]) -> String {
        let mut out = String::new();
        out.push_str("(set-option :produce-models true)\n");
        out.push_str("(set-logic QF_UFLIA)\n");
        for (name, sort) in &self.declarations {
            let symbol = quoted_symbol(name);
            match sort {
                SmtSort::Function { domain, codomain } => {
                    out.push_str(&format!("(declare-fun {symbol} ("));
                    for (i, d) in domain.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        out.push_str(&d.to_string());
                    }
                    out.push_str(&format!(") {codomain})\n"));
                }
                other => {
                    out.push_str(&format!("(declare-fun {symbol} () {other})\n"));
                }
            }
        }
        for frame in &self.frames {
            for assertion in frame {
                out.push_str(&format!("(assert {assertion})\n"));
            }
        }
        out.push_str("(check-sat)\n");
        if !eval.is_empty() {
            out.push_str("(get-value (");
            for (i, term) in eval.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&term.to_string());
            }
            out.push_str("))\n");
        }
        out
    }
}

impl SmtSolver for Smtlib2Solver {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the base assertion scope");
        self.frames.pop();
    }

    fn declare_var(&mut self, name: &str, sort: &SmtSort) {
        if self.declared.insert(name.to_string()) {
            self.declarations.push((name.to_string(), sort.clone()));
        }
    }

    fn add(&mut self, assertion: &SmtExpr) {
        self.frames
            .last_mut()
            .expect("assertion stack has a base scope")
            .push(assertion.clone());
    }

    fn check(&mut self, eval: &[SmtExpr]) -> (CheckResult, Vec<String>) {
        let script = self.render_query(eval);
        let digest = Self::digest(&script);
        trace!(%digest, "smtlib2 query");
        self.queries.push(script);
        match self.responses.get(&digest) {
            Some(response) => parse_response(response),
            // No pre-supplied answer: behave like a solver timeout.
            None => (CheckResult::Unknown, Vec::new()),
        }
    }

    fn reset(&mut self) {
        self.declarations.clear();
        self.declared.clear();
        self.frames = vec![Vec::new()];
    }
}

fn parse_response(response: &str) -> (CheckResult, Vec<String>) {
    let trimmed = response.trim();
    let first = trimmed.lines().next().unwrap_or("").trim();
    match first {
        "sat" => {
            let rest = trimmed.splitn(2, '\n').nth(1).unwrap_or("");
            (CheckResult::Satisfiable, parse_values(rest))
        }
        "unsat" => (CheckResult::Unsatisfiable, Vec::new()),
        "unknown" | "timeout" => (CheckResult::Unknown, Vec::new()),
        _ => (CheckResult::Error, Vec::new()),
    }
}

/// Parse a `get-value` answer: `((term value) (term value) ...)`.
fn parse_values(rest: &str) -> Vec<String> {
    let rest = rest.trim().replace('\n', " ");
    let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) else {
        return Vec::new();
    };
    top_level_tokens(inner)
        .iter()
        .filter_map(|pair| {
            let inner = pair.strip_prefix('(')?.strip_suffix(')')?;
            let tokens = top_level_tokens(inner);
            tokens.last().map(|v| normalize_model_value(v))
        })
        .collect()
}

/// Split an s-expression body into its top-level tokens, keeping nested
/// groups intact.
fn top_level_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;
    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
                if depth == 0 {
                    tokens.push(current.trim().to_string());
                    current.clear();
                }
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.trim().is_empty() {
                    tokens.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    tokens
}
