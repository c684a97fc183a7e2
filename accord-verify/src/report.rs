//! Warnings, the collecting reporter sink, and the JSON check report.

use std::path::Path;

use accord_ast::Span;
use miette::{Diagnostic, IntoDiagnostic};
use serde::Serialize;
use thiserror::Error;

/// A secondary note attached to a warning: a model dump, a havoc
/// explanation, or a pointer to a related source location.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub span: Option<Span>,
    pub message: String,
}

impl Note {
    pub fn new(message: impl Into<String>) -> Self {
        Self { span: None, message: message.into() }
    }

    pub fn at(span: Span, message: impl Into<String>) -> Self {
        Self { span: Some(span), message: message.into() }
    }
}

/// One checker finding. Everything the checker has to say is a warning:
/// findings, unsupported constructs, and solver failures alike.
#[derive(Clone, Debug, PartialEq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(accord::verify), severity(Warning))]
pub struct Warning {
    pub message: String,
    #[label]
    pub span: Span,
    pub secondary: Vec<Note>,
}

/// Collecting sink for warnings. Emission order follows AST traversal
/// order, so diagnostics are reproducible for a fixed input and solver.
#[derive(Default)]
pub struct Reporter {
    warnings: Vec<Warning>,
}

impl Reporter {
    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.warning_with(span, message, Vec::new());
    }

    pub fn warning_with(
        &mut self,
        span: Span,
        message: impl Into<String>,
        secondary: Vec<Note>,
    ) {
        self.warnings.push(Warning {
            message: message.into(),
            span,
            secondary,
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanRange {
    pub offset: usize,
    pub len: usize,
}

impl From<Span> for SpanRange {
    fn from(s: Span) -> Self {
        Self { offset: s.offset(), len: s.len() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportedNote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanRange>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportedWarning {
    pub span: SpanRange,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<ReportedNote>,
}

/// Machine-readable summary of one checker run, for CI artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub schema: &'static str,
    pub warnings: Vec<ReportedWarning>,
}

impl CheckReport {
    pub fn new(warnings: &[Warning]) -> Self {
        Self {
            schema: "accord.check.v1",
            warnings: warnings
                .iter()
                .map(|w| ReportedWarning {
                    span: w.span.into(),
                    message: w.message.clone(),
                    secondary: w
                        .secondary
                        .iter()
                        .map(|n| ReportedNote {
                            span: n.span.map(Into::into),
                            message: n.message.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

pub fn write_check_report(out_path: &Path, warnings: &[Warning]) -> miette::Result<()> {
    let report = CheckReport::new(warnings);
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).into_diagnostic()?;
    }
    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
    std::fs::write(out_path, json).into_diagnostic()?;
    Ok(())
}
