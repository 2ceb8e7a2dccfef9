//! Syntax validation for generated JavaScript test files.
//!
//! [`validate`] is total: a clean parse, a parse with recoverable errors and a
//! parse the parser had to abandon all come back as a [`ValidationReport`].

pub mod lexer;
pub mod parser;
pub mod report;

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

use lexer::LineIndex;
pub use parser::SyntaxFault;
pub use report::{render_summary, ValidatorOutput};

/// Category reported for parses that could not complete at all.
pub const CRITICAL_FAILURE: &str = "Critical parsing failure";

/// A recoverable problem at a byte offset, before it is numbered and located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub offset: usize,
    pub message: String,
}

/// 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based, in discovery order.
    pub index: usize,
    /// Message with a ` (line:column)` suffix.
    pub message: String,
    pub loc: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Clean,
    Recoverable(Vec<SyntaxError>),
    Fatal {
        category: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_lines_of_code: usize,
    pub outcome: ValidationOutcome,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Clean)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::Fatal { .. })
    }

    /// Recoverable error count, or the line count when parsing failed outright.
    pub fn total_errors(&self) -> usize {
        match &self.outcome {
            ValidationOutcome::Clean => 0,
            ValidationOutcome::Recoverable(errors) => errors.len(),
            ValidationOutcome::Fatal { .. } => self.total_lines_of_code,
        }
    }

    /// Quality score in `[0, 100]`.
    pub fn score(&self) -> f64 {
        if self.is_fatal() {
            return 0.0;
        }
        let ratio = self.total_errors() as f64 / self.total_lines_of_code as f64;
        ((1.0 - ratio) * 100.0).clamp(0.0, 100.0)
    }

    /// Recoverable errors; empty for clean and fatal outcomes.
    pub fn errors(&self) -> &[SyntaxError] {
        match &self.outcome {
            ValidationOutcome::Recoverable(errors) => errors,
            _ => &[],
        }
    }
}

/// Number of newline-delimited lines, never less than one.
pub fn count_lines(source: &str) -> usize {
    source.split('\n').count().max(1)
}

/// Validate JavaScript module source.
pub fn validate(source: &str) -> ValidationReport {
    let total_lines_of_code = count_lines(source);

    let parsed = panic::catch_unwind(AssertUnwindSafe(|| parser::parse_module(source)));
    let outcome = match parsed {
        Ok(Ok(diagnostics)) if diagnostics.is_empty() => ValidationOutcome::Clean,
        Ok(Ok(diagnostics)) => ValidationOutcome::Recoverable(number(source, diagnostics)),
        Ok(Err(fault)) => {
            let index = LineIndex::new(source);
            let loc = index.locate(source, fault.offset());
            ValidationOutcome::Fatal {
                category: CRITICAL_FAILURE,
                message: format!("{} ({}:{})", fault, loc.line, loc.column),
            }
        }
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ValidationOutcome::Fatal {
                category: CRITICAL_FAILURE,
                message: format!("Internal parser error: {}", detail),
            }
        }
    };

    let report = ValidationReport {
        total_lines_of_code,
        outcome,
    };
    match &report.outcome {
        ValidationOutcome::Fatal { message, .. } => {
            warn!("Validation aborted after {} lines: {}", total_lines_of_code, message)
        }
        _ => debug!(
            "Validated {} lines: {} errors, score {:.2}",
            total_lines_of_code,
            report.total_errors(),
            report.score()
        ),
    }
    report
}

fn number(source: &str, diagnostics: Vec<Diagnostic>) -> Vec<SyntaxError> {
    let index = LineIndex::new(source);
    diagnostics
        .into_iter()
        .enumerate()
        .map(|(i, diagnostic)| {
            let loc = index.locate(source, diagnostic.offset);
            SyntaxError {
                index: i + 1,
                message: format!("{} ({}:{})", diagnostic.message, loc.line, loc.column),
                loc: Some(loc),
            }
        })
        .collect()
}
