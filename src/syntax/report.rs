//! Wire and terminal renderings of a [`ValidationReport`].

use std::fmt::Write;

use serde::Serialize;

use super::{Location, ValidationOutcome, ValidationReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub index: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
}

/// JSON shape handed to reporting consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidatorOutput {
    #[serde(rename_all = "camelCase")]
    Parsed {
        valid: bool,
        total_errors: usize,
        total_lines_of_code: usize,
        syntax_validation_metric: String,
        errors: Vec<ErrorEntry>,
    },
    #[serde(rename_all = "camelCase")]
    Fatal {
        valid: bool,
        error: String,
        message: String,
        total_errors: usize,
        total_lines_of_code: usize,
        syntax_validation_metric: String,
    },
}

impl From<&ValidationReport> for ValidatorOutput {
    fn from(report: &ValidationReport) -> Self {
        match &report.outcome {
            ValidationOutcome::Fatal { category, message } => ValidatorOutput::Fatal {
                valid: false,
                error: category.to_string(),
                message: message.clone(),
                total_errors: report.total_errors(),
                total_lines_of_code: report.total_lines_of_code,
                syntax_validation_metric: "0.0".to_string(),
            },
            _ => ValidatorOutput::Parsed {
                valid: report.is_valid(),
                total_errors: report.total_errors(),
                total_lines_of_code: report.total_lines_of_code,
                syntax_validation_metric: format!("{:.2}", report.score()),
                errors: report
                    .errors()
                    .iter()
                    .map(|e| ErrorEntry {
                        index: e.index,
                        message: e.message.clone(),
                        loc: e.loc,
                    })
                    .collect(),
            },
        }
    }
}

/// Human-readable summary for terminal output.
pub fn render_summary(report: &ValidationReport) -> String {
    let mut out = String::new();
    let status = match &report.outcome {
        ValidationOutcome::Clean => "valid",
        ValidationOutcome::Recoverable(_) => "invalid",
        ValidationOutcome::Fatal { .. } => "failed to parse",
    };
    let _ = writeln!(out, "Syntax: {}", status);
    let _ = writeln!(out, "Score: {:.2}", report.score());
    let _ = writeln!(out, "Lines of code: {}", report.total_lines_of_code);
    let _ = writeln!(out, "Errors: {}", report.total_errors());

    if let ValidationOutcome::Fatal { category, message } = &report.outcome {
        let _ = writeln!(out, "\n{}: {}", category, message);
    }
    for error in report.errors() {
        let _ = writeln!(out, "\nError {}: {}", error.index, error.message);
        if let Some(loc) = error.loc {
            let _ = writeln!(out, "Location: Line {}, Column {}", loc.line, loc.column);
        }
    }
    out
}
