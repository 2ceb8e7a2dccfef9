use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::syntax::{self, ValidationReport, ValidatorOutput};
use crate::util::read_input;

/// Validate `source`. Blank input is rejected unless `allow_empty` is set.
pub fn check(source: &str, allow_empty: bool) -> Result<ValidationReport> {
    if source.trim().is_empty() && !allow_empty {
        bail!("Nothing to validate: input is empty (pass --allow-empty to score it anyway)");
    }
    Ok(syntax::validate(source))
}

pub fn render(report: &ValidationReport, json: bool) -> Result<String> {
    if json {
        let output = ValidatorOutput::from(report);
        serde_json::to_string_pretty(&output).context("Failed to serialize validation report")
    } else {
        Ok(syntax::render_summary(report))
    }
}

pub fn run(input: Option<PathBuf>, json: bool, allow_empty: bool) -> Result<()> {
    let source = read_input(input.as_deref())?;
    let report = check(&source, allow_empty)?;
    println!("{}", render(&report, json)?);

    if !report.is_valid() {
        bail!(
            "Validation failed: {} errors in {} lines",
            report.total_errors(),
            report.total_lines_of_code
        );
    }
    info!("Source is syntactically valid");
    Ok(())
}
