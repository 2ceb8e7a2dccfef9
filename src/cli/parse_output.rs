use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::coverage;
use crate::transcript::{self, ParsedTranscript};
use crate::util::read_input;

/// Parse a transcript; coverage from an Istanbul JSON report replaces the
/// transcript's table when a path is given.
pub fn analyze(transcript_text: &str, coverage_json: Option<&Path>) -> Result<ParsedTranscript> {
    let mut parsed = transcript::parse(transcript_text);
    if let Some(path) = coverage_json {
        info!("Reading coverage from {}", path.display());
        parsed.coverage = Some(coverage::load(path)?);
    }
    Ok(parsed)
}

pub fn run(input: Option<PathBuf>, coverage_json: Option<PathBuf>, json: bool) -> Result<()> {
    let text = read_input(input.as_deref())?;
    let parsed = analyze(&text, coverage_json.as_deref())?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&parsed).context("Failed to serialize test results")?;
        println!("{}", rendered);
    } else {
        print!("{}", transcript::render(&parsed));
    }
    Ok(())
}
