use anyhow::{bail, Result};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::extractor;
use crate::util::read_input;

/// Extract from raw response text, or from a JSON payload when the input is one.
pub fn extract_text(raw: &str) -> String {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('"') {
        if let Ok(payload) = serde_json::from_str::<Value>(raw) {
            debug!("Input is a JSON payload");
            return extractor::extract_from_payload(&payload);
        }
    }
    extractor::extract(raw)
}

pub fn run(input: Option<PathBuf>) -> Result<()> {
    let raw = read_input(input.as_deref())?;
    let code = extract_text(&raw);
    if code.is_empty() {
        bail!(
            "No ```{} block found in the response",
            extractor::LANGUAGE_TAG
        );
    }
    info!("Extracted {} lines", code.lines().count());
    println!("{}", code);
    Ok(())
}
