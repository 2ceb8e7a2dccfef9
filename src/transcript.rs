//! Mining of Mocha/Hardhat console transcripts.
//!
//! [`parse`] never fails. Each mining step writes into one result value; when
//! a step errors, whatever the earlier steps collected is kept and the error
//! is attached as `parse_error` together with the raw transcript.

use std::fmt::Write;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Check glyphs Mocha prints before a passing test.
const PASS_GLYPHS: [char; 2] = ['√', '✔'];

const ALL_FILES_LABEL: &str = "All files";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("coverage column '{column}' is not a percentage: {value:?}")]
    CoverageValue { column: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTest {
    pub name: String,
    pub error_message: String,
}

/// Test names in transcript order. Names are not deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub passed_names: Vec<String>,
    pub failed_names: Vec<String>,
    pub failed_details: Vec<FailedTest>,
}

/// Counts from the `N passing` / `N failing` / `N pending` summary lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub passing: Option<usize>,
    pub failing: Option<usize>,
    pub pending: Option<usize>,
}

/// Coverage percentages, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub statements: f64,
    pub branches: f64,
    pub functions: f64,
    pub lines: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTranscript {
    pub summary: TestSummary,
    pub counts: TestCounts,
    pub coverage: Option<CoverageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

/// Parse a test-runner transcript into names, counts and coverage.
pub fn parse(transcript: &str) -> ParsedTranscript {
    let mut result = ParsedTranscript::default();
    if let Err(err) = mine(transcript, &mut result) {
        warn!("Transcript only partially parsed: {}", err);
        result.raw_output = Some(transcript.to_string());
        result.parse_error = Some(err.to_string());
    }
    debug!(
        "Transcript: {} passed, {} failed, coverage {}",
        result.summary.passed_names.len(),
        result.summary.failed_names.len(),
        if result.coverage.is_some() { "found" } else { "absent" }
    );
    result
}

fn mine(transcript: &str, result: &mut ParsedTranscript) -> Result<(), TranscriptError> {
    let lines: Vec<&str> = transcript
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    mine_passed(&lines, &mut result.summary)?;
    mine_failures(&lines, &mut result.summary)?;
    mine_counts(&lines, &mut result.counts)?;
    result.coverage = mine_coverage(&lines)?;
    Ok(())
}

fn pass_name(line: &str) -> Option<&str> {
    let rest = line.trim_start();
    let glyph = rest.chars().next().filter(|c| PASS_GLYPHS.contains(c))?;
    let name = rest[glyph.len_utf8()..].strip_prefix(' ')?.trim();
    (!name.is_empty()).then_some(name)
}

fn mine_passed(lines: &[&str], summary: &mut TestSummary) -> Result<(), TranscriptError> {
    let duration = Regex::new(r"\s*\(\d+(?:\.\d+)?m?s\)$")?;
    for name in lines.iter().filter_map(|line| pass_name(line)) {
        summary
            .passed_names
            .push(duration.replace(name, "").trim_end().to_string());
    }
    Ok(())
}

enum FailureState {
    Idle,
    /// Ordinal line seen; title segments until one ends with `:`.
    Title(Vec<String>),
    Message { name: String, lines: Vec<String> },
}

fn start_title(text: &str) -> FailureState {
    let text = text.trim();
    match text.strip_suffix(':') {
        Some(name) => FailureState::Message {
            name: name.trim().to_string(),
            lines: Vec::new(),
        },
        None => FailureState::Title(vec![text.to_string()]),
    }
}

fn finish_failure(name: String, lines: Vec<String>, summary: &mut TestSummary) {
    let error_message = lines.join("\n").trim().to_string();
    if name.is_empty() || error_message.is_empty() {
        return;
    }
    summary.failed_names.push(name.clone());
    summary.failed_details.push(FailedTest {
        name,
        error_message,
    });
}

fn mine_failures(lines: &[&str], summary: &mut TestSummary) -> Result<(), TranscriptError> {
    let ordinal = Regex::new(r"^\s*\d+\) (.+)$")?;
    let counts = Regex::new(r"^\s*\d+ (?:passing|failing|pending)\b")?;
    let ordinal_text = |line: &str| {
        ordinal
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };

    let mut state = FailureState::Idle;
    for line in lines {
        let blank = line.trim().is_empty();
        state = match state {
            FailureState::Idle => match ordinal_text(line) {
                Some(text) => start_title(&text),
                None => FailureState::Idle,
            },
            FailureState::Title(mut parts) => {
                if let Some(text) = ordinal_text(line) {
                    start_title(&text)
                } else if blank || pass_name(line).is_some() || counts.is_match(line) {
                    // progress listing entry, not a failure report
                    FailureState::Idle
                } else {
                    let segment = line.trim();
                    match segment.strip_suffix(':') {
                        Some(last) => {
                            parts.push(last.trim().to_string());
                            FailureState::Message {
                                name: parts.join(" "),
                                lines: Vec::new(),
                            }
                        }
                        None => {
                            parts.push(segment.to_string());
                            FailureState::Title(parts)
                        }
                    }
                }
            }
            FailureState::Message { name, mut lines } => {
                if let Some(text) = ordinal_text(line) {
                    finish_failure(name, lines, summary);
                    start_title(&text)
                } else if blank && lines.is_empty() {
                    FailureState::Message { name, lines }
                } else if blank {
                    finish_failure(name, lines, summary);
                    FailureState::Idle
                } else {
                    lines.push(line.to_string());
                    FailureState::Message { name, lines }
                }
            }
        };
    }
    if let FailureState::Message { name, lines } = state {
        finish_failure(name, lines, summary);
    }
    Ok(())
}

fn mine_counts(lines: &[&str], counts: &mut TestCounts) -> Result<(), TranscriptError> {
    let summary = Regex::new(r"^\s*(\d+) (passing|failing|pending)\b")?;
    for caps in lines.iter().filter_map(|line| summary.captures(line)) {
        let Ok(n) = caps[1].parse::<usize>() else {
            debug!("Skipping out-of-range count: {}", caps[0].trim());
            continue;
        };
        match &caps[2] {
            "passing" => counts.passing = Some(n),
            "failing" => counts.failing = Some(n),
            _ => counts.pending = Some(n),
        }
    }
    Ok(())
}

fn percentage(column: &'static str, cell: &str) -> Result<f64, TranscriptError> {
    cell.parse::<f64>()
        .ok()
        .filter(|v| (0.0..=100.0).contains(v))
        .ok_or_else(|| TranscriptError::CoverageValue {
            column,
            value: cell.to_string(),
        })
}

/// Read the summary row of an Istanbul text table, if one is present.
fn mine_coverage(lines: &[&str]) -> Result<Option<CoverageReport>, TranscriptError> {
    let Some(start) = lines
        .iter()
        .position(|line| line.trim_start().starts_with("File") && line.contains('|'))
    else {
        return Ok(None);
    };
    let region: Vec<&str> = lines[start..]
        .iter()
        .take_while(|line| line.contains('|'))
        .copied()
        .collect();

    let row = region
        .iter()
        .find(|line| line.split('|').next().map(str::trim) == Some(ALL_FILES_LABEL))
        .or_else(|| region.get(2));
    let Some(row) = row else {
        return Ok(None);
    };

    let cells: Vec<&str> = row.split('|').map(str::trim).collect();
    if cells.len() < 4 {
        debug!("Coverage row has only {} columns", cells.len());
        return Ok(None);
    }

    let statements = percentage("statements", cells[1])?;
    let branches = percentage("branches", cells[2])?;
    let functions = percentage("functions", cells[3])?;
    let lines = match cells.get(4).filter(|cell| !cell.is_empty()) {
        Some(cell) => percentage("lines", cell)?,
        None => functions,
    };

    Ok(Some(CoverageReport {
        statements,
        branches,
        functions,
        lines,
    }))
}

/// Plain-text rendering for terminal output.
pub fn render(parsed: &ParsedTranscript) -> String {
    let mut out = String::new();
    let summary = &parsed.summary;
    let _ = writeln!(out, "Passed: {}", summary.passed_names.len());
    for name in &summary.passed_names {
        let _ = writeln!(out, "  ✔ {}", name);
    }
    let _ = writeln!(out, "Failed: {}", summary.failed_names.len());
    for failure in &summary.failed_details {
        let _ = writeln!(out, "  ✘ {}", failure.name);
        for line in failure.error_message.lines() {
            let _ = writeln!(out, "      {}", line.trim());
        }
    }
    if let Some(pending) = parsed.counts.pending {
        let _ = writeln!(out, "Pending: {}", pending);
    }
    match &parsed.coverage {
        Some(c) => {
            let _ = writeln!(
                out,
                "Coverage: statements {:.2}%, branches {:.2}%, functions {:.2}%, lines {:.2}%",
                c.statements, c.branches, c.functions, c.lines
            );
        }
        None => {
            let _ = writeln!(out, "Coverage: not reported");
        }
    }
    if let Some(err) = &parsed.parse_error {
        let _ = writeln!(out, "Parse error: {}", err);
    }
    out
}
