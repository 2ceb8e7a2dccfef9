//! Coverage totals from an Istanbul `coverage-final.json` report.
//!
//! The report maps each source file to hit counters: `s` (statements), `b`
//! (branches, one array of counts per branch point), `f` (functions) and
//! optionally `l` (lines). A counter is covered when its hit count is
//! positive. Files without an `l` map get line counters derived from the
//! start lines in `statementMap`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::transcript::CoverageReport;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    total: usize,
    covered: usize,
}

impl Tally {
    fn add(&mut self, covered: bool) {
        self.total += 1;
        if covered {
            self.covered += 1;
        }
    }

    fn add_hits(&mut self, count: &Value) {
        self.add(count.as_f64().unwrap_or(0.0) > 0.0);
    }

    /// Percentage rounded to two decimals; zero when there is nothing to count.
    fn percent(self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = 100.0 * self.covered as f64 / self.total as f64;
        (raw * 100.0).round() / 100.0
    }
}

#[derive(Debug, Default)]
struct Totals {
    statements: Tally,
    branches: Tally,
    functions: Tally,
    lines: Tally,
}

impl Totals {
    fn add_file(&mut self, file: &Value) {
        for count in counters(file, "s") {
            self.statements.add_hits(count);
        }
        for branch in counters(file, "b") {
            match branch.as_array() {
                Some(paths) => paths.iter().for_each(|count| self.branches.add_hits(count)),
                None => self.branches.add_hits(branch),
            }
        }
        for count in counters(file, "f") {
            self.functions.add_hits(count);
        }

        if file.get("l").is_some_and(Value::is_object) {
            for count in counters(file, "l") {
                self.lines.add_hits(count);
            }
        } else {
            for covered in derived_lines(file).into_values() {
                self.lines.add(covered);
            }
        }
    }

    fn report(&self) -> CoverageReport {
        CoverageReport {
            statements: self.statements.percent(),
            branches: self.branches.percent(),
            functions: self.functions.percent(),
            lines: self.lines.percent(),
        }
    }
}

fn counters<'a>(file: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    file.get(key)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.values())
}

/// Line number to covered flag, from statement start lines and their hits.
fn derived_lines(file: &Value) -> BTreeMap<u64, bool> {
    let mut lines = BTreeMap::new();
    let (Some(map), Some(hits)) = (
        file.get("statementMap").and_then(Value::as_object),
        file.get("s").and_then(Value::as_object),
    ) else {
        return lines;
    };

    for (id, location) in map {
        let Some(line) = location.pointer("/start/line").and_then(Value::as_u64) else {
            continue;
        };
        let hit = hits
            .get(id)
            .and_then(Value::as_f64)
            .is_some_and(|count| count > 0.0);
        *lines.entry(line).or_insert(false) |= hit;
    }
    lines
}

/// Aggregate coverage over every file in a parsed report.
pub fn from_istanbul(report: &Value) -> Result<CoverageReport> {
    let Some(files) = report.as_object() else {
        bail!("coverage report must be a JSON object keyed by file path");
    };

    let mut totals = Totals::default();
    for (path, file) in files {
        if !file.is_object() {
            bail!("coverage entry for {} is not an object", path);
        }
        totals.add_file(file);
    }
    debug!(
        "Coverage over {} files: {}/{} statements, {}/{} branches",
        files.len(),
        totals.statements.covered,
        totals.statements.total,
        totals.branches.covered,
        totals.branches.total
    );
    Ok(totals.report())
}

pub fn from_istanbul_str(json: &str) -> Result<CoverageReport> {
    let report: Value = serde_json::from_str(json).context("Failed to parse coverage JSON")?;
    from_istanbul(&report)
}

pub fn load(path: &Path) -> Result<CoverageReport> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage report: {}", path.display()))?;
    from_istanbul_str(&json).with_context(|| format!("Invalid coverage report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregates_all_files() {
        let report = json!({
            "contracts/Token.sol": {
                "s": { "1": 1, "2": 0, "3": 4 },
                "b": { "1": [1, 0], "2": [2, 3] },
                "f": { "1": 1, "2": 0 },
                "l": { "10": 1, "11": 0 }
            },
            "contracts/Vault.sol": {
                "s": { "1": 5 },
                "b": {},
                "f": { "1": 2 },
                "l": { "3": 5 }
            }
        });
        let coverage = from_istanbul(&report).unwrap();
        assert_eq!(coverage.statements, 75.0);
        assert_eq!(coverage.branches, 75.0);
        assert_eq!(coverage.functions, 66.67);
        assert_eq!(coverage.lines, 66.67);
    }

    #[test]
    fn test_empty_categories_report_zero() {
        let coverage = from_istanbul(&json!({ "a.sol": { "s": {}, "b": {}, "f": {} } })).unwrap();
        assert_eq!(coverage, CoverageReport::default());
        assert_eq!(from_istanbul(&json!({})).unwrap(), CoverageReport::default());
    }

    #[test]
    fn test_lines_derived_from_statement_map() {
        let report = json!({
            "a.sol": {
                "statementMap": {
                    "1": { "start": { "line": 4 } },
                    "2": { "start": { "line": 4 } },
                    "3": { "start": { "line": 9 } }
                },
                "s": { "1": 0, "2": 3, "3": 0 },
                "b": {},
                "f": {}
            }
        });
        let coverage = from_istanbul(&report).unwrap();
        assert_eq!(coverage.statements, 33.33);
        assert_eq!(coverage.lines, 50.0);
    }

    #[test]
    fn test_malformed_reports_are_errors() {
        assert!(from_istanbul_str("not json").is_err());
        assert!(from_istanbul(&json!([1, 2])).is_err());
        assert!(from_istanbul(&json!({ "a.sol": 3 })).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage-final.json");
        std::fs::write(&path, r#"{"a.sol": {"s": {"1": 1}, "b": {}, "f": {"1": 1}}}"#).unwrap();
        let coverage = load(&path).unwrap();
        assert_eq!(coverage.statements, 100.0);
        assert_eq!(coverage.functions, 100.0);
        assert_eq!(coverage.lines, 0.0);

        let missing = load(&dir.path().join("missing.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to read coverage report"));
    }
}
