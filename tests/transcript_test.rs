//! Parsing of Hardhat test run transcripts

use anyhow::Result;
use testsmith::transcript::{parse, render, CoverageReport};

const HARDHAT_RUN: &str = "
  Token
    Deployment
      ✔ Should set the right owner (1204ms)
      ✔ Should assign the total supply of tokens to the owner
    Transactions
      1) Should transfer tokens between accounts
      ✔ Should emit Transfer events (58ms)
      2) Should fail if sender doesn't have enough tokens


  2 passing (2s)
  2 failing

  1) Token
       Transactions
         Should transfer tokens between accounts:
     AssertionError: expected 0 to equal 50
      at Context.<anonymous> (test/Token.js:41:58)

  2) Token
       Transactions
         Should fail if sender doesn't have enough tokens:
     Error: VM Exception while processing transaction: reverted with reason string 'Not enough tokens'
      at Token.transfer (contracts/Token.sol:27)

----------------|----------|----------|----------|----------|----------------|
File            |  % Stmts | % Branch |  % Funcs |  % Lines |Uncovered Lines |
----------------|----------|----------|----------|----------|----------------|
 contracts/     |    85.71 |       70 |       90 |    88.24 |                |
  Token.sol     |    85.71 |       70 |       90 |    88.24 |       27,31    |
----------------|----------|----------|----------|----------|----------------|
All files       |    85.71 |       70 |       90 |    88.24 |                |
----------------|----------|----------|----------|----------|----------------|
";

#[test]
fn test_names_counts_and_failures() -> Result<()> {
    let parsed = parse(HARDHAT_RUN);
    assert_eq!(
        parsed.summary.passed_names,
        vec![
            "Should set the right owner",
            "Should assign the total supply of tokens to the owner",
            "Should emit Transfer events",
        ]
    );
    assert_eq!(
        parsed.summary.failed_names,
        vec![
            "Token Transactions Should transfer tokens between accounts",
            "Token Transactions Should fail if sender doesn't have enough tokens",
        ]
    );
    assert!(parsed.summary.failed_details[0]
        .error_message
        .starts_with("AssertionError: expected 0 to equal 50"));
    assert!(parsed.summary.failed_details[1]
        .error_message
        .contains("Not enough tokens"));
    assert_eq!(parsed.counts.passing, Some(2));
    assert_eq!(parsed.counts.failing, Some(2));
    assert_eq!(parsed.counts.pending, None);
    assert!(parsed.parse_error.is_none());
    Ok(())
}

#[test]
fn test_coverage_from_all_files_row() -> Result<()> {
    let parsed = parse(HARDHAT_RUN);
    assert_eq!(
        parsed.coverage,
        Some(CoverageReport {
            statements: 85.71,
            branches: 70.0,
            functions: 90.0,
            lines: 88.24,
        })
    );
    Ok(())
}

#[test]
fn test_minimal_transcript() -> Result<()> {
    let parsed = parse("√ A\n√ B\n√ C\n1) D:\n   boom");
    assert_eq!(parsed.summary.passed_names, vec!["A", "B", "C"]);
    assert_eq!(parsed.summary.failed_names, vec!["D"]);
    assert_eq!(parsed.summary.failed_details[0].error_message, "boom");
    assert!(parsed.coverage.is_none());
    Ok(())
}

#[test]
fn test_short_coverage_table() -> Result<()> {
    let parsed = parse("File | S | B | F | L\n---|---|---|---|---\nAll files | 85 | 70 | 90 | 88\n");
    let coverage = parsed.coverage.expect("coverage row");
    assert_eq!(coverage.statements, 85.0);
    assert_eq!(coverage.lines, 88.0);
    Ok(())
}

#[test]
fn test_garbled_coverage_keeps_test_names() -> Result<()> {
    let transcript = "✔ mints\nFile | S | B | F | L\n---|---|---|---|---\nAll files | 85 | ?? | 90 | 88\n";
    let parsed = parse(transcript);
    assert_eq!(parsed.summary.passed_names, vec!["mints"]);
    assert!(parsed.coverage.is_none());
    assert!(parsed.parse_error.is_some());
    assert_eq!(parsed.raw_output.as_deref(), Some(transcript));
    Ok(())
}

#[test]
fn test_empty_transcript() -> Result<()> {
    let parsed = parse("");
    assert!(parsed.summary.passed_names.is_empty());
    assert!(parsed.summary.failed_names.is_empty());
    assert!(parsed.coverage.is_none());
    assert!(render(&parsed).contains("Coverage: not reported"));
    Ok(())
}

#[test]
fn test_json_wire_names() -> Result<()> {
    let value = serde_json::to_value(parse(HARDHAT_RUN))?;
    assert_eq!(value["summary"]["passedNames"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        value["summary"]["failedDetails"][1]["name"],
        "Token Transactions Should fail if sender doesn't have enough tokens"
    );
    assert_eq!(value["coverage"]["statements"], 85.71);
    assert!(value.get("parseError").is_none());
    Ok(())
}
