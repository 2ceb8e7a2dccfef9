use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use testsmith::cli;

#[derive(Parser)]
#[command(name = "testsmith", version)]
#[command(about = "Generate, validate and report on Hardhat unit tests", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the first ```javascript block of an LLM response
    Extract {
        /// Response file, or a JSON payload with a "generatedTest" field (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Check a JavaScript test file for syntax errors and score it
    Validate {
        /// Source file (stdin if omitted)
        file: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Score blank input instead of rejecting it
        #[arg(long)]
        allow_empty: bool,
    },

    /// Summarize a mocha/hardhat test run transcript
    ParseOutput {
        /// Transcript file (stdin if omitted)
        file: Option<PathBuf>,

        /// Istanbul coverage-final.json to take coverage from
        #[arg(long)]
        coverage_json: Option<PathBuf>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a Hardhat test file for a Solidity contract
    Generate {
        /// Solidity source file
        #[arg(long)]
        contract: PathBuf,

        /// Override the requirements section of the prompt
        #[arg(long)]
        requirements: Option<String>,

        /// Override the instructions section of the prompt
        #[arg(long)]
        instructions: Option<String>,

        /// Example test file to include in the prompt
        #[arg(long)]
        example: Option<PathBuf>,

        /// Output file path (stdout if omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Path to config file (defaults to ./testsmith.toml or ~/.config/testsmith/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Override LLM model (e.g., "codestral:22b", "gpt-4o")
        #[arg(long)]
        model: Option<String>,

        /// Use mock LLM client for testing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Extract { file } => cli::extract::run(file)?,
        Commands::Validate {
            file,
            json,
            allow_empty,
        } => cli::validate::run(file, json, allow_empty)?,
        Commands::ParseOutput {
            file,
            coverage_json,
            json,
        } => cli::parse_output::run(file, coverage_json, json)?,
        Commands::Generate {
            contract,
            requirements,
            instructions,
            example,
            output,
            config,
            model,
            dry_run,
        } => {
            cli::generate::run(
                contract,
                requirements,
                instructions,
                example,
                output,
                config,
                model,
                dry_run,
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_extract_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["testsmith", "extract"]).unwrap();
        match cli.command {
            Commands::Extract { file } => assert!(file.is_none()),
            _ => panic!("Expected Extract command"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_validate_flags() {
        let cli = Cli::try_parse_from([
            "testsmith",
            "validate",
            "test/Token.js",
            "--json",
            "--allow-empty",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Validate {
                file,
                json,
                allow_empty,
            } => {
                assert_eq!(file, Some(PathBuf::from("test/Token.js")));
                assert!(json);
                assert!(allow_empty);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_output_with_coverage() {
        let cli = Cli::try_parse_from([
            "testsmith",
            "parse-output",
            "run.log",
            "--coverage-json",
            "coverage/coverage-final.json",
        ])
        .unwrap();
        match cli.command {
            Commands::ParseOutput {
                file,
                coverage_json,
                json,
            } => {
                assert_eq!(file, Some(PathBuf::from("run.log")));
                assert_eq!(
                    coverage_json,
                    Some(PathBuf::from("coverage/coverage-final.json"))
                );
                assert!(!json);
            }
            _ => panic!("Expected ParseOutput command"),
        }
    }

    #[test]
    fn test_parse_generate_with_all_args() {
        let cli = Cli::try_parse_from([
            "testsmith",
            "generate",
            "--contract",
            "contracts/Token.sol",
            "--requirements",
            "Cover minting",
            "--instructions",
            "Use fixtures",
            "--example",
            "test/Example.js",
            "-o",
            "test/Token.js",
            "--config",
            "custom.toml",
            "--model",
            "codestral:22b",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                contract,
                requirements,
                instructions,
                example,
                output,
                config,
                model,
                dry_run,
            } => {
                assert_eq!(contract, PathBuf::from("contracts/Token.sol"));
                assert_eq!(requirements.as_deref(), Some("Cover minting"));
                assert_eq!(instructions.as_deref(), Some("Use fixtures"));
                assert_eq!(example, Some(PathBuf::from("test/Example.js")));
                assert_eq!(output, Some(PathBuf::from("test/Token.js")));
                assert_eq!(config.as_deref(), Some("custom.toml"));
                assert_eq!(model.as_deref(), Some("codestral:22b"));
                assert!(dry_run);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_requires_contract() {
        assert!(Cli::try_parse_from(["testsmith", "generate"]).is_err());
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["testsmith", "review"]).is_err());
    }
}
