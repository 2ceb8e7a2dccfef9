use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::extractor;
use crate::llm::client::LlmClient;
use crate::llm::factory;
use crate::llm::prompts::{build_generation_prompt, GenerationRequest};
use crate::syntax::{self, ValidationReport};

/// A generated test file and how well it parsed.
#[derive(Debug)]
pub struct GeneratedTest {
    pub code: String,
    pub report: ValidationReport,
}

/// Prompt the model, extract the test file from its answer and score it.
pub async fn generate_test(
    client: &dyn LlmClient,
    request: &GenerationRequest,
) -> Result<GeneratedTest> {
    let prompt = build_generation_prompt(request);
    info!("Requesting test generation ({} prompt chars)", prompt.len());

    let response = client.complete(&prompt).await?;
    let code = extractor::extract(&response);
    if code.is_empty() {
        bail!(
            "Model response contained no ```{} block",
            extractor::LANGUAGE_TAG
        );
    }

    let report = syntax::validate(&code);
    if report.is_valid() {
        info!("Generated test parsed cleanly");
    } else {
        warn!(
            "Generated test has {} syntax errors (score {:.2})",
            report.total_errors(),
            report.score()
        );
    }
    Ok(GeneratedTest { code, report })
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}: {}", what, path.display()))
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    contract: PathBuf,
    requirements: Option<String>,
    instructions: Option<String>,
    example: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<String>,
    model_override: Option<String>,
    dry_run: bool,
) -> Result<()> {
    info!("Generating tests for {}", contract.display());

    let mut config = Config::load_with_path(config_path)?;
    if let Some(model) = model_override {
        info!("CLI override: model = {}", model);
        config.llm.model = model;
    }

    let solidity_code = read_file(&contract, "contract")?;
    let mut request = GenerationRequest::from_config(solidity_code, &config.generation);
    if let Some(requirements) = requirements {
        info!("CLI override: requirements");
        request.requirements = requirements;
    }
    if let Some(instructions) = instructions {
        info!("CLI override: instructions");
        request.general_instructions = instructions;
    }
    if let Some(example) = example {
        request.example_test = Some(read_file(&example, "example test")?);
    }

    if dry_run {
        info!("Dry run: using mock client");
    } else {
        info!("Using {} model {}", config.llm.provider, config.llm.model);
    }
    let client = factory::create_client(&config, dry_run)?;
    let generated = generate_test(client.as_ref(), &request).await?;

    match output {
        Some(path) => {
            fs::write(&path, format!("{}\n", generated.code))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", generated.code),
    }
    eprintln!("{}", syntax::render_summary(&generated.report));
    Ok(())
}
