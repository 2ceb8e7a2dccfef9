// Prompt assembly for test generation

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// Everything the generation prompt is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub context: String,
    pub solidity_code: String,
    pub general_instructions: String,
    pub requirements: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_test: Option<String>,
}

impl GenerationRequest {
    /// Request for `solidity_code` with the prompt sections taken from config.
    pub fn from_config(solidity_code: String, generation: &GenerationConfig) -> Self {
        Self {
            context: generation.context.clone(),
            solidity_code,
            general_instructions: generation.general_instructions.clone(),
            requirements: generation.requirements.clone(),
            example_test: None,
        }
    }
}

/// Build the prompt: context, then the contract, instructions, requirements
/// and, when one is given, an example test. Sections are separated by a
/// blank line.
pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "{}\n\nSolidity Code:\n{}\n\nInstructions:\n{}\n\nRequirements:\n{}\n\n",
        request.context,
        request.solidity_code,
        request.general_instructions,
        request.requirements
    );
    if let Some(example) = request.example_test.as_deref().filter(|e| !e.is_empty()) {
        prompt.push_str("Example Test:\n");
        prompt.push_str(example);
        prompt.push_str("\n\n");
    }
    prompt
}
