//! testsmith - Generate, validate and report on Hardhat unit tests
//!
//! Pulls the JavaScript test file out of an LLM response, scores it with an
//! error-tolerant syntax validator and mines mocha/hardhat transcripts for
//! pass/fail names, failure messages and coverage. The `generate` command
//! drives an OpenAI-compatible model (OpenAI or a local Ollama server).

pub mod cli;
pub mod config;
pub mod coverage;
pub mod extractor;
pub mod llm;
pub mod syntax;
pub mod transcript;
pub mod util;
