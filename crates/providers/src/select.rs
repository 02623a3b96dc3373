use relay_core::llm::{ChatBackend, GenerateError};

use crate::anthropic::{client::AnthropicClient, config::AnthropicConfig};
use crate::gemini::{client::GeminiClient, config::GeminiConfig};
use crate::ollama::{client::OllamaClient, config::OllamaConfig};
use crate::openai::{client::OpenAiClient, config::OpenAiConfig};

pub const LOCAL_ALIASES: [&str; 2] = ["ollama", "local"];
pub const OPENAI_PREFIX: &str = "openai";
pub const ANTHROPIC_PREFIX: &str = "anthropic";
pub const GEMINI_PREFIX: &str = "gemini";

/// Maps a requested model name to a backend. Object-safe so the pipeline
/// can be driven by a test double.
pub trait SelectBackend: Send + Sync {
    fn select(
        &self,
        model: Option<&str>,
        variant: Option<&str>,
        credential: Option<&str>,
    ) -> Result<Box<dyn ChatBackend>, GenerateError>;
}

pub struct ProviderSelector;

impl SelectBackend for ProviderSelector {
    fn select(
        &self,
        model: Option<&str>,
        variant: Option<&str>,
        credential: Option<&str>,
    ) -> Result<Box<dyn ChatBackend>, GenerateError> {
        backend_for(model, variant, credential)
    }
}

/// First match wins, case-insensitive on the model name. Construction is
/// pure configuration; no connection is opened here.
pub fn backend_for(
    model: Option<&str>,
    variant: Option<&str>,
    credential: Option<&str>,
) -> Result<Box<dyn ChatBackend>, GenerateError> {
    let raw = model.unwrap_or("");
    let name = raw.to_ascii_lowercase();

    if LOCAL_ALIASES.contains(&name.as_str()) {
        return local_backend(variant);
    }
    if name.starts_with(OPENAI_PREFIX) {
        let key = credential.ok_or(GenerateError::MissingCredential("openai"))?;
        let client = OpenAiClient::new(OpenAiConfig::new(raw, key))?;
        return Ok(Box::new(client));
    }
    if name.starts_with(ANTHROPIC_PREFIX) {
        let key = credential.ok_or(GenerateError::MissingCredential("anthropic"))?;
        let client = AnthropicClient::new(AnthropicConfig::new(raw, key))?;
        return Ok(Box::new(client));
    }
    if name.starts_with(GEMINI_PREFIX) {
        let key = credential.ok_or(GenerateError::MissingCredential("gemini"))?;
        let client = GeminiClient::new(GeminiConfig::new(variant, key))?;
        return Ok(Box::new(client));
    }
    // Unknown or absent model names run on the local backend.
    local_backend(variant)
}

fn local_backend(variant: Option<&str>) -> Result<Box<dyn ChatBackend>, GenerateError> {
    let client = OllamaClient::new(OllamaConfig::new(variant))?;
    Ok(Box::new(client))
}
