use futures::StreamExt;
use relay_core::llm::{FragmentStream, GenerateError, Message};
use relay_core::prompt::{build_prompt, Topic, WireMessage};
use serde::Deserialize;
use tracing::info;

use crate::select::{ProviderSelector, SelectBackend, GEMINI_PREFIX};

/// One generation call, as deserialized from the transport payload.
#[derive(Clone, Debug, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub topic: Topic,
}

/// Stateless generation service: validate, adapt, build the prompt,
/// select a backend and hand back the fragment stream. One instance can
/// serve any number of concurrent requests.
pub struct Generator {
    selector: Box<dyn SelectBackend>,
}

impl Generator {
    pub fn new() -> Self {
        Generator {
            selector: Box::new(ProviderSelector),
        }
    }

    pub fn with_selector(selector: Box<dyn SelectBackend>) -> Self {
        Generator { selector }
    }

    pub async fn generate(&self, req: GenerateRequest) -> Result<FragmentStream, GenerateError> {
        if req.messages.is_empty() {
            return Err(GenerateError::InvalidRequest(
                "`messages` must be a non-empty list".into(),
            ));
        }

        let wire = adapt_messages(req.model.as_deref(), &req.messages);
        let prompt = build_prompt(wire, req.topic);
        let backend = self.selector.select(
            req.model.as_deref(),
            req.variant.as_deref(),
            req.api_key.as_deref(),
        )?;
        info!(target:"providers::generate","streaming via {} ({} turns, topic {:?})",
            backend.name(), prompt.messages.len(), req.topic);

        let mut inner = backend.stream(&prompt).await?;
        let out = async_stream::stream! {
            let mut produced = false;
            while let Some(item) = inner.next().await {
                match item {
                    Ok(fragment) => {
                        produced = true;
                        yield Ok(fragment);
                    }
                    Err(e) => {
                        // Mid-stream backend failures cross the boundary
                        // as a single normalized error, then the stream ends.
                        yield Err(GenerateError::Generation(e));
                        return;
                    }
                }
            }
            if !produced {
                yield Err(GenerateError::EmptyResponse);
            }
        };
        Ok(Box::pin(out))
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

/// Providers whose wire takes `{role, parts}` get their turns re-shaped
/// here, before prompt assembly; everyone else keeps `{role, content}`.
pub fn adapt_messages(model: Option<&str>, messages: &[Message]) -> Vec<WireMessage> {
    let parts_shape = model
        .map(|m| m.to_ascii_lowercase().starts_with(GEMINI_PREFIX))
        .unwrap_or(false);
    messages
        .iter()
        .map(|m| {
            if parts_shape {
                WireMessage::Parts {
                    role: m.role,
                    parts: m.content.clone(),
                }
            } else {
                WireMessage::Content {
                    role: m.role,
                    content: m.content.clone(),
                }
            }
        })
        .collect()
}
