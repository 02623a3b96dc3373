use std::{env, time::Duration};

use crate::http::DEFAULT_CONNECT_TIMEOUT;

// The messages API refuses requests without an explicit output cap.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub connect_timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(model: &str, api_key: &str) -> Self {
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        AnthropicConfig {
            api_key: api_key.to_string(),
            base_url,
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
