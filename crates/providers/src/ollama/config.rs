use std::{env, time::Duration};

use crate::http::DEFAULT_CONNECT_TIMEOUT;

/// Local model used when the caller names no variant.
pub const DEFAULT_MODEL: &str = "llama3";

#[derive(Clone, Debug)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
}

impl OllamaConfig {
    pub fn new(variant: Option<&str>) -> Self {
        let base_url = env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
        OllamaConfig {
            base_url,
            model: variant.unwrap_or(DEFAULT_MODEL).to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
