use std::{env, time::Duration};

use crate::http::DEFAULT_CONNECT_TIMEOUT;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
}

impl GeminiConfig {
    // Gemini is addressed by `variant`, not by the routing model name.
    pub fn new(variant: Option<&str>, api_key: &str) -> Self {
        let base_url = env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        GeminiConfig {
            api_key: api_key.to_string(),
            base_url,
            model: variant.unwrap_or(DEFAULT_MODEL).to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
