use std::{env, time::Duration};

use crate::http::DEFAULT_CONNECT_TIMEOUT;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(model: &str, api_key: &str) -> Self {
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        OpenAiConfig {
            api_key: api_key.to_string(),
            base_url,
            model: model.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
