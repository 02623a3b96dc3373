use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use relay_core::llm::{BackendError, BackendStream, ChatBackend, Role};
use relay_core::prompt::Prompt;
use reqwest::Client;
use tracing::{error, info};

use crate::gemini::config::GeminiConfig;
use crate::http::{map_reqwest_err, map_status_err};
use crate::sse;

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .use_rustls_tls()
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    // The wire takes `contents` with user/model roles only; system turns
    // fold into `system_instruction`.
    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut instruction = prompt.preamble.clone();
        let mut contents = Vec::new();
        for m in &prompt.messages {
            match m.role() {
                Role::System => {
                    instruction.push_str("\n\n");
                    instruction.push_str(m.text());
                }
                role => {
                    let wire_role = match role {
                        Role::Assistant => "model",
                        _ => "user",
                    };
                    contents.push(serde_json::json!({
                        "role": wire_role,
                        "parts": [{"text": m.text()}],
                    }));
                }
            }
        }
        serde_json::json!({
            "system_instruction": {"parts": [{"text": instruction}]},
            "contents": contents,
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<BackendStream, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model
        );
        info!(target:"providers::gemini","start content stream model={} url={}", self.cfg.model, url);
        let resp = self
            .http
            .post(url)
            .query(&[("alt", "sse"), ("key", self.cfg.api_key.as_str())])
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.ok();
            error!(target:"providers::gemini","content stream non-200 status={} body={:?}", status, body);
            return Err(map_status_err(status, body));
        }
        let mut chunks = resp.bytes_stream();
        let s = async_stream::stream! {
            let mut buf = BytesMut::new();
            'outer: while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(b) => {
                        buf.extend_from_slice(&b);
                        while let Some(ev) = sse::next_event(&mut buf) {
                            match parse_content_event(&ev) {
                                Ok(Some(t)) => yield Ok(t),
                                Ok(None) => {}
                                Err(e) => { yield Err(e); break 'outer; }
                            }
                        }
                    }
                    Err(e) => { yield Err(map_reqwest_err(e)); break 'outer; }
                }
            }
        };
        Ok(Box::pin(s))
    }
}

fn parse_content_event(ev: &Bytes) -> Result<Option<String>, BackendError> {
    let (_, data) = sse::parse_event(ev)?;
    if data.is_empty() {
        return Ok(None);
    }
    let v: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| BackendError::Decode(e.to_string()))?;
    if let Some(msg) = v["error"]["message"].as_str() {
        return Err(BackendError::Protocol(msg.to_string()));
    }
    let mut text = String::new();
    if let Some(parts) = v["candidates"][0]["content"]["parts"].as_array() {
        for p in parts {
            if let Some(t) = p["text"].as_str() {
                text.push_str(t);
            }
        }
    }
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}
