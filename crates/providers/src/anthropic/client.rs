use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use relay_core::llm::{BackendError, BackendStream, ChatBackend, Role};
use relay_core::prompt::Prompt;
use reqwest::{header, Client};
use tracing::{error, info};

use crate::anthropic::config::AnthropicConfig;
use crate::http::{map_reqwest_err, map_status_err};
use crate::sse;

#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    cfg: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(cfg: AnthropicConfig) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&cfg.api_key)
            .map_err(|e| BackendError::Other(e.to_string()))?;
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static("2023-06-01"),
        );
        let http = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    // System turns ride in the top-level `system` field; the messages
    // array only accepts user/assistant roles.
    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut system = prompt.preamble.clone();
        let mut messages = Vec::new();
        for m in &prompt.messages {
            match m.role() {
                Role::System => {
                    system.push_str("\n\n");
                    system.push_str(m.text());
                }
                role => messages.push(
                    serde_json::json!({"role": role.as_str(), "content": m.text()}),
                ),
            }
        }
        serde_json::json!({
            "model": self.cfg.model,
            "max_tokens": self.cfg.max_tokens,
            "system": system,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<BackendStream, BackendError> {
        let url = format!("{}/v1/messages", self.cfg.base_url.trim_end_matches('/'));
        info!(target:"providers::anthropic","start message stream model={} url={}", self.cfg.model, url);
        let resp = self
            .http
            .post(url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(map_reqwest_err)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.ok();
            error!(target:"providers::anthropic","message stream non-200 status={} body={:?}", status, body);
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
                            match parse_message_event(&ev) {
                                Ok(Some(MessageEvent::Text(t))) => yield Ok(t),
                                Ok(Some(MessageEvent::Stop)) => break 'outer,
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

#[derive(Debug)]
enum MessageEvent {
    Text(String),
    Stop,
}

fn parse_message_event(ev: &Bytes) -> Result<Option<MessageEvent>, BackendError> {
    let (event, data) = sse::parse_event(ev)?;
    if data.is_empty() {
        return Ok(None);
    }
    let v: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| BackendError::Decode(e.to_string()))?;
    // No explicit event header: fall back to the payload's `type` field.
    let kind = match event {
        Some(e) => e,
        None => v["type"].as_str().unwrap_or("").to_string(),
    };
    match kind.as_str() {
        "content_block_delta" => {
            if let Some(t) = v["delta"]["text"].as_str() {
                if !t.is_empty() {
                    return Ok(Some(MessageEvent::Text(t.to_string())));
                }
            }
            Ok(None)
        }
        "message_stop" => Ok(Some(MessageEvent::Stop)),
        "error" => Err(BackendError::Protocol(
            v["error"]["message"].as_str().unwrap_or(&data).to_string(),
        )),
        _ => Ok(None),
    }
}
