use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use relay_core::llm::{BackendError, BackendStream, ChatBackend};
use relay_core::prompt::Prompt;
use reqwest::{header, Client};
use tracing::{error, info};

use crate::http::{map_reqwest_err, map_status_err};
use crate::openai::config::OpenAiConfig;
use crate::sse;

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    cfg: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig) -> Result<Self, BackendError> {
        let mut headers = header::HeaderMap::new();
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
            .map_err(|e| BackendError::Other(e.to_string()))?;
        headers.insert(header::AUTHORIZATION, bearer);
        let http = Client::builder()
            .default_headers(headers)
            .use_rustls_tls()
            .connect_timeout(cfg.connect_timeout)
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut messages =
            vec![serde_json::json!({"role": "system", "content": prompt.preamble})];
        messages.extend(prompt.messages.iter().map(|m| {
            serde_json::json!({"role": m.role().as_str(), "content": m.text()})
        }));
        serde_json::json!({
            "model": self.cfg.model,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait::async_trait]
impl ChatBackend for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<BackendStream, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        info!(target:"providers::openai","start chat stream model={} url={}", self.cfg.model, url);
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
            error!(target:"providers::openai","chat stream non-200 status={} body={:?}", status, body);
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
                            match parse_delta_event(&ev) {
                                Ok(Some(DeltaEvent::Text(t))) => yield Ok(t),
                                Ok(Some(DeltaEvent::Done)) => break 'outer,
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
enum DeltaEvent {
    Text(String),
    Done,
}

fn parse_delta_event(ev: &Bytes) -> Result<Option<DeltaEvent>, BackendError> {
    let (_, data) = sse::parse_event(ev)?;
    if data.is_empty() {
        return Ok(None);
    }
    if data == "[DONE]" {
        return Ok(Some(DeltaEvent::Done));
    }
    let v: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| BackendError::Decode(e.to_string()))?;
    if let Some(content) = v["choices"][0]["delta"]["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(DeltaEvent::Text(content.to_string())));
        }
    }
    Ok(None)
}
