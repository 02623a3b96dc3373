use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use relay_core::llm::{BackendError, BackendStream, ChatBackend};
use relay_core::prompt::Prompt;
use reqwest::Client;
use tracing::{error, info};

use crate::http::{map_reqwest_err, map_status_err};
use crate::ollama::config::OllamaConfig;

#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    cfg: OllamaConfig,
}

impl OllamaClient {
    pub fn new(cfg: OllamaConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
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
impl ChatBackend for OllamaClient {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn stream(&self, prompt: &Prompt) -> Result<BackendStream, BackendError> {
        let url = format!("{}/api/chat", self.cfg.base_url.trim_end_matches('/'));
        info!(target:"providers::ollama","start chat stream model={} url={}", self.cfg.model, url);
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
            error!(target:"providers::ollama","chat stream non-200 status={} body={:?}", status, body);
            return Err(map_status_err(status, body));
        }
        let mut chunks = resp.bytes_stream();
        let s = async_stream::stream! {
            let mut buf = BytesMut::new();
            'outer: while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(b) => {
                        buf.extend_from_slice(&b);
                        while let Some(line) = next_line(&mut buf) {
                            match parse_chat_line(&line) {
                                Ok(Some(ChatLine::Text(t))) => yield Ok(t),
                                Ok(Some(ChatLine::Done)) => break 'outer,
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
enum ChatLine {
    Text(String),
    Done,
}

fn next_line(buf: &mut BytesMut) -> Option<Bytes> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let line = buf.split_to(pos).freeze();
    buf.advance(1);
    Some(line)
}

fn parse_chat_line(line: &Bytes) -> Result<Option<ChatLine>, BackendError> {
    let s = std::str::from_utf8(line).map_err(|e| BackendError::Decode(e.to_string()))?;
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let v: serde_json::Value =
        serde_json::from_str(s).map_err(|e| BackendError::Decode(e.to_string()))?;
    if let Some(err) = v["error"].as_str() {
        return Err(BackendError::Protocol(err.to_string()));
    }
    if let Some(t) = v["message"]["content"].as_str() {
        if !t.is_empty() {
            return Ok(Some(ChatLine::Text(t.to_string())));
        }
    }
    if v["done"].as_bool() == Some(true) {
        return Ok(Some(ChatLine::Done));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::llm::Role;
    use relay_core::prompt::{build_prompt, Topic, WireMessage};

    fn client() -> OllamaClient {
        OllamaClient::new(OllamaConfig::new(Some("mistral"))).unwrap()
    }

    #[test]
    fn request_body_leads_with_the_preamble() {
        let prompt = build_prompt(
            vec![WireMessage::Content {
                role: Role::User,
                content: "hello".into(),
            }],
            Topic::General,
        );
        let body = client().request_body(&prompt);
        assert_eq!(body["model"], "mistral");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn content_lines_become_fragments() {
        let line = Bytes::from_static(
            br#"{"model":"mistral","message":{"role":"assistant","content":"Hi"},"done":false}"#,
        );
        match parse_chat_line(&line).unwrap() {
            Some(ChatLine::Text(t)) => assert_eq!(t, "Hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn done_line_terminates_the_stream() {
        let line = Bytes::from_static(
            br#"{"model":"mistral","message":{"role":"assistant","content":""},"done":true}"#,
        );
        assert!(matches!(parse_chat_line(&line).unwrap(), Some(ChatLine::Done)));
    }

    #[test]
    fn error_lines_surface_as_protocol_errors() {
        let line = Bytes::from_static(br#"{"error":"model not found"}"#);
        assert!(matches!(
            parse_chat_line(&line),
            Err(BackendError::Protocol(_))
        ));
    }

    #[test]
    fn lines_split_across_chunks_reassemble() {
        let mut buf = BytesMut::from(&br#"{"done"#[..]);
        assert!(next_line(&mut buf).is_none());
        buf.extend_from_slice(b"\":true}\n");
        let line = next_line(&mut buf).unwrap();
        assert!(matches!(parse_chat_line(&line).unwrap(), Some(ChatLine::Done)));
    }
}
