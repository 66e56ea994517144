use crate::config::LlmConfig;
use async_trait::async_trait;
use domain::services::{ChatClient, ChatMessage, ChatStream};
use futures::stream::{self, StreamExt};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use serde_json::Value;
use shared::error::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Incremental decoder for Server-Sent-Events frames (`data: {...}`).
///
/// Bytes arrive in arbitrary chunks, possibly splitting a multi-byte
/// character. Only complete lines are decoded as UTF-8; the rest is held
/// until the next chunk arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `data: [DONE]` frame has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes and return the text chunks of every complete frame.
    pub fn push(&mut self, raw: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(raw);
        let mut chunks = Vec::new();

        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(text) = self.decode_line(line.trim_end_matches(['\r', '\n'])) {
                chunks.push(text);
            }
        }
        chunks
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.pending);
        let rest = String::from_utf8_lossy(&rest);
        self.decode_line(rest.trim()).into_iter().collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<String> {
        if self.done {
            return None;
        }
        let data = line.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(value) => extract_text(&value).filter(|t| !t.is_empty()),
            Err(_) => Some(data.to_string()),
        }
    }
}

/// Pull the text out of the payload shapes chat backends commonly stream.
fn extract_text(value: &Value) -> Option<String> {
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    for key in ["content", "text", "delta", "response"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    if let Some(text) = value.pointer("/message/content").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// HTTP chat collaborator speaking a streaming `/api/chat` endpoint.
#[derive(Clone)]
pub struct SseChatClient {
    client: Arc<Client>,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl SseChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(10) // Connection pool
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_nodelay(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatClient for SseChatClient {
    async fn complete(&self, prompt: &str, history: &[ChatMessage]) -> Result<ChatStream> {
        let url = format!("{}/api/chat", self.base_url);
        let mut messages = history.to_vec();
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let mut builder = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("chat API error {}: {}", status, body)));
        }

        let decoder = Arc::new(Mutex::new(SseDecoder::new()));
        let tail_decoder = decoder.clone();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                let items: Vec<Result<String>> = match chunk {
                    Ok(bytes) => decoder
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(&bytes)
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(Error::from(e))],
                };
                stream::iter(items)
            })
            .flatten();
        let tail = stream::once(async move {
            let rest = tail_decoder
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .finish();
            stream::iter(rest.into_iter().map(Ok).collect::<Vec<Result<String>>>())
        })
        .flatten();

        Ok(body.chain(tail).boxed())
    }
}
