use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};

use crate::error::InvokeError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Local Ollama inference server over its HTTP API.
#[derive(Debug, Clone)]
pub struct Ollama {
    base_url: String,
    model: String,
}

impl Ollama {
    pub fn new(base_url: Option<String>, model: String) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.into())
            .trim_end_matches('/')
            .to_string();
        Self { base_url, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn probe(&self, timeout: Duration) -> bool {
        let Ok(client) = http(timeout) else {
            return false;
        };
        client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub fn chat(&self, prompt: &str, timeout: Duration) -> Result<String, InvokeError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream": false,
        });

        let resp = http(timeout)?
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(InvokeError::Status {
                code: status.as_u16(),
                body: clip(&resp.text().unwrap_or_default()),
            });
        }

        let json: Value = resp.json()?;
        json.pointer("/message/content")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| InvokeError::Malformed("Ollama response has no message content".into()))
    }
}

pub(crate) fn http(timeout: Duration) -> Result<Client, InvokeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| InvokeError::Transport(e.to_string()))
}

pub(crate) fn clip(body: &str) -> String {
    const MAX: usize = 500;
    if body.chars().count() > MAX {
        let head: String = body.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}
