// src/llm/client.rs

use std::time::Duration;

use serde_json::Value;

use crate::error::InvokeError;
use crate::llm::ollama::{clip, http};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProvider {
    OpenAI,
    Anthropic,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: RemoteProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Hosted chat-completion API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    cfg: ProviderConfig,
}

impl LlmClient {
    pub fn new(cfg: ProviderConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.cfg
    }

    pub fn probe(&self, timeout: Duration) -> bool {
        let Ok(client) = http(timeout) else {
            return false;
        };

        let mut req = client.get(format!("{}/models", api_root(&self.cfg)));
        for (k, v) in auth_headers(&self.cfg) {
            req = req.header(k, v);
        }

        req.send().map(|r| r.status().is_success()).unwrap_or(false)
    }

    /// Send one user message and return the text of the reply.
    pub fn run(&self, prompt: &str, timeout: Duration) -> Result<String, InvokeError> {
        let (url, body) = build_request(&self.cfg, prompt);

        let mut req = http(timeout)?.post(url).json(&body);
        for (k, v) in auth_headers(&self.cfg) {
            req = req.header(k, v);
        }

        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(InvokeError::Status {
                code: status.as_u16(),
                body: clip(&resp.text().unwrap_or_default()),
            });
        }

        let json: Value = resp.json()?;
        extract_text(self.cfg.provider, &json)
    }
}

fn api_root(cfg: &ProviderConfig) -> String {
    let default = match cfg.provider {
        RemoteProvider::OpenAI => "https://api.openai.com/v1",
        RemoteProvider::Anthropic => "https://api.anthropic.com/v1",
    };
    cfg.base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn auth_headers(cfg: &ProviderConfig) -> Vec<(&'static str, String)> {
    match cfg.provider {
        RemoteProvider::OpenAI => vec![("Authorization", format!("Bearer {}", cfg.api_key))],
        RemoteProvider::Anthropic => vec![
            ("x-api-key", cfg.api_key.clone()),
            ("anthropic-version", "2023-06-01".into()),
        ],
    }
}

fn build_request(cfg: &ProviderConfig, prompt: &str) -> (String, Value) {
    let root = api_root(cfg);
    match cfg.provider {
        RemoteProvider::OpenAI => (
            format!("{root}/responses"),
            serde_json::json!({
                "model": cfg.model,
                "input": prompt,
            }),
        ),
        RemoteProvider::Anthropic => (
            format!("{root}/messages"),
            serde_json::json!({
                "model": cfg.model,
                "max_tokens": 8192,
                "messages": [
                    { "role": "user", "content": prompt }
                ]
            }),
        ),
    }
}

fn extract_text(provider: RemoteProvider, v: &Value) -> Result<String, InvokeError> {
    let text = match provider {
        RemoteProvider::OpenAI => v
            .get("output")
            .and_then(|o| o.as_array())
            .and_then(|arr| {
                arr.iter().find_map(|item| {
                    item.get("content")?
                        .as_array()?
                        .iter()
                        .find_map(|c| c.get("text")?.as_str())
                })
            }),
        RemoteProvider::Anthropic => v.pointer("/content/0/text").and_then(|v| v.as_str()),
    };

    text.map(str::to_owned).ok_or_else(|| {
        InvokeError::Malformed(format!("{provider:?} response parse failure"))
    })
}
