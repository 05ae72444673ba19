use std::time::Duration;

use crate::config::{BackendConfig, Provider};
use crate::error::{ConfigError, InvokeError};
use crate::llm::client::{LlmClient, ProviderConfig, RemoteProvider};
use crate::llm::ollama::Ollama;

/// The two operations the pipeline needs from a generative-model service.
pub trait Backend: Send + Sync {
    fn label(&self) -> String;

    /// Cheap reachability check, answered within `timeout`.
    fn probe(&self, timeout: Duration) -> bool;

    /// One chat completion for a single user message.
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, InvokeError>;
}

#[derive(Debug, Clone)]
pub enum LlmBackend {
    Ollama(Ollama),
    Remote(LlmClient),
}

impl LlmBackend {
    pub fn from_config(cfg: &BackendConfig) -> Result<Self, ConfigError> {
        let remote = |provider: RemoteProvider,
                      name: &'static str,
                      env_key: &'static str|
         -> Result<Self, ConfigError> {
            let api_key = cfg
                .resolved_api_key()
                .ok_or(ConfigError::MissingApiKey(name, env_key))?;
            Ok(LlmBackend::Remote(LlmClient::new(ProviderConfig {
                provider,
                model: cfg.model.clone(),
                api_key,
                base_url: cfg.base_url.clone(),
            })))
        };

        match cfg.provider {
            Provider::Ollama => Ok(LlmBackend::Ollama(Ollama::new(
                cfg.base_url.clone(),
                cfg.model.clone(),
            ))),
            Provider::OpenAI => remote(RemoteProvider::OpenAI, "openai", "OPENAI_API_KEY"),
            Provider::Anthropic => {
                remote(RemoteProvider::Anthropic, "anthropic", "ANTHROPIC_API_KEY")
            }
        }
    }
}

impl Backend for LlmBackend {
    fn label(&self) -> String {
        match self {
            LlmBackend::Ollama(o) => format!("ollama:{}", o.model()),
            LlmBackend::Remote(c) => {
                let cfg = c.config();
                format!("{:?}:{}", cfg.provider, cfg.model).to_lowercase()
            }
        }
    }

    fn probe(&self, timeout: Duration) -> bool {
        match self {
            LlmBackend::Ollama(o) => o.probe(timeout),
            LlmBackend::Remote(c) => c.probe(timeout),
        }
    }

    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, InvokeError> {
        match self {
            LlmBackend::Ollama(o) => o.chat(prompt, timeout),
            LlmBackend::Remote(c) => c.run(prompt, timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_needs_no_key() {
        let b = LlmBackend::from_config(&BackendConfig::default()).unwrap();
        assert_eq!(b.label(), "ollama:deepseek-r1");
    }

    #[test]
    fn configured_key_selects_remote_provider() {
        let cfg = BackendConfig {
            provider: Provider::Anthropic,
            model: "claude-x".into(),
            base_url: None,
            api_key: Some("sk-test".into()),
        };
        let b = LlmBackend::from_config(&cfg).unwrap();
        assert_eq!(b.label(), "anthropic:claude-x");
    }

    #[test]
    fn blank_key_is_rejected() {
        let cfg = BackendConfig {
            provider: Provider::OpenAI,
            model: "m".into(),
            base_url: None,
            api_key: Some("   ".into()),
        };
        // a blank configured key falls through to the env var
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(matches!(
                LlmBackend::from_config(&cfg),
                Err(ConfigError::MissingApiKey("openai", _))
            ));
        }
    }
}
