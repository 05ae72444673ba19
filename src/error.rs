use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown backend provider `{0}` (expected ollama, openai or anthropic)")]
    UnknownProvider(String),
    #[error("{0} backend needs an API key (config `backend.api_key` or {1})")]
    MissingApiKey(&'static str, &'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("cannot run git: {0}")]
    Spawn(#[from] io::Error),
    #[error("git diff failed: {0}")]
    Query(String),
}

/// Why a single model call produced no text.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("backend did not answer within {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unexpected backend response: {0}")]
    Malformed(String),
    #[error("backend worker exited without a response")]
    Disconnected,
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InvokeError::Transport(format!("request timed out: {e}"))
        } else if e.is_decode() {
            InvokeError::Malformed(e.to_string())
        } else {
            InvokeError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
#[error("cannot update {}: {source}", path.display())]
pub struct MergeError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl MergeError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
#[error("cannot update dependency manifest {}: {source}", path.display())]
pub struct ManifestError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot access merge ledger {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt merge ledger {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Conditions that end a run before any file is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("backend `{0}` is unreachable")]
    BackendUnreachable(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
