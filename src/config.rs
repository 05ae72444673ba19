use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "osmotest.toml";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: "deepseek-r1".into(),
            base_url: None,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// API key from config, falling back to the provider's env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        let from_env = match self.provider {
            Provider::Ollama => None,
            Provider::OpenAI => env::var("OPENAI_API_KEY").ok(),
            Provider::Anthropic => env::var("ANTHROPIC_API_KEY").ok(),
        };

        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or(from_env.filter(|k| !k.trim().is_empty()))
    }
}

/// Sends every source file whose path mentions `area` to one shared test file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteRule {
    pub area: String,
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_root: String,
    pub extension: String,
    pub test_root: PathBuf,
    pub test_prefix: String,
    pub manifest: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub backend: BackendConfig,
    /// `None` means the built-in routes for `extension`.
    pub routes: Option<Vec<RouteRule>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_root: "app/".into(),
            extension: "py".into(),
            test_root: PathBuf::from("tests"),
            test_prefix: "test_".into(),
            manifest: Some(PathBuf::from("requirements.txt")),
            request_timeout_secs: 300,
            probe_timeout_secs: 5,
            backend: BackendConfig::default(),
            routes: None,
        }
    }
}

fn default_routes(prefix: &str, extension: &str) -> Vec<RouteRule> {
    let ext = extension.trim_start_matches('.');
    ["routes", "services", "models"]
        .into_iter()
        .map(|area| RouteRule {
            area: area.into(),
            file: format!("{prefix}{area}.{ext}"),
        })
        .collect()
}

impl Config {
    pub fn routes(&self) -> Vec<RouteRule> {
        self.routes
            .clone()
            .unwrap_or_else(|| default_routes(&self.test_prefix, &self.extension))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.trim().is_empty() {
            return Err(ConfigError::Invalid("`extension` cannot be empty".into()));
        }
        if self.test_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("`test_root` cannot be empty".into()));
        }
        if self.request_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1s".into()));
        }
        if self.routes().iter().any(|r| r.area.is_empty() || r.file.is_empty()) {
            return Err(ConfigError::Invalid(
                "route rules need both `area` and `file`".into(),
            ));
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str, origin: &Path) -> Result<Config, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load config from an explicit path, the repo, the user config dir, or defaults.
pub fn load_config(repo_root: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        return parse_config(&raw, path);
    }

    for path in [repo_root.join(CONFIG_FILE), user_config_path()] {
        if !path.is_file() {
            continue;
        }
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        return parse_config(&raw, &path);
    }

    Ok(Config::default())
}

fn user_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("osmotest");
    dir.push("config.toml");
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = parse_config(
            r#"
source_root = "src/"

[backend]
provider = "anthropic"
model = "claude-sonnet"
"#,
            Path::new("osmotest.toml"),
        )
        .unwrap();

        assert_eq!(cfg.source_root, "src/");
        assert_eq!(cfg.extension, "py");
        assert_eq!(cfg.backend.provider, Provider::Anthropic);
        assert_eq!(cfg.routes().len(), 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn explicit_routes_replace_defaults() {
        let cfg = parse_config(
            r#"
[[routes]]
area = "views"
file = "test_views.py"
"#,
            Path::new("osmotest.toml"),
        )
        .unwrap();

        assert_eq!(
            cfg.routes(),
            vec![RouteRule {
                area: "views".into(),
                file: "test_views.py".into()
            }]
        );
    }

    #[test]
    fn default_routes_follow_extension() {
        let cfg = parse_config(
            "extension = \"rs\"\nsource_root = \"src/\"\n",
            Path::new("osmotest.toml"),
        )
        .unwrap();

        let files: Vec<String> = cfg.routes().into_iter().map(|r| r.file).collect();
        assert_eq!(files, ["test_routes.rs", "test_services.rs", "test_models.rs"]);
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn provider_names_are_case_insensitive() {
        assert_eq!(Provider::parse("OpenAI").unwrap(), Provider::OpenAI);
        assert!(matches!(
            Provider::parse("gemini"),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn repo_config_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "test_root = \"checks\"\n").unwrap();

        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.test_root, PathBuf::from("checks"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
