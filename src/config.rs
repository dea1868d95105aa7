//! Configuration for the paper indexer.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{PaperIndexError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Maximum number of PDF pages read per paper.
pub const MAX_PAGES: usize = 60;

/// Maximum characters of page-tagged text sent to the model.
pub const MAX_TEXT_CHARS: usize = 52_000;

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API, including the version path
    /// (e.g., "https://api.moonshot.cn/v1")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "kimi-k2-turbo-preview")
    pub model: String,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.moonshot.cn/v1".to_string(),
            api_key: String::new(),
            model: "kimi-k2-turbo-preview".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Indexing limits and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding `metadata.json`, the PDFs and the `*_index.json` files.
    pub papers_dir: PathBuf,

    /// Page cap for extraction.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Character budget for the model input.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_max_pages() -> usize {
    MAX_PAGES
}

fn default_max_text_chars() -> usize {
    MAX_TEXT_CHARS
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            papers_dir: PathBuf::from("papers"),
            max_pages: MAX_PAGES,
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

impl IndexConfig {
    /// Path of the paper registry.
    pub fn registry_path(&self) -> PathBuf {
        self.papers_dir.join("metadata.json")
    }

    /// Directory that registry `file_path` values are relative to.
    pub fn project_root(&self) -> PathBuf {
        match self.papers_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,

    /// Indexing settings
    pub index: IndexConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    index: Option<IndexFileSection>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IndexFileSection {
    papers_dir: Option<PathBuf>,
    max_pages: Option<usize>,
    max_text_chars: Option<usize>,
}

/// Read the first set variable among `keys`.
fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (`LLM_*`, then `MOONSHOT_*` fallbacks, `PAPERS_DIR`, ...)
    /// 2. Config file (`explicit` path, else ~/.config/paper-tree-indexer/config.yaml)
    /// 3. Default values
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(api_base) = env_first(&["LLM_API_BASE", "MOONSHOT_API_BASE"]) {
            self.llm.api_base = api_base;
        }

        if let Some(api_key) = env_first(&["LLM_API_KEY", "MOONSHOT_API_KEY"]) {
            self.llm.api_key = api_key;
        }

        if let Some(model) = env_first(&["LLM_MODEL", "MOONSHOT_MODEL"]) {
            self.llm.model = model;
        }

        if let Some(tokens) = env_first(&["LLM_MAX_TOKENS"]).and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = tokens;
        }

        if let Some(temp) = env_first(&["LLM_TEMPERATURE"]).and_then(|v| v.parse().ok()) {
            self.llm.temperature = temp;
        }

        if let Some(secs) = env_first(&["LLM_TIMEOUT_SECS"]).and_then(|v| v.parse().ok()) {
            self.llm.timeout_secs = secs;
        }

        if let Some(dir) = env_first(&["PAPERS_DIR"]) {
            self.index.papers_dir = PathBuf::from(dir);
        }

        if let Some(pages) = env_first(&["MAX_PAGES"]).and_then(|v| v.parse().ok()) {
            self.index.max_pages = pages;
        }

        if let Some(chars) = env_first(&["MAX_TEXT_CHARS"]).and_then(|v| v.parse().ok()) {
            self.index.max_text_chars = chars;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PaperIndexError::io(path, e))?;

        let file_config: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| PaperIndexError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                config.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(index) = file_config.index {
            if let Some(papers_dir) = index.papers_dir {
                config.index.papers_dir = papers_dir;
            }
            if let Some(max_pages) = index.max_pages {
                config.index.max_pages = max_pages;
            }
            if let Some(max_text_chars) = index.max_text_chars {
                config.index.max_text_chars = max_text_chars;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "paper-tree-indexer")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the indexing limits. Needed for every command.
    pub fn validate(&self) -> Result<()> {
        if self.index.max_pages == 0 {
            return Err(PaperIndexError::Config(
                "max_pages must be at least 1".to_string(),
            ));
        }

        if self.index.max_text_chars == 0 {
            return Err(PaperIndexError::Config(
                "max_text_chars must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate the LLM settings. Only needed before tree generation.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.api_key.is_empty() {
            return Err(PaperIndexError::MissingCredential);
        }

        if self.llm.api_base.is_empty() {
            return Err(PaperIndexError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(PaperIndexError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(PaperIndexError::Config(format!(
                "temperature must be within [0, 1], got {}",
                self.llm.temperature
            )));
        }

        if self.llm.max_tokens == 0 {
            return Err(PaperIndexError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            index: IndexConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.llm.api_key.is_empty());
        assert_eq!(config.llm.api_base, "https://api.moonshot.cn/v1");
        assert_eq!(config.llm.max_tokens, 4000);
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.index.max_pages, 60);
        assert_eq!(config.index.max_text_chars, 52_000);
    }

    #[test]
    fn test_validate_llm_requires_credential() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_llm(),
            Err(PaperIndexError::MissingCredential)
        ));
    }

    #[test]
    fn test_validate_llm_rejects_high_temperature() {
        let mut config = Config::with_llm("https://api.example.com/v1", "key", "m");
        config.llm.temperature = 1.5;
        assert!(config.validate_llm().is_err());
        config.llm.temperature = 0.0;
        assert!(config.validate_llm().is_ok());
    }

    #[test]
    fn test_with_llm() {
        let config = Config::with_llm("https://api.example.com", "test-key", "gpt-4");
        assert_eq!(config.llm.api_base, "https://api.example.com");
        assert_eq!(config.llm.api_key, "test-key");
        assert_eq!(config.llm.model, "gpt-4");
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "llm:\n  model: local-model\n  timeout_secs: 30\nindex:\n  papers_dir: /data/papers\n  max_pages: 10"
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.index.papers_dir, PathBuf::from("/data/papers"));
        assert_eq!(config.index.max_pages, 10);
        assert_eq!(config.index.max_text_chars, 52_000);
    }

    #[test]
    fn test_index_paths() {
        let index = IndexConfig {
            papers_dir: PathBuf::from("/srv/site/papers"),
            ..Default::default()
        };
        assert_eq!(
            index.registry_path(),
            PathBuf::from("/srv/site/papers/metadata.json")
        );
        assert_eq!(index.project_root(), PathBuf::from("/srv/site"));
        assert_eq!(IndexConfig::default().project_root(), PathBuf::from("."));
    }
}
