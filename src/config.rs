use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::search::semantic::DEFAULT_THRESHOLD;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

const DEFAULT_SOURCE_URL: &str = "https://november7-730026606190.europe-west1.run.app/messages";
/// Page size requested from the remote messages API
const DEFAULT_BATCH_SIZE: usize = 3349;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TEXT_FIELD: &str = "message";

const DEFAULT_APPROACH: &str = "term_frequency_token";

/// Default semantic search model
const DEFAULT_SEMANTIC_MODEL: &str = "all-MiniLM-L6-v2";
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Where the corpus comes from and how to read it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Paginated endpoint returning `{items, total}`
    #[serde(default = "default_source_url")]
    pub source_url: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout for the remote source
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Document field holding the searchable text
    #[serde(default = "default_text_field")]
    pub text_field: String,

    /// Fetch the corpus once when the daemon starts
    #[serde(default = "default_true")]
    pub load_on_startup: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            text_field: default_text_field(),
            load_on_startup: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Approach used when a request does not name one
    #[serde(default = "default_approach")]
    pub default_approach: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_approach: default_approach(),
        }
    }
}

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Minimum cosine similarity a result needs to be returned
    #[serde(default = "default_semantic_threshold")]
    pub threshold: f32,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_text_field() -> String {
    DEFAULT_TEXT_FIELD.to_string()
}

fn default_true() -> bool {
    true
}

fn default_approach() -> String {
    DEFAULT_APPROACH.to_string()
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_semantic_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.corpus.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "corpus.batch_size must be greater than 0".to_string(),
            ));
        }

        if self.corpus.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "corpus.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.corpus.text_field.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "corpus.text_field must not be empty".to_string(),
            ));
        }

        // cosine similarity range
        let sem = &self.semantic_search;
        if !(-1.0..=1.0).contains(&sem.threshold) {
            return Err(ConfigError::Invalid(format!(
                "semantic_search.threshold must be between -1.0 and 1.0, got {}",
                sem.threshold
            )));
        }

        if sem.download_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "semantic_search.download_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn load_with(base_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path)?;
        let config_path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !config_path.exists() {
            std::fs::write(&config_path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&config_path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();

        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.corpus.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.corpus.text_field, "message");
        assert_eq!(config.search.default_approach, "term_frequency_token");
        assert!((config.semantic_search.threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.base_path(), tmp.path());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic_search:\n  threshold: 0.5\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();

        assert!((config.semantic_search.threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.semantic_search.model, DEFAULT_SEMANTIC_MODEL);
        assert_eq!(config.server.listen_addr, DEFAULT_LISTEN_ADDR);

        // upgraded file now carries every section
        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("listen_addr"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic_search:\n  threshold: 1.5\n",
        )
        .unwrap();

        let result = Config::load_with(tmp.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "corpus:\n  batch_size: 0\n").unwrap();

        let result = Config::load_with(tmp.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_config_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "corpus: [1, 2").unwrap();

        let result = Config::load_with(tmp.path());
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }
}
