use crate::{
    app::service::AppService,
    config::Config,
    loader::HttpCorpusLoader,
    search::{
        ScorerRegistry, SemanticScorer, TermFrequencyScorer, SENTENCE_EMBEDDING,
        TERM_FREQUENCY_TOKEN,
    },
};
use anyhow::{bail, Context, Result};
use homedir::my_home;
use std::sync::Arc;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Create the application service with the HTTP corpus loader.
    pub fn create_app_service(paths: &AppPaths) -> Result<AppService> {
        let config = Self::create_config(&paths.base_path)?;
        let registry = Self::create_registry(&config);
        let loader = HttpCorpusLoader::new(&config.corpus);

        Ok(AppService::new(config, registry, Box::new(loader)))
    }

    /// Both built-in approaches, lexical first.
    pub fn create_registry(config: &Config) -> ScorerRegistry {
        let semantic = SemanticScorer::new(
            &config.semantic_search,
            config.base_path().to_path_buf(),
        );

        let mut registry = ScorerRegistry::new();
        registry
            .register(TERM_FREQUENCY_TOKEN, Arc::new(TermFrequencyScorer::new()))
            .register(SENTENCE_EMBEDDING, Arc::new(semantic));
        registry
    }

    /// Get application paths with validation
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;

        // Ensure base directory exists
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths { base_path })
    }

    /// Load configuration and check it against the built-in approaches
    pub fn create_config(base_path: &str) -> Result<Config> {
        let config = Config::load_with(base_path).context("Failed to load config")?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    fn validate_config(config: &Config) -> Result<()> {
        let approach = config.search.default_approach.as_str();
        if approach != TERM_FREQUENCY_TOKEN && approach != SENTENCE_EMBEDDING {
            bail!(
                "search.default_approach must be one of {TERM_FREQUENCY_TOKEN}, {SENTENCE_EMBEDDING}, got '{approach}'"
            );
        }
        Ok(())
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("MSGSEARCH_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/msgsearch", home.to_string_lossy()))
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_app_service_from_fresh_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths {
            base_path: tmp.path().to_str().unwrap().to_string(),
        };

        let app = AppFactory::create_app_service(&paths).unwrap();

        assert_eq!(
            app.registry().names(),
            vec![TERM_FREQUENCY_TOKEN, SENTENCE_EMBEDDING]
        );
        assert!(!app.store().is_loaded());
        assert!(tmp.path().join("config.yaml").exists());
    }

    #[test]
    fn test_unknown_default_approach_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.yaml"),
            "search:\n  default_approach: bm25\n",
        )
        .unwrap();

        let result = AppFactory::create_config(tmp.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
