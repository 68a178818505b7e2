//! Text encoders. `EmbeddingModel` is the fastembed-backed one used in
//! production; tests plug in their own `Encoder`.

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Turns text into fixed-dimension vectors.
///
/// Must be deterministic for identical input, and every vector from one
/// encoder has `dimensions()` components.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Model download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Accepted model names, compared case-insensitively.
const SUPPORTED_MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    ("all-minilm-l6-v2", fastembed::EmbeddingModel::AllMiniLML6V2),
    ("all-minilm-l6-v2-q", fastembed::EmbeddingModel::AllMiniLML6V2Q),
    ("bge-small-en-v1.5", fastembed::EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", fastembed::EmbeddingModel::BGEBaseENV15),
];

fn lookup_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    let wanted = name.to_lowercase();
    SUPPORTED_MODELS
        .iter()
        .find(|(known, _)| *known == wanted)
        .map(|(_, model)| model.clone())
        .ok_or_else(|| {
            let known: Vec<&str> = SUPPORTED_MODELS.iter().map(|(known, _)| *known).collect();
            EmbeddingError::InvalidModel(format!("{name} (supported: {})", known.join(", ")))
        })
}

/// Load `model` from `models_dir`, downloading it if needed.
///
/// fastembed has no download timeout of its own, so loading happens on a
/// separate thread. On timeout that thread is left behind.
fn load_with_timeout(
    model: fastembed::EmbeddingModel,
    models_dir: PathBuf,
    timeout: Duration,
) -> Result<TextEmbedding, EmbeddingError> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let options = InitOptions::new(model)
            .with_cache_dir(models_dir)
            .with_show_download_progress(false);
        let _ = tx.send(TextEmbedding::try_new(options));
    });

    match rx.recv_timeout(timeout) {
        Ok(loaded) => loaded.map_err(|e| EmbeddingError::InitFailed(e.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(EmbeddingError::DownloadTimeout(timeout.as_secs()))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(EmbeddingError::InitFailed(
            "model loader thread exited".to_string(),
        )),
    }
}

/// Sentence encoder backed by a fastembed model.
pub struct EmbeddingModel {
    // fastembed needs &mut for inference
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load `model_name`, caching model files under `<cache_dir>/models`.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        download_timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let variant = lookup_model(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("cannot create {}: {e}", models_dir.display()))
        })?;

        let started = std::time::Instant::now();
        let model = load_with_timeout(
            variant,
            models_dir,
            download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
        )?;

        let encoder = Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions: 0,
        };
        // vector size is only known after a first inference
        let dimensions = encoder
            .run(vec!["dimension probe"])?
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::InitFailed("model returned no embedding".to_string()))?;

        log::info!(
            "embedding model '{model_name}' loaded in {:?} ({dimensions} dimensions)",
            started.elapsed()
        );

        Ok(Self {
            dimensions,
            ..encoder
        })
    }

    fn run(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::EmbeddingFailed(format!("model lock poisoned: {e}")))?;

        model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

impl Encoder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.run(vec![text])?
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.run(texts.iter().map(String::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf(), None)
            .unwrap();

        assert_eq!(model.name(), "all-MiniLM-L6-v2");
        assert_eq!(model.dimensions(), 384); // MiniLM produces 384-dim embeddings
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_is_deterministic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf(), None)
            .unwrap();

        let first = model.embed("Book a table for two").unwrap();
        let second = model.embed("Book a table for two").unwrap();
        assert_eq!(first, second);

        // empty input still yields a full vector
        let empty = model.embed("").unwrap();
        assert_eq!(empty.len(), model.dimensions());
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_batch_matches_dimensions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf(), None)
            .unwrap();

        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let batch = model.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|v| v.len() == model.dimensions()));
    }

    #[test]
    fn test_lookup_model_is_case_insensitive() {
        assert!(lookup_model("all-MiniLM-L6-v2").is_ok());
        assert!(lookup_model("BGE-SMALL-EN-V1.5").is_ok());
        assert!(matches!(lookup_model("gpt-4"), Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = EmbeddingModel::new("nonexistent-model", temp_dir.path().to_path_buf(), None);
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }
}
