//! Shared fixtures for tests that must not download a model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::app::{AppService, SearchRequest};
use crate::config::Config;
use crate::corpus::{CorpusStore, Document, Snapshot};
use crate::loader::{CorpusLoader, FetchError};
use crate::search::semantic::{EmbeddingError, Encoder};
use crate::search::{
    ScorerRegistry, SemanticScorer, TermFrequencyScorer, SENTENCE_EMBEDDING, TERM_FREQUENCY_TOKEN,
};

/// Deterministic encoder with one axis per vocabulary word.
///
/// A text's vector counts vocabulary words in it; texts with no known word
/// land on an extra "unknown" axis, so no vector is ever zero.
pub struct KeywordEncoder {
    vocabulary: Vec<String>,
    batch_calls: AtomicUsize,
    batch_delay: Duration,
    fail_batches: bool,
}

impl KeywordEncoder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
            batch_calls: AtomicUsize::new(0),
            batch_delay: Duration::ZERO,
            fail_batches: false,
        }
    }

    /// Slow down every batch, to widen race windows.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Make every batch fail.
    pub fn failing(mut self) -> Self {
        self.fail_batches = true;
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl Encoder for KeywordEncoder {
    fn name(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0; self.dimensions()];
        for word in crate::search::lexical::tokenize(text) {
            if let Some(axis) = self.vocabulary.iter().position(|v| *v == word) {
                vector[axis] += 1.0;
            }
        }
        if vector.iter().all(|x| *x == 0.0) {
            vector[self.vocabulary.len()] = 1.0;
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.batch_delay.is_zero() {
            std::thread::sleep(self.batch_delay);
        }
        if self.fail_batches {
            return Err(EmbeddingError::EmbeddingFailed("test encoder failure".to_string()));
        }
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

pub fn keyword_encoder(vocabulary: &[&str]) -> Arc<KeywordEncoder> {
    Arc::new(KeywordEncoder::new(vocabulary))
}

pub fn message(text: &str) -> Document {
    serde_json::from_value(json!({ "message": text })).expect("valid document")
}

pub fn messages(texts: &[&str]) -> Vec<Document> {
    texts.iter().map(|text| message(text)).collect()
}

pub fn snapshot_of(texts: &[&str]) -> Arc<Snapshot> {
    CorpusStore::new("message").replace(messages(texts))
}

/// Loader replaying canned outcomes, cycling back to the first when done.
pub struct StaticLoader {
    outcomes: Vec<Result<Vec<Document>, String>>,
    next: AtomicUsize,
}

impl StaticLoader {
    pub fn new(outcomes: Vec<Result<Vec<Document>, String>>) -> Self {
        Self {
            outcomes,
            next: AtomicUsize::new(0),
        }
    }
}

impl CorpusLoader for StaticLoader {
    fn fetch(&self) -> Result<Vec<Document>, FetchError> {
        if self.outcomes.is_empty() {
            return Err(FetchError::Other("nothing to load".to_string()));
        }
        let i = self.next.fetch_add(1, Ordering::SeqCst) % self.outcomes.len();
        self.outcomes[i].clone().map_err(FetchError::Other)
    }
}

/// Service with both approaches, a keyword encoder and canned loads.
pub fn create_app(
    outcomes: Vec<Result<Vec<Document>, String>>,
    encoder: Arc<KeywordEncoder>,
) -> AppService {
    let mut registry = ScorerRegistry::new();
    registry
        .register(TERM_FREQUENCY_TOKEN, Arc::new(TermFrequencyScorer::new()))
        .register(
            SENTENCE_EMBEDDING,
            Arc::new(SemanticScorer::with_encoder(encoder, 0.3)),
        );

    AppService::new(Config::default(), registry, Box::new(StaticLoader::new(outcomes)))
}

pub fn search_request(query: &str, approach: Option<&str>) -> SearchRequest {
    SearchRequest {
        query: Some(query.to_string()),
        approach: approach.map(str::to_string),
        ..Default::default()
    }
}
