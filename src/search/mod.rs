//! Query scoring and result shaping.
//!
//! # Architecture
//!
//! - `lexical`: term-frequency overlap scorer
//! - `semantic`: embedding model, vector index and the semantic scorer
//! - `pagination`: ranking, page windows and the result envelope
//! - `registry`: named scorers, looked up by approach identifier

pub mod lexical;
pub mod pagination;
pub mod registry;
pub mod semantic;

use crate::corpus::Snapshot;
use crate::search::semantic::{EmbeddingError, IndexError};

pub use lexical::TermFrequencyScorer;
pub use pagination::{paginate, ResultPage};
pub use registry::{ScorerRegistry, SENTENCE_EMBEDDING, TERM_FREQUENCY_TOKEN};
pub use semantic::SemanticScorer;

/// A document position in a snapshot together with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub position: usize,
    pub score: f32,
}

/// Errors a scorer can hit while producing candidates.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A search strategy.
///
/// Implementations return candidates for `snapshot` ordered by score
/// descending, ties in corpus order.
pub trait Scorer: Send + Sync {
    fn score(&self, query: &str, snapshot: &Snapshot) -> Result<Vec<ScoredCandidate>, ScoreError>;
}
