//! Semantic search over sentence embeddings.
//!
//! # Architecture
//!
//! - `embeddings`: the `Encoder` seam and its fastembed implementation
//! - `index`: flat vector index over unit vectors, L2 distance
//! - `service`: the `sentence_embedding` scorer and its index lifecycle

pub mod embeddings;
mod index;
mod service;

pub use embeddings::{EmbeddingError, Encoder};
pub use index::IndexError;
pub use service::SemanticScorer;

/// Default similarity threshold for semantic search
pub const DEFAULT_THRESHOLD: f32 = 0.3;
