//! Semantic scorer over a lazily built vector index.
//!
//! - Lazy-loads the encoder on first use
//! - Builds the index the first time a snapshot is searched, and rebuilds
//!   it when the snapshot (generation, size, content) or encoder dimension
//!   no longer matches
//! - Builds are single-flight: concurrent callers wait for the build in
//!   progress and then reuse its result

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::config::SemanticSearchConfig;
use crate::corpus::Snapshot;
use crate::search::pagination::rank;
use crate::search::semantic::embeddings::{EmbeddingError, EmbeddingModel, Encoder};
use crate::search::semantic::index::{similarity_from_distance, VectorIndex};
use crate::search::{ScoreError, ScoredCandidate, Scorer};

type EncoderFactory = Box<dyn Fn() -> Result<Arc<dyn Encoder>, EmbeddingError> + Send + Sync>;

/// A vector index together with the snapshot it was built from.
pub struct BuiltIndex {
    generation: u64,
    fingerprint: [u8; 32],
    index: VectorIndex,
}

impl BuiltIndex {
    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    fn matches(&self, snapshot: &Snapshot, dimensions: usize) -> bool {
        self.generation == snapshot.generation()
            && self.index.len() == snapshot.len()
            && self.index.dimensions() == dimensions
            && &self.fingerprint == snapshot.fingerprint()
    }
}

/// Lifecycle of the installed index.
#[derive(Clone)]
pub enum IndexState {
    Empty,
    Building { generation: u64 },
    Ready(Arc<BuiltIndex>),
}

/// Embedding similarity scorer (`sentence_embedding`).
pub struct SemanticScorer {
    encoder: OnceCell<Arc<dyn Encoder>>,
    encoder_factory: EncoderFactory,
    threshold: f32,
    state: Mutex<IndexState>,
    /// Held for the whole duration of a build
    build_lock: Mutex<()>,
    /// Index for a snapshot older than the one in `state`, never installed
    superseded: Mutex<Option<Arc<BuiltIndex>>>,
    builds: AtomicU64,
}

impl SemanticScorer {
    /// Scorer backed by the configured fastembed model.
    ///
    /// The model is only loaded on the first semantic search.
    pub fn new(config: &SemanticSearchConfig, base_path: PathBuf) -> Self {
        let model = config.model.clone();
        let timeout = Duration::from_secs(config.download_timeout_secs);

        Self::with_factory(config.threshold, move || {
            log::info!("Initializing semantic search with model '{}'", model);
            let encoder = EmbeddingModel::new(&model, base_path.clone(), Some(timeout))?;
            Ok(Arc::new(encoder) as Arc<dyn Encoder>)
        })
    }

    /// Scorer using an already constructed encoder.
    #[cfg(test)]
    pub fn with_encoder(encoder: Arc<dyn Encoder>, threshold: f32) -> Self {
        let scorer = Self::with_factory(threshold, || {
            Err(EmbeddingError::InitFailed("encoder already set".to_string()))
        });
        let _ = scorer.encoder.set(encoder);
        scorer
    }

    fn with_factory<F>(threshold: f32, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Encoder>, EmbeddingError> + Send + Sync + 'static,
    {
        Self {
            encoder: OnceCell::new(),
            encoder_factory: Box::new(factory),
            threshold,
            state: Mutex::new(IndexState::Empty),
            build_lock: Mutex::new(()),
            superseded: Mutex::new(None),
            builds: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Number of index builds performed so far.
    #[cfg(test)]
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn state(&self) -> IndexState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn encoder(&self) -> Result<&Arc<dyn Encoder>, EmbeddingError> {
        self.encoder.get_or_try_init(|| (self.encoder_factory)())
    }

    /// The index for `snapshot`, building it if needed.
    pub fn ensure_index(&self, snapshot: &Snapshot) -> Result<Arc<BuiltIndex>, ScoreError> {
        let encoder = self.encoder()?;
        let dimensions = encoder.dimensions();

        if let Some(ready) = self.ready_for(snapshot, dimensions)? {
            return Ok(ready);
        }

        if self.is_superseded(snapshot)? {
            return self.superseded_index(snapshot, &**encoder);
        }

        let build = self
            .build_lock
            .lock()
            .map_err(|e| ScoreError::Internal(format!("Lock poisoned: {}", e)))?;

        // someone else may have built it while we waited
        if let Some(ready) = self.ready_for(snapshot, dimensions)? {
            return Ok(ready);
        }

        if self.is_superseded(snapshot)? {
            drop(build);
            return self.superseded_index(snapshot, &**encoder);
        }

        let previous = self.set_state(IndexState::Building {
            generation: snapshot.generation(),
        })?;

        match self.build(snapshot, &**encoder) {
            Ok(built) => {
                let built = Arc::new(built);
                // a request still holding an older snapshot must not roll
                // back the index of a newer one
                let next = match previous {
                    IndexState::Ready(current) if current.generation > built.generation => {
                        IndexState::Ready(current)
                    }
                    _ => IndexState::Ready(built.clone()),
                };
                self.set_state(next)?;
                Ok(built)
            }
            Err(err) => {
                self.set_state(previous)?;
                Err(err)
            }
        }
    }

    /// Whether a newer snapshot's index is installed or being built.
    fn is_superseded(&self, snapshot: &Snapshot) -> Result<bool, ScoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| ScoreError::Internal(format!("Lock poisoned: {}", e)))?;

        let current = match &*guard {
            IndexState::Empty => return Ok(false),
            IndexState::Building { generation } => *generation,
            IndexState::Ready(built) => built.generation,
        };
        Ok(current > snapshot.generation())
    }

    /// Index for a request still holding an older snapshot.
    ///
    /// Built without `build_lock` so it never delays the current snapshot,
    /// and kept aside so repeated searches of that snapshot reuse it.
    fn superseded_index(
        &self,
        snapshot: &Snapshot,
        encoder: &dyn Encoder,
    ) -> Result<Arc<BuiltIndex>, ScoreError> {
        let mut slot = self
            .superseded
            .lock()
            .map_err(|e| ScoreError::Internal(format!("Lock poisoned: {}", e)))?;

        if let Some(built) = slot.as_ref() {
            if built.matches(snapshot, encoder.dimensions()) {
                return Ok(built.clone());
            }
        }

        log::debug!(
            "generation {} is superseded; building a private index",
            snapshot.generation()
        );
        let built = Arc::new(self.build(snapshot, encoder)?);
        *slot = Some(built.clone());
        Ok(built)
    }

    fn ready_for(
        &self,
        snapshot: &Snapshot,
        dimensions: usize,
    ) -> Result<Option<Arc<BuiltIndex>>, ScoreError> {
        let guard = self
            .state
            .lock()
            .map_err(|e| ScoreError::Internal(format!("Lock poisoned: {}", e)))?;

        match &*guard {
            IndexState::Ready(built) if built.matches(snapshot, dimensions) => Ok(Some(built.clone())),
            _ => Ok(None),
        }
    }

    /// Swap in `next`, returning the previous state.
    fn set_state(&self, next: IndexState) -> Result<IndexState, ScoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| ScoreError::Internal(format!("Lock poisoned: {}", e)))?;
        Ok(std::mem::replace(&mut *guard, next))
    }

    fn build(&self, snapshot: &Snapshot, encoder: &dyn Encoder) -> Result<BuiltIndex, ScoreError> {
        let started = Instant::now();
        log::info!(
            "building vector index with {}: generation={} documents={} fingerprint={}",
            encoder.name(),
            snapshot.generation(),
            snapshot.len(),
            snapshot.short_fingerprint()
        );

        let texts: Vec<String> = snapshot.texts().map(str::to_string).collect();
        let embeddings = encoder.embed_batch(&texts)?;
        if embeddings.len() != texts.len() {
            return Err(ScoreError::Internal(format!(
                "encoder returned {} embeddings for {} documents",
                embeddings.len(),
                texts.len()
            )));
        }

        let mut index = VectorIndex::with_capacity(encoder.dimensions(), texts.len());
        for embedding in embeddings {
            index.insert(embedding)?;
        }

        self.builds.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "vector index ready: generation={} vectors={} in {:?}",
            snapshot.generation(),
            index.len(),
            started.elapsed()
        );

        Ok(BuiltIndex {
            generation: snapshot.generation(),
            fingerprint: *snapshot.fingerprint(),
            index,
        })
    }
}

impl Scorer for SemanticScorer {
    fn score(&self, query: &str, snapshot: &Snapshot) -> Result<Vec<ScoredCandidate>, ScoreError> {
        if snapshot.is_empty() {
            return Ok(vec![]);
        }

        let built = self.ensure_index(snapshot)?;
        let query_embedding = self.encoder()?.embed(query)?;

        // the threshold needs the whole similarity distribution, so k = corpus size
        let neighbors = built.index.search(&query_embedding, built.index.len())?;

        let mut candidates: Vec<ScoredCandidate> = neighbors
            .into_iter()
            .map(|neighbor| ScoredCandidate {
                position: neighbor.position,
                score: similarity_from_distance(neighbor.distance_sq),
            })
            .filter(|candidate| candidate.score >= self.threshold)
            .collect();

        rank(&mut candidates);

        log::debug!(
            "semantic: {} of {} above threshold {}",
            candidates.len(),
            snapshot.len(),
            self.threshold
        );

        Ok(candidates)
    }
}
