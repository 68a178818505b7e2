//! In-memory corpus of documents.
//!
//! The store hands out immutable snapshots. A reload builds a whole new
//! snapshot and swaps it in; readers holding the old one keep using it
//! until they are done.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, RwLock};

/// A single searchable record.
///
/// Only the text field is interpreted; every other field is passed through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(serde_json::Map<String, serde_json::Value>);

impl Document {
    /// Searchable text stored under `field`, or "" when absent or not a string.
    pub fn text(&self, field: &str) -> &str {
        self.0
            .get(field)
            .and_then(|value| value.as_str())
            .unwrap_or_default()
    }
}

/// An immutable, ordered set of documents.
///
/// Document identity is its position in `documents`.
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    fingerprint: [u8; 32],
    text_field: String,
    documents: Arc<[Document]>,
}

impl Snapshot {
    fn new(generation: u64, text_field: &str, documents: Vec<Document>) -> Self {
        let fingerprint = fingerprint(text_field, &documents);
        Self {
            generation,
            fingerprint,
            text_field: text_field.to_string(),
            documents: documents.into(),
        }
    }

    /// Monotonic reload counter; 0 means nothing was ever loaded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn get(&self, position: usize) -> Option<&Document> {
        self.documents.get(position)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Searchable text of the document at `position`.
    pub fn text(&self, position: usize) -> &str {
        self.documents
            .get(position)
            .map(|doc| doc.text(&self.text_field))
            .unwrap_or_default()
    }

    /// Searchable text of every document, in corpus order.
    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.documents.iter().map(|doc| doc.text(&self.text_field))
    }

    /// Short hex prefix of the fingerprint, for logs.
    pub fn short_fingerprint(&self) -> String {
        self.fingerprint[..6]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn fingerprint(text_field: &str, documents: &[Document]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for doc in documents {
        let text = doc.text(text_field);
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().into()
}

/// Owner of the current snapshot.
pub struct CorpusStore {
    text_field: String,
    current: RwLock<Arc<Snapshot>>,
}

impl CorpusStore {
    pub fn new(text_field: &str) -> Self {
        Self {
            text_field: text_field.to_string(),
            current: RwLock::new(Arc::new(Snapshot::new(0, text_field, vec![]))),
        }
    }

    /// The snapshot every part of one search should read from.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Atomically replace the whole corpus.
    pub fn replace(&self, documents: Vec<Document>) -> Arc<Snapshot> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let snapshot = Arc::new(Snapshot::new(
            guard.generation + 1,
            &self.text_field,
            documents,
        ));
        *guard = snapshot.clone();

        log::info!(
            "corpus replaced: generation={} documents={} fingerprint={}",
            snapshot.generation(),
            snapshot.len(),
            snapshot.short_fingerprint()
        );

        snapshot
    }

    #[cfg(test)]
    pub fn is_loaded(&self) -> bool {
        self.snapshot().generation() > 0
    }
}
