//! Named scorer lookup.

use std::sync::Arc;

use crate::search::Scorer;

pub const TERM_FREQUENCY_TOKEN: &str = "term_frequency_token";
pub const SENTENCE_EMBEDDING: &str = "sentence_embedding";

/// Approach identifier -> scorer, in registration order.
#[derive(Default, Clone)]
pub struct ScorerRegistry {
    scorers: Vec<(String, Arc<dyn Scorer>)>,
}

impl ScorerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scorer` under `name`, replacing any scorer already there.
    pub fn register(&mut self, name: &str, scorer: Arc<dyn Scorer>) -> &mut Self {
        match self.scorers.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = scorer,
            None => self.scorers.push((name.to_string(), scorer)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scorer>> {
        self.scorers
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, scorer)| scorer.clone())
    }

    pub fn names(&self) -> Vec<&str> {
        self.scorers.iter().map(|(name, _)| name.as_str()).collect()
    }
}
