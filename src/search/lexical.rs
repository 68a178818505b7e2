//! Lexical (keyword) scoring.
//!
//! Scores each document by how often the query's tokens occur in it,
//! weighted by how many of the query's tokens it covers:
//!
//!   score = (raw_hits / |query|) * (matched_tokens / |query|)
//!
//! Repeated query tokens count every time, both in the hits and in `|query|`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;

use crate::corpus::Snapshot;
use crate::search::pagination::rank;
use crate::search::{ScoreError, ScoredCandidate, Scorer};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static word pattern"));

/// Split text into lowercase word tokens.
///
/// Word characters are Unicode-aware; everything else separates tokens.
/// No stemming and no stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD.find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Occurrence count per token.
pub fn term_frequencies(tokens: &[String]) -> HashMap<&str, usize> {
    let mut frequencies = HashMap::with_capacity(tokens.len());
    for token in tokens {
        *frequencies.entry(token.as_str()).or_insert(0) += 1;
    }
    frequencies
}

/// Score one text against pre-tokenized query tokens.
///
/// Returns `None` when no query token occurs in the text.
pub fn score_text(query_tokens: &[String], text: &str) -> Option<f32> {
    if query_tokens.is_empty() {
        return None;
    }

    let tokens = tokenize(text);
    if tokens.is_empty() {
        return None;
    }
    let frequencies = term_frequencies(&tokens);

    let mut raw_hits = 0usize;
    let mut matched_tokens = 0usize;
    for token in query_tokens {
        if let Some(count) = frequencies.get(token.as_str()) {
            raw_hits += count;
            matched_tokens += 1;
        }
    }

    if matched_tokens == 0 {
        return None;
    }

    let query_len = query_tokens.len() as f32;
    Some((raw_hits as f32 / query_len) * (matched_tokens as f32 / query_len))
}

/// Term frequency / token overlap scorer (`term_frequency_token`).
#[derive(Debug, Default)]
pub struct TermFrequencyScorer;

impl TermFrequencyScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Scorer for TermFrequencyScorer {
    fn score(&self, query: &str, snapshot: &Snapshot) -> Result<Vec<ScoredCandidate>, ScoreError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(vec![]);
        }

        // indexed collect keeps corpus order, the stable sort relies on it
        let mut candidates: Vec<ScoredCandidate> = (0..snapshot.len())
            .into_par_iter()
            .filter_map(|position| {
                score_text(&query_tokens, snapshot.text(position))
                    .map(|score| ScoredCandidate { position, score })
            })
            .collect();

        rank(&mut candidates);

        log::debug!(
            "lexical: query_tokens={} matched={} of {}",
            query_tokens.len(),
            candidates.len(),
            snapshot.len()
        );

        Ok(candidates)
    }
}
