//! Ranking and pagination of scored candidates.

use serde::Serialize;

use crate::corpus::{Document, Snapshot};
use crate::search::ScoredCandidate;

/// The uniform result envelope returned by every approach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPage {
    pub total: usize,
    pub items: Vec<Document>,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    /// Why the page is empty when no search actually ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResultPage {
    /// An empty page explaining why nothing was searched.
    pub fn empty(page: usize, per_page: usize, message: impl Into<String>) -> Self {
        Self {
            total: 0,
            items: vec![],
            page,
            per_page,
            total_pages: 0,
            message: Some(message.into()),
        }
    }
}

/// Sort by score descending. The sort is stable, so equal scores keep
/// corpus order.
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// Cut the `page`-th window (1-based) out of already ranked candidates.
///
/// A window past the end is empty, never an error.
pub fn paginate(
    candidates: &[ScoredCandidate],
    snapshot: &Snapshot,
    page: usize,
    per_page: usize,
) -> ResultPage {
    let total = candidates.len();
    let start = page.saturating_sub(1).saturating_mul(per_page);

    let items = candidates
        .iter()
        .skip(start)
        .take(per_page)
        .filter_map(|candidate| snapshot.get(candidate.position).cloned())
        .collect();

    ResultPage {
        total,
        items,
        page,
        per_page,
        total_pages: total_pages(total, per_page),
        message: None,
    }
}
