use std::time::Instant;

use serde::Serialize;

use crate::{
    app::errors::AppError,
    config::Config,
    corpus::CorpusStore,
    loader::CorpusLoader,
    search::{paginate, ResultPage, ScorerRegistry},
};

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

const NO_DATA_MESSAGE: &str = "No data loaded. Please call /load_data first.";
const INDEX_FAILURE_MESSAGE: &str = "Failed to initialize search index.";

/// Raw search parameters as the caller sent them.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub approach: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub query: String,
    pub approach: String,
    pub processing_time_ms: u64,
    #[serde(flatten)]
    pub results: ResultPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub documents: usize,
    pub generation: u64,
}

impl LoadSummary {
    pub fn message(&self) -> String {
        format!("Successfully loaded {} messages", self.documents)
    }
}

/// Page number, falling back to the first page for anything below 1.
pub fn clamp_page(page: Option<i64>) -> usize {
    match page {
        Some(page) if page >= 1 => usize::try_from(page).unwrap_or(DEFAULT_PAGE),
        _ => DEFAULT_PAGE,
    }
}

/// Page size, falling back to the default for anything outside 1..=100.
pub fn clamp_per_page(per_page: Option<i64>) -> usize {
    match per_page {
        Some(per_page) if (1..=MAX_PER_PAGE as i64).contains(&per_page) => per_page as usize,
        _ => DEFAULT_PER_PAGE,
    }
}

pub struct AppService {
    config: Config,
    store: CorpusStore,
    registry: ScorerRegistry,
    loader: Box<dyn CorpusLoader>,
}

impl AppService {
    pub fn new(config: Config, registry: ScorerRegistry, loader: Box<dyn CorpusLoader>) -> Self {
        let store = CorpusStore::new(&config.corpus.text_field);
        Self {
            config,
            store,
            registry,
            loader,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    #[cfg(test)]
    pub fn registry(&self) -> &ScorerRegistry {
        &self.registry
    }

    /// Fetch the corpus and swap it in.
    ///
    /// On failure the current corpus stays in place.
    pub fn load_data(&self) -> Result<LoadSummary, AppError> {
        let documents = self.loader.fetch()?;
        let snapshot = self.store.replace(documents);

        Ok(LoadSummary {
            documents: snapshot.len(),
            generation: snapshot.generation(),
        })
    }

    pub fn search(&self, request: SearchRequest) -> Result<SearchResponse, AppError> {
        let query = request.query.as_deref().unwrap_or_default().trim();
        if query.is_empty() {
            return Err(AppError::MissingQuery);
        }

        let page = clamp_page(request.page);
        let per_page = clamp_per_page(request.per_page);

        let approach = request
            .approach
            .unwrap_or_else(|| self.config.search.default_approach.clone());
        let scorer = self
            .registry
            .get(&approach)
            .ok_or_else(|| AppError::UnknownApproach {
                approach: approach.clone(),
                available: self.registry.names().join(", "),
            })?;

        let started = Instant::now();

        // one snapshot for the whole request
        let snapshot = self.store.snapshot();

        let results = if snapshot.is_empty() {
            ResultPage::empty(page, per_page, NO_DATA_MESSAGE)
        } else {
            match scorer.score(query, &snapshot) {
                Ok(candidates) => paginate(&candidates, &snapshot, page, per_page),
                Err(err) => {
                    log::error!("{approach} search failed: {err}");
                    ResultPage::empty(page, per_page, INDEX_FAILURE_MESSAGE)
                }
            }
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "search approach={approach} page={page} per_page={per_page} total={} in {processing_time_ms}ms",
            results.total
        );

        Ok(SearchResponse {
            status: "success",
            query: query.to_string(),
            approach,
            processing_time_ms,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(-4)), 1);
        assert_eq!(clamp_page(Some(1)), 1);
        assert_eq!(clamp_page(Some(7)), 7);
    }

    #[test]
    fn test_clamp_per_page() {
        assert_eq!(clamp_per_page(None), 10);
        assert_eq!(clamp_per_page(Some(0)), 10);
        assert_eq!(clamp_per_page(Some(-1)), 10);
        assert_eq!(clamp_per_page(Some(1)), 1);
        assert_eq!(clamp_per_page(Some(100)), 100);
        assert_eq!(clamp_per_page(Some(101)), 10);
        assert_eq!(clamp_per_page(Some(25)), 25);
    }

    #[test]
    fn test_load_summary_message() {
        let summary = LoadSummary {
            documents: 3349,
            generation: 1,
        };
        assert_eq!(summary.message(), "Successfully loaded 3349 messages");
    }
}
