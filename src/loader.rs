//! Fetching the corpus from the remote messages API.
//!
//! The API is paged with `skip`/`limit` and answers `{items, total}`.
//! Loading keeps requesting pages until a page comes back empty or the
//! running count reaches the advertised total.

use std::time::Duration;

use serde::Deserialize;

use crate::config::CorpusConfig;
use crate::corpus::Document;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to fetch data: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to fetch data: {0}")]
    Other(String),
}

/// Source of a complete corpus.
pub trait CorpusLoader: Send + Sync {
    /// Fetch every document, in source order.
    fn fetch(&self) -> Result<Vec<Document>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    items: Vec<Document>,
    #[serde(default)]
    total: usize,
}

pub struct HttpCorpusLoader {
    source_url: String,
    batch_size: usize,
    timeout: Duration,
}

impl HttpCorpusLoader {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            source_url: config.source_url.clone(),
            batch_size: config.batch_size,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        }
    }

    fn fetch_page(
        &self,
        client: &reqwest::blocking::Client,
        skip: usize,
    ) -> Result<MessagesPage, FetchError> {
        log::info!("{}?skip={skip}&limit={}", self.source_url, self.batch_size);

        let page = client
            .get(&self.source_url)
            .query(&[("skip", skip), ("limit", self.batch_size)])
            .send()?
            .error_for_status()?
            .json::<MessagesPage>()?;

        Ok(page)
    }
}

impl CorpusLoader for HttpCorpusLoader {
    fn fetch(&self) -> Result<Vec<Document>, FetchError> {
        if self.batch_size == 0 {
            return Err(FetchError::Other("batch size must be greater than 0".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let mut documents = Vec::new();
        let mut skip = 0;

        loop {
            let page = self.fetch_page(&client, skip)?;
            if page.items.is_empty() {
                break;
            }

            documents.extend(page.items);

            if documents.len() >= page.total {
                break;
            }

            skip += self.batch_size;
        }

        log::info!("fetched {} documents from {}", documents.len(), self.source_url);

        Ok(documents)
    }
}
