use crate::loader::FetchError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Query parameter \"q\" is required")]
    MissingQuery,

    #[error("Unknown approach: {approach}. Available approaches: {available}")]
    UnknownApproach { approach: String, available: String },

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller sent a bad request, as opposed to us failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::MissingQuery | AppError::UnknownApproach { .. })
    }
}
