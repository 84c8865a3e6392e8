use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Request to {url} failed: {source}")]
    Fetch { url: String, source: reqwest::Error },

    #[error("Request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Cannot write or read {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Database error")]
    Ledger(#[from] sqlx::error::Error),
}

impl CrawlerError {
    /// Coarse class used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlerError::Fetch { .. } | CrawlerError::Status { .. } => "fetch",
            CrawlerError::Persistence { .. } | CrawlerError::Json { .. } => "persistence",
            CrawlerError::Ledger(_) => "ledger",
        }
    }
}
