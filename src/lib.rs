use tracing::{info, warn};

pub mod config;
pub mod engine;
pub mod fetch;
pub mod filter;
pub mod ledger;
pub mod state;
pub mod wiki;

mod error;

#[cfg(test)]
mod testing;

pub use config::{CheckpointCadence, CrawlConfig, ResumePolicy};
pub use engine::{CrawlEngine, CrawlStats, Phase};
pub use error::CrawlerError;
pub use filter::TopicFilter;
pub use state::CrawlState;
pub use wiki::ContentRecord;

/// Source of raw page markup. Callers parse the returned text themselves and
/// keep the parsed document out of any await point.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError>;
}

/// Crawls over HTTP until the category frontier is exhausted. Only a client
/// that cannot be built, or a damaged checkpoint that cannot be moved aside,
/// is fatal. Everything after that degrades to warnings.
pub async fn run_crawl(config: CrawlConfig) -> Result<CrawlStats, CrawlerError> {
    let fetcher = fetch::HttpFetcher::new(&config.user_agent)?;

    let ledger = match &config.ledger_path {
        Some(path) => match ledger::FailureLedger::open(path).await {
            Ok(ledger) => {
                if let Ok(count) = ledger.count().await {
                    info!("Failure ledger at {} holds {} entries", path.display(), count);
                }
                Some(ledger)
            }
            Err(e) => {
                warn!(stage = "ledger", kind = e.kind(), "Running without ledger: {}", e);
                None
            }
        },
        None => None,
    };

    let mut engine = CrawlEngine::start(fetcher, config).await?;
    if let Some(ledger) = ledger {
        engine = engine.with_ledger(ledger);
    }
    Ok(engine.run().await)
}
