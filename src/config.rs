use crate::filter::TopicFilter;
use crate::wiki::{BASE_URL, DEFAULT_SEED};
use std::path::PathBuf;
use std::time::Duration;

/// Whether a run picks up the records of an earlier, interrupted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Fresh,
    Resume,
}

/// How often the record set is flushed to disk. A zero disables that trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointCadence {
    /// Every n-th accepted record.
    pub records: usize,
    /// Every n-th explored category.
    pub categories: usize,
}

impl Default for CheckpointCadence {
    fn default() -> Self {
        CheckpointCadence {
            records: 10,
            categories: 20,
        }
    }
}

impl CheckpointCadence {
    pub(crate) fn is_due(every: usize, count: usize) -> bool {
        every > 0 && count > 0 && count % every == 0
    }
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    pub seed: String,
    pub checkpoint_path: PathBuf,
    pub output_path: PathBuf,
    pub resume: ResumePolicy,
    pub cadence: CheckpointCadence,
    /// Minimum spacing between any two outbound requests.
    pub request_delay: Duration,
    pub page_workers: usize,
    pub max_pagination_pages: usize,
    pub user_agent: String,
    pub ledger_path: Option<PathBuf>,
    pub filter: TopicFilter,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            base_url: BASE_URL.to_string(),
            seed: DEFAULT_SEED.to_string(),
            checkpoint_path: PathBuf::from("animal_data_partial.json"),
            output_path: PathBuf::from("animal_data.json"),
            resume: ResumePolicy::Resume,
            cadence: CheckpointCadence::default(),
            request_delay: Duration::from_secs(1),
            page_workers: 1,
            max_pagination_pages: crate::wiki::DEFAULT_MAX_PAGINATION_PAGES,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            ledger_path: Some(PathBuf::from("crawl_failures.db")),
            filter: TopicFilter::default(),
        }
    }
}
