use crate::{
    config::{CheckpointCadence, CrawlConfig, ResumePolicy},
    fetch::Throttled,
    ledger::FailureLedger,
    state::{self, CrawlState},
    wiki::{CategoryExplorer, Extraction, PageExtractor},
    CrawlerError, Fetcher,
};
use futures::{stream, StreamExt};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, info, warn};

const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Exploring(String),
    ExtractingPages(usize),
    Checkpointing,
    Drained,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStats {
    pub categories_processed: usize,
    pub pages_found: usize,
    pub pages_processed: usize,
    pub records_added: usize,
    pub failures: usize,
}

/// Walks the topical part of the category graph breadth-first and extracts
/// every candidate page once.
///
/// Only the records survive a restart. The frontier is rebuilt by exploring
/// from the seed again, so categories that were pending at interruption are
/// reached only if they are still linked from the seed's subgraph.
pub struct CrawlEngine<F> {
    fetcher: Throttled<F>,
    config: CrawlConfig,
    state: CrawlState,
    frontier: VecDeque<String>,
    queued: HashSet<String>,
    ledger: Option<FailureLedger>,
    phase: Phase,
    stats: CrawlStats,
}

impl<F: Fetcher> CrawlEngine<F> {
    /// Builds the engine, rehydrating state from the checkpoint if the resume
    /// policy asks for it.
    ///
    /// An unreadable checkpoint is moved aside and the run starts empty. If it
    /// cannot be moved, starting would overwrite it, so that is an error.
    pub async fn start(fetcher: F, config: CrawlConfig) -> Result<Self, CrawlerError> {
        let state = match config.resume {
            ResumePolicy::Fresh => {
                info!("Starting fresh, ignoring {}", config.checkpoint_path.display());
                CrawlState::new()
            }
            ResumePolicy::Resume => match CrawlState::load(&config.checkpoint_path).await {
                Ok(state) => {
                    info!("Continuing from {} existing records", state.records().len());
                    state
                }
                Err(e) => {
                    let moved = state::quarantine(&config.checkpoint_path).await?;
                    warn!(
                        stage = "checkpoint",
                        kind = e.kind(),
                        "Starting empty, unreadable checkpoint kept at {}: {}",
                        moved.display(),
                        e
                    );
                    CrawlState::new()
                }
            },
        };
        Ok(Self::with_state(fetcher, config, state))
    }

    /// The seed is queued unless the state already visited it, in which case
    /// the run drains immediately.
    pub fn with_state(fetcher: F, config: CrawlConfig, state: CrawlState) -> Self {
        let mut engine = CrawlEngine {
            fetcher: Throttled::new(fetcher, config.request_delay),
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            ledger: None,
            phase: Phase::Idle,
            stats: CrawlStats::default(),
            state,
            config,
        };
        let seed = engine.config.seed.clone();
        engine.enqueue(seed);
        engine
    }

    pub fn with_ledger(mut self, ledger: FailureLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn stats(&self) -> CrawlStats {
        self.stats
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    fn enqueue(&mut self, category: String) -> bool {
        if self.state.is_category_visited(&category) || !self.queued.insert(category.clone()) {
            return false;
        }
        self.frontier.push_back(category);
        true
    }

    pub async fn run(&mut self) -> CrawlStats {
        info!(
            "Crawling from {} with {} records already held",
            self.config.seed,
            self.state.records().len()
        );

        while let Some(category) = self.frontier.pop_front() {
            self.queued.remove(&category);
            self.process_category(category).await;
        }

        self.phase = Phase::Checkpointing;
        self.checkpoint().await;
        self.phase = Phase::Drained;

        info!(
            categories = self.stats.categories_processed,
            pages = self.stats.pages_processed,
            added = self.stats.records_added,
            failures = self.stats.failures,
            "Crawl drained with {} records",
            self.state.records().len()
        );
        self.stats
    }

    async fn process_category(&mut self, category: String) {
        if !self.state.mark_category(&category) {
            return;
        }
        self.stats.categories_processed += 1;
        self.phase = Phase::Exploring(category.clone());
        debug!("Phase {:?}", self.phase);

        let explored = CategoryExplorer::new(&self.fetcher, &self.config.filter, &self.config.base_url)
            .with_max_pagination_pages(self.config.max_pagination_pages)
            .explore(&category)
            .await;

        match explored {
            Ok(listing) => {
                for (url, reason) in &listing.skipped {
                    self.stats.failures += 1;
                    self.note_failure(url, "pagination", reason).await;
                }
                let discovered = listing
                    .subcategories
                    .into_iter()
                    .filter(|sub| self.enqueue(sub.clone()))
                    .count();
                debug!("{} new categories under {}", discovered, category);
                self.extract_pages(listing.pages).await;
            }
            Err(e) => {
                warn!(url = category.as_str(), stage = "category", kind = e.kind(), "{}", e);
                self.stats.failures += 1;
                self.note_failure(&category, "category", &e.to_string()).await;
            }
        }

        let processed = self.stats.categories_processed;
        if processed % PROGRESS_EVERY == 0 {
            self.report_progress(&category);
        }
        if CheckpointCadence::is_due(self.config.cadence.categories, processed)
            && !self.state.records().is_empty()
        {
            self.phase = Phase::Checkpointing;
            self.checkpoint().await;
        }
    }

    /// Each page is marked visited before it is dispatched, so no url is
    /// extracted twice even with several workers in flight. Records are
    /// appended here, one at a time, and checkpoints see whole snapshots.
    async fn extract_pages(&mut self, pages: BTreeSet<String>) {
        let fresh: Vec<String> = pages
            .into_iter()
            .filter(|url| self.state.mark_page(url))
            .collect();
        if fresh.is_empty() {
            return;
        }
        let batch = fresh.len();
        self.stats.pages_found += batch;
        self.phase = Phase::ExtractingPages(batch);

        let extractor = PageExtractor::new(&self.fetcher, &self.config.filter);
        let extractor = &extractor;
        let mut outcomes = stream::iter(fresh)
            .map(move |url| async move {
                let extraction = extractor.extract(&url).await;
                (url, extraction)
            })
            .buffer_unordered(self.config.page_workers.max(1));

        while let Some((url, extraction)) = outcomes.next().await {
            self.stats.pages_processed += 1;
            match extraction {
                Extraction::Accepted(record) => {
                    info!("[{}] Added {}", self.state.records().len() + 1, record.title);
                    self.state.push_record(record);
                    self.stats.records_added += 1;
                    if let Some(ledger) = &self.ledger {
                        if let Err(e) = ledger.resolve(&url).await {
                            warn!(url = url.as_str(), stage = "ledger", "{}", e);
                        }
                    }

                    if CheckpointCadence::is_due(self.config.cadence.records, self.state.records().len()) {
                        self.report_progress(&url);
                        self.phase = Phase::Checkpointing;
                        self.checkpoint().await;
                        self.phase = Phase::ExtractingPages(batch);
                    }
                }
                Extraction::Rejected(rejection) => {
                    if rejection.is_failure() {
                        self.stats.failures += 1;
                        self.note_failure(&url, "page", &rejection.to_string()).await;
                    }
                }
            }
        }
    }

    /// Persistence failures are logged and the run carries on in memory.
    async fn checkpoint(&self) {
        for path in [&self.config.checkpoint_path, &self.config.output_path] {
            if let Err(e) = self.state.persist(path).await {
                warn!(stage = "checkpoint", kind = e.kind(), "{}", e);
            }
        }
    }

    async fn note_failure(&self, url: &str, stage: &str, reason: &str) {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record(url, stage, reason).await {
                warn!(url, stage = "ledger", "{}", e);
            }
        }
    }

    fn report_progress(&self, current: &str) {
        info!(
            categories_processed = self.stats.categories_processed,
            categories_remaining = self.frontier.len(),
            pages_found = self.stats.pages_found,
            pages_processed = self.stats.pages_processed,
            records = self.state.records().len(),
            "Progress at {}",
            current
        );
    }
}
