use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use wiki_fauna_crawler::{run_crawl, CrawlConfig, ResumePolicy, TopicFilter};

/// Crawls the animal part of Wikipedia's category graph into a JSON file.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Root category page
    #[arg(long)]
    seed: Option<String>,

    /// Ignore the existing checkpoint and start with no records
    #[arg(long)]
    fresh: bool,

    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Minimum milliseconds between two requests
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Pages extracted concurrently
    #[arg(long, default_value_t = 1)]
    workers: usize,

    #[arg(long, value_name = "PATH")]
    ledger: Option<PathBuf>,

    /// Do not record failed URLs
    #[arg(long, conflicts_with = "ledger")]
    no_ledger: bool,

    /// Replaces the default category keywords; repeatable
    #[arg(long = "category-keyword", value_name = "KEYWORD")]
    category_keywords: Vec<String>,

    /// Replaces the default excluded namespaces; repeatable
    #[arg(long = "exclude-keyword", value_name = "KEYWORD")]
    excluded_keywords: Vec<String>,

    /// Replaces the default page keywords; repeatable
    #[arg(long = "page-keyword", value_name = "KEYWORD")]
    page_keywords: Vec<String>,
}

impl Cli {
    fn into_config(self) -> CrawlConfig {
        let defaults = CrawlConfig::default();

        let mut filter = TopicFilter::default();
        if !self.category_keywords.is_empty() {
            filter = filter.with_category_keywords(&self.category_keywords);
        }
        if !self.excluded_keywords.is_empty() {
            filter = filter.with_excluded_keywords(&self.excluded_keywords);
        }
        if !self.page_keywords.is_empty() {
            filter = filter.with_page_keywords(&self.page_keywords);
        }

        let ledger_path = if self.no_ledger {
            None
        } else {
            self.ledger.or(defaults.ledger_path.clone())
        };

        CrawlConfig {
            seed: self.seed.unwrap_or(defaults.seed.clone()),
            checkpoint_path: self.checkpoint.unwrap_or(defaults.checkpoint_path.clone()),
            output_path: self.output.unwrap_or(defaults.output_path.clone()),
            resume: if self.fresh {
                ResumePolicy::Fresh
            } else {
                ResumePolicy::Resume
            },
            request_delay: Duration::from_millis(self.delay_ms),
            page_workers: self.workers,
            ledger_path,
            filter,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let config = Cli::parse().into_config();
    let output_path = config.output_path.clone();

    match run_crawl(config).await {
        Ok(stats) => {
            info!(
                "Done: {} categories, {} pages, {} new records, {} failures. Output in {}",
                stats.categories_processed,
                stats.pages_processed,
                stats.records_added,
                stats.failures,
                output_path.display()
            );
            Ok(())
        }
        Err(e) => {
            error!(kind = e.kind(), "{}", e);
            Err(e.into())
        }
    }
}
