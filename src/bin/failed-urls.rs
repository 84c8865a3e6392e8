use clap::Parser;
use std::path::PathBuf;
use wiki_fauna_crawler::ledger::FailureLedger;

/// Prints the URLs that failed during earlier crawls, oldest first.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[arg(long, value_name = "PATH", default_value = "crawl_failures.db")]
    ledger: PathBuf,

    /// Only one stage: category, pagination or page
    #[arg(long)]
    stage: Option<String>,

    /// Print bare URLs, one per line
    #[arg(long)]
    urls_only: bool,
}

async fn list_failed(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ledger = FailureLedger::open(&cli.ledger).await?;
    let entries = ledger.entries(cli.stage.as_deref()).await?;

    for entry in &entries {
        if cli.urls_only {
            println!("{}", entry.url);
        } else {
            println!(
                "{}\t{}\t{}\t{}",
                entry.created_at.to_rfc3339(),
                entry.stage,
                entry.url,
                entry.reason
            );
        }
    }
    if !cli.urls_only {
        eprintln!("{} entries", entries.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    list_failed(Cli::parse()).await
}
