//! Durable list of URLs that failed to fetch or parse, kept so they can be
//! re-run by hand. A later success for the same URL clears its entry.

use crate::CrawlerError;
use chrono::{DateTime, FixedOffset, Local};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::Path;

const TABLE: &str = "crawl_failures";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub url: String,
    pub stage: String,
    pub reason: String,
    pub created_at: DateTime<FixedOffset>,
}

/// One row per URL. Recording a URL again replaces its stage and reason.
pub struct FailureLedger {
    pool: SqlitePool,
}

impl FailureLedger {
    pub async fn open(path: &Path) -> Result<FailureLedger, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (
                url TEXT PRIMARY KEY,
                stage TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at DATETIME NOT NULL
             )"
        ))
        .execute(&pool)
        .await?;
        tracing::debug!("Use table {} in {}", TABLE, path.display());
        Ok(FailureLedger { pool })
    }

    pub async fn record(&self, url: &str, stage: &str, reason: &str) -> Result<(), CrawlerError> {
        let now: DateTime<FixedOffset> = Local::now().into();
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {TABLE} (url, stage, reason, created_at) VALUES (?, ?, ?, ?)"
        ))
        .bind(url.trim())
        .bind(stage)
        .bind(reason)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drops the entry of a URL that has since been extracted.
    pub async fn resolve(&self, url: &str) -> Result<(), CrawlerError> {
        sqlx::query(&format!("DELETE FROM {TABLE} WHERE url = ?"))
            .bind(url.trim())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u32, CrawlerError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get(0)?)
    }

    /// Oldest first, optionally restricted to one stage.
    pub async fn entries(&self, stage: Option<&str>) -> Result<Vec<FailureEntry>, CrawlerError> {
        let select = format!("SELECT url, stage, reason, created_at FROM {TABLE}");
        let rows = match stage {
            Some(stage) => {
                sqlx::query(&format!("{select} WHERE stage = ? ORDER BY created_at"))
                    .bind(stage)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("{select} ORDER BY created_at"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| -> Result<FailureEntry, CrawlerError> {
                Ok(FailureEntry {
                    url: row.try_get("url")?,
                    stage: row.try_get("stage")?,
                    reason: row.try_get("reason")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.db");

        assert!(!path.is_file());
        let ledger = FailureLedger::open(&path).await.unwrap();
        assert!(path.is_file());
        ledger
            .record(" https://en.wikipedia.org/wiki/Okapi ", "page", "timeout")
            .await
            .unwrap();
        drop(ledger);

        // reopening keeps the existing rows
        let ledger = FailureLedger::open(&path).await.unwrap();
        let entries = ledger.entries(None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://en.wikipedia.org/wiki/Okapi");
        assert_eq!(entries[0].stage, "page");
    }

    #[tokio::test]
    async fn record_replace_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FailureLedger::open(&dir.path().join("failures.db")).await.unwrap();

        ledger.record("https://en.wikipedia.org/wiki/Lion", "page", "timeout").await.unwrap();
        ledger
            .record("https://en.wikipedia.org/wiki/Category:Felidae", "category", "503")
            .await
            .unwrap();
        ledger.record("https://en.wikipedia.org/wiki/Lion", "page", "no title heading").await.unwrap();
        assert_eq!(ledger.count().await.unwrap(), 2);

        let pages = ledger.entries(Some("page")).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://en.wikipedia.org/wiki/Lion");
        assert_eq!(pages[0].reason, "no title heading");
        assert_eq!(ledger.entries(None).await.unwrap().len(), 2);

        ledger.resolve("https://en.wikipedia.org/wiki/Lion").await.unwrap();
        assert_eq!(ledger.count().await.unwrap(), 1);
        assert!(ledger.entries(Some("page")).await.unwrap().is_empty());
    }
}
