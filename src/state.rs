use crate::{wiki::ContentRecord, CrawlerError};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Visited sets plus the accepted records. Both sets only ever grow, and every
/// record's url is in `visited_pages`.
///
/// Only the records are checkpointed. On reload the visited pages are rebuilt
/// from them and the visited categories start empty, so a resumed run walks
/// the category graph again from the seed and skips pages it already holds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlState {
    visited_categories: HashSet<String>,
    visited_pages: HashSet<String>,
    records: Vec<ContentRecord>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ContentRecord>) -> Self {
        CrawlState {
            visited_categories: HashSet::new(),
            visited_pages: records.iter().map(|r| r.url.clone()).collect(),
            records,
        }
    }

    /// A missing checkpoint is an empty state, not an error.
    pub async fn load(path: &Path) -> Result<Self, CrawlerError> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CrawlerError::Persistence {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let records: Vec<ContentRecord> =
            serde_json::from_slice(&raw).map_err(|source| CrawlerError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_records(records))
    }

    /// Writes every record to a sibling temp file and renames it into place,
    /// so a crash mid-write leaves the previous snapshot intact.
    pub async fn persist(&self, path: &Path) -> Result<(), CrawlerError> {
        let json = serde_json::to_vec_pretty(&self.records).map_err(|source| CrawlerError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let staging = staging_path(path);
        let io_error = |source| CrawlerError::Persistence {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&staging, json).await.map_err(io_error)?;
        fs::rename(&staging, path).await.map_err(io_error)?;
        debug!("Saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Test-and-set: true when the category was not visited before.
    pub fn mark_category(&mut self, url: &str) -> bool {
        self.visited_categories.insert(url.to_string())
    }

    /// Test-and-set: true when the page was not visited before.
    pub fn mark_page(&mut self, url: &str) -> bool {
        self.visited_pages.insert(url.to_string())
    }

    pub fn is_category_visited(&self, url: &str) -> bool {
        self.visited_categories.contains(url)
    }

    pub fn push_record(&mut self, record: ContentRecord) {
        self.visited_pages.insert(record.url.clone());
        self.records.push(record);
    }

    pub fn records(&self) -> &[ContentRecord] {
        &self.records
    }

    pub fn visited_pages(&self) -> &HashSet<String> {
        &self.visited_pages
    }

    pub fn visited_categories(&self) -> &HashSet<String> {
        &self.visited_categories
    }
}

/// Moves an unreadable checkpoint out of the way so the next persist cannot
/// replace it. Returns where it went.
pub async fn quarantine(path: &Path) -> Result<PathBuf, CrawlerError> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S")));
    let target = path.with_file_name(name);
    fs::rename(path, &target)
        .await
        .map_err(|source| CrawlerError::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(target)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> ContentRecord {
        ContentRecord {
            title: name.to_string(),
            url: format!("https://en.wikipedia.org/wiki/{name}"),
            body: format!("The {name} is an animal."),
            categories: vec!["Animals".to_string(), "Fauna of Ñuble".to_string()],
            extracted_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animal_data_partial.json");

        let mut state = CrawlState::new();
        state.mark_category("https://en.wikipedia.org/wiki/Category:Animals");
        for name in ["Lion", "Tiger", "Okapi"] {
            state.mark_page(&format!("https://en.wikipedia.org/wiki/{name}"));
            state.push_record(record(name));
        }
        state.persist(&path).await.unwrap();

        let loaded = CrawlState::load(&path).await.unwrap();

        assert_eq!(loaded.visited_pages().len(), 3);
        assert_eq!(loaded.records(), state.records());
        assert!(loaded.visited_categories().is_empty());
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn missing_checkpoint_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let loaded = CrawlState::load(&dir.path().join("absent.json")).await.unwrap();

        assert_eq!(loaded, CrawlState::new());
    }

    #[tokio::test]
    async fn corrupted_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animal_data_partial.json");
        fs::write(&path, "[{\"title\": ").await.unwrap();

        let err = CrawlState::load(&path).await.unwrap_err();

        assert_eq!(err.kind(), "persistence");
    }

    #[tokio::test]
    async fn quarantine_keeps_the_damaged_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animal_data_partial.json");
        fs::write(&path, "[{\"title\": \"Okapi\"").await.unwrap();

        let moved = quarantine(&path).await.unwrap();

        assert!(!path.exists());
        assert_eq!(moved.parent(), path.parent());
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("animal_data_partial.json.corrupt-"));
        assert_eq!(fs::read_to_string(&moved).await.unwrap(), "[{\"title\": \"Okapi\"");
    }

    #[tokio::test]
    async fn persist_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animal_data.json");

        let mut state = CrawlState::new();
        state.push_record(record("Lion"));
        state.persist(&path).await.unwrap();
        state.push_record(record("Tiger"));
        state.persist(&path).await.unwrap();

        let raw = fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("Fauna of Ñuble"));
        assert!(raw.contains("\"main_text\""));
        assert_eq!(CrawlState::load(&path).await.unwrap().records().len(), 2);
    }

    #[tokio::test]
    async fn persist_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("animal_data.json");

        let err = CrawlState::new().persist(&path).await.unwrap_err();

        assert_eq!(err.kind(), "persistence");
    }

    #[test]
    fn visited_sets_are_test_and_set() {
        let mut state = CrawlState::new();
        assert!(state.mark_page("p"));
        assert!(!state.mark_page("p"));
        assert!(state.visited_pages().contains("p"));
        assert!(state.mark_category("c"));
        assert!(!state.mark_category("c"));
        assert!(state.is_category_visited("c"));
    }
}
