//! Offline fetcher and markup builders for unit tests.

use crate::{CrawlerError, Fetcher};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct StaticFetcher {
    documents: HashMap<String, String>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StaticFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_document(mut self, url: &str, html: String) -> Self {
        self.documents.insert(url.to_string(), html);
        self
    }

    pub(crate) fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlerError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
    }
}

fn links(hrefs: &[&str]) -> String {
    hrefs
        .iter()
        .map(|href| format!(r#"<li><a href="{href}">{href}</a></li>"#))
        .collect()
}

/// A category listing with relative hrefs, the way the site renders them.
pub(crate) fn category_html(subcategories: &[&str], pages: &[&str], continuations: &[&str]) -> String {
    let continuations: String = continuations
        .iter()
        .map(|href| format!(r#"<a href="{href}">next page</a>"#))
        .collect();
    format!(
        r#"<html><body>
        <h1 id="firstHeading">Category listing</h1>
        <div id="mw-content-text">
          <div id="mw-subcategories"><ul>{}</ul></div>
          <div id="mw-pages">{continuations}<ul>{}</ul>{continuations}</div>
        </div>
        <div id="catlinks"><div id="mw-normal-catlinks"><ul></ul></div></div>
        </body></html>"#,
        links(subcategories),
        links(pages),
    )
}

pub(crate) fn article_html(title: &str, categories: &[&str], content: &str) -> String {
    let categories: String = categories
        .iter()
        .map(|c| format!(r#"<li><a href="/wiki/Category:{}">{c}</a></li>"#, c.replace(' ', "_")))
        .collect();
    format!(
        r#"<html><body>
        <h1 id="firstHeading">{title}</h1>
        <div id="mw-content-text"><div class="mw-content-ltr mw-parser-output">{content}</div></div>
        <div id="catlinks"><div id="mw-normal-catlinks">
          <a href="/wiki/Help:Category">Categories</a>: <ul>{categories}</ul>
        </div></div>
        </body></html>"#
    )
}
