use super::{absolute, is_article_path, is_category_path, is_pagination_path};
use crate::{filter::TopicFilter, CrawlerError, Fetcher};
use itertools::Itertools;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};

pub(crate) const DEFAULT_MAX_PAGINATION_PAGES: usize = 50;

const E: &str = "Invalid selector";
lazy_static! {
    static ref SUBCATEGORIES: Selector = Selector::parse("div#mw-subcategories a[href]").expect(E);
    static ref NORMAL_CATLINKS: Selector =
        Selector::parse("div#mw-normal-catlinks a[href]").expect(E);
    static ref HIDDEN_CATLINKS: Selector =
        Selector::parse("div#mw-hidden-catlinks a[href]").expect(E);
    static ref PAGES: Selector = Selector::parse("div#mw-pages a[href]").expect(E);
    static ref A: Selector = Selector::parse("a[href]").expect(E);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CategoryListing {
    pub subcategories: BTreeSet<String>,
    pub pages: BTreeSet<String>,
    /// Continuation pages that could not be fetched, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl CategoryListing {
    fn merge(&mut self, other: CategoryListing) {
        self.subcategories.extend(other.subcategories);
        self.pages.extend(other.pages);
        self.skipped.extend(other.skipped);
    }
}

fn hrefs<'a>(doc: &'a Html, selector: &'a Selector) -> impl Iterator<Item = &'a str> + 'a {
    doc.select(selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
}

/// Reads one rendered listing page. Returns the admitted child categories and
/// candidate pages, plus the continuation links found on it.
pub fn scan_category(
    doc: &Html,
    base_url: &str,
    filter: &TopicFilter,
) -> (CategoryListing, Vec<String>) {
    let subcategories = hrefs(doc, &SUBCATEGORIES)
        .chain(hrefs(doc, &NORMAL_CATLINKS))
        .chain(hrefs(doc, &HIDDEN_CATLINKS))
        .filter(|href| is_category_path(href) && filter.is_topical_category(href))
        .map(|href| absolute(base_url, href))
        .collect();

    let pages = hrefs(doc, &PAGES)
        .filter(|href| is_article_path(href))
        .map(|href| absolute(base_url, href))
        .collect();

    let continuations = hrefs(doc, &A)
        .filter(|href| is_pagination_path(href))
        .map(|href| absolute(base_url, href))
        .unique()
        .collect();

    let listing = CategoryListing {
        subcategories,
        pages,
        skipped: vec![],
    };
    (listing, continuations)
}

/// Expands a category into child categories and candidate pages, following
/// the listing's continuation pages. Request spacing is the fetcher's concern.
#[derive(Debug, Clone, Copy)]
pub struct CategoryExplorer<'a, F> {
    fetcher: &'a F,
    filter: &'a TopicFilter,
    base_url: &'a str,
    max_pagination_pages: usize,
}

impl<'a, F: Fetcher> CategoryExplorer<'a, F> {
    pub fn new(fetcher: &'a F, filter: &'a TopicFilter, base_url: &'a str) -> Self {
        CategoryExplorer {
            fetcher,
            filter,
            base_url,
            max_pagination_pages: DEFAULT_MAX_PAGINATION_PAGES,
        }
    }

    pub fn with_max_pagination_pages(mut self, max_pagination_pages: usize) -> Self {
        self.max_pagination_pages = max_pagination_pages;
        self
    }

    /// Fails only when the category page itself cannot be fetched. A broken
    /// continuation page is logged, listed in `skipped`, and passed over.
    pub async fn explore(&self, category_url: &str) -> Result<CategoryListing, CrawlerError> {
        debug!("Explore {}", category_url);
        let html = self.fetcher.fetch(category_url).await?;
        let (mut listing, continuations) = {
            let doc = Html::parse_document(&html);
            scan_category(&doc, self.base_url, self.filter)
        };

        let mut seen = HashSet::from([category_url.to_string()]);
        let mut pending: VecDeque<String> = continuations.into();
        let mut followed = 0;

        while let Some(next) = pending.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if followed == self.max_pagination_pages {
                warn!(
                    category = category_url,
                    stage = "pagination",
                    "Stopped after {} continuation pages, {} left unvisited",
                    followed,
                    pending.len() + 1
                );
                break;
            }
            followed += 1;

            debug!("Visit continuation {}", next);
            match self.fetcher.fetch(&next).await {
                Ok(html) => {
                    let (more, continuations) = {
                        let doc = Html::parse_document(&html);
                        scan_category(&doc, self.base_url, self.filter)
                    };
                    listing.merge(more);
                    pending.extend(continuations);
                }
                Err(e) => {
                    warn!(
                        url = next.as_str(),
                        category = category_url,
                        stage = "pagination",
                        "Skipping continuation page: {}",
                        e
                    );
                    listing.skipped.push((next, e.to_string()));
                }
            }
        }

        Ok(listing)
    }
}
