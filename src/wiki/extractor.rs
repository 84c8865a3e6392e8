use super::ContentRecord;
use crate::{filter::TopicFilter, Fetcher};
use chrono::Utc;
use itertools::Itertools;
use lazy_regex::regex;
use lazy_static::lazy_static;
use scraper::{node::Element, ElementRef, Html, Selector};
use std::fmt;
use tracing::{debug, warn};

const E: &str = "Invalid selector";
lazy_static! {
    static ref TITLE: Selector = Selector::parse("h1#firstHeading").expect(E);
    static ref CONTENT: Selector = Selector::parse("div#mw-content-text").expect(E);
    static ref PARSER_OUTPUT: Selector = Selector::parse("div.mw-parser-output").expect(E);
    static ref CATEGORY_LINKS: Selector = Selector::parse("div#mw-normal-catlinks li a").expect(E);
}

/// Substructures that never count as prose.
const STRIPPED_TAGS: &[&str] = &["table", "div", "script", "style", "sup", "span"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Fetch(String),
    MissingTitle,
    MissingContent,
    NotTopical,
    EmptyBody,
}

impl Rejection {
    /// Topical rejections are expected; everything else is worth a backfill.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Rejection::NotTopical)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Fetch(reason) => write!(f, "fetch failed: {}", reason),
            Rejection::MissingTitle => write!(f, "no title heading"),
            Rejection::MissingContent => write!(f, "no content container"),
            Rejection::NotTopical => write!(f, "no topical category"),
            Rejection::EmptyBody => write!(f, "no paragraph text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Accepted(ContentRecord),
    Rejected(Rejection),
}

fn is_infobox(element: &Element) -> bool {
    element
        .attr("class")
        .map_or(false, |class| class.split_whitespace().any(|c| c.contains("infobox")))
}

fn is_stripped(element: &Element) -> bool {
    STRIPPED_TAGS.contains(&element.name()) && !is_infobox(element)
}

fn push_prose(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if !is_stripped(child.value()) {
                push_prose(child, out);
            }
        }
    }
}

fn infobox_text(element: ElementRef<'_>) -> String {
    let text = element.text().map(str::trim).filter(|t| !t.is_empty()).join(" ");
    regex!(r"\s+").replace_all(&text, " ").into_owned()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Turns a rendered article into a record, or says why it does not qualify.
///
/// The topical check runs before the content container is inspected, so a
/// non-topical page is rejected whatever shape its body has.
pub fn extract_record(doc: &Html, url: &str, filter: &TopicFilter) -> Result<ContentRecord, Rejection> {
    let title = doc
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|title| !title.is_empty())
        .ok_or(Rejection::MissingTitle)?;

    let content = doc.select(&CONTENT).next().ok_or(Rejection::MissingContent)?;

    let categories: Vec<String> = doc
        .select(&CATEGORY_LINKS)
        .map(element_text)
        .filter(|c| !c.is_empty())
        .collect();

    if !filter.is_topical_page_by_categories(&categories) {
        return Err(Rejection::NotTopical);
    }

    let main = content
        .select(&PARSER_OUTPUT)
        .next()
        .ok_or(Rejection::MissingContent)?;

    let body = main
        .children()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let text = if el.value().name() == "p" {
                let mut text = String::new();
                push_prose(el, &mut text);
                text
            } else if is_infobox(el.value()) {
                infobox_text(el)
            } else {
                return None;
            };
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .join("\n\n");

    if body.is_empty() {
        return Err(Rejection::EmptyBody);
    }

    Ok(ContentRecord {
        title,
        url: url.to_string(),
        body,
        categories,
        extracted_at: Some(Utc::now()),
    })
}

/// Fetches and extracts single pages. Never fails: every problem ends up as
/// a [`Rejection`].
#[derive(Debug, Clone, Copy)]
pub struct PageExtractor<'a, F> {
    fetcher: &'a F,
    filter: &'a TopicFilter,
}

impl<'a, F: Fetcher> PageExtractor<'a, F> {
    pub fn new(fetcher: &'a F, filter: &'a TopicFilter) -> Self {
        PageExtractor { fetcher, filter }
    }

    pub async fn extract(&self, page_url: &str) -> Extraction {
        debug!("Visit {}", page_url);
        let html = match self.fetcher.fetch(page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = page_url, stage = "page", kind = e.kind(), "{}", e);
                return Extraction::Rejected(Rejection::Fetch(e.to_string()));
            }
        };

        let doc = Html::parse_document(&html);
        match extract_record(&doc, page_url, self.filter) {
            Ok(record) => Extraction::Accepted(record),
            Err(rejection) => {
                if rejection.is_failure() {
                    warn!(url = page_url, stage = "page", "Rejected: {}", rejection);
                } else {
                    debug!("Rejected {}: {}", page_url, rejection);
                }
                Extraction::Rejected(rejection)
            }
        }
    }
}
