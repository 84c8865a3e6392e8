mod explorer;
mod extractor;

pub(crate) use explorer::DEFAULT_MAX_PAGINATION_PAGES;
pub use explorer::{scan_category, CategoryExplorer, CategoryListing};
pub use extractor::{extract_record, Extraction, PageExtractor, Rejection};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const BASE_URL: &str = "https://en.wikipedia.org";
pub const DEFAULT_SEED: &str = "https://en.wikipedia.org/wiki/Category:Animals";

const CATEGORY_PREFIX: &str = "/wiki/Category:";
const ARTICLE_PREFIX: &str = "/wiki/";
const EXCLUDED_PAGE_NAMESPACES: &[&str] = &[
    "Category:",
    "File:",
    "Template:",
    "Help:",
    "Wikipedia:",
    "Portal:",
    "Special:",
];

/// Category links are the only ones allowed into the category namespace.
pub(crate) fn is_category_path(href: &str) -> bool {
    href.starts_with(CATEGORY_PREFIX)
}

/// Article links: under `/wiki/` and outside every meta namespace.
pub(crate) fn is_article_path(href: &str) -> bool {
    href.starts_with(ARTICLE_PREFIX)
        && !EXCLUDED_PAGE_NAMESPACES
            .iter()
            .any(|namespace| href.contains(namespace))
}

/// Forward continuation links of a paginated category listing. Walking
/// forward from the first page reaches every page, so the `pageuntil=` links
/// back to earlier pages are never followed.
pub(crate) fn is_pagination_path(href: &str) -> bool {
    href.contains("pagefrom=")
        && href.contains("Category:")
        && (href.starts_with("/w/") || href.starts_with(ARTICLE_PREFIX))
}

pub(crate) fn absolute(base_url: &str, href: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), href)
}

/// One accepted page, in the on-disk checkpoint layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub url: String,
    #[serde(rename = "main_text")]
    pub body: String,
    pub categories: Vec<String>,
    #[serde(
        rename = "timestamp",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize"
    )]
    pub extracted_at: Option<DateTime<Utc>>,
}

mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    // Older checkpoints carry offset-less ISO timestamps written in UTC.
    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(Utc.from_utc_datetime(&naive)))
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn namespace_rules() {
        assert!(is_category_path("/wiki/Category:Felidae"));
        assert!(!is_category_path("/wiki/Lion"));

        assert!(is_article_path("/wiki/Lion"));
        assert!(!is_article_path("/wiki/File:Lion.jpg"));
        assert!(!is_article_path("/wiki/Category:Felidae"));
        assert!(!is_article_path("/wiki/Special:Random"));
        assert!(!is_article_path("https://example.org/wiki/Lion"));

        assert!(is_pagination_path(
            "/w/index.php?title=Category:Felidae&pagefrom=Lion#mw-pages"
        ));
        assert!(is_pagination_path("/wiki/Category:Felidae?pagefrom=Cheetah"));
        assert!(!is_pagination_path(
            "/wiki/Category:Felidae?pageuntil=Cheetah#mw-pages"
        ));
        assert!(!is_pagination_path("/w/index.php?title=Lion&pagefrom=A"));
    }

    #[test]
    fn reads_legacy_records_without_or_with_naive_timestamps() {
        let json = r#"[
            {"title": "Lion", "url": "https://en.wikipedia.org/wiki/Lion",
             "main_text": "The lion is a large cat.", "categories": ["Big cats"]},
            {"title": "Tiger", "url": "https://en.wikipedia.org/wiki/Tiger",
             "main_text": "The tiger is striped.", "categories": ["Mammals of Asia"],
             "timestamp": "2024-12-01T08:30:15.123456"}
        ]"#;
        let records: Vec<ContentRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records[0].extracted_at, None);
        assert_eq!(records[0].body, "The lion is a large cat.");
        assert_eq!(
            records[1].extracted_at,
            Some(
                Utc.with_ymd_and_hms(2024, 12, 1, 8, 30, 15).unwrap()
                    + chrono::Duration::microseconds(123456)
            )
        );
    }

    #[test]
    fn writes_body_as_main_text() {
        let record = ContentRecord {
            title: "Lion".to_string(),
            url: "https://en.wikipedia.org/wiki/Lion".to_string(),
            body: "The lion is a large cat.".to_string(),
            categories: vec!["Big cats".to_string()],
            extracted_at: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["main_text"], "The lion is a large cat.");
        assert!(value.get("timestamp").is_none());
        assert!(value.get("body").is_none());
    }
}
