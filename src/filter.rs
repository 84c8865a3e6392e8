//! Keyword admission rules for categories and pages.
//!
//! Category discovery and page admission use separate keyword sets: the
//! category set is wide so that topical subtrees are not pruned early, while
//! the page set is the authoritative gate for what ends up in the corpus.

const CATEGORY_KEYWORDS: &[&str] = &[
    "animals",
    "fauna",
    "species",
    "vertebrates",
    "invertebrates",
    "mammals",
    "birds",
    "reptiles",
    "amphibians",
    "fish",
    "insects",
    "molluscs",
    "crustaceans",
    "arachnids",
    "worms",
    "endangered",
    "extinct",
    "wildlife",
    "_by_",
    "animal",
];

const EXCLUDED_NAMESPACES: &[&str] = &[
    "help:",
    "wikipedia:",
    "template:",
    "portal:",
    "special:",
    "file:",
    "mediawiki:",
    "user:",
    "talk:",
    "project:",
];

const PAGE_KEYWORDS: &[&str] = &[
    "animal",
    "fauna",
    "species",
    "mammals",
    "birds",
    "reptiles",
    "amphibians",
    "fish",
    "insects",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    category_keywords: Vec<String>,
    excluded_keywords: Vec<String>,
    page_keywords: Vec<String>,
}

impl Default for TopicFilter {
    fn default() -> Self {
        TopicFilter::new(CATEGORY_KEYWORDS, EXCLUDED_NAMESPACES, PAGE_KEYWORDS)
    }
}

fn lowered<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl TopicFilter {
    /// Keywords are matched as lowercase substrings.
    pub fn new<S: AsRef<str>>(
        category_keywords: &[S],
        excluded_keywords: &[S],
        page_keywords: &[S],
    ) -> Self {
        TopicFilter {
            category_keywords: lowered(category_keywords),
            excluded_keywords: lowered(excluded_keywords),
            page_keywords: lowered(page_keywords),
        }
    }

    pub fn with_category_keywords<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.category_keywords = lowered(keywords);
        self
    }

    pub fn with_excluded_keywords<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.excluded_keywords = lowered(keywords);
        self
    }

    pub fn with_page_keywords<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.page_keywords = lowered(keywords);
        self
    }

    /// True iff `name` mentions a topic keyword and no excluded namespace.
    /// Exclusion always wins.
    pub fn is_topical_category(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.category_keywords.iter().any(|k| name.contains(k.as_str()))
            && !self.excluded_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    pub fn is_topical_page_by_categories<S: AsRef<str>>(&self, category_names: &[S]) -> bool {
        category_names.iter().any(|category| {
            let category = category.as_ref().to_lowercase();
            self.page_keywords.iter().any(|k| category.contains(k.as_str()))
        })
    }
}
