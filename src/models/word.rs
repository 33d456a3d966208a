use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

/// An authoritative word record with its child fan-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub id: Uuid,
    pub lemma: String,
    pub syllabification: Option<String>,
    pub part_of_speech: Option<String>,
    pub contextual_meaning_en: Option<String>,
    pub contextual_meaning_zh: Option<String>,
    pub other_common_meanings: Vec<String>,
    pub image_differentiation_zh: Option<String>,
    pub original_document: Value,
    pub revision_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub children: WordChildren,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordChildren {
    pub etymology: Option<Etymology>,
    pub cognates: Vec<Cognate>,
    pub examples: Vec<Example>,
    pub synonyms: Vec<Synonym>,
}

impl WordChildren {
    pub fn is_empty(&self) -> bool {
        self.etymology.is_none()
            && self.cognates.is_empty()
            && self.examples.is_empty()
            && self.synonyms.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Etymology {
    pub prefix: Option<String>,
    pub root: Option<String>,
    pub suffix: Option<String>,
    pub structure_analysis: Option<String>,
    pub history_myth: Option<String>,
    pub source_word: Option<String>,
    pub pie_root: Option<String>,
    pub visual_imagery_zh: Option<String>,
    pub meaning_evolution_zh: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cognate {
    pub word: String,
    pub logic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    pub example_type: Option<String>,
    pub sentence: String,
    pub translation_zh: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Synonym {
    pub word: String,
    pub meaning_zh: Option<String>,
}

/// One logged authoring request for a word.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_input: String,
    pub context_sentence: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing row: the top-level columns without the original document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordSummary {
    pub id: Uuid,
    pub lemma: String,
    pub part_of_speech: Option<String>,
    pub contextual_meaning_en: Option<String>,
    pub contextual_meaning_zh: Option<String>,
    pub revision_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for WordRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.lemma)?;
        writeln!(f, "{}", "=".repeat(self.lemma.chars().count()))?;
        writeln!(f, "ID: {}", self.id)?;
        if let Some(syllabification) = &self.syllabification {
            writeln!(f, "Syllables: {}", syllabification)?;
        }
        if let Some(pos) = &self.part_of_speech {
            writeln!(f, "Part of speech: {}", pos)?;
        }
        if let Some(en) = &self.contextual_meaning_en {
            writeln!(f, "Meaning: {}", en)?;
        }
        if let Some(zh) = &self.contextual_meaning_zh {
            writeln!(f, "Meaning (zh): {}", zh)?;
        }
        writeln!(f, "Revision: {}", self.revision_count)?;

        if let Some(pie_root) = self
            .children
            .etymology
            .as_ref()
            .and_then(|e| e.pie_root.as_ref())
        {
            writeln!(f, "PIE root: {}", pie_root)?;
        }

        if !self.children.cognates.is_empty() {
            writeln!(f, "\nCognates:")?;
            for cognate in &self.children.cognates {
                match &cognate.logic {
                    Some(logic) => writeln!(f, "  - {}: {}", cognate.word, logic)?,
                    None => writeln!(f, "  - {}", cognate.word)?,
                }
            }
        }

        if !self.children.examples.is_empty() {
            writeln!(f, "\nExamples:")?;
            for example in &self.children.examples {
                writeln!(f, "  - {}", example.sentence)?;
            }
        }

        if !self.children.synonyms.is_empty() {
            writeln!(f, "\nSynonyms:")?;
            for synonym in &self.children.synonyms {
                writeln!(f, "  - {}", synonym.word)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Az,
    Za,
}

impl SortOrder {
    /// ORDER BY clause. Lemma and id break ties so paging is stable.
    pub fn order_by(&self) -> &'static str {
        match self {
            SortOrder::Newest => "created_at DESC, lemma ASC, id ASC",
            SortOrder::Oldest => "created_at ASC, lemma ASC, id ASC",
            SortOrder::Az => "lemma_key ASC, id ASC",
            SortOrder::Za => "lemma_key DESC, id ASC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Newest => write!(f, "newest"),
            SortOrder::Oldest => write!(f, "oldest"),
            SortOrder::Az => write!(f, "az"),
            SortOrder::Za => write!(f, "za"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "az" => Ok(SortOrder::Az),
            "za" => Ok(SortOrder::Za),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid options: newest, oldest, az, za",
                s
            )),
        }
    }
}

/// Paging and filtering for word listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
}

impl ListQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Page number, at least 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32
    }

    /// Page size clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT as i64)
            .clamp(1, MAX_PAGE_LIMIT as i64) as u32
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.limit() as i64
    }

    /// Trimmed search term; blank searches are ignored.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn sort(&self) -> SortOrder {
        self.sort.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(limit.max(1) as u64);
        Self {
            items,
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_from_str() {
        assert_eq!(SortOrder::from_str("newest").unwrap(), SortOrder::Newest);
        assert_eq!(SortOrder::from_str("AZ").unwrap(), SortOrder::Az);
        assert_eq!(SortOrder::from_str("za").unwrap(), SortOrder::Za);
        assert!(SortOrder::from_str("random").is_err());
    }

    #[test]
    fn test_sort_order_display_roundtrip() {
        for order in [SortOrder::Newest, SortOrder::Oldest, SortOrder::Az, SortOrder::Za] {
            assert_eq!(SortOrder::from_str(&order.to_string()).unwrap(), order);
        }
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(query.offset(), 0);
        assert_eq!(query.sort(), SortOrder::Newest);
        assert_eq!(query.search_term(), None);
    }

    #[test]
    fn test_list_query_clamps() {
        let query = ListQuery::new(0, 0);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 1);

        let query = ListQuery::new(-4, 1000);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_LIMIT);

        let query = ListQuery::new(3, 20);
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = ListQuery::default().with_search("   ");
        assert_eq!(query.search_term(), None);

        let query = ListQuery::default().with_search(" hold ");
        assert_eq!(query.search_term(), Some("hold"));
    }

    #[test]
    fn test_page_total_pages() {
        let page: Page<u8> = Page::new(vec![], 1, 10, 0);
        assert_eq!(page.total_pages, 0);

        let page: Page<u8> = Page::new(vec![], 1, 10, 21);
        assert_eq!(page.total_pages, 3);

        let page: Page<u8> = Page::new(vec![], 1, 10, 20);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page: Page<u8> = Page::new(vec![1], 1, 10, 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["items"][0], 1);
    }

    #[test]
    fn test_word_record_display() {
        let now = Utc::now();
        let record = WordRecord {
            id: Uuid::nil(),
            lemma: "household".to_string(),
            syllabification: Some("house-hold".to_string()),
            part_of_speech: Some("Noun".to_string()),
            contextual_meaning_en: None,
            contextual_meaning_zh: None,
            other_common_meanings: Vec::new(),
            image_differentiation_zh: None,
            original_document: Value::Null,
            revision_count: 2,
            created_at: now,
            updated_at: now,
            children: WordChildren {
                cognates: vec![Cognate {
                    word: "Husband".to_string(),
                    logic: None,
                }],
                ..Default::default()
            },
        };

        let text = record.to_string();
        assert!(text.starts_with("household\n=========\n"));
        assert!(text.contains("Revision: 2"));
        assert!(text.contains("  - Husband"));
    }
}
