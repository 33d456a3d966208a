//! Word documents as authored in YAML.
//!
//! A document is kept as a generic value tree so that it can be compared and
//! stored verbatim. The typed [`DocumentFields`] view is only used to fan the
//! document out into relational rows.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static LEMMA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"lemma:\s*"?([^"\n]+)"?"#).expect("Invalid regex"));

/// Errors raised while validating a word document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("No YAML content")]
    Empty,

    #[error("Invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Document must be a mapping at the top level")]
    NotAMapping,

    #[error("YAML missing yield.lemma")]
    MissingLemma,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// A validated word document.
#[derive(Debug, Clone, PartialEq)]
pub struct WordDocument {
    value: Value,
    lemma: String,
}

impl WordDocument {
    /// Parses raw YAML text. The document must carry a non-empty `yield.lemma`.
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        if raw.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        let value: Value = serde_yaml::from_str(raw)?;
        Self::from_value(value)
    }

    /// Validates an already-parsed value tree.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        if !value.is_object() {
            return Err(DocumentError::NotAMapping);
        }

        let lemma = value
            .get("yield")
            .and_then(|section| section.get("lemma"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|lemma| !lemma.is_empty())
            .ok_or(DocumentError::MissingLemma)?
            .to_string();

        Ok(Self { value, lemma })
    }

    /// The lemma as written in the document.
    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    /// Lowercased lemma, used for case-insensitive identity.
    pub fn lemma_key(&self) -> String {
        self.lemma.to_lowercase()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The word the user originally typed, if recorded.
    pub fn user_word(&self) -> Option<&str> {
        self.yield_str("user_word")
    }

    /// The sentence the user encountered the word in, if recorded.
    pub fn user_context_sentence(&self) -> Option<&str> {
        self.yield_str("user_context_sentence")
    }

    fn yield_str(&self, key: &str) -> Option<&str> {
        self.value
            .get("yield")
            .and_then(|section| section.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Typed projection of the sections that map to relational columns.
    pub fn fields(&self) -> Result<DocumentFields, DocumentError> {
        DocumentFields::deserialize(&self.value)
            .map_err(|e| DocumentError::Malformed(e.to_string()))
    }
}

/// Best-effort lemma lookup on raw text without parsing the document.
///
/// This only looks for the first `lemma:` line, so it can be fooled by
/// comments, nested keys or multi-line values. Use [`WordDocument::parse`]
/// whenever an authoritative answer is needed.
pub fn extract_lemma_preview(raw: &str) -> Option<String> {
    LEMMA_PATTERN
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .filter(|lemma| !lemma.is_empty())
}

/// Sections of a word document, with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFields {
    #[serde(rename = "yield", deserialize_with = "or_default")]
    pub yield_section: YieldSection,
    #[serde(deserialize_with = "or_default")]
    pub etymology: EtymologySection,
    #[serde(deserialize_with = "or_default")]
    pub cognate_family: CognateFamily,
    #[serde(deserialize_with = "or_default")]
    pub application: Application,
    #[serde(deserialize_with = "or_default")]
    pub nuance: Nuance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YieldSection {
    #[serde(deserialize_with = "text")]
    pub user_word: Option<String>,
    #[serde(deserialize_with = "text")]
    pub lemma: Option<String>,
    #[serde(deserialize_with = "text")]
    pub syllabification: Option<String>,
    #[serde(deserialize_with = "text")]
    pub user_context_sentence: Option<String>,
    #[serde(deserialize_with = "text")]
    pub part_of_speech: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub contextual_meaning: ContextualMeaning,
    #[serde(deserialize_with = "text_list")]
    pub other_common_meanings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextualMeaning {
    #[serde(deserialize_with = "text")]
    pub en: Option<String>,
    #[serde(deserialize_with = "text")]
    pub zh: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtymologySection {
    #[serde(deserialize_with = "or_default")]
    pub root_and_affixes: RootAndAffixes,
    #[serde(deserialize_with = "or_default")]
    pub historical_origins: HistoricalOrigins,
    #[serde(deserialize_with = "text")]
    pub visual_imagery_zh: Option<String>,
    #[serde(deserialize_with = "text")]
    pub meaning_evolution_zh: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootAndAffixes {
    #[serde(deserialize_with = "text")]
    pub prefix: Option<String>,
    #[serde(deserialize_with = "text")]
    pub root: Option<String>,
    #[serde(deserialize_with = "text")]
    pub suffix: Option<String>,
    #[serde(deserialize_with = "text")]
    pub structure_analysis: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalOrigins {
    #[serde(deserialize_with = "text")]
    pub history_myth: Option<String>,
    #[serde(deserialize_with = "text")]
    pub source_word: Option<String>,
    #[serde(deserialize_with = "text")]
    pub pie_root: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognateFamily {
    #[serde(deserialize_with = "or_default")]
    pub cognates: Vec<CognateEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognateEntry {
    #[serde(deserialize_with = "text")]
    pub word: Option<String>,
    #[serde(deserialize_with = "text")]
    pub logic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Application {
    #[serde(deserialize_with = "or_default")]
    pub selected_examples: Vec<ExampleEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleEntry {
    #[serde(rename = "type", deserialize_with = "text")]
    pub example_type: Option<String>,
    #[serde(deserialize_with = "text")]
    pub sentence: Option<String>,
    #[serde(deserialize_with = "text")]
    pub translation_zh: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nuance {
    #[serde(deserialize_with = "or_default")]
    pub synonyms: Vec<SynonymEntry>,
    #[serde(deserialize_with = "text")]
    pub image_differentiation_zh: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynonymEntry {
    #[serde(deserialize_with = "text")]
    pub word: Option<String>,
    #[serde(deserialize_with = "text")]
    pub meaning_zh: Option<String>,
}

// YAML leaves empty sections as null.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Unquoted YAML scalars such as `2` or `yes` still count as text.
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {}",
            kind_name(&other)
        ))),
    }
}

fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s]),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(serde::de::Error::custom(format!(
                    "expected a list of text, found {}",
                    kind_name(&other)
                ))),
            })
            .collect(),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a list of text, found {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A complete document in the shape the authoring tool produces.
    pub const HOUSEHOLD: &str = r#"
yield:
  user_word: "household"
  lemma: "household"
  syllabification: "house-hold"
  user_context_sentence: "The entire household gathered in the living room."
  part_of_speech: "Noun (Collective)"
  contextual_meaning:
    en: "A group of people who live together in the same dwelling."
    zh: "一家人，一户"
  other_common_meanings:
    - "Domestic management or affairs."
    - "Familiar or common (adj)."

etymology:
  root_and_affixes:
    prefix: "N/A"
    root: "Compound Word: House + Hold"
    suffix: "N/A"
    structure_analysis: "Composite of 'House' + 'Hold'."
  historical_origins:
    history_myth: "A functional economic unit under one authority."
    source_word: "Middle English 'houshold' (14c.)"
    pie_root: "*(s)keu- (to cover)"
  visual_imagery_zh: "想象你正在搭建一个庇护所。"
  meaning_evolution_zh: "从持家到被管理的实体。"

cognate_family:
  cognates:
    - word: "Husband"
      logic: "House + Bond"
    - word: "Behold"
      logic: "Be- + Hold"

application:
  selected_examples:
    - type: "Literal / Root Image"
      sentence: "She manages the household accounts with great care."
      translation_zh: "她非常细心地管理着家庭账目。"
    - type: "Current Context"
      sentence: "The average household size has decreased."
      translation_zh: "平均每户家庭的人口数量有所减少。"

nuance:
  synonyms:
    - word: "Family"
      meaning_zh: "家庭"
    - word: "Residence"
      meaning_zh: "住宅"
  image_differentiation_zh: "Household 侧重共同居住。"
"#;

    /// Minimal document for the given lemma.
    pub fn minimal(lemma: &str) -> String {
        format!("yield:\n  lemma: \"{lemma}\"\n  part_of_speech: \"Noun\"\n")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let doc = WordDocument::parse(HOUSEHOLD).unwrap();
        assert_eq!(doc.lemma(), "household");
        assert_eq!(doc.user_word(), Some("household"));
        assert!(doc.user_context_sentence().unwrap().contains("living room"));

        let fields = doc.fields().unwrap();
        assert_eq!(fields.yield_section.syllabification.as_deref(), Some("house-hold"));
        assert_eq!(fields.yield_section.other_common_meanings.len(), 2);
        assert_eq!(fields.cognate_family.cognates.len(), 2);
        assert_eq!(fields.application.selected_examples.len(), 2);
        assert_eq!(
            fields.application.selected_examples[0].example_type.as_deref(),
            Some("Literal / Root Image")
        );
        assert_eq!(fields.nuance.synonyms[1].word.as_deref(), Some("Residence"));
        assert_eq!(
            fields.etymology.historical_origins.pie_root.as_deref(),
            Some("*(s)keu- (to cover)")
        );
    }

    #[test]
    fn test_lemma_key_is_lowercase() {
        let doc = WordDocument::parse("yield:\n  lemma: \"HouseHold\"\n").unwrap();
        assert_eq!(doc.lemma(), "HouseHold");
        assert_eq!(doc.lemma_key(), "household");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(WordDocument::parse("  \n"), Err(DocumentError::Empty)));
    }

    #[test]
    fn test_parse_rejects_missing_lemma() {
        let result = WordDocument::parse("yield:\n  part_of_speech: Noun\n");
        assert!(matches!(result, Err(DocumentError::MissingLemma)));

        let result = WordDocument::parse("yield:\n  lemma: \"   \"\n");
        assert!(matches!(result, Err(DocumentError::MissingLemma)));
    }

    #[test]
    fn test_parse_rejects_invalid_yaml() {
        let result = WordDocument::parse("yield: [unclosed");
        assert!(matches!(result, Err(DocumentError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let result = WordDocument::parse("- just\n- a list\n");
        assert!(matches!(result, Err(DocumentError::NotAMapping)));
    }

    #[test]
    fn test_empty_sections_are_tolerated() {
        let doc = WordDocument::parse("yield:\n  lemma: run\netymology:\nnuance:\n").unwrap();
        let fields = doc.fields().unwrap();
        assert!(fields.nuance.synonyms.is_empty());
        assert!(fields.etymology.root_and_affixes.root.is_none());
    }

    #[test]
    fn test_numeric_scalars_are_text() {
        let doc = WordDocument::parse("yield:\n  lemma: run\n  syllabification: 1\n").unwrap();
        let fields = doc.fields().unwrap();
        assert_eq!(fields.yield_section.syllabification.as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_section_is_reported() {
        let doc = WordDocument::parse("yield:\n  lemma: run\n  contextual_meaning:\n    en: [a, b]\n")
            .unwrap();
        assert!(matches!(doc.fields(), Err(DocumentError::Malformed(_))));
    }

    #[test]
    fn test_extract_lemma_preview() {
        assert_eq!(extract_lemma_preview(HOUSEHOLD), Some("household".to_string()));
        assert_eq!(
            extract_lemma_preview("yield:\n  lemma: run away  \n"),
            Some("run away".to_string())
        );
        assert_eq!(extract_lemma_preview("yield:\n  part_of_speech: Noun\n"), None);
    }
}
