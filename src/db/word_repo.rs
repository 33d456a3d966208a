use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::conflict::{self, ConflictReport};
use crate::models::{
    Cognate, DocumentError, DocumentFields, Etymology, Example, ListQuery, Page, Synonym,
    UserRequest, WordChildren, WordDocument, WordRecord, WordSummary,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] DocumentError),

    #[error("Word not found: {0}")]
    NotFound(Uuid),

    #[error("Transaction failed: {0}")]
    Transaction(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// No record existed for the lemma.
    Created,
    /// Content changed; children rewritten and revision bumped.
    Updated,
    /// Content unchanged; only the request was logged.
    Logged,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Created => write!(f, "created"),
            SaveStatus::Updated => write!(f, "updated"),
            SaveStatus::Logged => write!(f, "logged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved {
        id: Uuid,
        lemma: String,
        status: SaveStatus,
    },
    /// The stored document differs and the save was not forced. Nothing was written.
    Conflict {
        existing_id: Uuid,
        report: ConflictReport,
        old_data: Value,
        new_data: Value,
    },
}

pub struct WordRepository {
    pool: SqlitePool,
}

// Row types for database queries
#[derive(sqlx::FromRow)]
struct WordRow {
    id: String,
    lemma: String,
    syllabification: Option<String>,
    part_of_speech: Option<String>,
    contextual_meaning_en: Option<String>,
    contextual_meaning_zh: Option<String>,
    other_common_meanings: String,
    image_differentiation_zh: Option<String>,
    original_document: String,
    revision_count: i64,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    lemma: String,
    part_of_speech: Option<String>,
    contextual_meaning_en: Option<String>,
    contextual_meaning_zh: Option<String>,
    revision_count: i64,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct EtymologyRow {
    prefix: Option<String>,
    root: Option<String>,
    suffix: Option<String>,
    structure_analysis: Option<String>,
    history_myth: Option<String>,
    source_word: Option<String>,
    pie_root: Option<String>,
    visual_imagery_zh: Option<String>,
    meaning_evolution_zh: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CognateRow {
    cognate_word: String,
    logic: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ExampleRow {
    example_type: Option<String>,
    sentence: String,
    translation_zh: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SynonymRow {
    synonym_word: String,
    meaning_zh: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRequestRow {
    user_input: String,
    context_sentence: Option<String>,
    created_at: String,
}

const SUMMARY_COLUMNS: &str = "id, lemma, part_of_speech, contextual_meaning_en, \
     contextual_meaning_zh, revision_count, created_at, updated_at";

impl WordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<WordRecord>, RepositoryError> {
        let row: Option<WordRow> = sqlx::query_as("SELECT * FROM words WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.hydrate_word(row).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn find_by_lemma(&self, lemma: &str) -> Result<Option<WordRecord>, RepositoryError> {
        let row: Option<WordRow> =
            sqlx::query_as("SELECT * FROM words WHERE lemma_key = ?")
                .bind(lemma.trim().to_lowercase())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => self.hydrate_word(row).await.map(Some),
            None => Ok(None),
        }
    }

    /// Paged listing. Pages past the end are empty rather than an error.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<WordSummary>, RepositoryError> {
        let page = query.page();
        let limit = query.limit();
        let pattern = query
            .search_term()
            .map(|term| format!("%{}%", escape_like(&term.to_lowercase())));

        let filter = if pattern.is_some() {
            r"WHERE lemma_key LIKE ? ESCAPE '\'"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) FROM words {}", filter);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        let rows_sql = format!(
            "SELECT {} FROM words {} ORDER BY {} LIMIT ? OFFSET ?",
            SUMMARY_COLUMNS,
            filter,
            query.sort().order_by()
        );
        let mut rows_query = sqlx::query_as::<_, SummaryRow>(&rows_sql);
        if let Some(pattern) = &pattern {
            rows_query = rows_query.bind(pattern);
        }
        let rows = rows_query
            .bind(limit as i64)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(summary_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, page, limit, total.max(0) as u64))
    }

    /// Inserts a new word and its children as one unit.
    pub async fn create(&self, doc: &WordDocument) -> Result<Uuid, RepositoryError> {
        let fields = doc.fields()?;
        let id = Uuid::new_v4();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::Transaction)?;
        insert_word(&mut tx, id, doc, &fields, &now())
            .await
            .map_err(RepositoryError::Transaction)?;
        tx.commit().await.map_err(RepositoryError::Transaction)?;

        tracing::debug!(id = %id, lemma = %doc.lemma(), "Created word");
        Ok(id)
    }

    /// Replaces a word's content and rewrites all of its children.
    pub async fn replace(&self, id: Uuid, doc: &WordDocument) -> Result<(), RepositoryError> {
        let fields = doc.fields()?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::Transaction)?;
        let updated = update_word(&mut tx, id, doc, &fields, &now())
            .await
            .map_err(RepositoryError::Transaction)?;
        if !updated {
            tx.rollback().await.map_err(RepositoryError::Transaction)?;
            return Err(RepositoryError::NotFound(id));
        }
        tx.commit().await.map_err(RepositoryError::Transaction)?;

        tracing::debug!(id = %id, lemma = %doc.lemma(), "Replaced word");
        Ok(())
    }

    /// Removes a word. Children go with it.
    pub async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        // CASCADE will handle the child tables
        let result = sqlx::query("DELETE FROM words WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Appends an audit entry for a user submission.
    pub async fn record_user_request(
        &self,
        word_id: Uuid,
        user_input: &str,
        context_sentence: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_user_request(&mut conn, word_id, user_input, context_sentence, &now()).await?;
        Ok(())
    }

    pub async fn user_requests(&self, word_id: Uuid) -> Result<Vec<UserRequest>, RepositoryError> {
        let rows: Vec<UserRequestRow> = sqlx::query_as(
            "SELECT user_input, context_sentence, created_at FROM user_requests WHERE word_id = ? ORDER BY id",
        )
        .bind(word_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| UserRequest {
                user_input: r.user_input,
                context_sentence: r.context_sentence,
                created_at: parse_timestamp(&r.created_at),
            })
            .collect())
    }

    /// Saves a document under its lemma, re-checking for conflicts inside the
    /// transaction that performs the write.
    ///
    /// Without `force`, a differing stored document aborts the save with
    /// [`SaveOutcome::Conflict`]. Every save that goes through also logs the
    /// submission in `user_requests`.
    pub async fn save(
        &self,
        doc: &WordDocument,
        force: bool,
    ) -> Result<SaveOutcome, RepositoryError> {
        let fields = doc.fields()?;
        let timestamp = now();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::Transaction)?;

        let existing: Option<(String, String)> = sqlx::query_as(
            "SELECT id, original_document FROM words WHERE lemma_key = ?",
        )
        .bind(doc.lemma_key())
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::Transaction)?;

        let (id, status) = match existing {
            None => {
                let id = Uuid::new_v4();
                insert_word(&mut tx, id, doc, &fields, &timestamp)
                    .await
                    .map_err(RepositoryError::Transaction)?;
                (id, SaveStatus::Created)
            }
            Some((existing_id, original)) => {
                let id = parse_id(&existing_id).map_err(RepositoryError::Transaction)?;
                let old_data = decode_document(&original);
                let report = conflict::analyze(&old_data, doc.value());

                if report.has_conflict && !force {
                    tx.rollback().await.map_err(RepositoryError::Transaction)?;
                    tracing::debug!(lemma = %doc.lemma(), changes = report.diff.len(), "Save aborted on conflict");
                    return Ok(SaveOutcome::Conflict {
                        existing_id: id,
                        report,
                        old_data,
                        new_data: doc.value().clone(),
                    });
                }

                if report.has_conflict {
                    update_word(&mut tx, id, doc, &fields, &timestamp)
                        .await
                        .map_err(RepositoryError::Transaction)?;
                    (id, SaveStatus::Updated)
                } else {
                    (id, SaveStatus::Logged)
                }
            }
        };

        let user_input = doc.user_word().unwrap_or(doc.lemma());
        insert_user_request(
            &mut tx,
            id,
            user_input,
            doc.user_context_sentence(),
            &timestamp,
        )
        .await
        .map_err(RepositoryError::Transaction)?;

        tx.commit().await.map_err(RepositoryError::Transaction)?;

        tracing::debug!(id = %id, lemma = %doc.lemma(), status = %status, "Saved word");
        Ok(SaveOutcome::Saved {
            id,
            lemma: doc.lemma().to_string(),
            status,
        })
    }

    /// Child fan-out for a word. Empty when the word does not exist.
    pub async fn children(&self, word_id: Uuid) -> Result<WordChildren, RepositoryError> {
        self.load_children(&word_id.to_string()).await
    }

    async fn load_children(&self, word_id: &str) -> Result<WordChildren, RepositoryError> {
        let etymology: Option<EtymologyRow> = sqlx::query_as(
            r#"
            SELECT prefix, root, suffix, structure_analysis, history_myth, source_word,
                   pie_root, visual_imagery_zh, meaning_evolution_zh
            FROM etymologies WHERE word_id = ?
            "#,
        )
        .bind(word_id)
        .fetch_optional(&self.pool)
        .await?;

        let cognates: Vec<CognateRow> =
            sqlx::query_as("SELECT cognate_word, logic FROM cognates WHERE word_id = ? ORDER BY id")
                .bind(word_id)
                .fetch_all(&self.pool)
                .await?;

        let examples: Vec<ExampleRow> = sqlx::query_as(
            "SELECT example_type, sentence, translation_zh FROM examples WHERE word_id = ? ORDER BY id",
        )
        .bind(word_id)
        .fetch_all(&self.pool)
        .await?;

        let synonyms: Vec<SynonymRow> = sqlx::query_as(
            "SELECT synonym_word, meaning_zh FROM synonyms WHERE word_id = ? ORDER BY id",
        )
        .bind(word_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(WordChildren {
            etymology: etymology.map(|e| Etymology {
                prefix: e.prefix,
                root: e.root,
                suffix: e.suffix,
                structure_analysis: e.structure_analysis,
                history_myth: e.history_myth,
                source_word: e.source_word,
                pie_root: e.pie_root,
                visual_imagery_zh: e.visual_imagery_zh,
                meaning_evolution_zh: e.meaning_evolution_zh,
            }),
            cognates: cognates
                .into_iter()
                .map(|c| Cognate {
                    word: c.cognate_word,
                    logic: c.logic,
                })
                .collect(),
            examples: examples
                .into_iter()
                .map(|e| Example {
                    example_type: e.example_type,
                    sentence: e.sentence,
                    translation_zh: e.translation_zh,
                })
                .collect(),
            synonyms: synonyms
                .into_iter()
                .map(|s| Synonym {
                    word: s.synonym_word,
                    meaning_zh: s.meaning_zh,
                })
                .collect(),
        })
    }

    async fn hydrate_word(&self, row: WordRow) -> Result<WordRecord, RepositoryError> {
        let children = self.load_children(&row.id).await?;
        let other_common_meanings: Vec<String> =
            serde_json::from_str(&row.other_common_meanings).unwrap_or_default();

        Ok(WordRecord {
            id: parse_id(&row.id)?,
            lemma: row.lemma,
            syllabification: row.syllabification,
            part_of_speech: row.part_of_speech,
            contextual_meaning_en: row.contextual_meaning_en,
            contextual_meaning_zh: row.contextual_meaning_zh,
            other_common_meanings,
            image_differentiation_zh: row.image_differentiation_zh,
            original_document: decode_document(&row.original_document),
            revision_count: row.revision_count,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            children,
        })
    }
}

async fn insert_word(
    conn: &mut SqliteConnection,
    id: Uuid,
    doc: &WordDocument,
    fields: &DocumentFields,
    timestamp: &str,
) -> Result<(), sqlx::Error> {
    let id_str = id.to_string();
    let yield_section = &fields.yield_section;

    sqlx::query(
        r#"
        INSERT INTO words (id, lemma, lemma_key, syllabification, part_of_speech,
                           contextual_meaning_en, contextual_meaning_zh, other_common_meanings,
                           image_differentiation_zh, original_document, revision_count,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id_str)
    .bind(doc.lemma())
    .bind(doc.lemma_key())
    .bind(&yield_section.syllabification)
    .bind(&yield_section.part_of_speech)
    .bind(&yield_section.contextual_meaning.en)
    .bind(&yield_section.contextual_meaning.zh)
    .bind(encode_json(&yield_section.other_common_meanings))
    .bind(&fields.nuance.image_differentiation_zh)
    .bind(encode_json(doc.value()))
    .bind(timestamp)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;

    write_children(conn, &id_str, fields).await
}

/// Returns false when no word has the given id.
async fn update_word(
    conn: &mut SqliteConnection,
    id: Uuid,
    doc: &WordDocument,
    fields: &DocumentFields,
    timestamp: &str,
) -> Result<bool, sqlx::Error> {
    let id_str = id.to_string();
    let yield_section = &fields.yield_section;

    let result = sqlx::query(
        r#"
        UPDATE words
        SET lemma = ?, lemma_key = ?, syllabification = ?, part_of_speech = ?,
            contextual_meaning_en = ?,
            contextual_meaning_zh = ?, other_common_meanings = ?, image_differentiation_zh = ?,
            original_document = ?, revision_count = revision_count + 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(doc.lemma())
    .bind(doc.lemma_key())
    .bind(&yield_section.syllabification)
    .bind(&yield_section.part_of_speech)
    .bind(&yield_section.contextual_meaning.en)
    .bind(&yield_section.contextual_meaning.zh)
    .bind(encode_json(&yield_section.other_common_meanings))
    .bind(&fields.nuance.image_differentiation_zh)
    .bind(encode_json(doc.value()))
    .bind(timestamp)
    .bind(&id_str)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    for table in ["etymologies", "cognates", "examples", "synonyms"] {
        sqlx::query(&format!("DELETE FROM {} WHERE word_id = ?", table))
            .bind(&id_str)
            .execute(&mut *conn)
            .await?;
    }

    write_children(conn, &id_str, fields).await?;
    Ok(true)
}

async fn write_children(
    conn: &mut SqliteConnection,
    word_id: &str,
    fields: &DocumentFields,
) -> Result<(), sqlx::Error> {
    let etymology = &fields.etymology;
    let roots = &etymology.root_and_affixes;
    let origins = &etymology.historical_origins;

    sqlx::query(
        r#"
        INSERT INTO etymologies (word_id, prefix, root, suffix, structure_analysis, history_myth,
                                 source_word, pie_root, visual_imagery_zh, meaning_evolution_zh)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(word_id)
    .bind(&roots.prefix)
    .bind(&roots.root)
    .bind(&roots.suffix)
    .bind(&roots.structure_analysis)
    .bind(&origins.history_myth)
    .bind(&origins.source_word)
    .bind(&origins.pie_root)
    .bind(&etymology.visual_imagery_zh)
    .bind(&etymology.meaning_evolution_zh)
    .execute(&mut *conn)
    .await?;

    for cognate in &fields.cognate_family.cognates {
        sqlx::query("INSERT INTO cognates (word_id, cognate_word, logic) VALUES (?, ?, ?)")
            .bind(word_id)
            .bind(&cognate.word)
            .bind(&cognate.logic)
            .execute(&mut *conn)
            .await?;
    }

    for example in &fields.application.selected_examples {
        sqlx::query(
            "INSERT INTO examples (word_id, example_type, sentence, translation_zh) VALUES (?, ?, ?, ?)",
        )
        .bind(word_id)
        .bind(&example.example_type)
        .bind(&example.sentence)
        .bind(&example.translation_zh)
        .execute(&mut *conn)
        .await?;
    }

    for synonym in &fields.nuance.synonyms {
        sqlx::query("INSERT INTO synonyms (word_id, synonym_word, meaning_zh) VALUES (?, ?, ?)")
            .bind(word_id)
            .bind(&synonym.word)
            .bind(&synonym.meaning_zh)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn insert_user_request(
    conn: &mut SqliteConnection,
    word_id: Uuid,
    user_input: &str,
    context_sentence: Option<&str>,
    timestamp: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_requests (word_id, user_input, context_sentence, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(word_id.to_string())
    .bind(user_input)
    .bind(context_sentence)
    .bind(timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn summary_from_row(row: SummaryRow) -> Result<WordSummary, sqlx::Error> {
    Ok(WordSummary {
        id: parse_id(&row.id)?,
        lemma: row.lemma,
        part_of_speech: row.part_of_speech,
        contextual_meaning_en: row.contextual_meaning_en,
        contextual_meaning_zh: row.contextual_meaning_zh,
        revision_count: row.revision_count,
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_id(s: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(s).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn decode_document(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored document is not valid JSON");
        Value::Null
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
