pub mod document;
mod word;

pub use document::{extract_lemma_preview, DocumentError, DocumentFields, WordDocument};
pub use word::{
    Cognate, Etymology, Example, ListQuery, Page, SortOrder, Synonym, UserRequest, WordChildren,
    WordRecord, WordSummary, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
