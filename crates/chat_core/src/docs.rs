//! Retrieved search documents and the dedupe / index bookkeeping that goes
//! with them.
//!
//! Deduplication happens after retrieval completes so that content is not
//! dropped earlier in the pipeline than necessary. Because the relevance
//! filter reports positions in the doc list the caller already saw, every
//! index produced after a dedupe pass has to be renumbered against the
//! dropped positions.

use serde::{Deserialize, Serialize};

/// Caller-facing representation of one retrieved document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchDoc {
    pub document_id: String,
    pub semantic_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub blurb: String,
    pub source_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A search doc persisted in the doc cache, addressable by id for the
/// manual document-selection flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedSearchDoc {
    pub id: u64,
    #[serde(flatten)]
    pub doc: SearchDoc,
}

/// A retrievable slice of an indexed document, as handed to the search
/// tool when the caller pins documents manually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceSection {
    pub document_id: String,
    pub content: String,
}

/// Doc-list payload streamed to the caller when a retrieval-capable tool
/// finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaDocsResponse {
    pub top_documents: Vec<SavedSearchDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rephrased_query: Option<String>,
}

/// Drops duplicate documents (by `document_id`), keeping the first
/// occurrence. Returns the surviving docs and the indices dropped from the
/// original list, in ascending order.
pub fn dedupe_documents(docs: Vec<SearchDoc>) -> (Vec<SearchDoc>, Vec<usize>) {
    let mut seen: Vec<&str> = Vec::new();
    let mut dropped = Vec::new();
    let mut kept = Vec::new();

    for (index, doc) in docs.iter().enumerate() {
        if seen.contains(&doc.document_id.as_str()) {
            dropped.push(index);
        } else {
            kept.push(index);
        }
        seen.push(doc.document_id.as_str());
    }

    let mut kept_docs = Vec::with_capacity(kept.len());
    let mut docs = docs;
    for index in kept.into_iter().rev() {
        kept_docs.push(docs.swap_remove(index));
    }
    kept_docs.reverse();

    (kept_docs, dropped)
}

/// Maps relevance judgments (document ids the LLM marked useful) to index
/// positions within `docs`. Unknown ids are ignored.
pub fn relevant_documents_to_indices(relevant_ids: &[String], docs: &[SearchDoc]) -> Vec<usize> {
    docs.iter()
        .enumerate()
        .filter(|(_, doc)| relevant_ids.iter().any(|id| *id == doc.document_id))
        .map(|(index, _)| index)
        .collect()
}

/// Renumbers indices over the original doc list after a dedupe pass:
/// indices pointing at dropped documents are excluded outright, and every
/// retained index is shifted down by the number of dropped positions
/// before it.
pub fn drop_deduped_indices(indices: &[usize], dropped: &[usize]) -> Vec<usize> {
    indices
        .iter()
        .filter(|index| !dropped.contains(index))
        .map(|index| index - dropped.iter().filter(|d| *d < index).count())
        .collect()
}
