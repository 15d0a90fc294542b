//! Citations emitted by the answer engine and their translation to saved
//! search-doc ids for persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::docs::SavedSearchDoc;

/// One inline citation produced during answer generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitationInfo {
    pub citation_num: u32,
    pub document_id: String,
}

/// How citation coverage is biased for this turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CitationConfig {
    /// Manually selected documents are all considered useful.
    pub all_docs_useful: bool,
}

/// Maps citation numbers to saved search-doc ids. Citations pointing at
/// documents outside the reference list are dropped.
pub fn translate_citations(
    citations: &[CitationInfo],
    reference_docs: &[SavedSearchDoc],
) -> BTreeMap<u32, u64> {
    let mut translated = BTreeMap::new();
    for citation in citations {
        if let Some(saved) = reference_docs
            .iter()
            .find(|saved| saved.doc.document_id == citation.document_id)
        {
            translated.insert(citation.citation_num, saved.id);
        }
    }
    translated
}
