//! Document index trait and the in-memory implementation
//!
//! The index resolves document ids to retrievable sections for the manual
//! document-selection flow. Indexing and relevance scoring themselves live
//! outside this system.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chat_core::InferenceSection;

use crate::error::Result;

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Sections for the given document ids, in input order. Ids the index
    /// no longer knows are skipped silently.
    async fn sections_for_documents(&self, document_ids: &[String])
        -> Result<Vec<InferenceSection>>;
}

#[derive(Default)]
pub struct MemoryDocumentIndex {
    sections: Mutex<HashMap<String, Vec<InferenceSection>>>,
}

impl MemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, document_id: impl Into<String>, sections: Vec<InferenceSection>) {
        self.sections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(document_id.into(), sections);
    }
}

#[async_trait]
impl DocumentIndex for MemoryDocumentIndex {
    async fn sections_for_documents(
        &self,
        document_ids: &[String],
    ) -> Result<Vec<InferenceSection>> {
        let sections = self
            .sections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(document_ids
            .iter()
            .filter_map(|id| sections.get(id))
            .flat_map(|s| s.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_documents_are_skipped() {
        let index = MemoryDocumentIndex::new();
        index.insert_document(
            "a",
            vec![InferenceSection {
                document_id: "a".to_string(),
                content: "alpha".to_string(),
            }],
        );

        let sections = index
            .sections_for_documents(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].document_id, "a");
    }
}
