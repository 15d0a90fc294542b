//! Search-doc cache trait and the in-memory implementation
//!
//! Retrieved documents are cached as rows addressable by id so that a
//! later turn can pin them manually (`search_doc_ids` on the request).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use chat_core::{SavedSearchDoc, SearchDoc};

use crate::error::Result;

#[async_trait]
pub trait SearchDocStore: Send + Sync {
    /// Cache one retrieved doc, assigning it a stable id.
    async fn save_doc(&self, doc: SearchDoc) -> Result<SavedSearchDoc>;

    /// Look up a cached doc. Deleted/unknown ids resolve to `None`; callers
    /// drop them rather than failing the turn.
    async fn get_doc(&self, doc_id: u64) -> Result<Option<SavedSearchDoc>>;
}

#[derive(Default)]
pub struct MemorySearchDocStore {
    docs: Mutex<HashMap<u64, SavedSearchDoc>>,
    next_id: AtomicU64,
}

impl MemorySearchDocStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl SearchDocStore for MemorySearchDocStore {
    async fn save_doc(&self, doc: SearchDoc) -> Result<SavedSearchDoc> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let saved = SavedSearchDoc { id, doc };
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, saved.clone());
        Ok(saved)
    }

    async fn get_doc(&self, doc_id: u64) -> Result<Option<SavedSearchDoc>> {
        Ok(self
            .docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&doc_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(document_id: &str) -> SearchDoc {
        SearchDoc {
            document_id: document_id.to_string(),
            semantic_identifier: document_id.to_string(),
            link: None,
            blurb: String::new(),
            source_type: "file".to_string(),
            score: None,
        }
    }

    #[tokio::test]
    async fn saved_docs_are_retrievable_by_id() {
        let store = MemorySearchDocStore::new();
        let saved = store.save_doc(doc("a")).await.unwrap();

        let loaded = store.get_doc(saved.id).await.unwrap();
        assert_eq!(loaded, Some(saved));
    }

    #[tokio::test]
    async fn unknown_ids_resolve_to_none() {
        let store = MemorySearchDocStore::new();
        assert_eq!(store.get_doc(999).await.unwrap(), None);
    }
}
