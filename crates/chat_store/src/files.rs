//! File storage trait and the in-memory implementation

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// File storage trait: persists content fetched from URLs and hands back
/// stable identifiers.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist one file per URL; returns ids in input order.
    async fn save_from_urls(&self, urls: &[String]) -> Result<Vec<String>>;
}

/// In-memory file store; records the source URL per id.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, String>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(&self, file_id: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(file_id)
            .cloned()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save_from_urls(&self, urls: &[String]) -> Result<Vec<String>> {
        let mut files = self
            .files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids = Vec::with_capacity(urls.len());
        for url in urls {
            let id = Uuid::new_v4().to_string();
            files.insert(id.clone(), url.clone());
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_urls_get_stable_ids() {
        let store = MemoryFileStore::new();
        let ids = store
            .save_from_urls(&["http://a/img.png".to_string(), "http://b/img.png".to_string()])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(store.url_for(&ids[0]).unwrap(), "http://a/img.png");
        assert_eq!(store.url_for(&ids[1]).unwrap(), "http://b/img.png");
    }
}
