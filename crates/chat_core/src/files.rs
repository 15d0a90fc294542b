//! File descriptors attached to chat messages

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatFileType {
    Image,
    Document,
}

/// Pointer into the file store; the store owns the bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub file_type: ChatFileType,
}

impl FileDescriptor {
    pub fn image(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_type: ChatFileType::Image,
        }
    }
}
