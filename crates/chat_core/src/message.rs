//! Chat messages - nodes of the per-session message tree
//!
//! Every session owns a synthetic root message; every other message points
//! at exactly one parent. The currently active linear path from the root is
//! the mainline, resolved by walking latest children (see `turn_engine`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::files::FileDescriptor;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    System,
    User,
    Assistant,
}

/// Record of the single attributable tool call made during a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub tool_id: u64,
    pub tool_name: String,
    pub tool_arguments: serde_json::Value,
    pub tool_result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    /// None only for the synthetic root message.
    pub parent_id: Option<Uuid>,
    pub message_type: MessageType,
    pub message: String,
    pub token_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rephrased_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDescriptor>,
    /// Ids of the saved search docs this message referenced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_doc_ids: Vec<u64>,
    /// Citation number -> saved search doc id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<BTreeMap<u32, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The synthetic root every session starts with.
    pub fn root(session_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            parent_id: None,
            message_type: MessageType::System,
            message: String::new(),
            token_count: 0,
            prompt_id: None,
            rephrased_query: None,
            error: None,
            files: Vec::new(),
            reference_doc_ids: Vec::new(),
            citations: None,
            tool_call: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Caller-facing view of a committed message, sent as the final packet of a
/// successful turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDetail {
    pub message_id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub session_id: Uuid,
    pub message_type: MessageType,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rephrased_query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<BTreeMap<u32, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for ChatMessageDetail {
    fn from(message: &ChatMessage) -> Self {
        Self {
            message_id: message.id,
            parent_message_id: message.parent_id,
            session_id: message.session_id,
            message_type: message.message_type,
            message: message.message.clone(),
            rephrased_query: message.rephrased_query.clone(),
            files: message.files.clone(),
            citations: message.citations.clone(),
            error: message.error.clone(),
            created_at: message.created_at,
        }
    }
}
