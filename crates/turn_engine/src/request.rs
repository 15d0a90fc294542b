//! The request shape for one chat turn.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chat_core::{FileDescriptor, LlmOverride};

/// Whether retrieval runs for this turn when the search tool is available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunSearchSetting {
    Always,
    Never,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalOptions {
    #[serde(default)]
    pub run_search: RunSearchSetting,
    /// Drop duplicate documents before they reach the caller.
    #[serde(default)]
    pub dedupe_docs: bool,
}

/// Directive forcing the answer engine to invoke one specific tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForceUseTool {
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatMessageRequest {
    /// Absent for the first message of a new conversation; a session is
    /// created lazily.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_session_id: Option<Uuid>,

    /// Parent for the new user message; defaults to the session root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<Uuid>,

    pub message: String,

    /// Persona for a lazily created session.
    pub persona_id: u64,

    /// Persona used for this turn only, overriding the session persona.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_assistant_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<u64>,

    /// Files attached to this turn. Mutually exclusive with retrieval.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_descriptors: Vec<FileDescriptor>,

    /// Manually pinned reference docs. Exactly one of this and
    /// `retrieval_options` must be present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_doc_ids: Option<Vec<u64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_options: Option<RetrievalOptions>,

    /// Bypasses query rephrasing when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_override: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_override: Option<LlmOverride>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_override: Option<String>,

    /// Explicitly forced tool (by name) for this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_tool: Option<ForceUseTool>,

    /// Neighboring-chunk expansion for retrieval.
    #[serde(default)]
    pub chunks_above: u32,
    #[serde(default)]
    pub chunks_below: u32,
    #[serde(default)]
    pub full_doc: bool,

    /// Regeneration flow: reuse the existing mainline leaf (which must be
    /// a user message) instead of inserting `message`.
    #[serde(default)]
    pub use_existing_user_message: bool,

    /// Per-turn credential/header overrides threaded to the engine.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_headers: HashMap<String, String>,
}

impl CreateChatMessageRequest {
    pub fn new(message: impl Into<String>, persona_id: u64) -> Self {
        Self {
            chat_session_id: None,
            parent_message_id: None,
            message: message.into(),
            persona_id,
            alternate_assistant_id: None,
            prompt_id: None,
            file_descriptors: Vec::new(),
            search_doc_ids: None,
            retrieval_options: None,
            query_override: None,
            llm_override: None,
            prompt_override: None,
            force_tool: None,
            chunks_above: 0,
            chunks_below: 0,
            full_doc: false,
            use_existing_user_message: false,
            additional_headers: HashMap::new(),
        }
    }
}
