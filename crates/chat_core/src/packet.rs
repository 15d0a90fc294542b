//! The typed packet stream returned to callers during a turn.
//!
//! Packets are emitted in the order the underlying events arrive; a turn
//! ends with either `MessageDetail` (success) or `StreamError` (failure),
//! never both.

use serde::{Deserialize, Serialize};

use crate::citations::CitationInfo;
use crate::docs::QaDocsResponse;
use crate::message::ChatMessageDetail;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPacket {
    /// Retrieved documents, after deduplication.
    DocsFound { response: QaDocsResponse },

    /// Index positions (into the already-emitted doc list) the LLM judged
    /// relevant.
    RelevanceFilter { relevant_doc_indices: Vec<usize> },

    /// One streamed answer token.
    AnswerToken { content: String },

    /// An inline citation attached to the streamed answer.
    Citation { citation: CitationInfo },

    /// File ids of freshly persisted generated images.
    ImageGenerated { file_ids: Vec<String> },

    /// Raw result of a user-defined tool, passed through.
    CustomToolResult {
        tool_name: String,
        response: serde_json::Value,
    },

    /// Details on the committed assistant message; terminal on success.
    MessageDetail { detail: ChatMessageDetail },

    /// Classified failure; terminal on error.
    StreamError { error: String },
}

impl ChatPacket {
    /// Newline-delimited JSON framing for transports that stream text.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatPacket::MessageDetail { .. } | ChatPacket::StreamError { .. }
        )
    }
}
