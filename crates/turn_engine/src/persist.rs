//! Turn persistence
//!
//! Runs only after the generation phase completed without raising. Builds
//! the final assistant message and commits it together with the staged
//! user message as one transaction, so an external reader never observes
//! a user message without its assistant reply.

use std::collections::HashMap;

use uuid::Uuid;

use chat_core::{
    translate_citations, ChatMessageDetail, CitationInfo, FileDescriptor, MessageType,
    SavedSearchDoc, TokenCounter, ToolCallRecord,
};
use chat_store::{ConversationStore, NewMessage};

use crate::error::{Result, TurnError};

/// The single attributable tool result captured during generation.
#[derive(Debug, Clone)]
pub struct CapturedToolCall {
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    pub tool_result: serde_json::Value,
}

/// Handoff value from the generation phase: everything the persister
/// needs, with generation provably finished.
#[derive(Debug, Clone, Default)]
pub struct CompletedGeneration {
    pub answer: String,
    pub citations: Vec<CitationInfo>,
    pub rephrased_query: Option<String>,
    pub reference_docs: Vec<SavedSearchDoc>,
    pub message_files: Vec<FileDescriptor>,
    pub tool_result: Option<CapturedToolCall>,
}

/// Assemble and commit the assistant message. Any failure here is a
/// persistence error: the LLM output itself succeeded, only bookkeeping
/// failed.
pub async fn finalize_turn(
    store: &dyn ConversationStore,
    token_counter: &dyn TokenCounter,
    session_id: Uuid,
    parent_id: Uuid,
    prompt_id: Option<u64>,
    tool_ids_by_name: &HashMap<String, u64>,
    generation: CompletedGeneration,
) -> Result<ChatMessageDetail> {
    let citations = if generation.reference_docs.is_empty() {
        None
    } else {
        Some(translate_citations(
            &generation.citations,
            &generation.reference_docs,
        ))
    };

    let tool_call = generation.tool_result.map(|captured| {
        let tool_id = tool_ids_by_name
            .get(&captured.tool_name)
            .copied()
            .unwrap_or_else(|| {
                log::warn!(
                    "captured tool call '{}' has no configured tool id",
                    captured.tool_name
                );
                0
            });
        ToolCallRecord {
            tool_id,
            tool_name: captured.tool_name,
            tool_arguments: captured.tool_args,
            tool_result: captured.tool_result,
        }
    });

    let token_count = token_counter.count_text(&generation.answer);
    let mut new_message = NewMessage::new(
        session_id,
        parent_id,
        MessageType::Assistant,
        generation.answer,
        token_count,
    );
    new_message.prompt_id = prompt_id;
    new_message.rephrased_query = generation.rephrased_query;
    new_message.files = generation.message_files;
    new_message.reference_doc_ids = generation.reference_docs.iter().map(|d| d.id).collect();
    new_message.citations = citations;
    new_message.tool_call = tool_call;

    let assistant = store
        .create_message(new_message)
        .await
        .map_err(|e| TurnError::Persistence(e.to_string()))?;

    // Commits the user and assistant messages together.
    store
        .commit()
        .await
        .map_err(|e| TurnError::Persistence(e.to_string()))?;

    log::debug!(
        "[{}] turn committed, assistant message {}",
        session_id,
        assistant.id
    );

    Ok(ChatMessageDetail::from(&assistant))
}

#[cfg(test)]
mod tests {
    use chat_core::{HeuristicTokenCounter, SearchDoc};
    use chat_store::{MemoryBackend, MemoryConversationStore};

    use super::*;

    fn saved(id: u64, document_id: &str) -> SavedSearchDoc {
        SavedSearchDoc {
            id,
            doc: SearchDoc {
                document_id: document_id.to_string(),
                semantic_identifier: document_id.to_string(),
                link: None,
                blurb: String::new(),
                source_type: "file".to_string(),
                score: None,
            },
        }
    }

    #[tokio::test]
    async fn finalize_commits_user_and_assistant_together() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let session = store.create_session(None, 1).await.unwrap();
        let root = store.get_or_create_root_message(session.id).await.unwrap();
        let user = store
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "question",
                2,
            ))
            .await
            .unwrap();

        let generation = CompletedGeneration {
            answer: "answer".to_string(),
            citations: vec![CitationInfo {
                citation_num: 1,
                document_id: "a".to_string(),
            }],
            rephrased_query: Some("rephrased".to_string()),
            reference_docs: vec![saved(5, "a")],
            message_files: vec![FileDescriptor::image("img-1")],
            tool_result: Some(CapturedToolCall {
                tool_name: "run_search".to_string(),
                tool_args: serde_json::json!({"query": "question"}),
                tool_result: serde_json::json!([]),
            }),
        };

        let tool_ids = HashMap::from([("run_search".to_string(), 3)]);
        let detail = finalize_turn(
            &store,
            &HeuristicTokenCounter::default(),
            session.id,
            user.id,
            Some(1),
            &tool_ids,
            generation,
        )
        .await
        .unwrap();

        assert_eq!(detail.parent_message_id, Some(user.id));
        assert_eq!(detail.citations.unwrap().get(&1), Some(&5));

        // Both messages are now durable: root + user + assistant.
        assert_eq!(store.message_count(session.id).await.unwrap(), 3);
        let assistant = store.get_message(detail.message_id).await.unwrap();
        assert_eq!(assistant.tool_call.as_ref().unwrap().tool_id, 3);
        assert_eq!(assistant.files, vec![FileDescriptor::image("img-1")]);
    }
}
