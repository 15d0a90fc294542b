//! Message-chain resolution
//!
//! Messages form a tree, but at most one linear path from the root is
//! current at any time. The mainline is resolved by walking from the root
//! and taking the latest-created child at every step; a visited-set guards
//! the walk against cycles even though the tree invariant forbids them.
//!
//! Resolution is read-only. The one provisional insert of a turn is made
//! by the orchestrator, which then re-resolves the chain and requires the
//! fresh message to be the new leaf - the enforcement point against
//! concurrent turns on the same mainline.

use std::collections::HashSet;

use uuid::Uuid;

use chat_core::{ChatMessage, MessageType};
use chat_store::ConversationStore;

use crate::error::{Result, TurnError};

/// The current mainline: leaf plus the history from root (exclusive) to
/// the leaf (exclusive). For a session with no messages, the leaf is the
/// synthetic root itself.
pub struct ResolvedChain {
    pub leaf: ChatMessage,
    pub history: Vec<ChatMessage>,
}

/// Resolve the parent a new message attaches to: the given id, or the
/// session root when absent.
pub async fn resolve_parent(
    store: &dyn ConversationStore,
    session_id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<ChatMessage> {
    match parent_id {
        Some(id) => Ok(store.get_message(id).await?),
        None => Ok(store.get_or_create_root_message(session_id).await?),
    }
}

/// Re-create the linear history of messages for a session.
pub async fn resolve_mainline(
    store: &dyn ConversationStore,
    session_id: Uuid,
) -> Result<ResolvedChain> {
    let root = store.get_or_create_root_message(session_id).await?;

    let mut visited: HashSet<Uuid> = HashSet::from([root.id]);
    let mut chain: Vec<ChatMessage> = Vec::new();
    let mut current_id = root.id;

    loop {
        let children = store.child_messages(current_id).await?;
        let Some(&latest_child) = children.last() else {
            break;
        };
        if !visited.insert(latest_child) {
            return Err(TurnError::ChainIntegrity(
                "cycle detected while resolving the message chain".to_string(),
            ));
        }
        let message = store.get_message(latest_child).await?;
        current_id = message.id;
        chain.push(message);
    }

    match chain.pop() {
        Some(leaf) => Ok(ResolvedChain {
            leaf,
            history: chain,
        }),
        None => Ok(ResolvedChain {
            leaf: root,
            history: Vec::new(),
        }),
    }
}

/// After a provisional insert, the fresh message must be the mainline
/// leaf; otherwise a concurrent branch won the race and the caller must
/// discard the insert.
pub fn verify_new_leaf(chain: &ResolvedChain, inserted_id: Uuid) -> Result<()> {
    if chain.leaf.id != inserted_id {
        return Err(TurnError::ChainIntegrity(
            "the new message was not on the mainline; update the chat pointers before retrying"
                .to_string(),
        ));
    }
    Ok(())
}

/// Regeneration reuses the existing leaf, which must be a user message.
pub fn verify_regeneration_leaf(chain: &ResolvedChain) -> Result<()> {
    if chain.leaf.message_type != MessageType::User {
        return Err(TurnError::InvalidRegenerationState);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chat_store::{MemoryBackend, MemoryConversationStore, NewMessage};

    use super::*;

    async fn seed_session(store: &MemoryConversationStore) -> (Uuid, ChatMessage) {
        let session = store.create_session(None, 1).await.unwrap();
        let root = store.get_or_create_root_message(session.id).await.unwrap();
        (session.id, root)
    }

    async fn insert(
        store: &MemoryConversationStore,
        session_id: Uuid,
        parent_id: Uuid,
        message_type: MessageType,
        text: &str,
    ) -> ChatMessage {
        let message = store
            .create_message(NewMessage::new(session_id, parent_id, message_type, text, 1))
            .await
            .unwrap();
        store.commit().await.unwrap();
        message
    }

    #[tokio::test]
    async fn empty_session_resolves_to_root_leaf() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let (session_id, root) = seed_session(&store).await;

        let chain = resolve_mainline(&store, session_id).await.unwrap();
        assert_eq!(chain.leaf.id, root.id);
        assert!(chain.history.is_empty());
    }

    #[tokio::test]
    async fn mainline_follows_latest_children() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let (session_id, root) = seed_session(&store).await;

        let user = insert(&store, session_id, root.id, MessageType::User, "q1").await;
        let assistant = insert(&store, session_id, user.id, MessageType::Assistant, "a1").await;
        // A branch off the user message; created later, so it becomes the
        // current mainline.
        let regenerated = insert(&store, session_id, user.id, MessageType::Assistant, "a1'").await;

        let chain = resolve_mainline(&store, session_id).await.unwrap();
        assert_eq!(chain.leaf.id, regenerated.id);
        assert_ne!(chain.leaf.id, assistant.id);
        assert_eq!(
            chain.history.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![user.id]
        );
    }

    #[tokio::test]
    async fn resolving_twice_without_mutation_is_idempotent() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let (session_id, root) = seed_session(&store).await;
        let user = insert(&store, session_id, root.id, MessageType::User, "q1").await;
        insert(&store, session_id, user.id, MessageType::Assistant, "a1").await;

        let first = resolve_mainline(&store, session_id).await.unwrap();
        let second = resolve_mainline(&store, session_id).await.unwrap();
        assert_eq!(first.leaf.id, second.leaf.id);
        assert_eq!(
            first.history.iter().map(|m| m.id).collect::<Vec<_>>(),
            second.history.iter().map(|m| m.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn stale_insert_fails_leaf_verification() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let (session_id, root) = seed_session(&store).await;

        let mine = insert(&store, session_id, root.id, MessageType::User, "mine").await;
        // A concurrent turn attached a later sibling.
        insert(&store, session_id, root.id, MessageType::User, "theirs").await;

        let chain = resolve_mainline(&store, session_id).await.unwrap();
        let result = verify_new_leaf(&chain, mine.id);
        assert!(matches!(result, Err(TurnError::ChainIntegrity(_))));
    }

    #[tokio::test]
    async fn regeneration_requires_user_leaf() {
        let store = MemoryConversationStore::new(MemoryBackend::new());
        let (session_id, root) = seed_session(&store).await;
        let user = insert(&store, session_id, root.id, MessageType::User, "q1").await;
        insert(&store, session_id, user.id, MessageType::Assistant, "a1").await;

        let chain = resolve_mainline(&store, session_id).await.unwrap();
        assert!(matches!(
            verify_regeneration_leaf(&chain),
            Err(TurnError::InvalidRegenerationState)
        ));
    }
}
