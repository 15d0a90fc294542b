//! Conversation storage trait and the in-memory implementation
//!
//! A `ConversationStore` handle represents one unit of work, like a
//! database session: message writes are staged on the handle and only
//! become visible to other readers after `commit`. A failed turn calls
//! `rollback` and leaves no trace. Concurrent turns each hold their own
//! handle over the same shared backend.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Opens a fresh unit of work over shared durable state. Every turn gets
/// its own handle so staged writes never leak across turns.
pub trait ConversationStoreFactory: Send + Sync {
    fn open_store(&self) -> Arc<dyn ConversationStore>;
}

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use chat_core::{ChatMessage, ChatSession, FileDescriptor, MessageType, ToolCallRecord};

use crate::error::{Result, StoreError};

/// Fields for a message being inserted into the tree.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub parent_id: Uuid,
    pub message_type: MessageType,
    pub message: String,
    pub token_count: u32,
    pub prompt_id: Option<u64>,
    pub rephrased_query: Option<String>,
    pub error: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub reference_doc_ids: Vec<u64>,
    pub citations: Option<BTreeMap<u32, u64>>,
    pub tool_call: Option<ToolCallRecord>,
}

impl NewMessage {
    pub fn new(
        session_id: Uuid,
        parent_id: Uuid,
        message_type: MessageType,
        message: impl Into<String>,
        token_count: u32,
    ) -> Self {
        Self {
            session_id,
            parent_id,
            message_type,
            message: message.into(),
            token_count,
            prompt_id: None,
            rephrased_query: None,
            error: None,
            files: Vec::new(),
            reference_doc_ids: Vec::new(),
            citations: None,
            tool_call: None,
        }
    }
}

/// Conversation storage trait
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a session; `persona_id` binds the default assistant.
    async fn create_session(&self, user_id: Option<Uuid>, persona_id: u64) -> Result<ChatSession>;

    /// Load a session.
    async fn get_session(&self, session_id: Uuid) -> Result<ChatSession>;

    /// Every session begins with an empty synthetic root message.
    async fn get_or_create_root_message(&self, session_id: Uuid) -> Result<ChatMessage>;

    /// Load a message (staged writes on this handle are visible).
    async fn get_message(&self, message_id: Uuid) -> Result<ChatMessage>;

    /// Children of a message in creation order, staged writes included.
    async fn child_messages(&self, message_id: Uuid) -> Result<Vec<Uuid>>;

    /// Stage a new message on this handle. Not durable until `commit`.
    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessage>;

    /// Attach files to a staged message.
    async fn attach_files(&self, message_id: Uuid, files: Vec<FileDescriptor>) -> Result<()>;

    /// Promote all staged writes atomically.
    async fn commit(&self) -> Result<()>;

    /// Discard all staged writes.
    async fn rollback(&self) -> Result<()>;

    /// Number of durably committed messages in a session (diagnostics).
    async fn message_count(&self, session_id: Uuid) -> Result<usize>;
}

#[derive(Default)]
struct DurableState {
    sessions: HashMap<Uuid, ChatSession>,
    messages: HashMap<Uuid, ChatMessage>,
    /// Parent id -> child ids in creation order.
    children: HashMap<Uuid, Vec<Uuid>>,
    /// Session id -> root message id.
    roots: HashMap<Uuid, Uuid>,
}

/// Shared durable state behind all `MemoryConversationStore` handles.
/// Cheap to clone; clones share the same state.
#[derive(Default, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<DurableState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStoreFactory for MemoryBackend {
    fn open_store(&self) -> Arc<dyn ConversationStore> {
        Arc::new(MemoryConversationStore::new(self.clone()))
    }
}

#[derive(Default)]
struct StagedState {
    /// Staged messages in creation order.
    messages: Vec<ChatMessage>,
}

impl StagedState {
    fn get(&self, message_id: Uuid) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    fn get_mut(&mut self, message_id: Uuid) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}

/// In-memory conversation store; one handle per unit of work.
pub struct MemoryConversationStore {
    backend: MemoryBackend,
    staged: Mutex<StagedState>,
}

impl MemoryConversationStore {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            staged: Mutex::new(StagedState::default()),
        }
    }

    fn lock_backend(&self) -> std::sync::MutexGuard<'_, DurableState> {
        self.backend
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_staged(&self) -> std::sync::MutexGuard<'_, StagedState> {
        self.staged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_session(&self, user_id: Option<Uuid>, persona_id: u64) -> Result<ChatSession> {
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            persona_id,
            description: String::new(),
            llm_override: None,
            created_at: Utc::now(),
        };
        self.lock_backend()
            .sessions
            .insert(session.id, session.clone());
        log::debug!("[{}] session created", session.id);
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<ChatSession> {
        self.lock_backend()
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(session_id))
    }

    async fn get_or_create_root_message(&self, session_id: Uuid) -> Result<ChatMessage> {
        let mut state = self.lock_backend();
        if !state.sessions.contains_key(&session_id) {
            return Err(StoreError::SessionNotFound(session_id));
        }
        if let Some(root_id) = state.roots.get(&session_id) {
            let root_id = *root_id;
            return state
                .messages
                .get(&root_id)
                .cloned()
                .ok_or(StoreError::MessageNotFound(root_id));
        }

        let root = ChatMessage::root(session_id);
        state.roots.insert(session_id, root.id);
        state.messages.insert(root.id, root.clone());
        Ok(root)
    }

    async fn get_message(&self, message_id: Uuid) -> Result<ChatMessage> {
        if let Some(staged) = self.lock_staged().get(message_id) {
            return Ok(staged.clone());
        }
        self.lock_backend()
            .messages
            .get(&message_id)
            .cloned()
            .ok_or(StoreError::MessageNotFound(message_id))
    }

    async fn child_messages(&self, message_id: Uuid) -> Result<Vec<Uuid>> {
        let mut children = self
            .lock_backend()
            .children
            .get(&message_id)
            .cloned()
            .unwrap_or_default();
        for staged in &self.lock_staged().messages {
            if staged.parent_id == Some(message_id) {
                children.push(staged.id);
            }
        }
        Ok(children)
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<ChatMessage> {
        // Parent must exist, either durably or staged on this handle.
        let parent_exists = self.lock_staged().get(new_message.parent_id).is_some()
            || self
                .lock_backend()
                .messages
                .contains_key(&new_message.parent_id);
        if !parent_exists {
            return Err(StoreError::MessageNotFound(new_message.parent_id));
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            session_id: new_message.session_id,
            parent_id: Some(new_message.parent_id),
            message_type: new_message.message_type,
            message: new_message.message,
            token_count: new_message.token_count,
            prompt_id: new_message.prompt_id,
            rephrased_query: new_message.rephrased_query,
            error: new_message.error,
            files: new_message.files,
            reference_doc_ids: new_message.reference_doc_ids,
            citations: new_message.citations,
            tool_call: new_message.tool_call,
            created_at: Utc::now(),
        };
        self.lock_staged().messages.push(message.clone());
        Ok(message)
    }

    async fn attach_files(&self, message_id: Uuid, files: Vec<FileDescriptor>) -> Result<()> {
        let mut staged = self.lock_staged();
        let message = staged
            .get_mut(message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;
        message.files.extend(files);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut staged = self.lock_staged();
        let mut state = self.lock_backend();
        for message in staged.messages.drain(..) {
            if let Some(parent_id) = message.parent_id {
                state.children.entry(parent_id).or_default().push(message.id);
            }
            state.messages.insert(message.id, message);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.lock_staged().messages.clear();
        Ok(())
    }

    async fn message_count(&self, session_id: Uuid) -> Result<usize> {
        Ok(self
            .lock_backend()
            .messages
            .values()
            .filter(|message| message.session_id == session_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_messages_are_invisible_until_commit() {
        let backend = MemoryBackend::new();
        let store = MemoryConversationStore::new(backend.clone());

        let session = store.create_session(None, 1).await.unwrap();
        let root = store.get_or_create_root_message(session.id).await.unwrap();
        let message = store
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "hello",
                2,
            ))
            .await
            .unwrap();

        // Visible to this handle, invisible to a fresh one.
        assert!(store.get_message(message.id).await.is_ok());
        let other = MemoryConversationStore::new(backend.clone());
        assert!(other.get_message(message.id).await.is_err());
        assert_eq!(other.message_count(session.id).await.unwrap(), 1);

        store.commit().await.unwrap();
        assert!(other.get_message(message.id).await.is_ok());
        assert_eq!(other.message_count(session.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_staged_messages() {
        let backend = MemoryBackend::new();
        let store = MemoryConversationStore::new(backend);

        let session = store.create_session(None, 1).await.unwrap();
        let root = store.get_or_create_root_message(session.id).await.unwrap();
        let message = store
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "hello",
                2,
            ))
            .await
            .unwrap();

        store.rollback().await.unwrap();
        assert!(store.get_message(message.id).await.is_err());
        assert_eq!(store.message_count(session.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn children_preserve_creation_order_across_staging() {
        let backend = MemoryBackend::new();
        let store = MemoryConversationStore::new(backend);

        let session = store.create_session(None, 1).await.unwrap();
        let root = store.get_or_create_root_message(session.id).await.unwrap();

        let first = store
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "first",
                1,
            ))
            .await
            .unwrap();
        store.commit().await.unwrap();

        let second = store
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "second",
                1,
            ))
            .await
            .unwrap();

        let children = store.child_messages(root.id).await.unwrap();
        assert_eq!(children, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn handles_stage_independently() {
        let backend = MemoryBackend::new();
        let first = backend.open_store();
        let second = backend.open_store();

        let session = first.create_session(None, 1).await.unwrap();
        let root = first.get_or_create_root_message(session.id).await.unwrap();

        let staged_first = first
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "mine",
                1,
            ))
            .await
            .unwrap();
        let staged_second = second
            .create_message(NewMessage::new(
                session.id,
                root.id,
                MessageType::User,
                "theirs",
                1,
            ))
            .await
            .unwrap();

        // Committing one handle must not promote the other's staged
        // message, and rolling one back must not discard the other's.
        second.commit().await.unwrap();
        let reader = backend.open_store();
        assert!(reader.get_message(staged_second.id).await.is_ok());
        assert!(reader.get_message(staged_first.id).await.is_err());
        assert_eq!(reader.message_count(session.id).await.unwrap(), 2);

        second.rollback().await.unwrap();
        assert!(first.get_message(staged_first.id).await.is_ok());

        first.commit().await.unwrap();
        assert_eq!(reader.message_count(session.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn attach_files_requires_staged_message() {
        let backend = MemoryBackend::new();
        let store = MemoryConversationStore::new(backend);

        let result = store
            .attach_files(Uuid::new_v4(), vec![FileDescriptor::image("f1")])
            .await;
        assert!(matches!(result, Err(StoreError::MessageNotFound(_))));
    }
}
