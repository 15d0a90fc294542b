//! chat_store - Storage collaborator contracts for the chat turn pipeline
//!
//! The pipeline treats durable state as external collaborators, specified
//! at their interface:
//! - `ConversationStore` - sessions and the message tree, with staged
//!   writes that only become visible on `commit`
//! - `SearchDocStore` - the cache of retrieved search docs, addressable by
//!   id for the manual document-selection flow
//! - `DocumentIndex` - resolves document ids to retrievable sections
//! - `FileStore` - persists content fetched from URLs
//! - `PersonaStore` - assistant persona lookup
//!
//! In-memory implementations back the test suites and small deployments.

pub mod conversation;
pub mod error;
pub mod files;
pub mod index;
pub mod personas;
pub mod search_docs;

pub use conversation::{
    ConversationStore, ConversationStoreFactory, MemoryBackend, MemoryConversationStore,
    NewMessage,
};
pub use error::{Result, StoreError};
pub use files::{FileStore, MemoryFileStore};
pub use index::{DocumentIndex, MemoryDocumentIndex};
pub use personas::{MemoryPersonaStore, PersonaStore};
pub use search_docs::{MemorySearchDocStore, SearchDocStore};
