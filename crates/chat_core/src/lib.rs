//! chat_core - Core types for the streaming chat turn pipeline
//!
//! This crate provides the foundational types used across the chat crates:
//! - `message` / `session` - the conversation data model (message tree)
//! - `docs` / `citations` - retrieved document and citation handling
//! - `pruning` - the context pruning policy fed to retrieval
//! - `packet` - the typed packet stream returned to callers
//! - `tokens` - heuristic token counting
//! - `config` - runtime configuration

pub mod citations;
pub mod config;
pub mod docs;
pub mod files;
pub mod message;
pub mod packet;
pub mod pruning;
pub mod session;
pub mod tokens;

// Re-export commonly used types
pub use citations::{translate_citations, CitationConfig, CitationInfo};
pub use config::ChatConfig;
pub use docs::{
    dedupe_documents, drop_deduped_indices, relevant_documents_to_indices, InferenceSection,
    QaDocsResponse, SavedSearchDoc, SearchDoc,
};
pub use files::{ChatFileType, FileDescriptor};
pub use message::{ChatMessage, ChatMessageDetail, MessageType, ToolCallRecord};
pub use packet::ChatPacket;
pub use pruning::{DocumentPruningConfig, PruningMode};
pub use session::{
    BuiltinTool, ChatSession, LlmOverride, Persona, Prompt, ToolReference, ToolReferenceKind,
};
pub use tokens::{HeuristicTokenCounter, TokenCounter};
