//! turn_engine - Orchestration of one streaming conversational turn
//!
//! The entry point is [`stream_chat_turn`]: it resolves the session,
//! persona, prompt and LLM configuration, provisionally inserts the user
//! message, configures the persona's tools, then drives the answer
//! engine's event stream into an ordered packet stream for the caller.
//! Both messages of the turn become durable together on success; any
//! failure rolls the staged writes back.
//!
//! Collaborators (storage, document index, file store, the answer engine
//! itself) are traits defined here and in `chat_store`, so the pipeline is
//! testable against in-memory implementations.

pub mod chain;
pub mod classify;
pub mod engine;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod persist;
pub mod request;
pub mod tools;

pub use classify::classify_generation_error;
pub use engine::{AnswerEngine, AnswerEvent, AnswerRequest, AnswerStream, EngineError, GeneratedImage};
pub use error::{Result, TurnError};
pub use llm::{resolve_llm_config, LlmConfig, LlmProviderConfig};
pub use orchestrator::{
    stream_chat_turn, stream_chat_turn_json_lines, PacketStream, TurnRuntime,
};
pub use persist::{CapturedToolCall, CompletedGeneration};
pub use request::{CreateChatMessageRequest, ForceUseTool, RetrievalOptions, RunSearchSetting};
pub use tools::{
    ToolInstance, ToolSpec, IMAGE_GENERATION_TOOL_NAME, INTERNET_SEARCH_TOOL_NAME,
    SEARCH_TOOL_NAME,
};
