//! Answer engine contract
//!
//! The engine that interleaves tool invocation with token generation is an
//! external collaborator. It is consumed as a single ordered lazy sequence
//! of tagged events; the orchestrator classifies each event and re-emits
//! it as a caller-facing packet.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use chat_core::{
    ChatMessage, CitationConfig, CitationInfo, DocumentPruningConfig, FileDescriptor, Prompt,
    SearchDoc,
};

use crate::llm::LlmConfig;
use crate::request::ForceUseTool;
use crate::tools::ToolInstance;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct EngineError(pub String);

/// One generated image, by URL; the orchestrator persists it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub url: String,
    pub revised_prompt: Option<String>,
}

/// Events produced by the answer engine, in generation order.
#[derive(Debug, Clone)]
pub enum AnswerEvent {
    /// Document search finished; raw retrieved docs, pre-dedupe.
    SearchSummary {
        docs: Vec<SearchDoc>,
        rephrased_query: Option<String>,
    },

    /// The relevance filter judged the retrieved sections. Only meaningful
    /// after a `SearchSummary`.
    SectionRelevance { relevant_document_ids: Vec<String> },

    /// Image generation finished; one event may carry several images.
    ImagesGenerated { images: Vec<GeneratedImage> },

    /// Internet search finished. Does not participate in relevance
    /// filtering.
    InternetSearchSummary {
        docs: Vec<SearchDoc>,
        query: String,
    },

    /// A custom tool finished; passed through nearly verbatim.
    CustomToolResult {
        tool_name: String,
        result: serde_json::Value,
    },

    /// One streamed answer token.
    AnswerToken { content: String },

    /// An inline citation.
    Citation(CitationInfo),

    /// The final, attributable result of the turn's tool call; at most one
    /// is expected per turn.
    ToolCallFinal {
        tool_name: String,
        tool_args: serde_json::Value,
        tool_result: serde_json::Value,
    },
}

pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerEvent, EngineError>> + Send>>;

/// Everything the engine needs to run one turn's generation.
pub struct AnswerRequest {
    pub question: String,
    pub history: Vec<ChatMessage>,
    pub latest_query_files: Vec<FileDescriptor>,
    pub prompt: Prompt,
    pub prompt_override: Option<String>,
    pub llm: LlmConfig,
    pub tools: Vec<ToolInstance>,
    pub pruning: DocumentPruningConfig,
    pub citation_config: CitationConfig,
    pub force_tool: Option<ForceUseTool>,
    pub query_override: Option<String>,
}

#[async_trait]
pub trait AnswerEngine: Send + Sync {
    /// Start one generation. The returned stream is lazy; the caller's
    /// cancellation token must stop the underlying work promptly.
    async fn stream_answer(
        &self,
        request: AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<AnswerStream, EngineError>;
}
