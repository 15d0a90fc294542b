//! Turn orchestration
//!
//! Drives one full conversational turn: resolve the session, persona and
//! prompt, provisionally insert the user message, configure tools, consume
//! the answer engine's event stream and re-emit it as caller-facing
//! packets, then commit both messages atomically.
//!
//! Error surfaces split in two. Configuration-class failures are raised
//! before any packet is promised and propagate as `Err` from
//! `stream_chat_turn`. Everything that fails after that point becomes a
//! single terminal `StreamError` packet, with all staged writes rolled
//! back first.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chat_core::{
    dedupe_documents, drop_deduped_indices, relevant_documents_to_indices, ChatConfig, ChatPacket,
    CitationConfig, CitationInfo, DocumentPruningConfig, FileDescriptor, InferenceSection,
    MessageType, QaDocsResponse, SavedSearchDoc, SearchDoc, TokenCounter,
};
use chat_store::{
    ConversationStore, ConversationStoreFactory, DocumentIndex, FileStore, NewMessage,
    PersonaStore, SearchDocStore,
};

use crate::chain::{resolve_mainline, resolve_parent, verify_new_leaf, verify_regeneration_leaf};
use crate::classify::classify_generation_error;
use crate::engine::{AnswerEngine, AnswerEvent, AnswerRequest, GeneratedImage};
use crate::error::{Result, TurnError};
use crate::llm::{resolve_llm_config, LlmConfig, LlmProviderConfig};
use crate::persist::{finalize_turn, CapturedToolCall, CompletedGeneration};
use crate::request::{CreateChatMessageRequest, ForceUseTool};
use crate::tools::{configure_tools, force_search_settings, SEARCH_TOOL_NAME};

/// The ordered packet stream handed back to the caller.
pub type PacketStream = Pin<Box<dyn Stream<Item = ChatPacket> + Send>>;

const FINALIZE_FAILURE_MESSAGE: &str = "Failed to finalize response";

/// The collaborators one turn runs against. Shared across turns; each turn
/// opens its own `ConversationStore` unit of work from the factory, so one
/// turn's commit or rollback never touches another turn's staged writes.
pub struct TurnRuntime {
    pub store_factory: Arc<dyn ConversationStoreFactory>,
    pub personas: Arc<dyn PersonaStore>,
    pub doc_store: Arc<dyn SearchDocStore>,
    pub document_index: Arc<dyn DocumentIndex>,
    pub file_store: Arc<dyn FileStore>,
    pub engine: Arc<dyn AnswerEngine>,
    pub token_counter: Arc<dyn TokenCounter>,
    pub providers: Vec<LlmProviderConfig>,
    pub config: ChatConfig,
}

/// Run one turn. On success the returned stream yields packets in event
/// order and terminates with exactly one `MessageDetail` or `StreamError`.
pub async fn stream_chat_turn(
    runtime: Arc<TurnRuntime>,
    user_id: Option<Uuid>,
    request: CreateChatMessageRequest,
) -> Result<PacketStream> {
    let store = runtime.store_factory.open_store();
    match prepare_turn(&runtime, &store, user_id, &request).await {
        Ok(prepared) => {
            let (tx, rx) = mpsc::channel(1);
            let cancel = CancellationToken::new();
            tokio::spawn(drive_turn(runtime, prepared, tx, cancel));
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
        Err(err) => {
            let _ = store.rollback().await;
            if err.is_configuration() {
                return Err(err);
            }
            log::error!("turn setup failed: {err}");
            let packet = ChatPacket::StreamError {
                error: err.to_string(),
            };
            Ok(Box::pin(futures::stream::iter([packet])))
        }
    }
}

/// Everything resolved before the first packet is promised.
struct PreparedTurn {
    /// This turn's unit of work; staged writes live here until commit.
    store: Arc<dyn ConversationStore>,
    session_id: Uuid,
    user_message_id: Uuid,
    prompt_id: Option<u64>,
    dedupe_docs: bool,
    /// Present only in the manual document-selection flow.
    selected_docs: Option<Vec<SavedSearchDoc>>,
    llm: LlmConfig,
    tool_ids_by_name: HashMap<String, u64>,
    answer_request: AnswerRequest,
}

async fn prepare_turn(
    runtime: &TurnRuntime,
    store: &Arc<dyn ConversationStore>,
    user_id: Option<Uuid>,
    request: &CreateChatMessageRequest,
) -> Result<PreparedTurn> {
    let store_handle = Arc::clone(store);
    let store = store.as_ref();

    // Sessions are created lazily with the first message.
    let session = match request.chat_session_id {
        Some(id) => store.get_session(id).await.map_err(|_| {
            TurnError::Configuration(format!("Chat session {id} does not exist"))
        })?,
        None => store.create_session(user_id, request.persona_id).await?,
    };
    log::info!("[{}] received new message: {}", session.id, request.message);

    let persona_id = request.alternate_assistant_id.unwrap_or(session.persona_id);
    let persona = runtime
        .personas
        .get_persona(persona_id)
        .await?
        .ok_or_else(|| TurnError::Configuration(format!("No persona with id {persona_id}")))?;

    let prompt = match request.prompt_id {
        Some(id) => persona
            .prompts
            .iter()
            .find(|prompt| prompt.id == id)
            .cloned()
            .ok_or_else(|| {
                TurnError::Configuration(format!(
                    "No prompt with id {id} on assistant '{}'",
                    persona.name
                ))
            })?,
        None => persona.default_prompt().cloned().ok_or_else(|| {
            TurnError::Configuration("No prompt found for this assistant".to_string())
        })?,
    };

    let manual_doc_ids = request
        .search_doc_ids
        .as_deref()
        .filter(|ids| !ids.is_empty());
    if manual_doc_ids.is_none() && request.retrieval_options.is_none() {
        return Err(TurnError::Configuration(
            "Must specify a set of documents for chat or specify search options".to_string(),
        ));
    }

    let llm_override = request.llm_override.as_ref().or(session.llm_override.as_ref());
    let llm = resolve_llm_config(
        &persona,
        llm_override,
        &runtime.providers,
        &runtime.config,
        request.additional_headers.clone(),
    )?;

    let parent = resolve_parent(store, session.id, request.parent_message_id).await?;
    let (user_message, history) = if request.use_existing_user_message {
        let chain = resolve_mainline(store, session.id).await?;
        verify_regeneration_leaf(&chain)?;
        (chain.leaf, chain.history)
    } else {
        let token_count = runtime.token_counter.count_text(&request.message);
        let staged = store
            .create_message(NewMessage::new(
                session.id,
                parent.id,
                MessageType::User,
                request.message.clone(),
                token_count,
            ))
            .await?;
        if !request.file_descriptors.is_empty() {
            store
                .attach_files(staged.id, request.file_descriptors.clone())
                .await?;
        }
        let chain = resolve_mainline(store, session.id).await?;
        verify_new_leaf(&chain, staged.id)?;
        (chain.leaf, chain.history)
    };

    let question = user_message.message.clone();
    // A single-message conversation needs no query rephrasing.
    let query_override = request.query_override.clone().or_else(|| {
        if history.is_empty() {
            Some(question.clone())
        } else {
            None
        }
    });

    let mut selected_docs: Option<Vec<SavedSearchDoc>> = None;
    let mut selected_sections: Option<Vec<InferenceSection>> = None;
    let (pruning, citation_config) = if let Some(ids) = manual_doc_ids {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match runtime.doc_store.get_doc(*id).await? {
                Some(doc) => docs.push(doc),
                None => log::warn!(
                    "[{}] pinned search doc {id} no longer exists, skipping",
                    session.id
                ),
            }
        }
        let document_ids: Vec<String> = docs
            .iter()
            .map(|saved| saved.doc.document_id.clone())
            .collect();
        selected_sections = Some(
            runtime
                .document_index
                .sections_for_documents(&document_ids)
                .await?,
        );
        selected_docs = Some(docs);
        (
            DocumentPruningConfig::manually_selected(),
            CitationConfig {
                all_docs_useful: true,
            },
        )
    } else {
        let max_chunks = persona.num_chunks.unwrap_or(runtime.config.default_num_chunks);
        let use_sections = request.chunks_above > 0 || request.chunks_below > 0;
        (
            DocumentPruningConfig::budget(
                max_chunks,
                runtime.config.target_chunk_percentage,
                use_sections,
            ),
            CitationConfig {
                all_docs_useful: false,
            },
        )
    };

    let (tools, pruning) = configure_tools(
        &persona,
        request,
        &request.file_descriptors,
        selected_sections,
        &llm,
        &runtime.providers,
        &runtime.config,
        pruning,
        runtime.token_counter.as_ref(),
    )?;
    let tool_ids_by_name: HashMap<String, u64> = tools
        .iter()
        .map(|tool| (tool.name().to_string(), tool.reference_id))
        .collect();

    // Pinned documents always run through the search tool, overriding any
    // forced-tool directive on the request.
    let force_tool = if selected_docs.is_some() {
        if request.force_tool.is_some() {
            log::debug!(
                "[{}] forced tool ignored in favor of pinned documents",
                session.id
            );
        }
        Some(ForceUseTool {
            tool_name: SEARCH_TOOL_NAME.to_string(),
            args: None,
        })
    } else {
        force_search_settings(request, &tools)
    };

    Ok(PreparedTurn {
        store: store_handle,
        session_id: session.id,
        user_message_id: user_message.id,
        prompt_id: Some(prompt.id),
        dedupe_docs: request
            .retrieval_options
            .as_ref()
            .is_some_and(|options| options.dedupe_docs),
        selected_docs,
        llm: llm.clone(),
        tool_ids_by_name,
        answer_request: AnswerRequest {
            question,
            history,
            latest_query_files: request.file_descriptors.clone(),
            prompt,
            prompt_override: request.prompt_override.clone(),
            llm,
            tools,
            pruning,
            citation_config,
            force_tool,
            query_override,
        },
    })
}

async fn drive_turn(
    runtime: Arc<TurnRuntime>,
    prepared: PreparedTurn,
    tx: mpsc::Sender<ChatPacket>,
    cancel: CancellationToken,
) {
    let store = prepared.store.clone();
    let session_id = prepared.session_id;
    let user_message_id = prepared.user_message_id;
    let prompt_id = prepared.prompt_id;
    let llm = prepared.llm.clone();
    let tool_ids_by_name = prepared.tool_ids_by_name.clone();

    let mut driver = TurnDriver {
        runtime: runtime.clone(),
        session_id,
        dedupe_docs: prepared.dedupe_docs,
        selected_docs: prepared.selected_docs,
        tx,
        cancel,
        state: GenerationState::default(),
    };

    match driver.run_generation(prepared.answer_request).await {
        Ok(generation) => {
            let finalized = finalize_turn(
                store.as_ref(),
                runtime.token_counter.as_ref(),
                session_id,
                user_message_id,
                prompt_id,
                &tool_ids_by_name,
                generation,
            )
            .await;
            match finalized {
                Ok(detail) => {
                    let _ = driver.emit(ChatPacket::MessageDetail { detail }).await;
                }
                Err(err) => {
                    log::error!("[{session_id}] persistence failed: {err}");
                    let _ = store.rollback().await;
                    let _ = driver
                        .emit(ChatPacket::StreamError {
                            error: FINALIZE_FAILURE_MESSAGE.to_string(),
                        })
                        .await;
                }
            }
        }
        Err(TurnError::Cancelled) => {
            log::info!("[{session_id}] turn cancelled by the caller");
            let _ = store.rollback().await;
        }
        Err(err) => {
            let message = match &err {
                TurnError::Generation(text) => classify_generation_error(text, &llm),
                other => other.to_string(),
            };
            log::error!("[{session_id}] generation failed: {err}");
            let _ = store.rollback().await;
            let _ = driver
                .emit(ChatPacket::StreamError { error: message })
                .await;
        }
    }
}

/// Accumulated over the generation phase; feeds the persister on success.
#[derive(Default)]
struct GenerationState {
    answer: String,
    citations: Vec<CitationInfo>,
    rephrased_query: Option<String>,
    reference_docs: Vec<SavedSearchDoc>,
    /// Retrieved docs as originally ordered, pre-dedupe. Relevance
    /// judgments are resolved against this list and renumbered.
    original_docs: Vec<SearchDoc>,
    dropped_indices: Vec<usize>,
    /// A retrieval summary was seen; relevance judgments are meaningful
    /// even when it carried zero docs.
    saw_search_summary: bool,
    message_files: Vec<FileDescriptor>,
    tool_result: Option<CapturedToolCall>,
}

struct TurnDriver {
    runtime: Arc<TurnRuntime>,
    session_id: Uuid,
    dedupe_docs: bool,
    selected_docs: Option<Vec<SavedSearchDoc>>,
    tx: mpsc::Sender<ChatPacket>,
    cancel: CancellationToken,
    state: GenerationState,
}

impl TurnDriver {
    /// Deliver one packet. A dropped receiver counts as cancellation and
    /// stops the underlying generation.
    async fn emit(&self, packet: ChatPacket) -> Result<()> {
        if self.tx.send(packet).await.is_err() {
            self.cancel.cancel();
            return Err(TurnError::Cancelled);
        }
        Ok(())
    }

    async fn run_generation(&mut self, request: AnswerRequest) -> Result<CompletedGeneration> {
        let mut stream = self
            .runtime
            .engine
            .stream_answer(request, self.cancel.clone())
            .await
            .map_err(|err| TurnError::Generation(err.to_string()))?;

        while let Some(item) = stream.next().await {
            let event = item.map_err(|err| TurnError::Generation(err.to_string()))?;
            self.handle_event(event).await?;
        }

        let state = std::mem::take(&mut self.state);
        Ok(CompletedGeneration {
            answer: state.answer,
            citations: state.citations,
            rephrased_query: state.rephrased_query,
            reference_docs: state.reference_docs,
            message_files: state.message_files,
            tool_result: state.tool_result,
        })
    }

    async fn handle_event(&mut self, event: AnswerEvent) -> Result<()> {
        match event {
            AnswerEvent::SearchSummary {
                docs,
                rephrased_query,
            } => {
                self.handle_search_summary(docs, rephrased_query).await?;
            }
            AnswerEvent::SectionRelevance {
                relevant_document_ids,
            } => {
                if !self.state.saw_search_summary {
                    log::warn!(
                        "[{}] relevance judgment arrived before any retrieval summary, ignoring",
                        self.session_id
                    );
                    return Ok(());
                }
                let indices = relevant_documents_to_indices(
                    &relevant_document_ids,
                    &self.state.original_docs,
                );
                let indices = if self.state.dropped_indices.is_empty() {
                    indices
                } else {
                    drop_deduped_indices(&indices, &self.state.dropped_indices)
                };
                self.emit(ChatPacket::RelevanceFilter {
                    relevant_doc_indices: indices,
                })
                .await?;
            }
            AnswerEvent::ImagesGenerated { images } => {
                self.handle_images(images).await?;
            }
            AnswerEvent::InternetSearchSummary { docs, query } => {
                let mut saved = Vec::with_capacity(docs.len());
                for doc in docs {
                    saved.push(
                        self.runtime
                            .doc_store
                            .save_doc(doc)
                            .await
                            .map_err(|err| TurnError::Generation(err.to_string()))?,
                    );
                }
                self.state.reference_docs = saved.clone();
                self.state.saw_search_summary = true;
                self.state.rephrased_query = Some(query.clone());
                self.emit(ChatPacket::DocsFound {
                    response: QaDocsResponse {
                        top_documents: saved,
                        rephrased_query: Some(query),
                    },
                })
                .await?;
            }
            AnswerEvent::CustomToolResult { tool_name, result } => {
                self.emit(ChatPacket::CustomToolResult {
                    tool_name,
                    response: result,
                })
                .await?;
            }
            AnswerEvent::AnswerToken { content } => {
                self.state.answer.push_str(&content);
                self.emit(ChatPacket::AnswerToken { content }).await?;
            }
            AnswerEvent::Citation(citation) => {
                self.state.citations.push(citation.clone());
                self.emit(ChatPacket::Citation { citation }).await?;
            }
            AnswerEvent::ToolCallFinal {
                tool_name,
                tool_args,
                tool_result,
            } => {
                if self.state.tool_result.is_some() {
                    log::warn!(
                        "[{}] multiple final tool results in one turn, keeping the latest",
                        self.session_id
                    );
                }
                self.state.tool_result = Some(CapturedToolCall {
                    tool_name,
                    tool_args,
                    tool_result,
                });
            }
        }
        Ok(())
    }

    async fn handle_search_summary(
        &mut self,
        docs: Vec<SearchDoc>,
        rephrased_query: Option<String>,
    ) -> Result<()> {
        let saved = if let Some(selected) = &self.selected_docs {
            // Pinned documents stand in for whatever retrieval reported.
            self.state.original_docs = selected.iter().map(|doc| doc.doc.clone()).collect();
            self.state.dropped_indices.clear();
            selected.clone()
        } else {
            self.state.original_docs = docs.clone();
            let (kept, dropped) = if self.dedupe_docs {
                dedupe_documents(docs)
            } else {
                (docs, Vec::new())
            };
            self.state.dropped_indices = dropped;

            let mut saved = Vec::with_capacity(kept.len());
            for doc in kept {
                saved.push(
                    self.runtime
                        .doc_store
                        .save_doc(doc)
                        .await
                        .map_err(|err| TurnError::Generation(err.to_string()))?,
                );
            }
            saved
        };

        self.state.saw_search_summary = true;
        self.state.reference_docs = saved.clone();
        self.state.rephrased_query = rephrased_query.clone();
        self.emit(ChatPacket::DocsFound {
            response: QaDocsResponse {
                top_documents: saved,
                rephrased_query,
            },
        })
        .await
    }

    async fn handle_images(&mut self, images: Vec<GeneratedImage>) -> Result<()> {
        let urls: Vec<String> = images.into_iter().map(|image| image.url).collect();
        let file_ids = self
            .runtime
            .file_store
            .save_from_urls(&urls)
            .await
            .map_err(|err| TurnError::Generation(err.to_string()))?;
        self.state
            .message_files
            .extend(file_ids.iter().map(|id| FileDescriptor::image(id.clone())));
        self.emit(ChatPacket::ImageGenerated { file_ids }).await
    }
}

/// Frames every packet of a turn as newline-delimited JSON for text
/// transports; serialization failures become an error line.
pub async fn stream_chat_turn_json_lines(
    runtime: Arc<TurnRuntime>,
    user_id: Option<Uuid>,
    request: CreateChatMessageRequest,
) -> Result<Pin<Box<dyn Stream<Item = String> + Send>>> {
    let packets = stream_chat_turn(runtime, user_id, request).await?;
    Ok(Box::pin(packets.map(|packet| {
        packet.to_json_line().unwrap_or_else(|err| {
            log::error!("packet serialization failed: {err}");
            let fallback = ChatPacket::StreamError {
                error: "Failed to serialize packet".to_string(),
            };
            fallback
                .to_json_line()
                .unwrap_or_else(|_| "{\"type\":\"stream_error\"}\n".to_string())
        })
    })))
}
