//! Tool selection and configuration for one turn.
//!
//! Maps a persona's enabled tool references to concrete, parameterized
//! tool instances. Tools are independent of one another, with one
//! exception: document search is skipped entirely when the turn carries
//! attached files (files imply no retrieval). After assembly, the token
//! cost of all tool definitions is folded into the pruning config, since
//! tool definitions consume context budget too.

use chat_core::{
    BuiltinTool, ChatConfig, DocumentPruningConfig, FileDescriptor, InferenceSection, Persona,
    TokenCounter, ToolReferenceKind,
};

use crate::error::{Result, TurnError};
use crate::llm::{explicit_tool_calling_supported, LlmConfig, LlmProviderConfig};
use crate::request::{CreateChatMessageRequest, ForceUseTool, RunSearchSetting};

use super::custom::build_custom_tool_operations;
use super::{
    ImageGenerationToolConfig, InternetSearchToolConfig, RelevanceEvalMode, SearchToolConfig,
    ToolInstance, ToolSpec, SEARCH_TOOL_NAME,
};

/// The image-generation backend provider.
const IMAGE_PROVIDER: &str = "openai";

/// Configure the persona's tools for this turn. Returns the instances in
/// persona order plus the pruning config updated with tool token overhead
/// and the structured tool-calling flag.
#[allow(clippy::too_many_arguments)]
pub fn configure_tools(
    persona: &Persona,
    request: &CreateChatMessageRequest,
    latest_query_files: &[FileDescriptor],
    selected_sections: Option<Vec<InferenceSection>>,
    llm: &LlmConfig,
    providers: &[LlmProviderConfig],
    config: &ChatConfig,
    pruning: DocumentPruningConfig,
    token_counter: &dyn TokenCounter,
) -> Result<(Vec<ToolInstance>, DocumentPruningConfig)> {
    let mut tools: Vec<ToolInstance> = Vec::new();

    for reference in &persona.tools {
        match &reference.kind {
            ToolReferenceKind::Builtin(BuiltinTool::Search) => {
                // Files attached to this turn replace retrieval outright.
                if !latest_query_files.is_empty() {
                    log::debug!(
                        "search tool skipped: {} file(s) attached to this turn",
                        latest_query_files.len()
                    );
                    continue;
                }
                tools.push(ToolInstance {
                    reference_id: reference.id,
                    spec: ToolSpec::Search(SearchToolConfig {
                        retrieval_options: request.retrieval_options.clone(),
                        pruning: pruning.clone(),
                        selected_sections: selected_sections.clone(),
                        chunks_above: request.chunks_above,
                        chunks_below: request.chunks_below,
                        full_doc: request.full_doc,
                        evaluation_type: if persona.llm_relevance_filter {
                            RelevanceEvalMode::Basic
                        } else {
                            RelevanceEvalMode::Skip
                        },
                    }),
                });
            }
            ToolReferenceKind::Builtin(BuiltinTool::ImageGeneration) => {
                let (api_key, api_base, api_version) =
                    resolve_image_generation_credential(llm, providers)?;
                tools.push(ToolInstance {
                    reference_id: reference.id,
                    spec: ToolSpec::ImageGeneration(ImageGenerationToolConfig {
                        api_key,
                        api_base,
                        api_version,
                        additional_headers: request.additional_headers.clone(),
                    }),
                });
            }
            ToolReferenceKind::Builtin(BuiltinTool::InternetSearch) => {
                let api_key = config.search_api_key.clone().ok_or_else(|| {
                    TurnError::MissingCredential(
                        "Internet search tool requires a search API key; ask your admin to add one"
                            .to_string(),
                    )
                })?;
                tools.push(ToolInstance {
                    reference_id: reference.id,
                    spec: ToolSpec::InternetSearch(InternetSearchToolConfig { api_key }),
                });
            }
            ToolReferenceKind::Custom { openapi_schema } => {
                for operation in build_custom_tool_operations(openapi_schema)? {
                    tools.push(ToolInstance {
                        reference_id: reference.id,
                        spec: ToolSpec::Custom(operation),
                    });
                }
            }
        }
    }

    let tool_num_tokens = tools
        .iter()
        .map(|tool| token_counter.count_value(&tool.definition()))
        .sum();

    let pruning = pruning
        .with_tool_num_tokens(tool_num_tokens)
        .with_tool_message(explicit_tool_calling_supported(
            &llm.model_provider,
            &llm.model_name,
        ));

    Ok((tools, pruning))
}

/// Credential priority for image generation: the turn's primary LLM
/// credential if its provider is the image backend, else the first
/// configured provider matching it.
fn resolve_image_generation_credential(
    llm: &LlmConfig,
    providers: &[LlmProviderConfig],
) -> Result<(String, Option<String>, Option<String>)> {
    if llm.model_provider == IMAGE_PROVIDER {
        if let Some(api_key) = &llm.api_key {
            return Ok((api_key.clone(), llm.api_base.clone(), llm.api_version.clone()));
        }
    }

    providers
        .iter()
        .find(|provider| provider.provider == IMAGE_PROVIDER && provider.api_key.is_some())
        .map(|provider| {
            (
                provider.api_key.clone().unwrap_or_default(),
                provider.api_base.clone(),
                provider.api_version.clone(),
            )
        })
        .ok_or_else(|| {
            TurnError::MissingCredential(
                "Image generation tool requires an OpenAI API key".to_string(),
            )
        })
}

/// The forced-tool directive for the answer engine. An explicit directive
/// on the request wins; otherwise `run_search = always` forces the search
/// tool if it was configured.
pub fn force_search_settings(
    request: &CreateChatMessageRequest,
    tools: &[ToolInstance],
) -> Option<ForceUseTool> {
    if let Some(forced) = &request.force_tool {
        return Some(forced.clone());
    }

    let search_configured = tools.iter().any(ToolInstance::is_search);
    let always = request
        .retrieval_options
        .as_ref()
        .is_some_and(|options| options.run_search == RunSearchSetting::Always);

    if search_configured && always {
        Some(ForceUseTool {
            tool_name: SEARCH_TOOL_NAME.to_string(),
            args: None,
        })
    } else {
        None
    }
}
