//! Per-turn tool instances
//!
//! Built-in tools are a closed set of tagged variants; custom tools are an
//! open list built from an OpenAPI-style schema. Instances are ephemeral:
//! they bind a persona's tool references to runtime parameters for exactly
//! one turn and are owned by the orchestrator.

pub mod custom;
pub mod selector;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use chat_core::{DocumentPruningConfig, InferenceSection};

use crate::request::RetrievalOptions;

pub use custom::build_custom_tool_operations;
pub use selector::{configure_tools, force_search_settings};

pub const SEARCH_TOOL_NAME: &str = "run_search";
pub const IMAGE_GENERATION_TOOL_NAME: &str = "run_image_generation";
pub const INTERNET_SEARCH_TOOL_NAME: &str = "run_internet_search";

/// How retrieved sections are judged for relevance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceEvalMode {
    /// The fast LLM scores each section.
    Basic,
    /// No relevance filtering.
    Skip,
}

#[derive(Debug, Clone)]
pub struct SearchToolConfig {
    pub retrieval_options: Option<RetrievalOptions>,
    pub pruning: DocumentPruningConfig,
    /// Manually pinned sections; retrieval is bypassed when present.
    pub selected_sections: Option<Vec<InferenceSection>>,
    pub chunks_above: u32,
    pub chunks_below: u32,
    pub full_doc: bool,
    pub evaluation_type: RelevanceEvalMode,
}

#[derive(Debug, Clone)]
pub struct ImageGenerationToolConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub api_version: Option<String>,
    pub additional_headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct InternetSearchToolConfig {
    pub api_key: String,
}

/// One operation of a custom tool's interface schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomToolOperation {
    pub name: String,
    pub description: String,
    pub method: String,
    pub path: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub enum ToolSpec {
    Search(SearchToolConfig),
    ImageGeneration(ImageGenerationToolConfig),
    InternetSearch(InternetSearchToolConfig),
    Custom(CustomToolOperation),
}

/// A tool bound to its runtime parameters for one turn.
#[derive(Debug, Clone)]
pub struct ToolInstance {
    /// Id of the persona tool reference this instance came from.
    pub reference_id: u64,
    pub spec: ToolSpec,
}

impl ToolInstance {
    pub fn name(&self) -> &str {
        match &self.spec {
            ToolSpec::Search(_) => SEARCH_TOOL_NAME,
            ToolSpec::ImageGeneration(_) => IMAGE_GENERATION_TOOL_NAME,
            ToolSpec::InternetSearch(_) => INTERNET_SEARCH_TOOL_NAME,
            ToolSpec::Custom(operation) => &operation.name,
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(self.spec, ToolSpec::Search(_))
    }

    /// Whether this tool produces a retrieved-docs summary the relevance
    /// filter can refer back to.
    pub fn is_retrieval_capable(&self) -> bool {
        matches!(
            self.spec,
            ToolSpec::Search(_) | ToolSpec::InternetSearch(_)
        )
    }

    /// The definition handed to the LLM; also what tool token overhead is
    /// computed from.
    pub fn definition(&self) -> serde_json::Value {
        match &self.spec {
            ToolSpec::Search(_) => json!({
                "name": SEARCH_TOOL_NAME,
                "description": "Search the connected document sources",
                "parameters": {"query": {"type": "string"}},
            }),
            ToolSpec::ImageGeneration(_) => json!({
                "name": IMAGE_GENERATION_TOOL_NAME,
                "description": "Generate images from a text prompt",
                "parameters": {"prompt": {"type": "string"}},
            }),
            ToolSpec::InternetSearch(_) => json!({
                "name": INTERNET_SEARCH_TOOL_NAME,
                "description": "Search the public internet",
                "parameters": {"query": {"type": "string"}},
            }),
            ToolSpec::Custom(operation) => json!({
                "name": operation.name,
                "description": operation.description,
                "method": operation.method,
                "path": operation.path,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_names_are_stable() {
        let tool = ToolInstance {
            reference_id: 1,
            spec: ToolSpec::InternetSearch(InternetSearchToolConfig {
                api_key: "key".to_string(),
            }),
        };
        assert_eq!(tool.name(), INTERNET_SEARCH_TOOL_NAME);
        assert!(tool.is_retrieval_capable());
        assert!(!tool.is_search());
    }

    #[test]
    fn custom_tools_report_operation_name() {
        let tool = ToolInstance {
            reference_id: 7,
            spec: ToolSpec::Custom(CustomToolOperation {
                name: "getWeather".to_string(),
                description: "Fetch the weather".to_string(),
                method: "GET".to_string(),
                path: "/weather".to_string(),
                base_url: "https://api.example.com".to_string(),
            }),
        };
        assert_eq!(tool.name(), "getWeather");
        assert!(!tool.is_retrieval_capable());
    }
}
