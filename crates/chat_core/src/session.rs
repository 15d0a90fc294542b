//! Chat sessions and personas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One conversation. Outlives many turns; mutated only by appending
/// messages to its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    /// Anonymous sessions are allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub persona_id: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_override: Option<LlmOverride>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Per-session or per-request override of the persona's LLM selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: u64,
    pub name: String,
    pub system_prompt: String,
    pub task_prompt: String,
}

/// The closed set of built-in tools.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    Search,
    ImageGeneration,
    InternetSearch,
}

/// A tool enabled on a persona: either a built-in or a custom tool
/// described by an OpenAPI-style schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReference {
    pub id: u64,
    pub kind: ToolReferenceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolReferenceKind {
    Builtin(BuiltinTool),
    Custom { openapi_schema: serde_json::Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: u64,
    pub name: String,
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub tools: Vec<ToolReference>,
    /// Overrides the configured default chunk budget when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<u32>,
    /// Whether retrieved sections go through the LLM relevance filter.
    #[serde(default)]
    pub llm_relevance_filter: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model_provider_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model_name_override: Option<String>,
}

impl Persona {
    /// The prompt used when the request does not pin one: the persona's
    /// highest-id prompt.
    pub fn default_prompt(&self) -> Option<&Prompt> {
        self.prompts.iter().max_by_key(|prompt| prompt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(id: u64) -> Prompt {
        Prompt {
            id,
            name: format!("prompt-{id}"),
            system_prompt: String::new(),
            task_prompt: String::new(),
        }
    }

    #[test]
    fn default_prompt_picks_highest_id() {
        let persona = Persona {
            id: 1,
            name: "default".to_string(),
            prompts: vec![prompt(3), prompt(7), prompt(5)],
            tools: Vec::new(),
            num_chunks: None,
            llm_relevance_filter: false,
            llm_model_provider_override: None,
            llm_model_name_override: None,
        };
        assert_eq!(persona.default_prompt().map(|p| p.id), Some(7));
    }
}
