//! LLM provider resolution for a turn.
//!
//! The answer engine itself is an external collaborator; this module only
//! resolves which provider configuration (credentials included) the turn
//! runs against, layering overrides: request > session > persona > first
//! configured provider.

use std::collections::HashMap;

use chat_core::{ChatConfig, LlmOverride, Persona};

use crate::error::{Result, TurnError};

/// An admin-configured LLM provider.
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub provider: String,
    pub default_model_name: String,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub api_version: Option<String>,
}

/// The fully resolved LLM configuration for one turn.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model_provider: String,
    pub model_name: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub api_version: Option<String>,
    pub additional_headers: HashMap<String, String>,
}

pub fn resolve_llm_config(
    persona: &Persona,
    llm_override: Option<&LlmOverride>,
    providers: &[LlmProviderConfig],
    config: &ChatConfig,
    additional_headers: HashMap<String, String>,
) -> Result<LlmConfig> {
    if providers.is_empty() {
        return Err(TurnError::Configuration(
            "LLM is disabled. Can't use chat flow without LLM.".to_string(),
        ));
    }

    let provider_name = llm_override
        .and_then(|o| o.model_provider.as_deref())
        .or(persona.llm_model_provider_override.as_deref())
        .unwrap_or(&providers[0].provider);

    let provider = providers
        .iter()
        .find(|p| p.provider == provider_name)
        .ok_or_else(|| {
            TurnError::Configuration(format!("No LLM provider configured for '{provider_name}'"))
        })?;

    let model_name = llm_override
        .and_then(|o| o.model_name.clone())
        .or_else(|| persona.llm_model_name_override.clone())
        .unwrap_or_else(|| provider.default_model_name.clone());

    let temperature = llm_override
        .and_then(|o| o.temperature)
        .unwrap_or(config.temperature);

    Ok(LlmConfig {
        model_provider: provider.provider.clone(),
        model_name,
        temperature,
        api_key: provider.api_key.clone(),
        api_base: provider.api_base.clone(),
        api_version: provider.api_version.clone(),
        additional_headers,
    })
}

/// Whether the target LLM understands structured tool-calling syntax; this
/// affects prompt formatting downstream, not the orchestration itself.
pub fn explicit_tool_calling_supported(provider: &str, model_name: &str) -> bool {
    match provider {
        "openai" | "azure" => !model_name.starts_with("o1"),
        "anthropic" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> Persona {
        Persona {
            id: 1,
            name: "default".to_string(),
            prompts: Vec::new(),
            tools: Vec::new(),
            num_chunks: None,
            llm_relevance_filter: false,
            llm_model_provider_override: None,
            llm_model_name_override: None,
        }
    }

    fn providers() -> Vec<LlmProviderConfig> {
        vec![
            LlmProviderConfig {
                provider: "openai".to_string(),
                default_model_name: "gpt-4o".to_string(),
                api_key: Some("sk-test".to_string()),
                api_base: None,
                api_version: None,
            },
            LlmProviderConfig {
                provider: "anthropic".to_string(),
                default_model_name: "claude-3-5-sonnet".to_string(),
                api_key: Some("ak-test".to_string()),
                api_base: None,
                api_version: None,
            },
        ]
    }

    #[test]
    fn no_providers_means_llm_disabled() {
        let result = resolve_llm_config(
            &persona(),
            None,
            &[],
            &ChatConfig::default(),
            HashMap::new(),
        );
        assert!(matches!(result, Err(TurnError::Configuration(_))));
    }

    #[test]
    fn defaults_to_first_provider() {
        let llm = resolve_llm_config(
            &persona(),
            None,
            &providers(),
            &ChatConfig::default(),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(llm.model_provider, "openai");
        assert_eq!(llm.model_name, "gpt-4o");
    }

    #[test]
    fn override_picks_provider_and_model() {
        let llm_override = LlmOverride {
            model_provider: Some("anthropic".to_string()),
            model_name: Some("claude-3-opus".to_string()),
            temperature: Some(0.7),
        };
        let llm = resolve_llm_config(
            &persona(),
            Some(&llm_override),
            &providers(),
            &ChatConfig::default(),
            HashMap::new(),
        )
        .unwrap();
        assert_eq!(llm.model_provider, "anthropic");
        assert_eq!(llm.model_name, "claude-3-opus");
        assert_eq!(llm.temperature, 0.7);
    }

    #[test]
    fn unknown_override_provider_is_a_configuration_error() {
        let llm_override = LlmOverride {
            model_provider: Some("mistral".to_string()),
            model_name: None,
            temperature: None,
        };
        let result = resolve_llm_config(
            &persona(),
            Some(&llm_override),
            &providers(),
            &ChatConfig::default(),
            HashMap::new(),
        );
        assert!(matches!(result, Err(TurnError::Configuration(_))));
    }

    #[test]
    fn tool_calling_support_by_provider() {
        assert!(explicit_tool_calling_supported("openai", "gpt-4o"));
        assert!(!explicit_tool_calling_supported("openai", "o1-mini"));
        assert!(explicit_tool_calling_supported("anthropic", "claude-3-5-sonnet"));
        assert!(!explicit_tool_calling_supported("ollama", "llama3"));
    }
}
