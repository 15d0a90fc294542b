//! Runtime configuration for the chat turn pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Chunk budget when the persona does not pin one.
    #[serde(default = "default_num_chunks")]
    pub default_num_chunks: u32,

    /// Fraction of the context window retrieval may occupy. Kept below 1.0
    /// to leave room for chat history on smaller models.
    #[serde(default = "default_target_chunk_percentage")]
    pub target_chunk_percentage: f32,

    /// API key for the internet-search backend; the internet-search tool
    /// cannot be configured without it.
    #[serde(default)]
    pub search_api_key: Option<String>,

    /// Sampling temperature handed to provider configs resolved here.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_num_chunks() -> u32 {
    10
}

fn default_target_chunk_percentage() -> f32 {
    0.512
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_num_chunks: default_num_chunks(),
            target_chunk_percentage: default_target_chunk_percentage(),
            search_api_key: None,
            temperature: default_temperature(),
        }
    }
}

impl ChatConfig {
    /// Layer environment overrides on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = read_env_u32("CHAT_MAX_CHUNKS") {
            config.default_num_chunks = value;
        }
        if let Some(value) = read_env_f32("CHAT_TARGET_CHUNK_PERCENTAGE") {
            config.target_chunk_percentage = value;
        }
        if let Ok(key) = std::env::var("SEARCH_API_KEY") {
            if !key.trim().is_empty() {
                config.search_api_key = Some(key);
            }
        }
        if let Some(value) = read_env_f32("GEN_AI_TEMPERATURE") {
            config.temperature = value;
        }

        config
    }
}

fn read_env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

fn read_env_f32(name: &str) -> Option<f32> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ChatConfig::default();
        assert_eq!(config.default_num_chunks, 10);
        assert!(config.target_chunk_percentage > 0.0 && config.target_chunk_percentage < 1.0);
        assert!(config.search_api_key.is_none());
    }
}
