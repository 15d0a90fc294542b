//! Generation-error classification
//!
//! Low-level failures from the LLM layer leak provider internals and,
//! worst case, credentials. Every generation-phase failure is mapped to
//! one safe, user-facing message per failure class before it reaches the
//! caller. The resolved API key must never be echoed back.

use crate::llm::LlmConfig;

/// Marker left by HTTP clients when the bearer header is built from an
/// empty key.
const MALFORMED_BEARER_MARKER: &str = "Illegal header value b'Bearer  '";

/// Marker for keys carrying whitespace or reserved characters.
const HEADER_ENCODING_MARKER: &str =
    "Invalid leading whitespace, reserved character(s), or return character(s) in header value";

/// Classify a generation-phase error into its user-facing message, in
/// priority order.
pub fn classify_generation_error(error_text: &str, llm: &LlmConfig) -> String {
    let provider = &llm.model_provider;

    if error_text.contains(MALFORMED_BEARER_MARKER) {
        return format!(
            "Authentication error: Invalid or empty API key provided for '{provider}'. \
             Please check your API key configuration."
        );
    }

    if error_text.contains(HEADER_ENCODING_MARKER) {
        return format!(
            "Authentication error: Invalid API key format for '{provider}'. Please ensure your \
             API key does not contain leading/trailing whitespace or invalid characters."
        );
    }

    if let Some(api_key) = &llm.api_key {
        if !api_key.is_empty()
            && error_text
                .to_lowercase()
                .contains(&api_key.to_lowercase())
        {
            return format!(
                "LLM failed to respond. Invalid API key error from '{provider}'."
            );
        }
    }

    "An unexpected error occurred while processing your request. Please try again later."
        .to_string()
}
