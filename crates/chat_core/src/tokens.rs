//! Token counting for message and tool-definition budgeting.
//!
//! Provides heuristic token estimation (chars/4 + 10% margin); callers that
//! need exact counts can plug in their own `TokenCounter`.

use serde_json::Value;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;

    /// Count tokens in a serialized JSON value (tool definitions, schemas).
    fn count_value(&self, value: &Value) -> u32 {
        self.count_text(&value.to_string())
    }
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation: tokens ≈ characters / 4, with a safety margin.
/// Intentionally conservative to avoid underestimating token usage.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: f64,
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: f64, safety_margin: f64) -> Self {
        Self {
            chars_per_token,
            safety_margin,
        }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4.0, 1.1)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let estimate = (text.chars().count() as f64 / self.chars_per_token) * self.safety_margin;
        estimate.ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_zero() {
        let counter = HeuristicTokenCounter::default();
        assert_eq!(counter.count_text(""), 0);
    }

    #[test]
    fn estimate_scales_with_length() {
        let counter = HeuristicTokenCounter::default();
        let short = counter.count_text("hello");
        let long = counter.count_text(&"hello ".repeat(50));
        assert!(short >= 1);
        assert!(long > short * 10);
    }

    #[test]
    fn json_values_count_via_serialization() {
        let counter = HeuristicTokenCounter::default();
        let value = serde_json::json!({"name": "search", "description": "retrieve documents"});
        assert!(counter.count_value(&value) > 0);
    }
}
