//! Context pruning policy
//!
//! Governs how many retrieved chunks the retrieval tool may feed the LLM.
//! The config is an immutable value: every stage that adjusts it (tool
//! token overhead, tool-message support) returns an updated copy instead
//! of mutating shared state.

use serde::{Deserialize, Serialize};

/// The two mutually exclusive pruning modes for a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PruningMode {
    /// Caller pinned an explicit document set; everything is used verbatim.
    ManuallySelected,
    /// Retrieval works against a budget.
    Budget {
        max_chunks: u32,
        /// Fraction of the context window retrieval may occupy.
        max_window_percentage: f32,
        /// Expand chunks into neighboring sections.
        use_sections: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentPruningConfig {
    pub mode: PruningMode,
    /// Token cost of all tool definitions, subtracted from the budget by
    /// the retrieval tool.
    pub tool_num_tokens: u32,
    /// Whether the target LLM supports structured tool-calling syntax.
    pub using_tool_message: bool,
}

impl DocumentPruningConfig {
    pub fn manually_selected() -> Self {
        Self {
            mode: PruningMode::ManuallySelected,
            tool_num_tokens: 0,
            using_tool_message: false,
        }
    }

    pub fn budget(max_chunks: u32, max_window_percentage: f32, use_sections: bool) -> Self {
        Self {
            mode: PruningMode::Budget {
                max_chunks,
                max_window_percentage,
                use_sections,
            },
            tool_num_tokens: 0,
            using_tool_message: false,
        }
    }

    pub fn is_manually_selected(&self) -> bool {
        matches!(self.mode, PruningMode::ManuallySelected)
    }

    pub fn with_tool_num_tokens(mut self, tool_num_tokens: u32) -> Self {
        self.tool_num_tokens = tool_num_tokens;
        self
    }

    pub fn with_tool_message(mut self, using_tool_message: bool) -> Self {
        self.using_tool_message = using_tool_message;
        self
    }
}
