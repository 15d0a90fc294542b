//! Turn error taxonomy
//!
//! Configuration-class errors are raised before any packet is promised and
//! propagate to the caller directly. Everything else is converted to a
//! single terminal `StreamError` packet after rolling back staged writes.

use thiserror::Error;

use chat_store::StoreError;

#[derive(Error, Debug)]
pub enum TurnError {
    /// Bad request or missing setup; raised before streaming begins.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required tool credential is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The provisional message did not land on the mainline leaf.
    #[error("Chain integrity error: {0}")]
    ChainIntegrity(String),

    /// Regeneration requires the mainline leaf to be a user message.
    #[error("The last message was not a user message; cannot reuse it for regeneration")]
    InvalidRegenerationState,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Failure surfaced by the answer engine during generation. The raw
    /// text is classified before it reaches the caller.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Assembling or committing the final messages failed after a
    /// successful generation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Cancelled")]
    Cancelled,
}

impl TurnError {
    /// Errors of this class propagate directly instead of becoming stream
    /// packets; no partial stream was promised yet.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TurnError::Configuration(_) | TurnError::MissingCredential(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;
