//! Error types for Parley

use thiserror::Error;

use crate::negotiation::Stage;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Parley operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A model invocation failed (network, auth, rate limit or timeout).
    /// Fatal to the whole negotiation run.
    #[error("Invocation failed at {stage} for {persona}: {message}")]
    Invocation {
        stage: Stage,
        persona: String,
        message: String,
    },

    /// Backend transport or provider error, before it is attributed to a stage
    #[error("Backend error: {0}")]
    Backend(String),

    /// The stress test output carried no recognizable verdict token
    #[error("Stress test output has no HOLDS, HOLDS_WITH_CONDITIONS or FRAGILE verdict")]
    MalformedVerdict { raw: String },

    /// The synthesis output is missing required sections
    #[error("Synthesis output is missing sections: {}", missing.join(", "))]
    MalformedSynthesis { missing: Vec<String> },

    /// Prompt composition error
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The stage an invocation failure happened at, if this is one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Invocation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether this error aborted a run mid-protocol
    pub fn is_invocation_failure(&self) -> bool {
        matches!(self, Error::Invocation { .. })
    }
}
