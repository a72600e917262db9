//! Error types for the trading assistant pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Step Contract Errors
    // =============================

    /// A required prior field is absent. Fatal for foundational steps
    /// (entry, query parsing); data steps degrade instead of raising this.
    #[error("Missing input for step '{step}': {field}")]
    MissingInput {
        step: &'static str,
        field: &'static str,
    },

    /// A collaborator call failed (timeout, non-2xx, malformed payload).
    /// Caught at the step boundary and converted into the step's fallback.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Collaborator returned text with no locatable JSON object, or JSON
    /// that fails type coercion.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A value falls outside its declared numeric range.
    #[error("Validation error: {0}")]
    Validation(String),

    // =============================
    // Graph Engine Errors
    // =============================

    #[error("Graph error: {0}")]
    Graph(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// True when the step contract allows substituting a documented
    /// fallback value instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Collaborator(_)
                | PipelineError::Parse(_)
                | PipelineError::HttpError(_)
        )
    }
}
