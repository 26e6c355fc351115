use adlens_core::errors::{CollaboratorError, StateError};

/// Run-level failures. Each one aborts the run; no partial result is returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("the plan has no query to execute")]
    MissingQuery,

    #[error("planning failed: {0}")]
    Planning(#[source] CollaboratorError),

    #[error("data retrieval failed: {0}")]
    Retrieval(#[source] CollaboratorError),

    #[error("narrative synthesis failed: {0}")]
    Synthesis(#[source] CollaboratorError),

    #[error("pipeline state error: {0}")]
    State(#[from] StateError),
}

impl PipelineError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingQuery => "missing_query",
            Self::Planning(_) => "planning",
            Self::Retrieval(_) => "retrieval",
            Self::Synthesis(_) => "synthesis",
            Self::State(_) => "state",
        }
    }
}
