use thiserror::Error;

/// Why a chat request could not be relayed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("backend request failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Outcome of a document that did not make it through ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("unsupported document type '{0}', only application/pdf is accepted")]
    Unsupported(String),

    #[error("backend reported that processing of '{0}' failed")]
    Failed(String),

    #[error("'{name}' was still processing after {attempts} status checks")]
    TimedOut { name: String, attempts: u32 },

    #[error("backend request failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}
