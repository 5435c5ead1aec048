use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use llm_core::{IngestionError, RelayError};
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API key is required")]
    MissingCredential,

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// The cause is logged, the client only sees `public`.
    #[error("{public}: {source:#}")]
    Backend {
        public: &'static str,
        source: anyhow::Error,
    },

    #[error("Document processing failed: {0}")]
    IngestionFailed(String),

    #[error("Document processing timed out: {0}")]
    IngestionTimeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn backend(public: &'static str, source: impl Into<anyhow::Error>) -> Self {
        ApiError::Backend {
            public,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::UnsupportedMedia(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
            ApiError::Backend { .. } | ApiError::IngestionFailed(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::IngestionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::InvalidInput(msg) | ApiError::UnsupportedMedia(msg) | ApiError::NotFound(msg) => msg,
            ApiError::MissingCredential => "API key is required".to_string(),
            ApiError::Backend { public, source } => {
                tracing::error!("{}: {:#}", public, source);
                public.to_string()
            }
            ApiError::IngestionFailed(msg) | ApiError::IngestionTimeout(msg) => {
                tracing::warn!("Ingestion error: {}", msg);
                msg
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            RelayError::Backend(source) => ApiError::backend("Failed to process chat request", source),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Unsupported(_) => ApiError::UnsupportedMedia(err.to_string()),
            IngestionError::Failed(_) => ApiError::IngestionFailed(err.to_string()),
            IngestionError::TimedOut { .. } => ApiError::IngestionTimeout(err.to_string()),
            IngestionError::Backend(source) => ApiError::backend("Failed to upload file", source),
        }
    }
}
