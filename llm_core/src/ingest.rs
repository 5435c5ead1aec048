//! Document ingestion gate: upload a PDF and wait until the backend can use it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{ApiKey, FileState, GenerativeBackend, RemoteFile};
use crate::error::IngestionError;
use crate::model::FileRef;

pub const PDF_MIME: &str = "application/pdf";

/// How long to wait for a document to leave the processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionPolicy {
    /// Total status checks, including the one right after upload.
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// MIME types are compared without parameters and case-insensitively.
pub fn is_pdf(mime_type: &str) -> bool {
    mime_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MIME))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct IngestionGate {
    backend: Arc<dyn GenerativeBackend>,
    policy: IngestionPolicy,
}

impl IngestionGate {
    pub fn new(backend: Arc<dyn GenerativeBackend>, policy: IngestionPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> IngestionPolicy {
        self.policy
    }

    /// Upload `bytes` and poll until the backend reports the file ready.
    ///
    /// Non-PDF input is rejected before any backend call. Running out of
    /// status checks is reported as [`IngestionError::TimedOut`], never as
    /// success.
    pub async fn ingest(
        &self,
        key: &ApiKey,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<FileRef, IngestionError> {
        if !is_pdf(mime_type) {
            return Err(IngestionError::Unsupported(mime_type.to_string()));
        }

        info!("Uploading {} ({} bytes)", display_name, bytes.len());
        let uploaded = self
            .backend
            .upload_file(key, bytes, PDF_MIME, display_name)
            .await?;

        let ready = self.wait_until_active(key, &uploaded.name).await?;
        Ok(file_ref(ready, display_name))
    }

    async fn wait_until_active(&self, key: &ApiKey, name: &str) -> Result<RemoteFile, IngestionError> {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let file = self.backend.get_file(key, name).await?;
            match file.state {
                FileState::Active => {
                    info!("{} ready after {} status checks", name, attempt);
                    return Ok(file);
                }
                FileState::Failed => {
                    warn!("{} failed processing", name);
                    return Err(IngestionError::Failed(name.to_string()));
                }
                FileState::Processing | FileState::StateUnspecified => {
                    debug!("{} still processing (check {}/{})", name, attempt, attempts);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        warn!("{} still processing after {} checks, giving up", name, attempts);
        Err(IngestionError::TimedOut {
            name: name.to_string(),
            attempts,
        })
    }
}

fn file_ref(file: RemoteFile, fallback_name: &str) -> FileRef {
    FileRef {
        uri: file.uri,
        mime_type: file
            .mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| PDF_MIME.to_string()),
        display_name: file
            .display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string()),
    }
}
