use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

/// Caller-supplied credential for the generative backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Blank keys are treated as missing.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// A piece of streamed output, tagged as reasoning or answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub thought: bool,
}

impl Fragment {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thought: false,
        }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thought: true,
        }
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = anyhow::Result<Fragment>> + Send>>;

/// A streaming completion request with reasoning traces.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub include_thoughts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[serde(other)]
    StateUnspecified,
}

/// A file resource as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name used for status lookups, e.g. `files/abc123`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub uri: String,
    #[serde(default = "unspecified")]
    pub state: FileState,
}

fn unspecified() -> FileState {
    FileState::StateUnspecified
}

/// The external generative AI service.
///
/// Every call takes the credential explicitly; implementations hold no
/// per-user state.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Start a streaming completion. Errors before the first fragment are
    /// returned here; later ones arrive as stream items.
    async fn stream_chat(
        &self,
        key: &ApiKey,
        request: &CompletionRequest,
    ) -> anyhow::Result<FragmentStream>;

    /// Synthesize speech, returning Base64 raw PCM.
    async fn synthesize_speech(&self, key: &ApiKey, text: &str, voice: &str) -> anyhow::Result<String>;

    async fn upload_file(
        &self,
        key: &ApiKey,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> anyhow::Result<RemoteFile>;

    async fn get_file(&self, key: &ApiKey, name: &str) -> anyhow::Result<RemoteFile>;
}
