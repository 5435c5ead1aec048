//! Gemini REST implementation of [`GenerativeBackend`].

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{ApiKey, CompletionRequest, Fragment, FragmentStream, GenerativeBackend, RemoteFile};
use crate::conversation::{Part, Role, Turn};
use crate::sse::SseDecoder;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Credentials go in this header, never in a URL.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub chat_model: String,
    pub tts_model: String,
    /// Applied to every call except the body of a chat stream.
    pub timeout: Duration,
    pub upload_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiBackend {
    client: HttpClient,
    config: GeminiConfig,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: HttpClient::new(),
            config,
        }
    }

    fn base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base(), model, method)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("{} failed: {} - {}", what, status, body);
        }
        Ok(response)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: serde_json::Value,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

impl GenerateResponse {
    fn first_parts(self) -> Vec<ResponsePart> {
        self.candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .unwrap_or_default()
    }
}

/// Fragments carried by one streamed chunk. Parts without text are skipped.
fn parse_stream_chunk(data: &str) -> Result<Vec<Fragment>> {
    let chunk: GenerateResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!("skipping unparsable stream chunk ({} bytes): {e}", data.len());
            return Ok(Vec::new());
        }
    };
    if let Some(error) = chunk.error {
        bail!("backend error {}: {}", error.code, error.message);
    }
    Ok(chunk
        .first_parts()
        .into_iter()
        .filter_map(|part| {
            part.text
                .filter(|text| !text.is_empty())
                .map(|text| Fragment {
                    text,
                    thought: part.thought,
                })
        })
        .collect())
}

/// Decode the SSE body of a streaming completion into fragments.
fn fragments(response: reqwest::Response) -> impl Stream<Item = Result<Fragment>> + Send {
    try_stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("chat stream interrupted")?;
            for data in decoder.push(&chunk) {
                for fragment in parse_stream_chunk(&data)? {
                    yield fragment;
                }
            }
        }
        for data in decoder.finish() {
            for fragment in parse_stream_chunk(&data)? {
                yield fragment;
            }
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn stream_chat(&self, key: &ApiKey, request: &CompletionRequest) -> Result<FragmentStream> {
        let url = format!(
            "{}?alt=sse",
            self.model_url(&self.config.chat_model, "streamGenerateContent")
        );

        let body = GenerateRequest {
            contents: &request.turns,
            system_instruction: (!request.system_instruction.is_empty()).then(|| SystemInstruction {
                parts: vec![Part::text(request.system_instruction.clone())],
            }),
            generation_config: json!({
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
                "thinkingConfig": { "includeThoughts": request.include_thoughts },
            }),
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, key.expose())
            .json(&body)
            .send()
            .await
            .context("could not reach the chat endpoint")?;
        let response = Self::check(response, "Streaming completion").await?;
        tracing::debug!("chat stream opened with {} turns", request.turns.len());

        Ok(Box::pin(fragments(response)))
    }

    async fn synthesize_speech(&self, key: &ApiKey, text: &str, voice: &str) -> Result<String> {
        let url = self.model_url(&self.config.tts_model, "generateContent");
        let turns = [Turn {
            role: Role::User,
            parts: vec![Part::text(text)],
        }];
        let body = GenerateRequest {
            contents: &turns,
            system_instruction: None,
            generation_config: json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                },
            }),
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, key.expose())
            .json(&body)
            .timeout(self.config.timeout)
            .send()
            .await
            .context("could not reach the speech endpoint")?;
        let response: GenerateResponse = Self::check(response, "Speech synthesis")
            .await?
            .json()
            .await
            .context("speech response was not valid JSON")?;

        response
            .first_parts()
            .into_iter()
            .find_map(|part| part.inline_data)
            .map(|inline| inline.data)
            .filter(|data| !data.is_empty())
            .context("no audio data in speech response")
    }

    async fn upload_file(
        &self,
        key: &ApiKey,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile> {
        // Resumable protocol: announce the file, then send it in one finalizing chunk.
        let start_url = format!("{}/upload/v1beta/files", self.base());
        let response = self
            .client
            .post(&start_url)
            .header(API_KEY_HEADER, key.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "displayName": display_name } }))
            .timeout(self.config.timeout)
            .send()
            .await
            .context("could not reach the upload endpoint")?;
        let response = Self::check(response, "Upload start").await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .context("upload start response carried no upload URL")?;

        let response = self
            .client
            .post(&upload_url)
            .header(API_KEY_HEADER, key.expose())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .timeout(self.config.upload_timeout)
            .send()
            .await
            // server-issued session URL
            .map_err(reqwest::Error::without_url)
            .context("could not send file bytes")?;
        let envelope: FileEnvelope = Self::check(response, "Upload")
            .await?
            .json()
            .await
            .context("upload response was not valid JSON")?;

        tracing::info!("Uploaded {} as {}", display_name, envelope.file.name);
        Ok(envelope.file)
    }

    async fn get_file(&self, key: &ApiKey, name: &str) -> Result<RemoteFile> {
        let url = format!("{}/v1beta/{}", self.base(), name);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, key.expose())
            .timeout(self.config.timeout)
            .send()
            .await
            .context("could not reach the files endpoint")?;
        Self::check(response, "File status")
            .await?
            .json()
            .await
            .context("file status was not valid JSON")
    }
}
