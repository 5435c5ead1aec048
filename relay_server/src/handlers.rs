use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::{
    extract::{multipart::Multipart, rejection::JsonRejection, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::{Stream, StreamExt};
use llm_core::{ApiKey, ChatRelayRequest, FileRef, Message, StreamEvent, PREBUILT_VOICES};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::validation::{validate_chat_request, validate_tts_request};
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
const TTS_ACTION: &str = "generate_tts";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    uploaded_files: Vec<FileRef>,
    voice: Option<String>,
    #[serde(default = "default_true")]
    generate_audio: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct TtsRequest {
    text: Option<String>,
    voice: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    audio_data: String,
}

#[derive(Serialize)]
pub struct VoiceInfo {
    name: &'static str,
    description: &'static str,
    default: bool,
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let assets = state.audio.len().await;
    Json(state.metrics.snapshot(assets))
}

/// Prebuilt voices, the configured default first.
pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    let default_voice = state.relay.settings().default_voice.as_str();
    let mut voices: Vec<VoiceInfo> = PREBUILT_VOICES
        .iter()
        .map(|&(name, description)| VoiceInfo {
            name,
            description,
            default: name == default_voice,
        })
        .collect();
    voices.sort_by_key(|voice| !voice.default);
    Json(voices)
}

/// The request's own key wins; the server-wide key is only a fallback.
fn api_key(headers: &HeaderMap, state: &AppState) -> Result<ApiKey, ApiError> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(ApiKey::new)
        .or_else(|| state.config.fallback_api_key.as_deref().and_then(ApiKey::new))
        .ok_or(ApiError::MissingCredential)
}

/// POST /chat: a streamed chat reply, or speech when `action` is `generate_tts`.
pub async fn chat_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let key = api_key(&headers, &state)?;
    let Json(body) = body.map_err(|e| ApiError::InvalidInput(format!("Invalid JSON body: {}", e.body_text())))?;

    if body.get("action").and_then(Value::as_str) == Some(TTS_ACTION) {
        let req: TtsRequest = serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidInput(format!("Invalid TTS request: {e}")))?;
        return tts(state, key, req).await.map(IntoResponse::into_response);
    }

    let req: ChatRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid chat request: {e}")))?;
    chat(state, key, req).await.map(IntoResponse::into_response)
}

async fn chat(
    state: AppState,
    key: ApiKey,
    req: ChatRequest,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let start_time = Instant::now();
    if let Err(e) = validate_chat_request(&req.messages) {
        state.metrics.chat.record_error();
        return Err(e);
    }
    info!(
        "Chat request received: {} messages, {} files, audio={}",
        req.messages.len(),
        req.uploaded_files.len(),
        req.generate_audio
    );

    let rx = state
        .relay
        .start(
            key,
            ChatRelayRequest {
                messages: req.messages,
                uploaded_files: req.uploaded_files,
                voice: req.voice,
                generate_audio: req.generate_audio,
            },
        )
        .await
        .map_err(|e| {
            state.metrics.chat.record_error();
            ApiError::from(e)
        })?;
    state
        .metrics
        .chat
        .record_request(start_time.elapsed().as_millis() as u64);

    let metrics = state.metrics.clone();
    let events = ReceiverStream::new(rx).map(move |event| {
        if matches!(event, StreamEvent::Error { .. }) {
            metrics.chat.record_error();
        }
        Event::default().json_data(&event)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn tts(state: AppState, key: ApiKey, req: TtsRequest) -> Result<Json<TtsResponse>, ApiError> {
    let start_time = Instant::now();
    let (text, voice) = validate_tts_request(req.text.as_deref(), req.voice.as_deref()).map_err(|e| {
        state.metrics.tts.record_error();
        e
    })?;
    info!("TTS request received: {} chars, voice={}", text.len(), voice);

    let audio_data = state.relay.synthesize(&key, text, voice).await.map_err(|e| {
        state.metrics.tts.record_error();
        ApiError::backend("Failed to generate speech", e)
    })?;
    state
        .metrics
        .tts
        .record_request(start_time.elapsed().as_millis() as u64);
    Ok(Json(TtsResponse { audio_data }))
}

/// PUT /chat: multipart `file` field, ingested before the reference is returned.
pub async fn upload_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<FileRef>, ApiError> {
    let start_time = Instant::now();
    let key = api_key(&headers, &state)?;

    let result = ingest_upload(&state, &key, multipart).await;
    match &result {
        Ok(_) => {
            state.metrics.ingestion.ready.fetch_add(1, Ordering::Relaxed);
            state
                .metrics
                .upload
                .record_request(start_time.elapsed().as_millis() as u64);
        }
        Err(e) => {
            let counter = match e {
                ApiError::UnsupportedMedia(_) => Some(&state.metrics.ingestion.rejected),
                ApiError::IngestionFailed(_) => Some(&state.metrics.ingestion.failed),
                ApiError::IngestionTimeout(_) => Some(&state.metrics.ingestion.timed_out),
                _ => None,
            };
            if let Some(counter) = counter {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            state.metrics.upload.record_error();
        }
    }
    result.map(Json)
}

async fn ingest_upload(state: &AppState, key: &ApiKey, mut multipart: Multipart) -> Result<FileRef, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("document.pdf").to_string();
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime(&name).to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("Could not read file: {}", e.body_text())))?;

        info!("Upload received: {} ({}, {} bytes)", name, mime_type, bytes.len());
        let file = state.gate.ingest(key, bytes.to_vec(), &mime_type, &name).await?;
        return Ok(file);
    }
    warn!("Upload without a file field");
    Err(ApiError::InvalidInput("No file provided".to_string()))
}

fn guess_mime(name: &str) -> &'static str {
    if name.to_ascii_lowercase().ends_with(".pdf") {
        llm_core::PDF_MIME
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("Notes.PDF"), "application/pdf");
        assert_eq!(guess_mime("notes.txt"), "application/octet-stream");
    }

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages":[{"content":"hi","isUser":true}]}"#).unwrap();
        assert!(req.generate_audio);
        assert!(req.uploaded_files.is_empty());
        assert!(req.voice.is_none());
    }
}
