//! Common utilities for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
    Router,
};
use llm_core::sse::SseDecoder;
use llm_core::{
    ApiKey, CompletionRequest, FileState, Fragment, FragmentStream, GenerativeBackend, IngestionPolicy,
    RemoteFile, StreamEvent,
};
use relay_server::config::ServerConfig;
use relay_server::{routes, AppState};
use serde_json::Value;

pub const TEST_KEY: &str = "test-key";
pub const BOUNDARY: &str = "relay-test-boundary";

/// Scripted stand-in for the generative backend that records every call.
#[derive(Default)]
pub struct FakeBackend {
    pub fragments: Vec<Fragment>,
    /// Fail after the scripted fragments instead of ending cleanly.
    pub break_stream: bool,
    pub refuse_chat: bool,
    /// Base64 PCM returned by synthesis; `None` makes synthesis fail.
    pub speech: Option<String>,
    pub file_states: Mutex<VecDeque<FileState>>,

    pub chat_calls: AtomicUsize,
    pub tts_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub requests: Mutex<Vec<CompletionRequest>>,
    pub spoken: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn replying(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments,
            speech: Some(pcm_base64(4800)),
            ..Default::default()
        }
    }

    pub fn with_file_states(states: impl IntoIterator<Item = FileState>) -> Self {
        Self {
            file_states: Mutex::new(states.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn backend_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
            + self.tts_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    async fn stream_chat(&self, key: &ApiKey, request: &CompletionRequest) -> anyhow::Result<FragmentStream> {
        assert!(!key.expose().is_empty());
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.refuse_chat {
            anyhow::bail!("429 quota exceeded for project secret-project");
        }

        let mut items: Vec<anyhow::Result<Fragment>> = self.fragments.iter().cloned().map(Ok).collect();
        if self.break_stream {
            items.push(Err(anyhow::anyhow!("connection reset")));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn synthesize_speech(&self, _key: &ApiKey, text: &str, voice: &str) -> anyhow::Result<String> {
        self.tts_calls.fetch_add(1, Ordering::SeqCst);
        self.spoken.lock().unwrap().push((text.to_string(), voice.to_string()));
        self.speech
            .clone()
            .ok_or_else(|| anyhow::anyhow!("speech model unavailable"))
    }

    async fn upload_file(
        &self,
        _key: &ApiKey,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> anyhow::Result<RemoteFile> {
        assert!(!bytes.is_empty());
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteFile {
            name: "files/test-doc".to_string(),
            display_name: Some(display_name.to_string()),
            mime_type: Some(mime_type.to_string()),
            uri: "https://files.test/test-doc".to_string(),
            state: FileState::Processing,
        })
    }

    async fn get_file(&self, _key: &ApiKey, name: &str) -> anyhow::Result<RemoteFile> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let state = self
            .file_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FileState::Processing);
        Ok(RemoteFile {
            name: name.to_string(),
            display_name: None,
            mime_type: Some("application/pdf".to_string()),
            uri: "https://files.test/test-doc".to_string(),
            state,
        })
    }
}

/// Base64 of `len` bytes of silence.
pub fn pcm_base64(len: usize) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(vec![0u8; len])
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        ingestion: IngestionPolicy {
            max_attempts: 5,
            interval: Duration::ZERO,
        },
        ..ServerConfig::default()
    }
}

/// Create a test app instance
pub fn create_test_app(backend: Arc<FakeBackend>) -> Router {
    create_test_app_with_config(backend, test_config())
}

pub fn create_test_app_with_config(backend: Arc<FakeBackend>, config: ServerConfig) -> Router {
    routes(AppState::new(config, backend))
}

pub fn post_json(uri: &str, body: &Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn multipart_upload(field: &str, filename: &str, mime: &str, bytes: &[u8], key: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("PUT")
        .uri("/api/chat")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Decode a complete `text/event-stream` body.
pub fn parse_events(body: &[u8]) -> Vec<StreamEvent> {
    let mut decoder = SseDecoder::new();
    let mut payloads = decoder.push(body);
    payloads.extend(decoder.finish());
    payloads
        .iter()
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

pub fn user_turn(text: &str) -> Value {
    serde_json::json!({ "content": text, "isUser": true })
}
