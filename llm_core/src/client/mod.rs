//! The consuming side of the relay: an HTTP client for its routes and a
//! controller that keeps a [`Session`] in step with what the relay streams.

mod assembler;
mod prefs;

pub use assembler::{Step, StreamAssembler};
pub use prefs::{Expiring, Preferences, DEFAULT_TTL_DAYS};

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::{multipart, Client as HttpClient, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::ApiKey;
use crate::event::StreamEvent;
use crate::ingest::{is_pdf, PDF_MIME};
use crate::model::{FailureKind, FileRef, Message, Session};
use crate::sse::SseDecoder;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody<'a> {
    messages: &'a [Message],
    uploaded_files: &'a [FileRef],
    voice: &'a str,
    generate_audio: bool,
}

#[derive(Serialize)]
struct TtsBody<'a> {
    action: &'static str,
    text: &'a str,
    voice: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsReply {
    audio_data: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// HTTP client for a running relay server.
#[derive(Clone)]
pub struct RelayClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<ApiKey>,
    generate_audio: bool,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            generate_audio: true,
        }
    }

    /// Ask the relay to skip speech synthesis after each reply.
    pub fn without_audio(mut self) -> Self {
        self.generate_audio = false;
        self
    }

    pub fn set_api_key(&mut self, api_key: Option<ApiKey>) {
        self.api_key = api_key;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/api/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key.expose()),
            None => builder,
        }
    }

    /// Submit the whole session and stream back the relay's events.
    pub async fn chat(&self, session: &Session) -> Result<impl Stream<Item = Result<StreamEvent>> + Send> {
        let body = ChatBody {
            messages: &session.messages,
            uploaded_files: &session.uploaded_files,
            voice: &session.selected_voice,
            generate_audio: self.generate_audio,
        };
        let response = self
            .request(Method::POST, "chat")
            .json(&body)
            .send()
            .await
            .context("could not reach the relay")?;
        Ok(events(check(response).await?))
    }

    /// Speech for `text`, as Base64 raw PCM.
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<String> {
        let response = self
            .request(Method::POST, "chat")
            .json(&TtsBody {
                action: "generate_tts",
                text,
                voice,
            })
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("could not reach the relay")?;
        let reply: TtsReply = check(response).await?.json().await.context("invalid speech reply")?;
        Ok(reply.audio_data)
    }

    /// Send a document for ingestion. Only PDFs are accepted; anything else
    /// is refused without a request.
    pub async fn upload(&self, name: &str, mime_type: &str, bytes: Vec<u8>) -> Result<FileRef> {
        if !is_pdf(mime_type) {
            bail!("only PDF documents can be uploaded, got '{}'", mime_type);
        }
        let part = multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(PDF_MIME)?;
        let response = self
            .request(Method::PUT, "chat")
            .multipart(multipart::Form::new().part("file", part))
            .send()
            .await
            .context("could not reach the relay")?;
        check(response).await?.json().await.context("invalid upload reply")
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorReply>(&body) {
        Ok(reply) => bail!("relay returned {}: {}", status, reply.error),
        Err(_) => bail!("relay returned {}: {}", status, body),
    }
}

fn events(response: reqwest::Response) -> impl Stream<Item = Result<StreamEvent>> + Send {
    try_stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.context("relay stream interrupted")?;
            for data in decoder.push(&chunk) {
                yield serde_json::from_str::<StreamEvent>(&data).context("malformed relay event")?;
            }
        }
        for data in decoder.finish() {
            yield serde_json::from_str::<StreamEvent>(&data).context("malformed relay event")?;
        }
    }
}

/// Drives one conversation against a relay.
///
/// Every operation takes `&mut self`, so a second submission cannot start
/// while one is still streaming.
pub struct ChatController {
    client: RelayClient,
    session: Session,
    assembler: StreamAssembler,
}

impl ChatController {
    pub fn new(client: RelayClient, session: Session) -> Self {
        Self {
            client,
            session,
            assembler: StreamAssembler::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client_mut(&mut self) -> &mut RelayClient {
        &mut self.client
    }

    /// Submit `text` and stream the reply. `on_update` sees the partial
    /// state after every fragment. Returns the assistant message appended to
    /// the session (an inline failure note if anything went wrong), or
    /// `None` for blank input.
    pub async fn send<F>(&mut self, text: &str, mut on_update: F) -> Option<&Message>
    where
        F: FnMut(&StreamAssembler),
    {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.session.push_user(text);

        match self.stream_reply(&mut on_update).await {
            Ok(Step::Completed {
                message,
                thoughts,
                audio_data,
            }) => Some(self.session.push_assistant(message, thoughts, audio_data)),
            Ok(step) => {
                warn!("Chat reply did not complete: {:?}", step);
                Some(self.session.push_failure(FailureKind::Chat))
            }
            Err(e) => {
                warn!("Chat request failed: {e:#}");
                self.assembler.clear();
                Some(self.session.push_failure(FailureKind::Chat))
            }
        }
    }

    async fn stream_reply<F>(&mut self, on_update: &mut F) -> Result<Step>
    where
        F: FnMut(&StreamAssembler),
    {
        let events = self.client.chat(&self.session).await?;
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            match self.assembler.apply(event?) {
                Step::Updated => on_update(&self.assembler),
                done => return Ok(done),
            }
        }
        bail!("relay stream ended without a completion")
    }

    /// Ingest a document and confirm it in the conversation, or note the failure.
    pub async fn upload(&mut self, name: &str, mime_type: &str, bytes: Vec<u8>) -> &Message {
        match self.client.upload(name, mime_type, bytes).await {
            Ok(file) => {
                info!("Document {} ingested", file.display_name);
                self.session.add_file(file)
            }
            Err(e) => {
                warn!("Upload of {} failed: {e:#}", name);
                self.session.push_failure(FailureKind::Upload)
            }
        }
    }

    pub fn update_voice(&mut self, voice: &str) {
        self.session.update_voice(voice);
    }

    /// Start over with a fresh session, keeping the selected voice.
    pub fn reset(&mut self) {
        self.assembler.clear();
        self.session.reset();
    }
}
