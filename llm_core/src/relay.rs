//! Stream Relay: forwards a conversation to the backend and re-emits the
//! streamed output as [`StreamEvent`]s over a channel.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::{ApiKey, CompletionRequest, FragmentStream, GenerativeBackend};
use crate::conversation::build_turns;
use crate::error::RelayError;
use crate::event::StreamEvent;
use crate::model::{FileRef, Message, DEFAULT_VOICE};
use crate::speech::{speakable_text, styled_prompt, DEFAULT_SPEECH_STYLE};

const CHANNEL_CAPACITY: usize = 100;

/// Shown to the client when the backend stream breaks; the cause is only logged.
const STREAM_FAILURE: &str = "Failed to process chat request";

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub default_voice: String,
    pub speech_style: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            system_instruction: String::new(),
            temperature: 0.7,
            max_output_tokens: 2048,
            default_voice: DEFAULT_VOICE.to_string(),
            speech_style: DEFAULT_SPEECH_STYLE.to_string(),
        }
    }
}

/// One chat submission: the full visible history, latest user message last.
#[derive(Debug, Clone, Default)]
pub struct ChatRelayRequest {
    pub messages: Vec<Message>,
    pub uploaded_files: Vec<FileRef>,
    pub voice: Option<String>,
    pub generate_audio: bool,
}

#[derive(Clone)]
pub struct Relay {
    backend: Arc<dyn GenerativeBackend>,
    settings: Arc<RelaySettings>,
}

impl Relay {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: RelaySettings) -> Self {
        Self {
            backend,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Open the backend stream and hand back the event channel.
    ///
    /// Input problems and a backend that refuses the request are returned as
    /// errors here, before any event is produced. Everything after that point
    /// is reported on the channel.
    pub async fn start(
        &self,
        key: ApiKey,
        request: ChatRelayRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>, RelayError> {
        let turns = build_turns(&request.messages, &request.uploaded_files)?;
        info!(
            "Relaying chat: {} turns, {} attachments",
            turns.len(),
            request.uploaded_files.iter().filter(|f| f.is_usable()).count()
        );

        let completion = CompletionRequest {
            turns,
            system_instruction: self.settings.system_instruction.clone(),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            include_thoughts: true,
        };
        let fragments = self.backend.stream_chat(&key, &completion).await?;

        let voice = request
            .voice
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_voice.clone());
        let speak = request.generate_audio.then_some(voice);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let relay = self.clone();
        tokio::spawn(async move {
            relay.pump(key, fragments, speak, tx).await;
        });
        Ok(rx)
    }

    async fn pump(
        &self,
        key: ApiKey,
        mut fragments: FragmentStream,
        speak: Option<String>,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let mut answer = String::new();
        let mut thoughts = String::new();

        while let Some(item) = fragments.next().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => {
                    error!("Chat stream failed: {e:#}");
                    let _ = tx
                        .send(StreamEvent::Error {
                            error: STREAM_FAILURE.to_string(),
                        })
                        .await;
                    return;
                }
            };
            if fragment.text.is_empty() {
                continue;
            }

            let event = if fragment.thought {
                thoughts.push_str(&fragment.text);
                StreamEvent::Thought {
                    content: fragment.text,
                }
            } else {
                answer.push_str(&fragment.text);
                StreamEvent::Message {
                    content: fragment.text,
                }
            };
            if tx.send(event).await.is_err() {
                debug!("Event receiver dropped, abandoning chat stream");
                return;
            }
        }
        info!(
            "Chat stream complete: answer {} chars, thoughts {} chars",
            answer.len(),
            thoughts.len()
        );

        if tx.is_closed() {
            debug!("Event receiver dropped before completion, skipping speech");
            return;
        }

        let audio_data = match speak {
            Some(voice) if !answer.trim().is_empty() => {
                match self.synthesize(&key, &answer, &voice).await {
                    Ok(audio) => Some(audio),
                    Err(e) => {
                        // text already went out; deliver it without audio
                        warn!("Speech synthesis failed, completing without audio: {e:#}");
                        None
                    }
                }
            }
            _ => None,
        };

        let complete = StreamEvent::Complete {
            message: answer,
            thoughts,
            audio_data,
        };
        if tx.send(complete).await.is_err() {
            debug!("Event receiver dropped during speech synthesis");
        }
    }

    /// Speech for `text` in `voice`, as Base64 raw PCM.
    pub async fn synthesize(&self, key: &ApiKey, text: &str, voice: &str) -> anyhow::Result<String> {
        let prompt = styled_prompt(&self.settings.speech_style, &speakable_text(text));
        let audio = self.backend.synthesize_speech(key, &prompt, voice).await?;
        info!("Synthesized speech with voice {}: {} base64 chars", voice, audio.len());
        Ok(audio)
    }
}
