use serde::{Deserialize, Serialize};

/// One frame of the relay's event stream, tagged by `type` on the wire.
///
/// Consumers must apply events in arrival order. Concatenating every
/// `Message` fragment reproduces the `message` field of `Complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A piece of the model's reasoning trace.
    Thought { content: String },
    /// A piece of the answer text.
    Message { content: String },
    /// Sent once, after the backend stream ended.
    Complete {
        message: String,
        thoughts: String,
        #[serde(
            rename = "audioData",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        audio_data: Option<String>,
    },
    /// The backend stream broke after the response had started. No
    /// `Complete` follows.
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// `data: <json>` followed by the blank line that ends an SSE event.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
