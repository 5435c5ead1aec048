use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Voice used when neither the request nor the session picks one.
pub const DEFAULT_VOICE: &str = "Kore";

/// Prebuilt speech voices offered to the user: (name, character).
pub const PREBUILT_VOICES: &[(&str, &str)] = &[
    ("Kore", "Firm"),
    ("Zephyr", "Bright"),
    ("Puck", "Upbeat"),
    ("Charon", "Informative"),
    ("Fenrir", "Excitable"),
    ("Leda", "Youthful"),
    ("Orus", "Firm"),
    ("Aoede", "Breezy"),
    ("Callirrhoe", "Easy-going"),
    ("Autonoe", "Bright"),
    ("Enceladus", "Breathy"),
    ("Iapetus", "Clear"),
];

pub fn is_known_voice(name: &str) -> bool {
    PREBUILT_VOICES.iter().any(|(voice, _)| *voice == name)
}

const WELCOME_MESSAGE: &str = "Hello! I'm your AI wellbeing companion. I'm here to listen and to \
offer support using evidence-based approaches. You can upload psychology documents to ground our \
conversation, and set your API key in settings. How are you feeling today?";

/// One entry of the visible conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub content: String,
    pub is_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    /// Base64 raw PCM from speech synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

/// A document the backend has ingested and that turns can reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub display_name: String,
}

impl FileRef {
    /// Attachments without a URI or MIME type cannot be referenced and are skipped.
    pub fn is_usable(&self) -> bool {
        !self.uri.trim().is_empty() && !self.mime_type.trim().is_empty()
    }
}

/// Inline messages shown when a request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Chat,
    Upload,
}

impl FailureKind {
    fn text(self) -> &'static str {
        match self {
            FailureKind::Chat => "Sorry, I encountered an error processing your message. Please check your API key in settings and try again.",
            FailureKind::Upload => "Sorry, there was an error uploading your document. Please check your API key in settings and try again.",
        }
    }
}

/// The active conversation. Plain data: the backend client is passed to
/// whoever drives it rather than stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub selected_voice: String,
    pub uploaded_files: Vec<FileRef>,
    #[serde(default)]
    next_seq: u64,
}

impl Session {
    pub fn new(selected_voice: impl Into<String>) -> Self {
        let mut session = Self {
            id: format!("session_{}", uuid::Uuid::new_v4().simple()),
            messages: Vec::new(),
            selected_voice: selected_voice.into(),
            uploaded_files: Vec::new(),
            next_seq: 0,
        };
        session.push("welcome", WELCOME_MESSAGE.to_string(), false, None, None);
        session
    }

    fn push(
        &mut self,
        prefix: &str,
        content: String,
        is_user: bool,
        thoughts: Option<String>,
        audio_data: Option<String>,
    ) -> &Message {
        // Keep timestamps non-decreasing so creation order and slice order agree.
        let now = Utc::now().timestamp_millis();
        let timestamp = self
            .messages
            .last()
            .map_or(now, |last| last.timestamp.max(now));
        let id = format!("{prefix}_{}", self.next_seq);
        self.next_seq += 1;

        self.messages.push(Message {
            id,
            content,
            is_user,
            thoughts,
            audio_data,
            timestamp,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &Message {
        self.push("user", content.into(), true, None, None)
    }

    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        thoughts: Option<String>,
        audio_data: Option<String>,
    ) -> &Message {
        let thoughts = thoughts.filter(|t| !t.is_empty());
        self.push("ai", content.into(), false, thoughts, audio_data)
    }

    pub fn push_failure(&mut self, kind: FailureKind) -> &Message {
        self.push("error", kind.text().to_string(), false, None, None)
    }

    /// Remember an ingested document and confirm it in the conversation.
    pub fn add_file(&mut self, file: FileRef) -> &Message {
        let note = format!(
            "Document \"{}\" has been uploaded successfully and will inform our conversation.",
            file.display_name
        );
        self.uploaded_files.push(file);
        self.push("upload", note, false, None, None)
    }

    pub fn update_voice(&mut self, voice: impl Into<String>) {
        self.selected_voice = voice.into();
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Fresh conversation under a new id; only the voice carries over.
    pub fn reset(&mut self) {
        *self = Session::new(std::mem::take(&mut self.selected_voice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_session_has_welcome() {
        let session = Session::new("Puck");
        assert_eq!(session.messages.len(), 1);
        assert!(!session.messages[0].is_user);
        assert_eq!(session.selected_voice, "Puck");
        assert!(session.uploaded_files.is_empty());
    }

    #[test]
    fn test_ids_unique_and_time_ordered() {
        let mut session = Session::new(DEFAULT_VOICE);
        for i in 0..20 {
            session.push_user(format!("question {i}"));
            session.push_assistant(format!("answer {i}"), Some(String::new()), None);
        }
        let ids: HashSet<_> = session.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), session.messages.len());
        assert!(session
            .messages
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        // empty reasoning is not kept
        assert!(session.last().unwrap().thoughts.is_none());
    }

    #[test]
    fn test_add_file_confirms() {
        let mut session = Session::new(DEFAULT_VOICE);
        let note = session
            .add_file(FileRef {
                uri: "https://files/abc".into(),
                mime_type: "application/pdf".into(),
                display_name: "cbt.pdf".into(),
            })
            .clone();
        assert!(note.content.contains("cbt.pdf"));
        assert!(note.id.starts_with("upload_"));
        assert_eq!(session.uploaded_files.len(), 1);
    }

    #[test]
    fn test_failure_prompts_for_key() {
        let mut session = Session::new(DEFAULT_VOICE);
        let msg = session.push_failure(FailureKind::Chat);
        assert!(!msg.is_user);
        assert!(msg.content.contains("API key"));
    }

    #[test]
    fn test_message_json_shape() {
        let json = r#"{"content":"hi","isUser":true}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.is_user);
        assert_eq!(msg.id, "");
        let back = serde_json::to_value(&msg).unwrap();
        assert!(back.get("audioData").is_none());
        assert_eq!(back["isUser"], true);
    }

    #[test]
    fn test_file_ref_usable() {
        let mut file = FileRef::default();
        assert!(!file.is_usable());
        file.uri = "u".into();
        file.mime_type = "application/pdf".into();
        assert!(file.is_usable());
    }

    #[test]
    fn test_reset_keeps_voice() {
        let mut session = Session::new("Leda");
        let old_id = session.id.clone();
        session.push_user("hello");
        session.add_file(FileRef::default());
        session.reset();
        assert_ne!(session.id, old_id);
        assert_eq!(session.messages.len(), 1);
        assert!(session.uploaded_files.is_empty());
        assert_eq!(session.selected_voice, "Leda");
    }

    #[test]
    fn test_voice_catalogue() {
        assert!(is_known_voice(DEFAULT_VOICE));
        assert!(!is_known_voice("Nobody"));
    }
}
