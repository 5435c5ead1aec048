use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::model::{FileRef, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn for_author(is_user: bool) -> Self {
        if is_user {
            Role::User
        } else {
            Role::Model
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(file: &FileRef) -> Self {
        Part::File {
            file_data: FileData {
                mime_type: file.mime_type.clone(),
                file_uri: file.uri.clone(),
            },
        }
    }
}

/// A backend-native conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Rebuild backend turns from the visible history.
///
/// Every message becomes one text turn; blank messages are dropped since the
/// backend rejects empty parts. Attachment parts go on the final turn only:
/// appended to it when it is the user's, otherwise carried by a new user turn.
pub fn build_turns(history: &[Message], attachments: &[FileRef]) -> Result<Vec<Turn>, RelayError> {
    let latest = history
        .last()
        .ok_or_else(|| RelayError::InvalidInput("messages cannot be empty".to_string()))?;
    if latest.content.trim().is_empty() {
        return Err(RelayError::InvalidInput(
            "latest message cannot be empty".to_string(),
        ));
    }

    let mut turns: Vec<Turn> = history
        .iter()
        .filter(|msg| !msg.content.trim().is_empty())
        .map(|msg| Turn {
            role: Role::for_author(msg.is_user),
            parts: vec![Part::text(msg.content.clone())],
        })
        .collect();

    let files: Vec<Part> = attachments
        .iter()
        .filter(|file| file.is_usable())
        .map(Part::file)
        .collect();
    if files.is_empty() {
        return Ok(turns);
    }

    match turns.last_mut() {
        Some(last) if last.role == Role::User => last.parts.extend(files),
        _ => turns.push(Turn {
            role: Role::User,
            parts: files,
        }),
    }
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str, is_user: bool) -> Message {
        Message {
            id: String::new(),
            content: content.to_string(),
            is_user,
            thoughts: None,
            audio_data: None,
            timestamp: 0,
        }
    }

    fn pdf(uri: &str) -> FileRef {
        FileRef {
            uri: uri.to_string(),
            mime_type: "application/pdf".to_string(),
            display_name: "doc.pdf".to_string(),
        }
    }

    #[test]
    fn test_roles_follow_author() {
        let turns = build_turns(&[msg("hello", false), msg("hi", true)], &[]).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Model);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].parts, vec![Part::text("hi")]);
    }

    #[test]
    fn test_attachments_only_on_final_turn() {
        let history = [msg("first", true), msg("reply", false), msg("second", true)];
        let turns = build_turns(&history, &[pdf("u1"), FileRef::default(), pdf("u2")]).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].parts.len(), 1);
        assert_eq!(turns[1].parts.len(), 1);
        assert_eq!(turns[2].parts.len(), 3);
        assert_eq!(turns[2].parts[1], Part::file(&pdf("u1")));
        assert_eq!(turns[2].parts[2], Part::file(&pdf("u2")));
    }

    #[test]
    fn test_attachments_after_model_turn_get_user_turn() {
        let turns = build_turns(&[msg("q", true), msg("a", false)], &[pdf("u")]).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[2].parts, vec![Part::file(&pdf("u"))]);
    }

    #[test]
    fn test_empty_history_rejected() {
        assert!(matches!(build_turns(&[], &[]), Err(RelayError::InvalidInput(_))));
        assert!(matches!(
            build_turns(&[msg("  ", true)], &[]),
            Err(RelayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_wire_shape() {
        let turns = build_turns(&[msg("q", true)], &[pdf("files/1")]).unwrap();
        let json = serde_json::to_value(&turns).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "role": "user",
                "parts": [
                    { "text": "q" },
                    { "fileData": { "mimeType": "application/pdf", "fileUri": "files/1" } }
                ]
            }])
        );
    }
}
