use llm_core::Message;

use crate::error::ApiError;

/// Maximum text length for TTS requests
pub const MAX_TTS_TEXT_LENGTH: usize = 5000;

/// Validate a chat submission: there must be a history, and its last entry
/// must say something.
pub fn validate_chat_request(messages: &[Message]) -> Result<(), ApiError> {
    let Some(last) = messages.last() else {
        return Err(ApiError::InvalidInput("Messages cannot be empty".to_string()));
    };
    if last.content.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "Latest message cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate a TTS request. Returns the trimmed text and voice.
pub fn validate_tts_request<'a>(
    text: Option<&'a str>,
    voice: Option<&'a str>,
) -> Result<(&'a str, &'a str), ApiError> {
    let text = text.map(str::trim).unwrap_or_default();
    let voice = voice.map(str::trim).unwrap_or_default();
    if text.is_empty() || voice.is_empty() {
        return Err(ApiError::InvalidInput(
            "Text and voice are required for TTS".to_string(),
        ));
    }
    if text.chars().count() > MAX_TTS_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TTS_TEXT_LENGTH
        )));
    }
    if !is_valid_voice_name(voice) {
        return Err(ApiError::InvalidInput(format!("Invalid voice name: {}", voice)));
    }
    Ok((text, voice))
}

/// Voice names are single alphabetic words, e.g. `Kore`.
fn is_valid_voice_name(name: &str) -> bool {
    name.len() <= 32 && name.chars().all(|c| c.is_ascii_alphabetic())
}
