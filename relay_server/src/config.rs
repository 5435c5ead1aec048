// Configuration constants for the server

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use llm_core::speech::DEFAULT_SPEECH_STYLE;
use llm_core::{GeminiConfig, IngestionPolicy, RelaySettings, DEFAULT_VOICE};

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a supportive, evidence-informed psychology \
assistant. Listen carefully, respond with empathy, and draw on cognitive behavioural therapy, \
mindfulness and related approaches. Ground answers in any documents the user has uploaded. \
You are not a replacement for professional care: when someone may be at risk, encourage them \
to contact a qualified professional or local emergency services.";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub max_upload_bytes: usize,
    pub audio_cache_size: usize,
    /// Used when a request carries no key of its own.
    pub fallback_api_key: Option<String>,
    pub gemini: GeminiConfig,
    pub relay: RelaySettings,
    pub ingestion: IngestionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            request_timeout_secs: 120,
            cors_allowed_origins: None,
            max_upload_bytes: 20 * 1024 * 1024,
            audio_cache_size: 64,
            fallback_api_key: None,
            gemini: GeminiConfig::default(),
            relay: RelaySettings {
                system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
                ..RelaySettings::default()
            },
            ingestion: IngestionPolicy::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let system_instruction = match env_string("SYSTEM_INSTRUCTION_FILE") {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .with_context(|| format!("could not read system instruction from {}", path.display()))?
                    .trim()
                    .to_string()
            }
            None => defaults.relay.system_instruction.clone(),
        };

        let gemini = GeminiConfig {
            api_base: env_string("GEMINI_API_BASE").unwrap_or(defaults.gemini.api_base),
            chat_model: env_string("CHAT_MODEL").unwrap_or(defaults.gemini.chat_model),
            tts_model: env_string("TTS_MODEL").unwrap_or(defaults.gemini.tts_model),
            timeout: defaults.gemini.timeout,
            upload_timeout: defaults.gemini.upload_timeout,
        };

        let relay = RelaySettings {
            system_instruction,
            temperature: env_or("TEMPERATURE", defaults.relay.temperature),
            max_output_tokens: env_or("MAX_OUTPUT_TOKENS", defaults.relay.max_output_tokens),
            default_voice: env_string("DEFAULT_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            speech_style: env_string("SPEECH_STYLE_PROMPT").unwrap_or_else(|| DEFAULT_SPEECH_STYLE.to_string()),
        };

        let ingestion = IngestionPolicy {
            max_attempts: env_or("INGESTION_MAX_ATTEMPTS", defaults.ingestion.max_attempts),
            interval: Duration::from_millis(env_or(
                "INGESTION_INTERVAL_MS",
                defaults.ingestion.interval.as_millis() as u64,
            )),
        };

        Ok(Self {
            port: env_or("PORT", defaults.port),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            audio_cache_size: env_or("AUDIO_CACHE_SIZE", defaults.audio_cache_size),
            fallback_api_key: env_string("GEMINI_API_KEY"),
            gemini,
            relay,
            ingestion,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8085);
        assert_eq!(config.ingestion.max_attempts, 30);
        assert_eq!(config.ingestion.interval, Duration::from_secs(2));
        assert_eq!(config.relay.default_voice, "Kore");
        assert!(!config.relay.system_instruction.is_empty());
        assert!(config.fallback_api_key.is_none());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("RELAY_TEST_NUMBER", "not-a-number");
        assert_eq!(env_or("RELAY_TEST_NUMBER", 7u32), 7);
        std::env::set_var("RELAY_TEST_NUMBER", " 12 ");
        assert_eq!(env_or("RELAY_TEST_NUMBER", 7u32), 12);
        std::env::remove_var("RELAY_TEST_NUMBER");
    }
}
