//! Client-side settings that expire, like the cookies a browser would keep.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expiring<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn get_at(&self, now: DateTime<Utc>) -> Option<&T> {
        (now < self.expires_at).then_some(&self.value)
    }

    pub fn get(&self) -> Option<&T> {
        self.get_at(Utc::now())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<Expiring<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice: Option<Expiring<String>>,
}

impl Preferences {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().and_then(Expiring::get).map(String::as_str)
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_ref().and_then(Expiring::get).map(String::as_str)
    }

    /// A blank key clears the stored one.
    pub fn set_api_key(&mut self, key: &str) {
        let key = key.trim();
        self.api_key = (!key.is_empty()).then(|| Expiring::new(key.to_string(), ttl()));
    }

    pub fn set_voice(&mut self, voice: &str) {
        self.voice = Some(Expiring::new(voice.to_string(), ttl()));
    }

    /// Missing file reads as empty preferences.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read preferences from {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid preferences in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("could not write preferences to {}", path.display()))
    }
}

fn ttl() -> Duration {
    Duration::days(DEFAULT_TTL_DAYS)
}
