//! Playback bookkeeping for an audio control.
//!
//! The decoder itself lives wherever the container ends up (a browser audio
//! element, a desktop sink). This state machine only tracks what the control
//! shows: play/pause, elapsed time, seek position and load failures.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Nothing loaded yet.
    Empty,
    Paused,
    Playing,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackState {
    status: PlayerStatus,
    duration: f64,
    current: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            status: PlayerStatus::Empty,
            duration: 0.0,
            current: 0.0,
        }
    }

    /// Metadata arrived for a freshly loaded container.
    pub fn load(&mut self, duration_secs: f64) {
        self.duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            0.0
        };
        self.current = 0.0;
        self.status = PlayerStatus::Paused;
    }

    pub fn status(&self) -> &PlayerStatus {
        &self.status
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.status, PlayerStatus::Playing)
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Flip between playing and paused. Returns the new playing flag.
    /// Does nothing before a load or after a failure.
    pub fn toggle(&mut self) -> bool {
        self.status = match self.status {
            PlayerStatus::Paused => PlayerStatus::Playing,
            PlayerStatus::Playing => PlayerStatus::Paused,
            ref other => other.clone(),
        };
        self.is_playing()
    }

    /// Decoder reported a new playhead position.
    pub fn tick(&mut self, current_secs: f64) {
        if matches!(self.status, PlayerStatus::Empty | PlayerStatus::Failed { .. }) {
            return;
        }
        self.current = current_secs.clamp(0.0, self.duration);
    }

    /// Jump to `percent` of the way through. Returns the target time in seconds.
    pub fn seek_percent(&mut self, percent: f64) -> f64 {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        let target = percent / 100.0 * self.duration;
        self.tick(target);
        self.current
    }

    /// Playback reached the end: rewind and stop.
    pub fn ended(&mut self) {
        if self.is_playing() {
            self.status = PlayerStatus::Paused;
        }
        self.current = 0.0;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = PlayerStatus::Failed {
            reason: reason.into(),
        };
    }

    /// Position of the seek bar, 0..=100.
    pub fn progress_percent(&self) -> f64 {
        if self.duration > 0.0 {
            self.current / self.duration * 100.0
        } else {
            0.0
        }
    }
}

/// `m:ss` as shown next to the seek bar.
pub fn format_time(secs: f64) -> String {
    let secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    let whole = secs.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}
