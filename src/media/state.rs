//! Playback state types shared by native and embedded players.

use std::time::Duration;

/// Playback status of an embedded player.
///
/// Mirrors the state codes reported by the embed API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlaybackStatus {
    /// Map a raw API state code. Unknown codes read as `Unstarted`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ended,
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Buffering,
            5 => Self::Cued,
            _ => Self::Unstarted,
        }
    }

    /// Whether the player is producing (or about to produce) sound.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

/// Options for a global mute change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteOptions {
    /// Write the new flag to storage.
    pub persist: bool,
}

impl MuteOptions {
    /// Applying the flag read from storage at startup; nothing to write back.
    pub fn initial() -> Self {
        Self { persist: false }
    }
}

impl Default for MuteOptions {
    fn default() -> Self {
        Self { persist: true }
    }
}

/// Format a duration as M:SS or H:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format a position in seconds as reported by media elements.
///
/// NaN, negative and zero values all render as `0:00`.
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return format_duration(Duration::ZERO);
    }
    format_duration(Duration::from_secs_f64(seconds))
}
