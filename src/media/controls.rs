//! Compact audio controls.
//!
//! A minimal play button, progress bar, time label and volume slider bound
//! to one native element. The struct only tracks what the widgets should show; the host
//! copies [`CompactView`] into the DOM after each event.

use std::rc::Rc;

use super::{PlaybackCoordinator, format_seconds};
use crate::platform::MediaElement;

pub const PLAY_GLYPH: &str = "▶";
pub const PAUSE_GLYPH: &str = "⏸";

/// What the compact widgets display.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CompactView {
    pub glyph: &'static str,
    pub time_label: String,
    pub progress: f64,
    pub max: f64,
    pub volume: f64,
}

pub struct CompactControls {
    coordinator: Rc<PlaybackCoordinator>,
    element: Rc<dyn MediaElement>,
    glyph: &'static str,
    position: f64,
    duration: f64,
    /// Progress value while the user drags the bar.
    dragging: Option<f64>,
    ended: bool,
    volume: f64,
}

impl CompactControls {
    /// Bind controls to `element`, registering it with the coordinator if it
    /// is not tracked yet.
    pub fn new(coordinator: Rc<PlaybackCoordinator>, element: Rc<dyn MediaElement>) -> Self {
        coordinator.register_media(Rc::clone(&element));
        let glyph = if element.is_paused() { PLAY_GLYPH } else { PAUSE_GLYPH };
        Self {
            coordinator,
            element,
            glyph,
            position: 0.0,
            duration: 0.0,
            dragging: None,
            ended: false,
            volume: 1.0,
        }
    }

    pub fn view(&self) -> CompactView {
        let shown = self.dragging.unwrap_or(self.position);
        CompactView {
            glyph: self.glyph,
            time_label: format_seconds(shown),
            progress: shown,
            max: self.duration,
            volume: self.volume,
        }
    }

    /// The play button was clicked.
    pub fn toggle(&mut self) {
        self.coordinator.toggle_playback(&self.element);
        self.glyph = if self.element.is_paused() { PLAY_GLYPH } else { PAUSE_GLYPH };
    }

    pub fn on_loaded_metadata(&mut self, duration: f64) {
        if duration.is_finite() && duration > 0.0 {
            self.duration = duration;
        }
    }

    pub fn on_time_update(&mut self, position: f64) {
        self.position = if position.is_finite() { position.max(0.0) } else { 0.0 };
    }

    pub fn on_play(&mut self) {
        self.ended = false;
        self.glyph = PAUSE_GLYPH;
    }

    pub fn on_pause(&mut self) {
        if !self.ended {
            self.glyph = PLAY_GLYPH;
        }
    }

    pub fn on_ended(&mut self) {
        self.ended = true;
        self.glyph = PLAY_GLYPH;
        self.position = 0.0;
    }

    /// The progress bar moved under the pointer. The label follows the drag,
    /// playback position updates do not move the bar until release.
    ///
    /// Until the duration is known only negative values are clamped.
    pub fn drag(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        let upper = if self.duration > 0.0 { self.duration } else { f64::INFINITY };
        let value = value.clamp(0.0, upper);
        if value.is_finite() {
            self.dragging = Some(value);
        }
    }

    /// The pointer was released. Returns the position to seek the element
    /// to, if a drag was in progress.
    pub fn release(&mut self) -> Option<f64> {
        let target = self.dragging.take()?;
        self.position = target;
        Some(target)
    }

    /// The volume slider moved. Returns the volume applied to the element.
    pub fn set_volume(&mut self, value: f64) -> f64 {
        let volume = if value.is_finite() { value.clamp(0.0, 1.0) } else { 1.0 };
        if let Err(e) = self.element.set_volume(volume) {
            tracing::debug!("Could not set volume on {}: {}", self.element.key(), e);
        }
        self.volume = volume;
        volume
    }
}
