//! Playback exclusivity across native and embedded players.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     PlaybackCoordinator                       │
//! │   global mute flag (persisted) · subscribers · landing policy │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │ pause all / except            │ pause all / except
//!                 ▼                               ▼
//! ┌───────────────────────────────┐ ┌─────────────────────────────┐
//! │         MediaRegistry         │ │         PlayerBridge        │
//! │  <audio>/<video> + sentinel   │ │  embed controllers, pending │
//! └───────────────┬───────────────┘ └──────────────┬──────────────┘
//!                 │ `play` event                   │ state → Playing
//!                 └────────────► PlaybackHub ◄─────┘
//! ```
//!
//! Both the registry and the bridge report "something started playing" to
//! the coordinator through [`PlaybackHub`], and the coordinator pauses
//! everything else. The rule is enforced reactively, so two near-simultaneous
//! starts resolve to whichever event was processed last.

mod bridge;
mod controls;
mod coordinator;
mod fallback;
mod landing;
mod registry;
mod state;

pub use bridge::PlayerBridge;
pub use controls::{CompactControls, CompactView};
pub use coordinator::{PlaybackCoordinator, PlaybackPolicy};
pub use fallback::{VideoFallback, video_fallback};
pub use registry::MediaRegistry;
pub use state::{MuteOptions, PlaybackStatus, format_duration, format_seconds};

use crate::platform::ElementKey;

/// Where the registry and the bridge report playback starts.
pub(crate) trait PlaybackHub {
    /// A native element fired its `play` event.
    fn native_started(&self, key: ElementKey);

    /// An embedded controller entered the playing state.
    fn embedded_started(&self, key: ElementKey);

    /// An embedded controller finished initializing.
    fn embedded_ready(&self, _key: ElementKey) {}
}
