//! Platform seams for the runtime.
//!
//! Everything the runtime touches in the browser sits behind one of these
//! traits: native media elements, embed iframes, the third-party player API,
//! per-browser storage, timers and the DOM surface used by navigation.
//! Production code uses the adapters in [`web`] (wasm32 + `web` feature);
//! the headless harness and tests use the deterministic fakes in [`memory`].
//!
//! The runtime is single-threaded, so none of these traits require
//! `Send`/`Sync`. Implementations are free to call back into the runtime
//! synchronously (a `play()` that fires its listeners immediately, for
//! example); the runtime never holds a borrow across such calls.

pub mod memory;
#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub mod web;

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::media::PlaybackStatus;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a media element or embed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct ElementKey(pub u64);

impl ElementKey {
    /// Allocate a key that no other element in this process has used.
    pub fn fresh() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transient failures reported by platform objects.
///
/// None of these are fatal: callers log them and move on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("element is no longer attached to the document")]
    Detached,

    #[error("playback rejected: {0}")]
    Rejected(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Callback fired when a native element starts playing.
pub type PlayListener = Box<dyn Fn()>;

/// Receives the deferred result of a `play()` request.
pub type PlaySettled = Box<dyn FnOnce(Result<(), PlatformError>)>;

/// Callback for events coming out of an embedded controller.
pub type ControllerListener = Box<dyn Fn(ControllerEvent)>;

/// A scheduled unit of work.
pub type Task = Box<dyn FnOnce()>;

/// A browser-native playable element (`<audio>` / `<video>`).
pub trait MediaElement {
    fn key(&self) -> ElementKey;

    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError>;

    fn pause(&self) -> Result<(), PlatformError>;

    /// Output volume, 0.0 to 1.0.
    fn set_volume(&self, volume: f64) -> Result<(), PlatformError>;

    /// Request playback. The outcome arrives through `on_settled`, which
    /// may run before this call returns.
    fn play(&self, on_settled: PlaySettled);

    /// Attach a listener for the element's `play` event.
    fn add_play_listener(&self, listener: PlayListener) -> Result<(), PlatformError>;

    /// Whether the element is still part of the document.
    fn is_connected(&self) -> bool {
        true
    }
}

/// An iframe hosting a third-party video embed.
pub trait EmbedFrame {
    fn key(&self) -> ElementKey;

    /// The currently assigned source, if any.
    fn src(&self) -> Option<String>;

    /// The real source held back until the frame is lazy-loaded.
    fn deferred_src(&self) -> Option<String>;

    fn set_src(&self, src: &str) -> Result<(), PlatformError>;

    fn clear_deferred_src(&self);
}

/// Events emitted by an embedded controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The controller finished its own initialization.
    Ready,
    /// The embedded player changed playback state.
    StateChanged(PlaybackStatus),
}

/// Programmatic control over one embedded player.
pub trait EmbeddedController {
    fn play(&self) -> Result<(), PlatformError>;

    fn pause(&self) -> Result<(), PlatformError>;

    fn status(&self) -> PlaybackStatus;

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError>;

    fn is_playing(&self) -> bool {
        self.status().is_active()
    }
}

/// Builds controllers once the external player API is available.
pub trait ControllerFactory {
    fn create(
        &self,
        frame: &Rc<dyn EmbedFrame>,
        on_event: ControllerListener,
    ) -> Result<Rc<dyn EmbeddedController>, PlatformError>;
}

/// Loads the external player API and announces when it is ready.
pub trait ApiLoader {
    fn is_ready(&self) -> bool;

    /// Start loading the API. Implementations must not inject a second
    /// loader if one is already present.
    fn request(&self);

    /// Register interest in the ready notification. Observers are kept in a
    /// list; registering never displaces another observer. If the API is
    /// already ready the callback may run immediately.
    fn on_ready(&self, callback: Task);
}

/// Per-browser key/value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), PlatformError>;
}

/// Deferred execution on the event loop.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: Task);
}

/// DOM-facing side of section and tab navigation.
pub trait NavSurface {
    fn set_section_active(&self, section: &str, active: bool);

    fn set_nav_link_active(&self, section: &str, active: bool);

    /// Apply the active class, `aria-selected` and roving `tabindex` of one
    /// tab in a single step so the three never disagree.
    fn set_tab_selected(&self, group: &str, tab: &str, selected: bool);

    fn set_pane_active(&self, group: &str, pane: &str, active: bool);

    /// Record a fragment in browser history without reloading.
    fn push_history(&self, fragment: &str);
}

/// Bundle of platform services handed to the runtime.
#[derive(Clone)]
pub struct Platform {
    pub store: Rc<dyn KeyValueStore>,
    pub loader: Rc<dyn ApiLoader>,
    pub factory: Rc<dyn ControllerFactory>,
    pub scheduler: Rc<dyn Scheduler>,
    pub surface: Rc<dyn NavSurface>,
}
