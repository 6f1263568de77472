//! The single chokepoint for playback exclusivity and the global mute flag.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use super::{MediaRegistry, MuteOptions, PlaybackHub, PlayerBridge};
use crate::config::Config;
use crate::platform::{
    ApiLoader, ControllerFactory, ElementKey, EmbedFrame, MediaElement, Scheduler,
};
use crate::prefs::Preferences;

/// How section changes treat the sentinel element.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPolicy {
    /// Play the sentinel when the landing section becomes active. When off,
    /// every section change pauses all media.
    pub landing_autoplay: bool,
    pub landing_section: String,
    /// Follow-up attempt delays; their count bounds the attempts.
    pub retry_delays: Vec<Duration>,
    pub unmute_delay: Duration,
}

impl PlaybackPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            landing_autoplay: config.media.landing_autoplay,
            landing_section: config.landing_section().to_string(),
            retry_delays: config.media.retry_delays(),
            unmute_delay: Duration::from_millis(config.media.unmute_delay_ms),
        }
    }
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type MuteSubscriber = Rc<dyn Fn(bool)>;

/// Coordinates every player on the page.
///
/// Construct one per page load with [`PlaybackCoordinator::new`] and hand
/// the `Rc` to the components that need it.
pub struct PlaybackCoordinator {
    pub(super) registry: MediaRegistry,
    pub(super) bridge: PlayerBridge,
    pub(super) prefs: Preferences,
    pub(super) scheduler: Rc<dyn Scheduler>,
    pub(super) policy: PlaybackPolicy,
    muted: Cell<bool>,
    subscribers: RefCell<Vec<MuteSubscriber>>,
    pub(super) active_section: RefCell<Option<String>>,
    pub(super) gesture_seen: Cell<bool>,
    /// Bumped whenever a landing autoplay run starts; stale timers compare
    /// against it and stop.
    pub(super) landing_run: Cell<u64>,
}

impl PlaybackCoordinator {
    /// Create the coordinator and apply the persisted mute flag.
    ///
    /// The flag is in place before anything is registered, so elements pick
    /// it up at registration time and no autoplay attempt can precede it.
    pub fn new(
        prefs: Preferences,
        factory: Rc<dyn ControllerFactory>,
        loader: Rc<dyn ApiLoader>,
        scheduler: Rc<dyn Scheduler>,
        policy: PlaybackPolicy,
    ) -> Rc<Self> {
        let coordinator = Rc::new_cyclic(|weak: &Weak<Self>| {
            let hub = weak.clone();
            let hub: Weak<dyn PlaybackHub> = hub;
            Self {
                registry: MediaRegistry::new(hub.clone()),
                bridge: PlayerBridge::new(hub, factory, loader),
                prefs,
                scheduler,
                policy,
                muted: Cell::new(false),
                subscribers: RefCell::new(Vec::new()),
                active_section: RefCell::new(None),
                gesture_seen: Cell::new(false),
                landing_run: Cell::new(0),
            }
        });

        let weak = Rc::downgrade(&coordinator);
        coordinator.bridge.loader().on_ready(Box::new(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.bridge.flush_pending();
            }
        }));

        let persisted = coordinator.prefs.muted();
        coordinator.set_global_muted(persisted, MuteOptions::initial());
        tracing::info!("Playback coordinator ready (muted: {})", persisted);
        coordinator
    }

    pub fn registry(&self) -> &MediaRegistry {
        &self.registry
    }

    pub fn bridge(&self) -> &PlayerBridge {
        &self.bridge
    }

    pub fn policy(&self) -> &PlaybackPolicy {
        &self.policy
    }

    /// Track a native element. Returns `false` if it was already tracked.
    pub fn register_media(&self, element: Rc<dyn MediaElement>) -> bool {
        self.registry.register(element)
    }

    pub fn set_sentinel(&self, element: Rc<dyn MediaElement>) {
        self.registry.set_sentinel(element);
    }

    /// Hand a loaded embed frame to the bridge.
    pub fn register_frame(&self, frame: Rc<dyn EmbedFrame>) {
        self.bridge.register_frame(frame);
    }

    /// Set, persist and apply the global mute flag.
    ///
    /// Native elements are only muted; embedded players are also paused
    /// when muting.
    pub fn set_global_muted(&self, muted: bool, options: MuteOptions) {
        self.muted.set(muted);
        if options.persist {
            self.prefs.set_muted(muted);
        }

        self.registry.apply_muted(muted);
        self.bridge.set_muted(muted);
        if muted {
            self.bridge.pause_all();
        }

        let subscribers: Vec<MuteSubscriber> = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(muted);
        }
        tracing::debug!("Global mute set to {}", muted);
    }

    pub fn toggle_global_mute(&self) {
        self.set_global_muted(!self.muted.get(), MuteOptions::default());
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    /// Subscribe to mute changes for the rest of the page's life.
    pub fn on_muted_change(&self, callback: impl Fn(bool) + 'static) {
        self.subscribers.borrow_mut().push(Rc::new(callback));
    }

    /// Pause every native element, every embedded player and the sentinel.
    pub fn pause_all_media(&self) {
        self.registry.pause_all();
        self.bridge.pause_all();
        self.registry.pause_sentinel_unless(None);
    }

    /// Keys of everything currently playing, native first.
    pub fn playing(&self) -> Vec<ElementKey> {
        let mut playing = self.registry.playing();
        playing.extend(self.bridge.playing());
        playing
    }

    pub fn active_section(&self) -> Option<String> {
        self.active_section.borrow().clone()
    }

    /// Navigation moved to `section`.
    ///
    /// Stops everything, unless the landing autoplay policy is on and this is
    /// the landing section, in which case the sentinel is started instead.
    pub fn notify_section_change(self: &Rc<Self>, section: &str) {
        *self.active_section.borrow_mut() = Some(section.to_string());
        self.landing_run.set(self.landing_run.get() + 1);

        if self.policy.landing_autoplay
            && section == self.policy.landing_section
            && self.registry.sentinel().is_some()
        {
            self.play_landing();
            return;
        }

        self.pause_all_media();
    }

    /// Play a native element from a custom control, pausing other native
    /// media first.
    pub fn toggle_playback(&self, element: &Rc<dyn MediaElement>) {
        if element.is_paused() {
            self.registry.pause_all_except(Some(element.key()));
            let key = element.key();
            element.play(Box::new(move |outcome| {
                if let Err(e) = outcome {
                    tracing::debug!("Play request for {} failed: {}", key, e);
                }
            }));
        } else if let Err(e) = element.pause() {
            tracing::debug!("Ignoring pause failure: {}", e);
        }
    }
}

impl PlaybackHub for PlaybackCoordinator {
    fn native_started(&self, key: ElementKey) {
        self.registry.pause_all_except(Some(key));
        self.registry.pause_sentinel_unless(Some(key));
        self.bridge.pause_all();
    }

    fn embedded_started(&self, key: ElementKey) {
        self.bridge.pause_all_except(Some(key));
        self.registry.pause_all();
        self.registry.pause_sentinel_unless(None);
    }

    fn embedded_ready(&self, key: ElementKey) {
        self.bridge.refresh_mute(key);
    }
}
