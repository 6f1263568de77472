//! Landing autoplay for the sentinel element.
//!
//! Browsers reject unmuted autoplay until the visitor interacts with the
//! page. A run therefore tries an unmuted start first, falls back to a muted
//! start, and later attempts to lift the mute again. Follow-up attempts are
//! bounded by the configured retry delays and stop as soon as the visitor
//! leaves the landing section or a newer run begins.

use std::rc::Rc;

use super::PlaybackCoordinator;

impl PlaybackCoordinator {
    /// Start a landing autoplay run.
    pub(super) fn play_landing(self: &Rc<Self>) {
        let Some(sentinel) = self.registry.sentinel() else {
            return;
        };
        let run = self.landing_run.get();

        self.registry.pause_all_except(Some(sentinel.key()));
        self.bridge.pause_all();
        self.attempt_landing(run);

        for (attempt, delay) in self.policy.retry_delays.iter().enumerate() {
            let weak = Rc::downgrade(self);
            self.scheduler.schedule(
                *delay,
                Box::new(move || {
                    let Some(coordinator) = weak.upgrade() else {
                        return;
                    };
                    if coordinator.landing_current(run) {
                        tracing::debug!("Landing retry {}", attempt + 1);
                        coordinator.attempt_landing(run);
                    }
                }),
            );
        }
    }

    /// The first user gesture on the page. Runs once; later calls are
    /// ignored.
    pub fn notify_user_gesture(self: &Rc<Self>) {
        if self.gesture_seen.replace(true) {
            return;
        }
        if !self.on_landing() {
            return;
        }
        tracing::debug!("First gesture, retrying landing autoplay");
        self.landing_run.set(self.landing_run.get() + 1);
        self.play_landing();
    }

    /// The sentinel scrolled into or out of view.
    pub fn notify_sentinel_visibility(self: &Rc<Self>, visible: bool) {
        self.landing_run.set(self.landing_run.get() + 1);
        if !visible {
            self.registry.pause_sentinel_unless(None);
            return;
        }
        if self.on_landing() {
            self.play_landing();
        }
    }

    /// Whether the landing policy applies to the current section.
    fn on_landing(&self) -> bool {
        self.policy.landing_autoplay
            && self.active_section.borrow().as_deref() == Some(self.policy.landing_section.as_str())
    }

    fn landing_current(&self, run: u64) -> bool {
        self.landing_run.get() == run && self.on_landing()
    }

    fn attempt_landing(self: &Rc<Self>, run: u64) {
        let Some(sentinel) = self.registry.sentinel() else {
            return;
        };
        if !sentinel.is_paused() {
            return;
        }

        let weak = Rc::downgrade(self);
        sentinel.play(Box::new(move |outcome| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            match outcome {
                Ok(()) => coordinator.after_landing_start(run),
                Err(e) => {
                    tracing::debug!("Unmuted start refused: {}", e);
                    coordinator.attempt_muted_landing(run);
                }
            }
        }));
    }

    fn attempt_muted_landing(self: &Rc<Self>, run: u64) {
        if !self.landing_current(run) {
            return;
        }
        let Some(sentinel) = self.registry.sentinel() else {
            return;
        };
        if let Err(e) = sentinel.set_muted(true) {
            tracing::debug!("Could not mute sentinel: {}", e);
            return;
        }

        let weak = Rc::downgrade(self);
        sentinel.play(Box::new(move |outcome| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            match outcome {
                Ok(()) => coordinator.after_landing_start(run),
                Err(e) => tracing::debug!("Muted start refused: {}", e),
            }
        }));
    }

    /// Playback started. If the sentinel only got going muted and the visitor
    /// has not asked for silence, try to lift the mute shortly after.
    fn after_landing_start(self: &Rc<Self>, run: u64) {
        let Some(sentinel) = self.registry.sentinel() else {
            return;
        };
        if self.is_muted() || !sentinel.is_muted() {
            return;
        }

        let weak = Rc::downgrade(self);
        self.scheduler.schedule(
            self.policy.unmute_delay,
            Box::new(move || {
                let Some(coordinator) = weak.upgrade() else {
                    return;
                };
                if !coordinator.landing_current(run) || coordinator.is_muted() {
                    return;
                }
                let Some(sentinel) = coordinator.registry.sentinel() else {
                    return;
                };
                if sentinel.is_paused() {
                    return;
                }
                if let Err(e) = sentinel.set_muted(false) {
                    tracing::debug!("Sentinel stays muted: {}", e);
                    return;
                }
                // Some browsers pause a video that loses its mute without a
                // gesture; fall back to muted playback.
                if sentinel.is_paused() {
                    coordinator.attempt_muted_landing(run);
                }
            }),
        );
    }
}
