//! Deferred loading of embed frames.
//!
//! Frames are declared with their real source held back. The loader assigns
//! it when the frame comes near the viewport (or, in click-to-load mode,
//! when the visitor activates the placeholder), then hands the frame to the
//! player bridge. Each frame is loaded at most once.

mod url;

pub use url::{JS_API_PARAM, embed_origin, is_embed_url, rewrite_embed_url};

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::config::LazyConfig;
use crate::media::PlaybackCoordinator;
use crate::platform::{ElementKey, EmbedFrame, Scheduler};

/// One intersection observer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub key: ElementKey,
    /// Within the observer's root margin.
    pub is_intersecting: bool,
}

#[derive(Default)]
struct LazyState {
    observed: BTreeMap<ElementKey, Rc<dyn EmbedFrame>>,
    placeholders: BTreeMap<ElementKey, Rc<dyn EmbedFrame>>,
    loaded: BTreeSet<ElementKey>,
}

pub struct LazyLoader {
    config: LazyConfig,
    origin: Option<String>,
    coordinator: Rc<PlaybackCoordinator>,
    scheduler: Rc<dyn Scheduler>,
    state: RefCell<LazyState>,
}

impl LazyLoader {
    pub fn new(
        config: LazyConfig,
        origin: Option<String>,
        coordinator: Rc<PlaybackCoordinator>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            config,
            origin,
            coordinator,
            scheduler,
            state: RefCell::new(LazyState::default()),
        }
    }

    /// The observer's root margin in CSS syntax.
    pub fn root_margin(&self) -> String {
        format!("{}px", self.config.root_margin_px)
    }

    /// Start watching a frame.
    ///
    /// Frames that already have a source go straight to the bridge. Returns
    /// `true` if the frame should be handed to the intersection observer.
    pub fn observe(&self, frame: Rc<dyn EmbedFrame>) -> bool {
        let key = frame.key();
        if frame.src().is_some() && frame.deferred_src().is_none() {
            self.coordinator.register_frame(frame);
            return false;
        }
        if frame.deferred_src().is_none() {
            tracing::debug!("Frame {} has no source to load", key);
            return false;
        }

        let mut state = self.state.borrow_mut();
        if state.loaded.contains(&key) {
            return false;
        }
        if self.config.click_to_load {
            state.placeholders.insert(key, frame);
            false
        } else {
            state.observed.insert(key, frame).is_none()
        }
    }

    pub fn is_observed(&self, key: ElementKey) -> bool {
        self.state.borrow().observed.contains_key(&key)
    }

    pub fn is_loaded(&self, key: ElementKey) -> bool {
        self.state.borrow().loaded.contains(&key)
    }

    /// Handle an observer callback. Returns the frames to unobserve.
    pub fn on_intersection(&self, entries: &[IntersectionEntry]) -> Vec<ElementKey> {
        let mut triggered = Vec::new();
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            let frame = self.state.borrow_mut().observed.remove(&entry.key);
            if let Some(frame) = frame {
                self.load_frame(frame);
                triggered.push(entry.key);
            }
        }
        triggered
    }

    /// The visitor clicked a placeholder overlay.
    pub fn activate_placeholder(&self, key: ElementKey) -> bool {
        let frame = {
            let mut state = self.state.borrow_mut();
            state
                .placeholders
                .remove(&key)
                .or_else(|| state.observed.remove(&key))
        };
        match frame {
            Some(frame) => self.load_frame(frame),
            None => false,
        }
    }

    /// Assign the frame's real source and register it with the bridge.
    ///
    /// A placeholder `src` does not count as loaded while the deferred
    /// source is still present. Does nothing once the deferred source has
    /// been consumed.
    pub fn load_frame(&self, frame: Rc<dyn EmbedFrame>) -> bool {
        let key = frame.key();
        if self.is_loaded(key) {
            return false;
        }
        let Some(deferred) = frame.deferred_src() else {
            return false;
        };

        let src = if is_embed_url(&deferred, &self.config.embed_hosts) {
            rewrite_embed_url(&deferred, self.origin.as_deref(), &self.config.params)
        } else {
            deferred
        };
        if let Err(e) = frame.set_src(&src) {
            tracing::debug!("Could not assign source to {}: {}", key, e);
            return false;
        }
        frame.clear_deferred_src();
        {
            let mut state = self.state.borrow_mut();
            state.loaded.insert(key);
            state.observed.remove(&key);
            state.placeholders.remove(&key);
        }
        tracing::debug!("Loaded frame {}: {}", key, src);

        let delay = self.config.register_delay();
        if delay.is_zero() {
            self.coordinator.register_frame(frame);
        } else {
            let coordinator = Rc::downgrade(&self.coordinator);
            self.scheduler.schedule(
                delay,
                Box::new(move || {
                    if let Some(coordinator) = coordinator.upgrade() {
                        coordinator.register_frame(frame);
                    }
                }),
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryFrame;
    use crate::test_utils::Harness;
    use std::time::Duration;

    fn loader(h: &Harness, config: LazyConfig) -> LazyLoader {
        LazyLoader::new(
            config,
            Some("https://example.com".into()),
            h.coordinator.clone(),
            h.scheduler.clone(),
        )
    }

    fn entry(key: ElementKey) -> IntersectionEntry {
        IntersectionEntry {
            key,
            is_intersecting: true,
        }
    }

    #[test]
    fn proximity_loads_once() {
        let h = Harness::preloaded();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/abc");
        assert!(lazy.observe(frame.clone()));

        assert_eq!(lazy.on_intersection(&[entry(frame.key())]), vec![frame.key()]);
        let src = frame.src().unwrap();
        assert_eq!(src.matches("enablejsapi=1").count(), 1);
        assert!(src.contains("origin=https%3A%2F%2Fexample.com"));
        assert!(frame.deferred_src().is_none());
        assert!(h.coordinator.bridge().controller(frame.key()).is_some());

        assert!(lazy.on_intersection(&[entry(frame.key())]).is_empty());
        assert!(!lazy.load_frame(frame.clone()));
        assert_eq!(frame.src(), Some(src));
        assert!(!lazy.observe(frame.clone()));
    }

    #[test]
    fn non_intersecting_entries_are_ignored() {
        let h = Harness::preloaded();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/abc");
        lazy.observe(frame.clone());

        let far = IntersectionEntry {
            key: frame.key(),
            is_intersecting: false,
        };
        assert!(lazy.on_intersection(&[far]).is_empty());
        assert!(lazy.is_observed(frame.key()));
        assert!(frame.src().is_none());
    }

    #[test]
    fn foreign_hosts_are_assigned_verbatim() {
        let h = Harness::preloaded();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::new("map", "https://maps.example.org/embed?x=1");
        lazy.observe(frame.clone());
        lazy.on_intersection(&[entry(frame.key())]);
        assert_eq!(frame.src().as_deref(), Some("https://maps.example.org/embed?x=1"));
    }

    #[test]
    fn click_to_load_waits_for_the_placeholder() {
        let h = Harness::preloaded();
        let config = LazyConfig {
            click_to_load: true,
            ..LazyConfig::default()
        };
        let lazy = loader(&h, config);
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/abc");
        assert!(!lazy.observe(frame.clone()));
        assert!(lazy.on_intersection(&[entry(frame.key())]).is_empty());
        assert!(frame.src().is_none());

        assert!(lazy.activate_placeholder(frame.key()));
        assert!(frame.src().is_some());
        assert!(!lazy.activate_placeholder(frame.key()));
    }

    #[test]
    fn registration_can_be_delayed() {
        let h = Harness::preloaded();
        let config = LazyConfig {
            register_delay_ms: 300,
            ..LazyConfig::default()
        };
        let lazy = loader(&h, config);
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/abc");
        lazy.observe(frame.clone());
        lazy.on_intersection(&[entry(frame.key())]);
        assert!(h.coordinator.bridge().is_empty());

        h.scheduler.advance(Duration::from_millis(300));
        assert_eq!(h.coordinator.bridge().len(), 1);
    }

    #[test]
    fn eager_frames_register_directly() {
        let h = Harness::preloaded();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::eager("clip", "https://www.youtube.com/embed/abc?enablejsapi=1");
        assert!(!lazy.observe(frame.clone()));
        assert!(h.coordinator.bridge().controller(frame.key()).is_some());
    }

    #[test]
    fn placeholder_source_does_not_block_loading() {
        let h = Harness::preloaded();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::with_placeholder(
            "clip",
            "about:blank",
            "https://www.youtube.com/embed/abc",
        );
        assert!(lazy.observe(frame.clone()));

        assert_eq!(lazy.on_intersection(&[entry(frame.key())]), vec![frame.key()]);
        let src = frame.src().unwrap();
        assert!(src.starts_with("https://www.youtube.com/embed/abc?"));
        assert!(frame.deferred_src().is_none());
        assert!(lazy.is_loaded(frame.key()));
        assert!(h.coordinator.bridge().controller(frame.key()).is_some());
        assert!(!lazy.load_frame(frame.clone()));
    }

    #[test]
    fn placeholder_source_loads_on_click() {
        let h = Harness::preloaded();
        let config = LazyConfig {
            click_to_load: true,
            ..LazyConfig::default()
        };
        let lazy = loader(&h, config);
        let frame = MemoryFrame::with_placeholder(
            "clip",
            "about:blank",
            "https://www.youtube.com/embed/abc",
        );
        assert!(!lazy.observe(frame.clone()));
        assert!(lazy.activate_placeholder(frame.key()));
        assert_ne!(frame.src().as_deref(), Some("about:blank"));
    }

    #[test]
    fn loaded_frame_waits_for_api_when_missing() {
        let h = Harness::new();
        let lazy = loader(&h, LazyConfig::default());
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/abc");
        lazy.observe(frame.clone());
        lazy.on_intersection(&[entry(frame.key())]);
        assert!(h.coordinator.bridge().is_pending(frame.key()));
        assert_eq!(h.loader.requests(), 1);
    }
}
