//! Test utilities and fixtures for showcase tests.
//!
//! [`Harness`] wires a [`PlaybackCoordinator`] to the in-memory platform and
//! keeps every fake reachable, so tests can drive events and inspect results
//! without repeating the setup.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::Harness;
//!
//! #[test]
//! fn test_something() {
//!     let h = Harness::preloaded();
//!     let track = h.media("track");
//!     track.start();
//!     assert_eq!(h.coordinator.playing().len(), 1);
//! }
//! ```

use std::rc::Rc;

use crate::config::Config;
use crate::media::{PlaybackCoordinator, PlaybackPolicy};
use crate::platform::memory::{
    ManualScheduler, MemoryController, MemoryFactory, MemoryFrame, MemoryLoader, MemoryMedia,
    MemoryStore, MemorySurface,
};
use crate::platform::{EmbedFrame, Platform};
use crate::prefs::Preferences;

/// A coordinator over fakes.
pub struct Harness {
    pub config: Config,
    pub store: Rc<MemoryStore>,
    pub loader: Rc<MemoryLoader>,
    pub factory: Rc<MemoryFactory>,
    pub scheduler: Rc<ManualScheduler>,
    pub surface: Rc<MemorySurface>,
    pub coordinator: Rc<PlaybackCoordinator>,
}

impl Harness {
    /// Default config, player API not loaded yet.
    pub fn new() -> Self {
        Self::with_config(Config::default(), false)
    }

    /// Default config, player API already present.
    pub fn preloaded() -> Self {
        Self::with_config(Config::default(), true)
    }

    pub fn with_config(config: Config, api_ready: bool) -> Self {
        let loader = if api_ready {
            MemoryLoader::preloaded()
        } else {
            MemoryLoader::new()
        };
        Self::build(config, MemoryStore::new(), loader)
    }

    /// A fresh page load sharing this one's storage.
    pub fn reload(&self) -> Self {
        Self::build(
            self.config.clone(),
            Rc::clone(&self.store),
            MemoryLoader::preloaded(),
        )
    }

    fn build(config: Config, store: Rc<MemoryStore>, loader: Rc<MemoryLoader>) -> Self {
        let factory = MemoryFactory::new();
        let scheduler = ManualScheduler::new();
        let surface = MemorySurface::new();
        let prefs = Preferences::new(store.clone(), config.storage.clone());
        let coordinator = PlaybackCoordinator::new(
            prefs,
            factory.clone(),
            loader.clone(),
            scheduler.clone(),
            PlaybackPolicy::from_config(&config),
        );
        Self {
            config,
            store,
            loader,
            factory,
            scheduler,
            surface,
            coordinator,
        }
    }

    /// The platform bundle over this harness's fakes.
    pub fn platform(&self) -> Platform {
        Platform {
            store: self.store.clone(),
            loader: self.loader.clone(),
            factory: self.factory.clone(),
            scheduler: self.scheduler.clone(),
            surface: self.surface.clone(),
        }
    }

    pub fn prefs(&self) -> Preferences {
        Preferences::new(self.store.clone(), self.config.storage.clone())
    }

    /// A registered native element.
    pub fn media(&self, label: &str) -> Rc<MemoryMedia> {
        let media = MemoryMedia::new(label);
        self.coordinator.register_media(media.clone());
        media
    }

    /// A registered sentinel element.
    pub fn sentinel(&self, label: &str) -> Rc<MemoryMedia> {
        let media = MemoryMedia::new(label);
        self.coordinator.set_sentinel(media.clone());
        media
    }

    /// An unregistered embed frame with its source already assigned.
    pub fn frame(&self, label: &str) -> Rc<MemoryFrame> {
        MemoryFrame::eager(label, format!("https://www.youtube.com/embed/{label}"))
    }

    /// A registered embed and its controller. Only valid when the player
    /// API is ready.
    pub fn embed(&self, label: &str) -> (Rc<MemoryFrame>, Rc<MemoryController>) {
        let frame = self.frame(label);
        self.coordinator.register_frame(frame.clone());
        let controller = self
            .factory
            .controller(frame.key())
            .expect("player API must be ready to create a controller");
        (frame, controller)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_embed_creates_controller() {
        let h = Harness::preloaded();
        let (frame, controller) = h.embed("clip");
        assert_eq!(controller.frame(), frame.key());
        assert_eq!(h.coordinator.bridge().len(), 1);
    }

    #[test]
    fn test_reload_shares_storage() {
        let h = Harness::new();
        h.prefs().set_language("en");
        let again = h.reload();
        assert_eq!(again.prefs().language().as_deref(), Some("en"));
    }
}
