//! Bridge to embedded third-party players.
//!
//! Controllers are created lazily: only once a frame has its real source and
//! the external player API has loaded. Until then frames wait in a pending
//! queue that the API-ready notification flushes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::{PlaybackHub, PlaybackStatus};
use crate::platform::{
    ApiLoader, ControllerEvent, ControllerFactory, ElementKey, EmbedFrame, EmbeddedController,
};

#[derive(Default)]
struct BridgeState {
    players: BTreeMap<ElementKey, Rc<dyn EmbeddedController>>,
    pending: BTreeMap<ElementKey, Rc<dyn EmbedFrame>>,
    api_requested: bool,
    muted: bool,
}

/// Owns every embedded controller on the page.
pub struct PlayerBridge {
    hub: Weak<dyn PlaybackHub>,
    factory: Rc<dyn ControllerFactory>,
    loader: Rc<dyn ApiLoader>,
    state: RefCell<BridgeState>,
}

impl PlayerBridge {
    pub(crate) fn new(
        hub: Weak<dyn PlaybackHub>,
        factory: Rc<dyn ControllerFactory>,
        loader: Rc<dyn ApiLoader>,
    ) -> Self {
        Self {
            hub,
            factory,
            loader,
            state: RefCell::new(BridgeState::default()),
        }
    }

    pub(crate) fn loader(&self) -> &Rc<dyn ApiLoader> {
        &self.loader
    }

    /// Hand a loaded frame to the bridge.
    ///
    /// Frames already known (live or pending) are ignored.
    pub fn register_frame(&self, frame: Rc<dyn EmbedFrame>) {
        let key = frame.key();
        {
            let state = self.state.borrow();
            if state.players.contains_key(&key) || state.pending.contains_key(&key) {
                return;
            }
        }

        if self.loader.is_ready() {
            self.create_controller(frame);
            return;
        }

        self.state.borrow_mut().pending.insert(key, frame);
        tracing::debug!("Frame {} waiting for player API", key);
        self.ensure_api();
    }

    /// Build controllers for every frame queued before the API was ready.
    pub fn flush_pending(&self) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending);
        if !pending.is_empty() {
            tracing::info!("Player API ready, creating {} queued player(s)", pending.len());
        }
        for frame in pending.into_values() {
            self.create_controller(frame);
        }
    }

    pub fn pause_all_except(&self, except: Option<ElementKey>) {
        for (key, controller) in self.controllers() {
            if Some(key) == except || !controller.is_playing() {
                continue;
            }
            if let Err(e) = controller.pause() {
                tracing::debug!("Ignoring pause failure on {}: {}", key, e);
            }
        }
    }

    pub fn pause_all(&self) {
        self.pause_all_except(None);
    }

    /// Apply the global mute flag to all controllers, and remember it for
    /// controllers created later.
    pub fn set_muted(&self, muted: bool) {
        self.state.borrow_mut().muted = muted;
        for (_, controller) in self.controllers() {
            apply_mute(controller.as_ref(), muted);
        }
    }

    pub fn is_pending(&self, frame: ElementKey) -> bool {
        self.state.borrow().pending.contains_key(&frame)
    }

    pub fn pending_len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().players.is_empty()
    }

    pub fn controller(&self, frame: ElementKey) -> Option<Rc<dyn EmbeddedController>> {
        self.state.borrow().players.get(&frame).cloned()
    }

    /// Frames whose controller is currently playing.
    pub fn playing(&self) -> Vec<ElementKey> {
        self.controllers()
            .into_iter()
            .filter(|(_, c)| c.is_playing())
            .map(|(k, _)| k)
            .collect()
    }

    fn ensure_api(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.api_requested {
                return;
            }
            state.api_requested = true;
        }
        tracing::info!("Requesting player API");
        self.loader.request();
    }

    fn create_controller(&self, frame: Rc<dyn EmbedFrame>) {
        let key = frame.key();
        let hub = self.hub.clone();
        let on_event = Box::new(move |event: ControllerEvent| {
            let Some(hub) = hub.upgrade() else {
                return;
            };
            match event {
                ControllerEvent::Ready => hub.embedded_ready(key),
                ControllerEvent::StateChanged(PlaybackStatus::Playing) => hub.embedded_started(key),
                ControllerEvent::StateChanged(_) => {}
            }
        });

        let controller = match self.factory.create(&frame, on_event) {
            Ok(controller) => controller,
            Err(e) => {
                tracing::debug!("Could not create player for {}: {}", key, e);
                return;
            }
        };

        let muted = {
            let mut state = self.state.borrow_mut();
            state.players.insert(key, Rc::clone(&controller));
            state.pending.remove(&key);
            state.muted
        };
        apply_mute(controller.as_ref(), muted);
        tracing::debug!("Created player for frame {}", key);
    }

    /// Re-apply the mute flag to one controller, typically once it reports
    /// ready.
    pub(crate) fn refresh_mute(&self, frame: ElementKey) {
        let (controller, muted) = {
            let state = self.state.borrow();
            (state.players.get(&frame).cloned(), state.muted)
        };
        if let Some(controller) = controller {
            apply_mute(controller.as_ref(), muted);
        }
    }

    fn controllers(&self) -> Vec<(ElementKey, Rc<dyn EmbeddedController>)> {
        self.state
            .borrow()
            .players
            .iter()
            .map(|(k, c)| (*k, Rc::clone(c)))
            .collect()
    }
}

fn apply_mute(controller: &dyn EmbeddedController, muted: bool) {
    if let Err(e) = controller.set_muted(muted) {
        tracing::debug!("Ignoring mute failure: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryFactory, MemoryFrame, MemoryLoader};
    use std::cell::Cell;

    #[derive(Default)]
    struct RecordingHub {
        started: RefCell<Vec<ElementKey>>,
        ready: Cell<u32>,
    }

    impl PlaybackHub for RecordingHub {
        fn native_started(&self, _key: ElementKey) {}

        fn embedded_started(&self, key: ElementKey) {
            self.started.borrow_mut().push(key);
        }

        fn embedded_ready(&self, _key: ElementKey) {
            self.ready.set(self.ready.get() + 1);
        }
    }

    struct Fixture {
        hub: Rc<RecordingHub>,
        factory: Rc<MemoryFactory>,
        loader: Rc<MemoryLoader>,
        bridge: PlayerBridge,
    }

    fn fixture(loader: Rc<MemoryLoader>) -> Fixture {
        let hub = Rc::new(RecordingHub::default());
        let factory = MemoryFactory::new();
        let weak = Rc::downgrade(&hub);
        let weak: Weak<dyn PlaybackHub> = weak;
        let bridge = PlayerBridge::new(weak, factory.clone(), loader.clone());
        Fixture {
            hub,
            factory,
            loader,
            bridge,
        }
    }

    #[test]
    fn frames_wait_for_api_and_request_it_once() {
        let f = fixture(MemoryLoader::new());
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        let b = MemoryFrame::eager("b", "https://www.youtube.com/embed/b");

        f.bridge.register_frame(a.clone());
        f.bridge.register_frame(a.clone());
        f.bridge.register_frame(b.clone());

        assert_eq!(f.loader.requests(), 1);
        assert_eq!(f.bridge.pending_len(), 2);
        assert!(f.bridge.is_empty());

        f.bridge.flush_pending();
        assert_eq!(f.bridge.len(), 2);
        assert_eq!(f.bridge.pending_len(), 0);
        assert_eq!(f.factory.created(), 2);
    }

    #[test]
    fn ready_api_creates_immediately() {
        let f = fixture(MemoryLoader::preloaded());
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        f.bridge.register_frame(a.clone());
        assert_eq!(f.loader.requests(), 0);
        assert!(f.bridge.controller(a.key()).is_some());
    }

    #[test]
    fn failed_construction_is_dropped_quietly() {
        let f = fixture(MemoryLoader::preloaded());
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        f.factory.fail_for(a.key());
        f.bridge.register_frame(a.clone());
        assert!(f.bridge.is_empty());
        assert!(!f.bridge.is_pending(a.key()));
    }

    #[test]
    fn new_controllers_receive_current_mute() {
        let f = fixture(MemoryLoader::preloaded());
        f.bridge.set_muted(true);
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        f.bridge.register_frame(a.clone());
        assert!(f.factory.controller(a.key()).unwrap().is_muted());
    }

    #[test]
    fn playing_event_reaches_hub() {
        let f = fixture(MemoryLoader::preloaded());
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        f.bridge.register_frame(a.clone());

        let controller = f.factory.controller(a.key()).unwrap();
        controller.ready();
        controller.start();

        assert_eq!(*f.hub.started.borrow(), vec![a.key()]);
        assert_eq!(f.hub.ready.get(), 1);
        assert_eq!(f.bridge.playing(), vec![a.key()]);
    }

    #[test]
    fn pause_all_except_spares_one() {
        let f = fixture(MemoryLoader::preloaded());
        let a = MemoryFrame::eager("a", "https://www.youtube.com/embed/a");
        let b = MemoryFrame::eager("b", "https://www.youtube.com/embed/b");
        f.bridge.register_frame(a.clone());
        f.bridge.register_frame(b.clone());
        let ca = f.factory.controller(a.key()).unwrap();
        let cb = f.factory.controller(b.key()).unwrap();
        ca.start();
        cb.start();

        f.bridge.pause_all_except(Some(b.key()));
        assert!(!ca.is_playing());
        assert!(cb.is_playing());
    }
}
