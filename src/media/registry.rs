//! Registry of native `<audio>`/`<video>` elements.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::PlaybackHub;
use crate::platform::{ElementKey, MediaElement};

/// Tracks every native media element on the page.
///
/// The registry owns the key → handle mapping, not the elements themselves:
/// a handle whose element has left the document is dropped on the next sweep.
pub struct MediaRegistry {
    hub: Weak<dyn PlaybackHub>,
    elements: RefCell<BTreeMap<ElementKey, Rc<dyn MediaElement>>>,
    sentinel: RefCell<Option<Rc<dyn MediaElement>>>,
    muted: Cell<bool>,
}

impl MediaRegistry {
    pub(crate) fn new(hub: Weak<dyn PlaybackHub>) -> Self {
        Self {
            hub,
            elements: RefCell::new(BTreeMap::new()),
            sentinel: RefCell::new(None),
            muted: Cell::new(false),
        }
    }

    /// Start tracking an element.
    ///
    /// Returns `false` if the element was already tracked; in that case
    /// nothing is attached a second time.
    pub fn register(&self, element: Rc<dyn MediaElement>) -> bool {
        let key = element.key();
        {
            let mut elements = self.elements.borrow_mut();
            if elements.contains_key(&key) {
                return false;
            }
            elements.insert(key, Rc::clone(&element));
        }

        if let Err(e) = element.set_muted(self.muted.get()) {
            tracing::debug!("Could not apply mute to {}: {}", key, e);
        }

        let hub = self.hub.clone();
        let listener = Box::new(move || {
            if let Some(hub) = hub.upgrade() {
                hub.native_started(key);
            }
        });
        if let Err(e) = element.add_play_listener(listener) {
            tracing::debug!("Could not listen to {}: {}", key, e);
        }

        tracing::debug!("Registered media element {}", key);
        true
    }

    /// Designate the sentinel (landing/hero) element. It is tracked like any
    /// other element as well.
    pub fn set_sentinel(&self, element: Rc<dyn MediaElement>) {
        self.register(Rc::clone(&element));
        *self.sentinel.borrow_mut() = Some(element);
    }

    pub fn sentinel(&self) -> Option<Rc<dyn MediaElement>> {
        self.sentinel.borrow().clone()
    }

    pub fn is_sentinel(&self, key: ElementKey) -> bool {
        self.sentinel
            .borrow()
            .as_ref()
            .is_some_and(|s| s.key() == key)
    }

    pub fn contains(&self, key: ElementKey) -> bool {
        self.elements.borrow().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    pub fn get(&self, key: ElementKey) -> Option<Rc<dyn MediaElement>> {
        self.elements.borrow().get(&key).cloned()
    }

    /// Keys of tracked elements that are currently playing.
    pub fn playing(&self) -> Vec<ElementKey> {
        self.snapshot()
            .into_iter()
            .filter(|e| !e.is_paused())
            .map(|e| e.key())
            .collect()
    }

    /// Pause every playing element other than `except`.
    pub fn pause_all_except(&self, except: Option<ElementKey>) {
        for element in self.snapshot() {
            let key = element.key();
            if Some(key) == except || element.is_paused() {
                continue;
            }
            if let Err(e) = element.pause() {
                tracing::debug!("Ignoring pause failure on {}: {}", key, e);
            }
        }
    }

    pub fn pause_all(&self) {
        self.pause_all_except(None);
    }

    /// Pause the sentinel unless it is the element identified by `playing`.
    pub fn pause_sentinel_unless(&self, playing: Option<ElementKey>) {
        let Some(sentinel) = self.sentinel() else {
            return;
        };
        if Some(sentinel.key()) == playing || sentinel.is_paused() {
            return;
        }
        if let Err(e) = sentinel.pause() {
            tracing::debug!("Ignoring sentinel pause failure: {}", e);
        }
    }

    /// Apply the global mute flag to every tracked element, and remember it
    /// for elements registered later.
    pub fn apply_muted(&self, muted: bool) {
        self.muted.set(muted);
        for element in self.snapshot() {
            if let Err(e) = element.set_muted(muted) {
                tracing::debug!("Ignoring mute failure on {}: {}", element.key(), e);
            }
        }
    }

    /// Current tracked handles, minus those whose element left the document.
    fn snapshot(&self) -> Vec<Rc<dyn MediaElement>> {
        let mut elements = self.elements.borrow_mut();
        elements.retain(|key, element| {
            let connected = element.is_connected();
            if !connected {
                tracing::debug!("Dropping detached element {}", key);
            }
            connected
        });
        elements.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryMedia;

    #[derive(Default)]
    struct CountingHub {
        started: RefCell<Vec<ElementKey>>,
    }

    impl PlaybackHub for CountingHub {
        fn native_started(&self, key: ElementKey) {
            self.started.borrow_mut().push(key);
        }

        fn embedded_started(&self, _key: ElementKey) {}
    }

    fn registry() -> (Rc<CountingHub>, MediaRegistry) {
        let hub = Rc::new(CountingHub::default());
        let weak = Rc::downgrade(&hub);
        let weak: Weak<dyn PlaybackHub> = weak;
        (hub, MediaRegistry::new(weak))
    }

    #[test]
    fn register_is_idempotent() {
        let (hub, registry) = registry();
        let audio = MemoryMedia::new("audio");

        assert!(registry.register(audio.clone()));
        assert!(!registry.register(audio.clone()));
        assert_eq!(audio.listener_count(), 1);

        audio.start();
        assert_eq!(hub.started.borrow().len(), 1);
    }

    #[test]
    fn pause_all_except_spares_one() {
        let (_hub, registry) = registry();
        let a = MemoryMedia::new("a");
        let b = MemoryMedia::new("b");
        registry.register(a.clone());
        registry.register(b.clone());
        a.start();
        b.start();

        registry.pause_all_except(Some(b.key()));
        assert!(a.is_paused());
        assert!(!b.is_paused());
        assert_eq!(registry.playing(), vec![b.key()]);
    }

    #[test]
    fn detached_element_does_not_block_others() {
        let (_hub, registry) = registry();
        let gone = MemoryMedia::new("gone");
        let live = MemoryMedia::new("live");
        registry.register(gone.clone());
        registry.register(live.clone());
        gone.start();
        live.start();
        gone.detach();

        registry.pause_all();
        assert!(live.is_paused());
        assert!(!registry.contains(gone.key()));
    }

    #[test]
    fn paused_elements_are_not_paused_again() {
        let (_hub, registry) = registry();
        let a = MemoryMedia::new("a");
        registry.register(a.clone());
        registry.pause_all();
        assert_eq!(a.pause_calls(), 0);
    }

    #[test]
    fn late_registration_inherits_mute() {
        let (_hub, registry) = registry();
        registry.apply_muted(true);
        let late = MemoryMedia::new("late");
        registry.register(late.clone());
        assert!(late.is_muted());
    }

    #[test]
    fn sentinel_pause_respects_exception() {
        let (_hub, registry) = registry();
        let hero = MemoryMedia::new("hero");
        registry.set_sentinel(hero.clone());
        hero.start();

        registry.pause_sentinel_unless(Some(hero.key()));
        assert!(!hero.is_paused());

        registry.pause_sentinel_unless(None);
        assert!(hero.is_paused());
        assert!(registry.is_sentinel(hero.key()));
        assert!(registry.contains(hero.key()));
    }
}
