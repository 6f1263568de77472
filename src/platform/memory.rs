//! Deterministic in-process platform.
//!
//! Used by the headless harness and by tests. Time only moves when
//! [`ManualScheduler::advance`] is called, and every event fires
//! synchronously, which makes interleavings reproducible.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use super::{
    ApiLoader, ControllerEvent, ControllerFactory, ControllerListener, ElementKey, EmbedFrame,
    EmbeddedController, KeyValueStore, MediaElement, NavSurface, PlatformError, PlaySettled,
    Scheduler, Task,
};
use crate::media::PlaybackStatus;

// ============================================================================
// Native media
// ============================================================================

/// A fake `<audio>`/`<video>` element.
pub struct MemoryMedia {
    key: ElementKey,
    label: String,
    paused: Cell<bool>,
    muted: Cell<bool>,
    volume: Cell<f64>,
    connected: Cell<bool>,
    /// Reject unmuted `play()` requests, like a browser autoplay policy.
    blocks_unmuted_autoplay: Cell<bool>,
    listeners: RefCell<Vec<Rc<dyn Fn()>>>,
    pause_calls: Cell<u32>,
}

impl MemoryMedia {
    pub fn new(label: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            key: ElementKey::fresh(),
            label: label.into(),
            paused: Cell::new(true),
            muted: Cell::new(false),
            volume: Cell::new(1.0),
            connected: Cell::new(true),
            blocks_unmuted_autoplay: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            pause_calls: Cell::new(0),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Simulate the user pressing the element's own play control.
    ///
    /// An element that is already playing fires no further `play` events.
    pub fn start(&self) {
        if !self.paused.replace(false) {
            return;
        }
        let listeners: Vec<Rc<dyn Fn()>> = self.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }

    /// Remove the element from the document.
    pub fn detach(&self) {
        self.connected.set(false);
    }

    pub fn block_unmuted_autoplay(&self, blocked: bool) {
        self.blocks_unmuted_autoplay.set(blocked);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn pause_calls(&self) -> u32 {
        self.pause_calls.get()
    }

    pub fn volume(&self) -> f64 {
        self.volume.get()
    }
}

impl MediaElement for MemoryMedia {
    fn key(&self) -> ElementKey {
        self.key
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        if !self.connected.get() {
            return Err(PlatformError::Detached);
        }
        self.muted.set(muted);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlatformError> {
        if !self.connected.get() {
            return Err(PlatformError::Detached);
        }
        self.pause_calls.set(self.pause_calls.get() + 1);
        self.paused.set(true);
        Ok(())
    }

    fn set_volume(&self, volume: f64) -> Result<(), PlatformError> {
        if !self.connected.get() {
            return Err(PlatformError::Detached);
        }
        self.volume.set(volume);
        Ok(())
    }

    fn play(&self, on_settled: PlaySettled) {
        if !self.connected.get() {
            on_settled(Err(PlatformError::Detached));
            return;
        }
        if self.blocks_unmuted_autoplay.get() && !self.muted.get() {
            on_settled(Err(PlatformError::Rejected(
                "unmuted autoplay is not allowed".into(),
            )));
            return;
        }
        self.start();
        on_settled(Ok(()));
    }

    fn add_play_listener(&self, listener: super::PlayListener) -> Result<(), PlatformError> {
        self.listeners.borrow_mut().push(Rc::from(listener));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

// ============================================================================
// Embeds
// ============================================================================

/// A fake embed iframe with a deferred source.
pub struct MemoryFrame {
    key: ElementKey,
    label: String,
    src: RefCell<Option<String>>,
    deferred: RefCell<Option<String>>,
}

impl MemoryFrame {
    pub fn new(label: impl Into<String>, deferred_src: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            key: ElementKey::fresh(),
            label: label.into(),
            src: RefCell::new(None),
            deferred: RefCell::new(Some(deferred_src.into())),
        })
    }

    /// A frame whose source was assigned directly in markup.
    pub fn eager(label: impl Into<String>, src: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            key: ElementKey::fresh(),
            label: label.into(),
            src: RefCell::new(Some(src.into())),
            deferred: RefCell::new(None),
        })
    }

    /// A deferred frame whose markup also carries a placeholder source,
    /// such as `about:blank`.
    pub fn with_placeholder(
        label: impl Into<String>,
        placeholder: impl Into<String>,
        deferred_src: impl Into<String>,
    ) -> Rc<Self> {
        Rc::new(Self {
            key: ElementKey::fresh(),
            label: label.into(),
            src: RefCell::new(Some(placeholder.into())),
            deferred: RefCell::new(Some(deferred_src.into())),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl EmbedFrame for MemoryFrame {
    fn key(&self) -> ElementKey {
        self.key
    }

    fn src(&self) -> Option<String> {
        self.src.borrow().clone()
    }

    fn deferred_src(&self) -> Option<String> {
        self.deferred.borrow().clone()
    }

    fn set_src(&self, src: &str) -> Result<(), PlatformError> {
        *self.src.borrow_mut() = Some(src.to_string());
        Ok(())
    }

    fn clear_deferred_src(&self) {
        self.deferred.borrow_mut().take();
    }
}

/// A fake embedded controller.
pub struct MemoryController {
    frame: ElementKey,
    status: Cell<PlaybackStatus>,
    muted: Cell<bool>,
    pause_calls: Cell<u32>,
    on_event: ControllerListener,
}

impl MemoryController {
    pub fn frame(&self) -> ElementKey {
        self.frame
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    pub fn pause_calls(&self) -> u32 {
        self.pause_calls.get()
    }

    /// Simulate the user pressing play inside the embed.
    pub fn start(&self) {
        self.transition(PlaybackStatus::Playing);
    }

    /// Simulate the embed finishing its own initialization.
    pub fn ready(&self) {
        (self.on_event)(ControllerEvent::Ready);
    }

    fn transition(&self, status: PlaybackStatus) {
        self.status.set(status);
        (self.on_event)(ControllerEvent::StateChanged(status));
    }
}

impl EmbeddedController for MemoryController {
    fn play(&self) -> Result<(), PlatformError> {
        self.transition(PlaybackStatus::Playing);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlatformError> {
        self.pause_calls.set(self.pause_calls.get() + 1);
        self.transition(PlaybackStatus::Paused);
        Ok(())
    }

    fn status(&self) -> PlaybackStatus {
        self.status.get()
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        self.muted.set(muted);
        Ok(())
    }
}

/// Builds [`MemoryController`]s and keeps them reachable by frame key.
#[derive(Default)]
pub struct MemoryFactory {
    controllers: RefCell<BTreeMap<ElementKey, Rc<MemoryController>>>,
    failing: RefCell<Vec<ElementKey>>,
}

impl MemoryFactory {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Make construction fail for one frame.
    pub fn fail_for(&self, frame: ElementKey) {
        self.failing.borrow_mut().push(frame);
    }

    pub fn controller(&self, frame: ElementKey) -> Option<Rc<MemoryController>> {
        self.controllers.borrow().get(&frame).cloned()
    }

    pub fn created(&self) -> usize {
        self.controllers.borrow().len()
    }
}

impl ControllerFactory for MemoryFactory {
    fn create(
        &self,
        frame: &Rc<dyn EmbedFrame>,
        on_event: ControllerListener,
    ) -> Result<Rc<dyn EmbeddedController>, PlatformError> {
        let key = frame.key();
        if self.failing.borrow().contains(&key) {
            return Err(PlatformError::Unavailable("player construction failed".into()));
        }
        let controller = Rc::new(MemoryController {
            frame: key,
            status: Cell::new(PlaybackStatus::Unstarted),
            muted: Cell::new(false),
            pause_calls: Cell::new(0),
            on_event,
        });
        self.controllers.borrow_mut().insert(key, Rc::clone(&controller));
        Ok(controller)
    }
}

/// A fake external API loader.
#[derive(Default)]
pub struct MemoryLoader {
    ready: Cell<bool>,
    requests: Cell<u32>,
    observers: RefCell<Vec<Task>>,
}

impl MemoryLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A loader whose API is present before the page starts.
    pub fn preloaded() -> Rc<Self> {
        let loader = Self::default();
        loader.ready.set(true);
        Rc::new(loader)
    }

    /// Number of times a script injection was requested.
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }

    /// Finish loading and notify every observer once.
    pub fn finish(&self) {
        self.ready.set(true);
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        for observer in observers {
            observer();
        }
    }
}

impl ApiLoader for MemoryLoader {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn request(&self) {
        self.requests.set(self.requests.get() + 1);
    }

    fn on_ready(&self, callback: Task) {
        if self.ready.get() {
            callback();
        } else {
            self.observers.borrow_mut().push(callback);
        }
    }
}

// ============================================================================
// Storage, time and DOM surface
// ============================================================================

/// In-memory key/value storage. Share it between page loads to simulate a
/// reload.
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    read_only: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Refuse writes, like storage disabled by privacy settings.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.set(read_only);
    }

    pub fn entries(&self) -> BTreeMap<String, String> {
        self.entries.borrow().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        if self.read_only.get() {
            return Err(PlatformError::Storage("storage is read-only".into()));
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

struct Timer {
    due: Duration,
    seq: u64,
    task: Task,
}

/// A scheduler driven by hand.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    seq: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl ManualScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Move time forward, running every timer that falls due in order.
    /// Timers scheduled by running tasks are honored if they fall inside the
    /// window.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let earliest = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.seq))
                    .map(|(i, _)| i);
                earliest.map(|i| timers.remove(i))
            };
            let Some(timer) = next else { break };
            self.now.set(timer.due);
            (timer.task)();
        }
        self.now.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.timers.borrow_mut().push(Timer {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }
}

/// Attributes of one tab as the DOM would show them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TabAttrs {
    pub active: bool,
    pub aria_selected: bool,
    pub tabindex: i8,
}

/// Records what navigation did to the document.
#[derive(Default)]
pub struct MemorySurface {
    sections: RefCell<BTreeMap<String, bool>>,
    nav_links: RefCell<BTreeMap<String, bool>>,
    tabs: RefCell<BTreeMap<(String, String), TabAttrs>>,
    panes: RefCell<BTreeMap<(String, String), bool>>,
    history: RefCell<Vec<String>>,
}

impl MemorySurface {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn active_sections(&self) -> Vec<String> {
        active_keys(&self.sections.borrow())
    }

    pub fn active_nav_links(&self) -> Vec<String> {
        active_keys(&self.nav_links.borrow())
    }

    pub fn tab(&self, group: &str, tab: &str) -> Option<TabAttrs> {
        self.tabs
            .borrow()
            .get(&(group.to_string(), tab.to_string()))
            .copied()
    }

    pub fn active_tabs(&self, group: &str) -> Vec<String> {
        self.tabs
            .borrow()
            .iter()
            .filter(|((g, _), attrs)| g == group && attrs.active)
            .map(|((_, t), _)| t.clone())
            .collect()
    }

    pub fn focusable_tabs(&self, group: &str) -> Vec<String> {
        self.tabs
            .borrow()
            .iter()
            .filter(|((g, _), attrs)| g == group && attrs.tabindex == 0)
            .map(|((_, t), _)| t.clone())
            .collect()
    }

    pub fn active_panes(&self, group: &str) -> Vec<String> {
        self.panes
            .borrow()
            .iter()
            .filter(|((g, _), active)| g == group && **active)
            .map(|((_, p), _)| p.clone())
            .collect()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

fn active_keys(map: &BTreeMap<String, bool>) -> Vec<String> {
    map.iter()
        .filter(|(_, active)| **active)
        .map(|(k, _)| k.clone())
        .collect()
}

impl NavSurface for MemorySurface {
    fn set_section_active(&self, section: &str, active: bool) {
        self.sections
            .borrow_mut()
            .insert(section.to_string(), active);
    }

    fn set_nav_link_active(&self, section: &str, active: bool) {
        self.nav_links
            .borrow_mut()
            .insert(section.to_string(), active);
    }

    fn set_tab_selected(&self, group: &str, tab: &str, selected: bool) {
        self.tabs.borrow_mut().insert(
            (group.to_string(), tab.to_string()),
            TabAttrs {
                active: selected,
                aria_selected: selected,
                tabindex: if selected { 0 } else { -1 },
            },
        );
    }

    fn set_pane_active(&self, group: &str, pane: &str, active: bool) {
        self.panes
            .borrow_mut()
            .insert((group.to_string(), pane.to_string()), active);
    }

    fn push_history(&self, fragment: &str) {
        self.history.borrow_mut().push(fragment.to_string());
    }
}
