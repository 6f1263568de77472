//! Browser adapters over `web-sys`.
//!
//! Each platform trait gets a thin wrapper around the matching DOM object.
//! [`boot`] discovers the page's elements, starts a [`SiteRuntime`] and wires
//! DOM events to it. Event closures are leaked with `forget()`: they live as
//! long as the page does.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, closure::Closure};
use web_sys::{
    AddEventListenerOptions, Document, Element, Event, HtmlElement, HtmlIFrameElement,
    HtmlMediaElement, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    KeyboardEvent, MutationObserver, MutationObserverInit, MutationRecord, ScrollBehavior,
    ScrollToOptions, Window,
};

use super::{
    ApiLoader, ControllerEvent, ControllerFactory, ControllerListener, ElementKey, EmbedFrame,
    EmbeddedController, KeyValueStore, MediaElement, NavSurface, PlatformError, PlayListener,
    PlaySettled, Platform, Scheduler, Task,
};
use crate::chrome::ButtonLabel;
use crate::config::Config;
use crate::gallery::{LightboxAction, Photo};
use crate::i18n::{BindingTarget, Translations};
use crate::lazy::IntersectionEntry;
use crate::media::{CompactControls, PlaybackStatus};
use crate::page::{PageAssets, PageContext, SiteRuntime};

/// Attribute carrying the runtime key of an adopted element.
const KEY_ATTR: &str = "data-showcase-key";
/// Default-language markup of a translated element.
const ORIGINAL_ATTR: &str = "data-i18n-original";
const API_SCRIPT_ID: &str = "youtube-iframe-api";
const API_SCRIPT_SRC: &str = "https://www.youtube.com/iframe_api";
const API_READY_HOOK: &str = "onYouTubeIframeAPIReady";

fn js_error(err: JsValue) -> PlatformError {
    PlatformError::Rejected(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

fn window() -> Result<Window, PlatformError> {
    web_sys::window().ok_or_else(|| PlatformError::Unavailable("window".into()))
}

fn document() -> Result<Document, PlatformError> {
    window()?
        .document()
        .ok_or_else(|| PlatformError::Unavailable("document".into()))
}

/// Elements matching `selector`, in document order.
fn select_all(root: &Document, selector: &str) -> Vec<Element> {
    let Ok(list) = root.query_selector_all(selector) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

fn set_class(element: &Element, class: &str, on: bool) {
    let _ = element.class_list().toggle_with_force(class, on);
}

fn blur(element: &Element) {
    if let Some(element) = element.dyn_ref::<HtmlElement>() {
        let _ = element.blur();
    }
}

fn focus(element: &Element) {
    if let Some(element) = element.dyn_ref::<HtmlElement>() {
        let _ = element.focus();
    }
}

fn find(root: &Element, selector: &str) -> Option<Element> {
    root.query_selector(selector).ok().flatten()
}

/// Tag `element` with a fresh key, or return `None` if it already has one.
fn tag_element(element: &Element) -> Option<ElementKey> {
    if element.has_attribute(KEY_ATTR) {
        return None;
    }
    let key = ElementKey::fresh();
    let _ = element.set_attribute(KEY_ATTR, &key.0.to_string());
    Some(key)
}

fn key_of(element: &Element) -> Option<ElementKey> {
    element
        .get_attribute(KEY_ATTR)
        .and_then(|raw| raw.parse().ok())
        .map(ElementKey)
}

fn listen(target: &web_sys::EventTarget, event: &str, handler: impl FnMut(Event) + 'static) {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    let _ = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    closure.forget();
}

// ---------------------------------------------------------------------------
// Media and frames
// ---------------------------------------------------------------------------

/// An `<audio>` or `<video>` element.
pub struct WebMedia {
    key: ElementKey,
    element: HtmlMediaElement,
}

impl WebMedia {
    /// Wrap `element` unless it was adopted already.
    pub fn adopt(element: HtmlMediaElement) -> Option<Rc<Self>> {
        let key = tag_element(&element)?;
        Some(Rc::new(Self { key, element }))
    }

    pub fn element(&self) -> &HtmlMediaElement {
        &self.element
    }
}

impl MediaElement for WebMedia {
    fn key(&self) -> ElementKey {
        self.key
    }

    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn is_muted(&self) -> bool {
        self.element.muted()
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        self.element.set_muted(muted);
        Ok(())
    }

    fn pause(&self) -> Result<(), PlatformError> {
        if !self.is_connected() {
            return Err(PlatformError::Detached);
        }
        self.element.pause().map_err(js_error)
    }

    fn set_volume(&self, volume: f64) -> Result<(), PlatformError> {
        self.element.set_volume(volume);
        Ok(())
    }

    fn play(&self, on_settled: PlaySettled) {
        let promise = match self.element.play() {
            Ok(promise) => promise,
            Err(err) => return on_settled(Err(js_error(err))),
        };
        let slot = Rc::new(RefCell::new(Some(on_settled)));
        let resolved = {
            let slot = Rc::clone(&slot);
            Closure::wrap(Box::new(move |_: JsValue| {
                if let Some(settle) = slot.borrow_mut().take() {
                    settle(Ok(()));
                }
            }) as Box<dyn FnMut(JsValue)>)
        };
        let rejected = Closure::wrap(Box::new(move |err: JsValue| {
            if let Some(settle) = slot.borrow_mut().take() {
                settle(Err(js_error(err)));
            }
        }) as Box<dyn FnMut(JsValue)>);
        let _ = promise.then2(&resolved, &rejected);
        resolved.forget();
        rejected.forget();
    }

    fn add_play_listener(&self, listener: PlayListener) -> Result<(), PlatformError> {
        let closure = Closure::wrap(Box::new(move || listener()) as Box<dyn FnMut()>);
        self.element
            .add_event_listener_with_callback("play", closure.as_ref().unchecked_ref())
            .map_err(js_error)?;
        closure.forget();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.element.is_connected()
    }
}

/// An embed `<iframe>`; the lazy source lives in `data-src`.
pub struct WebFrame {
    key: ElementKey,
    element: HtmlIFrameElement,
}

impl WebFrame {
    pub fn adopt(element: HtmlIFrameElement) -> Option<Rc<Self>> {
        let key = tag_element(&element)?;
        Some(Rc::new(Self { key, element }))
    }
}

impl EmbedFrame for WebFrame {
    fn key(&self) -> ElementKey {
        self.key
    }

    fn src(&self) -> Option<String> {
        self.element.get_attribute("src").filter(|s| !s.is_empty())
    }

    fn deferred_src(&self) -> Option<String> {
        self.element.get_attribute("data-src").filter(|s| !s.is_empty())
    }

    fn set_src(&self, src: &str) -> Result<(), PlatformError> {
        self.element.set_src(src);
        Ok(())
    }

    fn clear_deferred_src(&self) {
        let _ = self.element.remove_attribute("data-src");
    }
}

// ---------------------------------------------------------------------------
// Player API
// ---------------------------------------------------------------------------

struct LoaderState {
    ready: Cell<bool>,
    observers: RefCell<Vec<Task>>,
}

impl LoaderState {
    fn fire(&self) {
        self.ready.set(true);
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        tracing::info!("Player API ready ({} observers)", observers.len());
        for observer in observers {
            observer();
        }
    }
}

/// Loads the IFrame player API and fans its global ready hook out to
/// every observer.
pub struct YouTubeLoader {
    state: Rc<LoaderState>,
}

impl YouTubeLoader {
    /// Install the ready hook, chaining whatever handler the page already set.
    pub fn install() -> Result<Rc<Self>, PlatformError> {
        let window = window()?;
        let state = Rc::new(LoaderState {
            ready: Cell::new(player_constructor(&window).is_ok()),
            observers: RefCell::new(Vec::new()),
        });

        if !state.ready.get() {
            let previous = Reflect::get(&window, &JsValue::from_str(API_READY_HOOK))
                .unwrap_or(JsValue::UNDEFINED);
            let hook_state = Rc::clone(&state);
            let hook = Closure::wrap(Box::new(move || {
                if let Some(previous) = previous.dyn_ref::<Function>() {
                    let _ = previous.call0(&JsValue::NULL);
                }
                hook_state.fire();
            }) as Box<dyn FnMut()>);
            Reflect::set(&window, &JsValue::from_str(API_READY_HOOK), hook.as_ref())
                .map_err(js_error)?;
            hook.forget();
        }

        Ok(Rc::new(Self { state }))
    }
}

impl ApiLoader for YouTubeLoader {
    fn is_ready(&self) -> bool {
        self.state.ready.get()
    }

    fn request(&self) {
        if self.is_ready() {
            return;
        }
        let Ok(document) = document() else { return };
        if document.get_element_by_id(API_SCRIPT_ID).is_some() {
            return;
        }
        let Ok(script) = document.create_element("script") else {
            return;
        };
        let _ = script.set_attribute("id", API_SCRIPT_ID);
        let _ = script.set_attribute("src", API_SCRIPT_SRC);
        if let Some(head) = document.head() {
            let _ = head.append_child(&script);
            tracing::debug!("Injected player API script");
        }
    }

    fn on_ready(&self, callback: Task) {
        if self.is_ready() {
            callback();
        } else {
            self.state.observers.borrow_mut().push(callback);
        }
    }
}

fn player_constructor(window: &Window) -> Result<Function, PlatformError> {
    let api = Reflect::get(window, &JsValue::from_str("YT")).map_err(js_error)?;
    if api.is_undefined() {
        return Err(PlatformError::Unavailable("YT".into()));
    }
    Reflect::get(&api, &JsValue::from_str("Player"))
        .map_err(js_error)?
        .dyn_into::<Function>()
        .map_err(|_| PlatformError::Unavailable("YT.Player".into()))
}

/// A `YT.Player` instance.
pub struct YouTubeController {
    player: JsValue,
}

impl YouTubeController {
    fn call(&self, method: &str, args: &Array) -> Result<JsValue, PlatformError> {
        let function = Reflect::get(&self.player, &JsValue::from_str(method))
            .map_err(js_error)?
            .dyn_into::<Function>()
            .map_err(|_| PlatformError::Unavailable(method.to_string()))?;
        function.apply(&self.player, args).map_err(js_error)
    }
}

impl EmbeddedController for YouTubeController {
    fn play(&self) -> Result<(), PlatformError> {
        self.call("playVideo", &Array::new()).map(|_| ())
    }

    fn pause(&self) -> Result<(), PlatformError> {
        self.call("pauseVideo", &Array::new()).map(|_| ())
    }

    fn status(&self) -> PlaybackStatus {
        self.call("getPlayerState", &Array::new())
            .ok()
            .and_then(|code| code.as_f64())
            .map_or(PlaybackStatus::Unstarted, |code| {
                PlaybackStatus::from_code(code as i32)
            })
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        let method = if muted { "mute" } else { "unMute" };
        self.call(method, &Array::new()).map(|_| ())
    }
}

/// Builds `YT.Player` controllers for frames adopted by [`boot`].
#[derive(Default)]
pub struct YouTubeFactory {
    frames: RefCell<HashMap<ElementKey, HtmlIFrameElement>>,
}

impl YouTubeFactory {
    pub fn track(&self, key: ElementKey, element: HtmlIFrameElement) {
        self.frames.borrow_mut().insert(key, element);
    }
}

impl ControllerFactory for YouTubeFactory {
    fn create(
        &self,
        frame: &Rc<dyn EmbedFrame>,
        on_event: ControllerListener,
    ) -> Result<Rc<dyn EmbeddedController>, PlatformError> {
        let element = self
            .frames
            .borrow()
            .get(&frame.key())
            .cloned()
            .ok_or(PlatformError::Detached)?;
        let constructor = player_constructor(&window()?)?;

        let on_event = Rc::new(on_event);
        let ready_listener = Rc::clone(&on_event);
        let on_ready = Closure::wrap(Box::new(move |_: JsValue| {
            ready_listener(ControllerEvent::Ready)
        }) as Box<dyn FnMut(JsValue)>);
        let on_state = Closure::wrap(Box::new(move |event: JsValue| {
            let code = Reflect::get(&event, &JsValue::from_str("data"))
                .ok()
                .and_then(|data| data.as_f64())
                .unwrap_or(-1.0);
            on_event(ControllerEvent::StateChanged(PlaybackStatus::from_code(
                code as i32,
            )))
        }) as Box<dyn FnMut(JsValue)>);

        let events = Object::new();
        Reflect::set(&events, &JsValue::from_str("onReady"), on_ready.as_ref())
            .map_err(js_error)?;
        Reflect::set(&events, &JsValue::from_str("onStateChange"), on_state.as_ref())
            .map_err(js_error)?;
        let options = Object::new();
        Reflect::set(&options, &JsValue::from_str("events"), &events).map_err(js_error)?;

        let player =
            Reflect::construct(&constructor, &Array::of2(&element, &options)).map_err(js_error)?;
        on_ready.forget();
        on_state.forget();
        Ok(Rc::new(YouTubeController { player }))
    }
}

// ---------------------------------------------------------------------------
// Storage, timers, navigation
// ---------------------------------------------------------------------------

/// `window.localStorage`. Reads fail soft when storage is disabled.
pub struct LocalStore;

impl LocalStore {
    fn storage() -> Result<web_sys::Storage, PlatformError> {
        window()?
            .local_storage()
            .map_err(|e| PlatformError::Storage(format!("{:?}", e)))?
            .ok_or_else(|| PlatformError::Storage("localStorage unavailable".into()))
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage().ok()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| PlatformError::Storage(format!("{:?}", e)))
    }
}

/// `setTimeout`.
pub struct TimeoutScheduler;

impl Scheduler for TimeoutScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let Ok(window) = window() else { return };
        let callback = Closure::once_into_js(move || task());
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        if let Err(err) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.unchecked_ref(),
            millis,
        ) {
            tracing::warn!("setTimeout failed: {:?}", err);
        }
    }
}

/// Sections, nav links, tabs and panes addressed by id.
pub struct DomSurface {
    document: Document,
}

impl DomSurface {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl NavSurface for DomSurface {
    fn set_section_active(&self, section: &str, active: bool) {
        if let Some(element) = self.document.get_element_by_id(section) {
            set_class(&element, "active", active);
        }
    }

    fn set_nav_link_active(&self, section: &str, active: bool) {
        for link in select_all(&self.document, &format!("a[href=\"#{}\"]", section)) {
            set_class(&link, "active", active);
        }
    }

    fn set_tab_selected(&self, _group: &str, tab: &str, selected: bool) {
        let Some(element) = self.document.get_element_by_id(tab) else {
            return;
        };
        set_class(&element, "active", selected);
        let _ = element.set_attribute("aria-selected", if selected { "true" } else { "false" });
        let _ = element.set_attribute("tabindex", if selected { "0" } else { "-1" });
    }

    fn set_pane_active(&self, _group: &str, pane: &str, active: bool) {
        if let Some(element) = self.document.get_element_by_id(pane) {
            set_class(&element, "active", active);
        }
    }

    fn push_history(&self, fragment: &str) {
        let pushed = window().and_then(|w| {
            w.history()
                .and_then(|h| h.push_state_with_url(&JsValue::NULL, "", Some(fragment)))
                .map_err(js_error)
        });
        if let Err(err) = pushed {
            tracing::warn!("Could not push {}: {}", fragment, err);
        }
    }
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

fn inline_text(document: &Document, id: &str) -> Option<String> {
    document.get_element_by_id(id)?.text_content()
}

fn page_config(document: &Document) -> Config {
    let Some(raw) = inline_text(document, "showcase-config") else {
        return Config::default();
    };
    match Config::from_toml_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default config: {}", e);
            Config::default()
        }
    }
}

fn page_translations(document: &Document) -> Translations {
    inline_text(document, "translations")
        .and_then(|raw| match Translations::from_json(&raw) {
            Ok(t) => Some(t),
            Err(e) => {
                tracing::warn!("Ignoring translations: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

fn page_photos(document: &Document) -> Vec<Photo> {
    select_all(document, ".gallery img")
        .into_iter()
        .filter_map(|img| {
            Some(Photo {
                src: img.get_attribute("src")?,
                alt: img.get_attribute("alt").unwrap_or_default(),
                caption: img.get_attribute("data-caption").unwrap_or_default(),
            })
        })
        .collect()
}

fn page_context(window: &Window) -> PageContext {
    let location = window.location();
    PageContext {
        fragment: location.hash().unwrap_or_default(),
        protocol: location.protocol().unwrap_or_default(),
        origin: location.origin().unwrap_or_default(),
    }
}

/// Frame elements by key, for unobserving after a load.
type FrameIndex = Rc<RefCell<HashMap<ElementKey, Element>>>;

/// Discover the page, start the runtime and wire every DOM event.
pub fn boot() -> Result<Rc<SiteRuntime>, PlatformError> {
    let window = window()?;
    let document = document()?;
    let config = page_config(&document);

    let factory = Rc::new(YouTubeFactory::default());
    let platform = Platform {
        store: Rc::new(LocalStore),
        loader: YouTubeLoader::install()?,
        factory: Rc::clone(&factory) as Rc<dyn ControllerFactory>,
        scheduler: Rc::new(TimeoutScheduler),
        surface: Rc::new(DomSurface::new(document.clone())),
    };

    let sentinel_id = config.media.sentinel.clone();
    let mut assets = PageAssets {
        translations: page_translations(&document),
        photos: page_photos(&document),
        ..PageAssets::default()
    };
    let mut media_by_element = Vec::new();
    for element in select_all(&document, "audio, video") {
        let is_sentinel = sentinel_id.as_deref() == Some(element.id().as_str());
        let Ok(element) = element.dyn_into::<HtmlMediaElement>() else {
            continue;
        };
        let Some(media) = WebMedia::adopt(element) else {
            continue;
        };
        media_by_element.push(Rc::clone(&media));
        if is_sentinel {
            assets.sentinel = Some(media);
        } else {
            assets.media.push(media);
        }
    }
    let frames: FrameIndex = Rc::default();
    for element in select_all(&document, "iframe") {
        if let Some(frame) = adopt_frame(&factory, &frames, element) {
            assets.frames.push(frame);
        }
    }

    let runtime = SiteRuntime::start(config, platform, assets, page_context(&window));

    let bound = bind_translations(&document, &runtime);
    apply_video_fallback(&document, &runtime);
    let lazy_observer = observe_frames(&runtime, &frames)?;
    observe_sentinel(&document, &runtime)?;
    observe_insertions(&document, &runtime, &factory, &frames, &lazy_observer)?;
    bind_navigation(&window, &document, &runtime);
    bind_labels(&document, &runtime);
    bind_chrome(&window, &document, &runtime, &bound);
    bind_gestures(&document, &runtime);
    bind_gallery(&document, &runtime);
    bind_compact_players(&document, &runtime, &media_by_element);

    Ok(runtime)
}

fn adopt_frame(
    factory: &YouTubeFactory,
    frames: &FrameIndex,
    element: Element,
) -> Option<Rc<dyn EmbedFrame>> {
    let iframe = element.clone().dyn_into::<HtmlIFrameElement>().ok()?;
    let frame = WebFrame::adopt(iframe.clone())?;
    factory.track(frame.key(), iframe);
    frames.borrow_mut().insert(frame.key(), element);
    Some(frame)
}

/// Translated elements by runtime key.
type BoundIndex = Rc<RefCell<HashMap<ElementKey, Element>>>;

fn read_binding(element: &Element, target: &BindingTarget) -> String {
    match target {
        BindingTarget::Content => element.inner_html(),
        BindingTarget::Attribute(attr) => element.get_attribute(attr).unwrap_or_default(),
    }
}

fn write_binding(element: &Element, target: &BindingTarget, text: &str) {
    match target {
        BindingTarget::Content => element.set_inner_html(text),
        BindingTarget::Attribute(attr) => {
            let _ = element.set_attribute(attr, text);
        }
    }
}

/// Bind `element` to `key` and show its text for the current language.
/// `original` defaults to what the element shows now.
fn bind_text(
    runtime: &SiteRuntime,
    bound: &BoundIndex,
    element: &Element,
    key: &str,
    target: BindingTarget,
    original: Option<String>,
) {
    let Some(id) = key_of(element).or_else(|| tag_element(element)) else {
        return;
    };
    let original = original.unwrap_or_else(|| read_binding(element, &target));
    let text = runtime.language().register(id, key, target.clone(), &original);
    write_binding(element, &target, &text);
    bound.borrow_mut().insert(id, element.clone());
}

/// Text of `key` in the default language, or `fallback`.
fn default_text(runtime: &SiteRuntime, key: &str, fallback: &str) -> String {
    let default = runtime.config().site.default_language.as_str();
    let text = runtime.language().t(key, &[], Some(default));
    if text.is_empty() { fallback.to_string() } else { text }
}

fn set_document_language(document: &Document, lang: &str) {
    if let Some(root) = document.document_element() {
        let _ = root.set_attribute("lang", lang);
    }
}

/// Bind every `[data-i18n-key]` element. `data-i18n-attr` names an
/// attribute to translate instead of the inner markup.
fn bind_translations(document: &Document, runtime: &Rc<SiteRuntime>) -> BoundIndex {
    let bound: BoundIndex = Rc::default();
    for element in select_all(document, "[data-i18n-key]") {
        let Some(key) = element.get_attribute("data-i18n-key").filter(|k| !k.is_empty()) else {
            continue;
        };
        let target = BindingTarget::from_attr(element.get_attribute("data-i18n-attr").as_deref());
        let original = match element.get_attribute(ORIGINAL_ATTR) {
            Some(original) => original,
            None => {
                let original = read_binding(&element, &target);
                let _ = element.set_attribute(ORIGINAL_ATTR, &original);
                original
            }
        };
        bind_text(runtime, &bound, &element, &key, target, Some(original));
    }
    set_document_language(document, &runtime.language().language());

    let weak = Rc::downgrade(runtime);
    let index = Rc::clone(&bound);
    let document = document.clone();
    runtime.language().on_change(move |lang| {
        if let Some(runtime) = weak.upgrade() {
            let elements = index.borrow();
            for rendered in runtime.language().rendered() {
                if let Some(element) = elements.get(&rendered.element) {
                    write_binding(element, &rendered.target, &rendered.text);
                }
            }
        }
        set_document_language(&document, lang);
    });
    bound
}

/// Replace the sentinel video with a poster and a link when the browser
/// cannot play MP4.
fn apply_video_fallback(document: &Document, runtime: &SiteRuntime) {
    let Some(element) = runtime
        .config()
        .media
        .sentinel
        .as_deref()
        .and_then(|id| document.get_element_by_id(id))
    else {
        return;
    };
    let Some(video) = element.dyn_ref::<HtmlMediaElement>() else {
        return;
    };
    let source = find(&element, "source").and_then(|s| s.get_attribute("src"));
    let poster = element.get_attribute("data-fallback-poster");
    let can_play = !video.can_play_type("video/mp4").is_empty();
    let Some(fallback) = runtime.video_fallback(can_play, source.as_deref(), poster.as_deref())
    else {
        return;
    };
    let Some(container) = element.parent_element() else {
        return;
    };

    container.set_inner_html("");
    if let Some(poster) = &fallback.poster {
        if let Ok(img) = document.create_element("img") {
            let _ = img.set_attribute("src", poster);
            let _ = img.set_attribute("alt", "Imagen del video");
            let _ = img.set_attribute("class", "video-fallback-poster");
            let _ = container.append_child(&img);
        }
    }
    if let Ok(link) = document.create_element("a") {
        let _ = link.set_attribute("href", &fallback.href);
        let _ = link.set_attribute("class", "video-fallback-link");
        link.set_text_content(Some(&fallback.link_text));
        let _ = container.append_child(&link);
    }
}

fn observe_frames(
    runtime: &Rc<SiteRuntime>,
    frames: &FrameIndex,
) -> Result<Rc<IntersectionObserver>, PlatformError> {
    let handler_runtime = Rc::clone(runtime);
    let handler_frames = Rc::clone(frames);
    let callback = Closure::wrap(Box::new(move |entries: Array, observer: IntersectionObserver| {
        let entries: Vec<IntersectionEntry> = entries
            .iter()
            .filter_map(|entry| entry.dyn_into::<IntersectionObserverEntry>().ok())
            .filter_map(|entry| {
                Some(IntersectionEntry {
                    key: key_of(&entry.target())?,
                    is_intersecting: entry.is_intersecting(),
                })
            })
            .collect();
        for key in handler_runtime.on_intersection(&entries) {
            if let Some(element) = handler_frames.borrow().get(&key) {
                observer.unobserve(element);
            }
        }
    }) as Box<dyn FnMut(Array, IntersectionObserver)>);

    let init = IntersectionObserverInit::new();
    init.set_root_margin(&runtime.lazy().root_margin());
    let observer =
        IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)
            .map_err(js_error)?;
    callback.forget();

    for key in runtime.observed_frames() {
        if let Some(element) = frames.borrow().get(key) {
            observer.observe(element);
        }
    }

    for placeholder in select_all(&document()?, "[data-embed-placeholder]") {
        bind_placeholder(runtime, &placeholder);
    }
    Ok(Rc::new(observer))
}

fn bind_placeholder(runtime: &Rc<SiteRuntime>, placeholder: &Element) {
    let runtime = Rc::clone(runtime);
    let target = placeholder.clone();
    listen(placeholder, "click", move |_| {
        let frame = target.query_selector("iframe").ok().flatten();
        if let Some(key) = frame.as_ref().and_then(key_of) {
            if runtime.lazy().activate_placeholder(key) {
                set_class(&target, "loaded", true);
            }
        }
    });
}

fn observe_sentinel(document: &Document, runtime: &Rc<SiteRuntime>) -> Result<(), PlatformError> {
    let Some(id) = runtime.config().media.sentinel.clone() else {
        return Ok(());
    };
    let Some(element) = document.get_element_by_id(&id) else {
        return Ok(());
    };
    let runtime = Rc::clone(runtime);
    let callback = Closure::wrap(Box::new(move |entries: Array| {
        if let Some(entry) = entries
            .iter()
            .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
            .last()
        {
            runtime.on_sentinel_visibility(entry.is_intersecting());
        }
    }) as Box<dyn FnMut(Array)>);
    let observer =
        IntersectionObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
    callback.forget();
    observer.observe(&element);
    Ok(())
}

fn observe_insertions(
    document: &Document,
    runtime: &Rc<SiteRuntime>,
    factory: &Rc<YouTubeFactory>,
    frames: &FrameIndex,
    lazy_observer: &Rc<IntersectionObserver>,
) -> Result<(), PlatformError> {
    let Some(body) = document.body() else {
        return Ok(());
    };
    let runtime = Rc::clone(runtime);
    let factory = Rc::clone(factory);
    let frames = Rc::clone(frames);
    let lazy_observer = Rc::clone(lazy_observer);

    let callback = Closure::wrap(Box::new(move |records: Array| {
        for record in records.iter().filter_map(|r| r.dyn_into::<MutationRecord>().ok()) {
            let added = record.added_nodes();
            for node in (0..added.length()).filter_map(|i| added.get(i)) {
                let Ok(element) = node.dyn_into::<Element>() else {
                    continue;
                };
                let mut found = vec![element.clone()];
                if let Ok(list) = element.query_selector_all("audio, video, iframe") {
                    found.extend(
                        (0..list.length())
                            .filter_map(|i| list.get(i))
                            .filter_map(|n| n.dyn_into::<Element>().ok()),
                    );
                }
                for candidate in found {
                    match candidate.tag_name().to_ascii_lowercase().as_str() {
                        "audio" | "video" => {
                            let media = candidate
                                .dyn_into::<HtmlMediaElement>()
                                .ok()
                                .and_then(WebMedia::adopt);
                            if let Some(media) = media {
                                runtime.on_media_inserted(media);
                            }
                        }
                        "iframe" => {
                            if let Some(frame) = adopt_frame(&factory, &frames, candidate.clone())
                            {
                                if runtime.on_frame_inserted(frame) {
                                    lazy_observer.observe(&candidate);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }) as Box<dyn FnMut(Array)>);

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(js_error)?;
    callback.forget();
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer.observe_with_options(&body, &init).map_err(js_error)?;
    Ok(())
}

fn bind_navigation(window: &Window, document: &Document, runtime: &Rc<SiteRuntime>) {
    {
        let runtime = Rc::clone(runtime);
        let location = window.location();
        listen(window, "hashchange", move |_| {
            runtime.on_location_change(&location.hash().unwrap_or_default());
        });
    }

    for section in runtime.config().site.sections.clone() {
        for link in select_all(document, &format!("a[href=\"#{}\"]", section)) {
            let runtime = Rc::clone(runtime);
            let fragment = format!("#{}", section);
            listen(&link, "click", move |event| {
                event.prevent_default();
                runtime.navigate_to(&fragment);
            });
        }
    }

    for group in runtime.config().tabs.clone() {
        for tab in &group.tabs {
            let Some(button) = document.get_element_by_id(&tab.id) else {
                continue;
            };
            let runtime = Rc::clone(runtime);
            let group_id = group.id.clone();
            let tab_id = tab.id.clone();
            listen(&button, "click", move |_| {
                runtime.select_tab(&group_id, &tab_id);
            });
        }
    }
}

fn apply_button(button: &Element, label: &ButtonLabel) {
    button.set_text_content(Some(&label.text));
    let _ = button.set_attribute("aria-label", &label.label);
    let _ = button.set_attribute("title", &label.label);
    match label.pressed {
        Some(pressed) => {
            let _ = button.set_attribute("aria-pressed", if pressed { "true" } else { "false" });
            set_class(button, "muted", pressed);
        }
        None => {
            let _ = button.remove_attribute("aria-pressed");
        }
    }
}

/// The visit counter, the global mute buttons and the language toggle.
/// Their texts follow both the language and the mute flag.
fn bind_labels(document: &Document, runtime: &Rc<SiteRuntime>) {
    let counter = document.get_element_by_id("visit-counter");
    let mute_buttons = select_all(document, "#global-mute-btn, [data-action=\"toggle-mute\"]");
    let language_buttons = select_all(document, "[data-action=\"toggle-language\"]");

    let render: Rc<dyn Fn()> = {
        let weak = Rc::downgrade(runtime);
        let mute_buttons = mute_buttons.clone();
        let language_buttons = language_buttons.clone();
        Rc::new(move || {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            let labels = runtime.labels();
            if let Some(counter) = &counter {
                counter.set_text_content(Some(&labels.visit_counter));
            }
            for button in &mute_buttons {
                apply_button(button, &labels.mute_button);
            }
            for button in &language_buttons {
                apply_button(button, &labels.language_toggle);
            }
        })
    };
    render();
    {
        let render = Rc::clone(&render);
        runtime.language().on_change(move |_| render());
    }
    runtime.coordinator().on_muted_change(move |_| render());

    for button in mute_buttons {
        let runtime = Rc::clone(runtime);
        let target = button.clone();
        listen(&button, "click", move |_| {
            runtime.toggle_mute();
            blur(&target);
        });
    }
    for button in language_buttons {
        let runtime = Rc::clone(runtime);
        let target = button.clone();
        listen(&button, "click", move |_| {
            runtime.toggle_language();
            blur(&target);
        });
    }
}

fn create_back_to_top(document: &Document) -> Option<Element> {
    let button = document.create_element("button").ok()?;
    button.set_id("back-to-top");
    let _ = button.set_attribute("type", "button");
    let _ = button.set_attribute("class", "back-to-top");
    button.set_text_content(Some("↑"));
    document.body()?.append_child(&button).ok()?;
    Some(button)
}

fn bind_chrome(
    window: &Window,
    document: &Document,
    runtime: &Rc<SiteRuntime>,
    bound: &BoundIndex,
) {
    let navbar = document.query_selector(".navbar").ok().flatten();
    if let Some(navbar) = &navbar {
        let label = navbar
            .get_attribute("aria-label")
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| default_text(runtime, "nav.main", "Navegación principal"));
        let _ = navbar.set_attribute("aria-label", &label);
        let target = BindingTarget::from_attr(Some("aria-label"));
        bind_text(runtime, bound, navbar, "nav.main", target, Some(label));
    }

    let back_to_top = match document.query_selector("#back-to-top, .back-to-top").ok().flatten() {
        Some(button) => Some(button),
        None => create_back_to_top(document).inspect(|button| {
            let aria = default_text(runtime, "ui.backToTop.aria", "Volver al inicio de la página");
            let title = default_text(runtime, "ui.backToTop.title", "Volver arriba");
            let _ = button.set_attribute("aria-label", &aria);
            let _ = button.set_attribute("title", &title);
            let aria_target = BindingTarget::from_attr(Some("aria-label"));
            bind_text(runtime, bound, button, "ui.backToTop.aria", aria_target, Some(aria));
            let title_target = BindingTarget::from_attr(Some("title"));
            bind_text(runtime, bound, button, "ui.backToTop.title", title_target, Some(title));
        }),
    };
    if let Some(button) = &back_to_top {
        let window = window.clone();
        let target = button.clone();
        listen(button, "click", move |_| {
            let options = ScrollToOptions::new();
            options.set_top(0.0);
            options.set_behavior(ScrollBehavior::Smooth);
            window.scroll_to_with_scroll_to_options(&options);
            blur(&target);
        });
    }

    let progress = document.query_selector(".scroll-progress").ok().flatten();
    let sections: Vec<(String, HtmlElement, Vec<Element>)> = runtime
        .config()
        .site
        .sections
        .iter()
        .filter_map(|id| {
            let section = document.get_element_by_id(id)?.dyn_into::<HtmlElement>().ok()?;
            let links = select_all(document, &format!("a[href=\"#{}\"]", id));
            Some((id.clone(), section, links))
        })
        .collect();
    {
        let runtime = Rc::clone(runtime);
        let target = window.clone();
        let window = window.clone();
        let document = document.clone();
        listen(&target, "scroll", move |_| {
            let scroll_y = window.scroll_y().unwrap_or(0.0);
            let viewport = window
                .inner_height()
                .ok()
                .and_then(|h| h.as_f64())
                .unwrap_or(0.0);
            let height = document
                .document_element()
                .map_or(0.0, |root| f64::from(root.scroll_height()));
            let state = runtime.on_scroll(scroll_y, height - viewport);
            if let Some(navbar) = &navbar {
                set_class(navbar, "scrolled", state.navbar_scrolled);
            }
            if let Some(button) = &back_to_top {
                set_class(button, "visible", state.back_to_top_visible);
            }
            if let Some(bar) = &progress {
                let _ = bar.set_attribute("style", &format!("width: {}%", state.progress_percent));
            }

            let offsets: Vec<(String, f64)> = sections
                .iter()
                .map(|(id, section, _)| (id.clone(), f64::from(section.offset_top())))
                .collect();
            let current = runtime.spy_section(&offsets, scroll_y);
            for (id, _, links) in &sections {
                let active = current.as_deref() == Some(id.as_str());
                for link in links {
                    set_class(link, "active", active);
                }
            }
        });
    }

    let Some(toggle) = document.query_selector(".menu-toggle").ok().flatten() else {
        return;
    };
    let runtime = Rc::clone(runtime);
    let body = document.body();
    let button = toggle.clone();
    listen(&toggle, "click", move |_| {
        let menu = runtime.toggle_menu();
        let _ = button.set_attribute("aria-expanded", menu.aria_expanded());
        if let Some(body) = &body {
            set_class(body, "menu-open", menu.body_locked());
        }
    });
}

fn bind_gestures(document: &Document, runtime: &Rc<SiteRuntime>) {
    let options = AddEventListenerOptions::new();
    options.set_once(true);
    options.set_passive(true);
    for event in ["click", "keydown", "touchstart", "scroll"] {
        let runtime = Rc::clone(runtime);
        let closure = Closure::wrap(Box::new(move |_: Event| {
            runtime.on_user_gesture();
        }) as Box<dyn FnMut(Event)>);
        let _ = document.add_event_listener_with_callback_and_add_event_listener_options(
            event,
            closure.as_ref().unchecked_ref(),
            &options,
        );
        closure.forget();
    }
}

fn bind_gallery(document: &Document, runtime: &Rc<SiteRuntime>) {
    let Some(overlay) = document.query_selector(".lightbox").ok().flatten() else {
        return;
    };
    let image = find(&overlay, "img");
    let caption = find(&overlay, ".lightbox-caption");
    let buttons = [
        (find(&overlay, ".lightbox-close"), LightboxAction::Close),
        (find(&overlay, ".lightbox-prev"), LightboxAction::Previous),
        (find(&overlay, ".lightbox-next"), LightboxAction::Next),
    ];
    let close_button = buttons[0].0.clone();
    let thumbnails = select_all(document, ".gallery img");
    let body = document.body();

    let render = {
        let runtime = Rc::clone(runtime);
        let overlay = overlay.clone();
        let thumbnails = thumbnails.clone();
        Rc::new(move |focus_back: Option<usize>| {
            let open = {
                let lightbox = runtime.lightbox();
                if let Some(photo) = lightbox.current() {
                    if let Some(image) = &image {
                        let _ = image.set_attribute("src", &photo.src);
                        let _ = image.set_attribute("alt", &photo.alt);
                    }
                    if let Some(caption) = &caption {
                        caption.set_text_content(Some(&photo.caption));
                    }
                }
                lightbox.is_open()
            };
            set_class(&overlay, "open", open);
            if let Some(body) = &body {
                set_class(body, "lightbox-open", open);
            }
            if let Some(thumb) = focus_back.and_then(|i| thumbnails.get(i)) {
                focus(thumb);
            }
        })
    };

    let label_gallery: Rc<dyn Fn()> = {
        let weak = Rc::downgrade(runtime);
        let overlay = overlay.clone();
        let buttons = buttons.clone();
        Rc::new(move || {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            let labels = runtime.labels().gallery;
            let _ = overlay.set_attribute("aria-label", &labels.dialog);
            for (button, action) in &buttons {
                let Some(button) = button else {
                    continue;
                };
                let label = match action {
                    LightboxAction::Close => &labels.close,
                    LightboxAction::Previous => &labels.previous,
                    LightboxAction::Next => &labels.next,
                };
                let _ = button.set_attribute("aria-label", label);
            }
        })
    };
    label_gallery();
    runtime.language().on_change(move |_| label_gallery());

    for (index, thumb) in thumbnails.iter().enumerate() {
        let runtime = Rc::clone(runtime);
        let render = Rc::clone(&render);
        let close_button = close_button.clone();
        listen(thumb, "click", move |event| {
            event.prevent_default();
            let opened = runtime.lightbox().open(index);
            if opened {
                render(None);
                if let Some(button) = &close_button {
                    focus(button);
                }
            }
        });
    }

    for (button, action) in buttons {
        let Some(button) = button else {
            continue;
        };
        let runtime = Rc::clone(runtime);
        let render = Rc::clone(&render);
        listen(&button, "click", move |_| {
            let trigger = runtime.lightbox().trigger();
            let applied = runtime.lightbox().apply(action);
            if applied {
                render((action == LightboxAction::Close).then_some(trigger).flatten());
            }
        });
    }

    {
        let runtime = Rc::clone(runtime);
        let render = Rc::clone(&render);
        let backdrop = overlay.clone();
        listen(&overlay, "click", move |event| {
            let on_backdrop = event
                .target()
                .is_some_and(|target| Object::is(target.as_ref(), backdrop.as_ref()));
            let trigger = runtime.lightbox().trigger();
            let closed = runtime.lightbox().on_overlay_click(on_backdrop);
            if closed {
                render(trigger);
            }
        });
    }

    let runtime = Rc::clone(runtime);
    listen(document, "keydown", move |event| {
        let Some(key) = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key) else {
            return;
        };
        let closing = LightboxAction::from_key(&key) == Some(LightboxAction::Close);
        let trigger = runtime.lightbox().trigger();
        let consumed = runtime.lightbox().handle_key(&key);
        if consumed {
            event.prevent_default();
            render(if closing { trigger } else { None });
        }
    });
}

fn bind_compact_players(document: &Document, runtime: &Rc<SiteRuntime>, media: &[Rc<WebMedia>]) {
    for player in select_all(document, ".compact-player") {
        let Some(audio) = player.query_selector("audio").ok().flatten() else {
            continue;
        };
        let Some(element) = key_of(&audio)
            .and_then(|key| media.iter().find(|m| m.key() == key))
            .cloned()
        else {
            continue;
        };
        let button = find(&player, ".compact-toggle, .compact-play");
        let time = find(&player, ".compact-time");
        let bar = find(&player, ".compact-progress");
        let volume = find(&player, ".compact-volume");

        let controls = Rc::new(RefCell::new(CompactControls::new(
            Rc::clone(runtime.coordinator()),
            Rc::clone(&element) as Rc<dyn MediaElement>,
        )));
        let render = {
            let controls = Rc::clone(&controls);
            let bar = bar.clone();
            Rc::new(move || {
                let view = controls.borrow().view();
                if let Some(button) = &button {
                    button.set_text_content(Some(view.glyph));
                }
                if let Some(time) = &time {
                    time.set_text_content(Some(&view.time_label));
                }
                if let Some(bar) = &bar {
                    if view.max > 0.0 {
                        let _ = Reflect::set(bar, &JsValue::from_str("max"), &view.max.into());
                    }
                    let _ = Reflect::set(bar, &JsValue::from_str("value"), &view.progress.into());
                }
            })
        };

        let media_element = element.element().clone();
        for event in ["loadedmetadata", "timeupdate", "play", "pause", "ended"] {
            let controls = Rc::clone(&controls);
            let render = Rc::clone(&render);
            let source = media_element.clone();
            listen(&media_element, event, move |_| {
                {
                    let mut controls = controls.borrow_mut();
                    match event {
                        "loadedmetadata" => controls.on_loaded_metadata(source.duration()),
                        "timeupdate" => controls.on_time_update(source.current_time()),
                        "play" => controls.on_play(),
                        "pause" => controls.on_pause(),
                        _ => controls.on_ended(),
                    }
                }
                render();
            });
        }

        if let Some(toggle) = find(&player, ".compact-toggle, .compact-play") {
            let controls = Rc::clone(&controls);
            listen(&toggle, "click", move |_| controls.borrow_mut().toggle());
        }
        let value_of = |input: &Element| {
            Reflect::get(input, &JsValue::from_str("value"))
                .ok()
                .and_then(|v| v.as_string())
                .and_then(|v| v.parse::<f64>().ok())
        };
        if let Some(volume) = volume {
            controls
                .borrow_mut()
                .set_volume(value_of(&volume).unwrap_or(1.0));
            let controls = Rc::clone(&controls);
            let source = volume.clone();
            listen(&volume, "input", move |_| {
                if let Some(value) = value_of(&source) {
                    controls.borrow_mut().set_volume(value);
                }
            });
        }
        if let Some(bar) = bar {
            {
                let controls = Rc::clone(&controls);
                let render = Rc::clone(&render);
                let source = bar.clone();
                listen(&bar, "input", move |_| {
                    if let Some(value) = value_of(&source) {
                        controls.borrow_mut().drag(value);
                        render();
                    }
                });
            }
            let controls = Rc::clone(&controls);
            let source = bar.clone();
            listen(&bar, "change", move |_| {
                if let Some(value) = value_of(&source) {
                    controls.borrow_mut().drag(value);
                }
                let seek = controls.borrow_mut().release();
                if let Some(position) = seek {
                    media_element.set_current_time(position);
                }
                render();
            });
        }
    }
}
