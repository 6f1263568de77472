//! The per-page runtime context.
//!
//! [`SiteRuntime`] owns one instance of every component and is passed to
//! event handlers explicitly. Start-up runs in a fixed order: the persisted
//! mute flag is in force before any element is registered and before the
//! first navigation, which is the only thing that may start playback.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::chrome::{ChromeLabels, MenuToggle, ScrollState, scroll_spy};
use crate::config::Config;
use crate::gallery::{Lightbox, Photo};
use crate::i18n::{LanguageManager, Translations};
use crate::lazy::{IntersectionEntry, LazyLoader, embed_origin};
use crate::media::{PlaybackCoordinator, PlaybackPolicy, VideoFallback, video_fallback};
use crate::nav::Navigator;
use crate::platform::{ElementKey, EmbedFrame, MediaElement, Platform};
use crate::prefs::Preferences;

/// Elements and content discovered in the document at start-up.
#[derive(Default)]
pub struct PageAssets {
    pub media: Vec<Rc<dyn MediaElement>>,
    pub sentinel: Option<Rc<dyn MediaElement>>,
    pub frames: Vec<Rc<dyn EmbedFrame>>,
    pub translations: Translations,
    pub photos: Vec<Photo>,
}

/// Facts about the page's own location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub fragment: String,
    /// `location.protocol`, including the colon.
    pub protocol: String,
    pub origin: String,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            fragment: String::new(),
            protocol: "https:".to_string(),
            origin: "https://localhost".to_string(),
        }
    }
}

pub struct SiteRuntime {
    config: Config,
    prefs: Preferences,
    coordinator: Rc<PlaybackCoordinator>,
    navigator: Navigator,
    lazy: LazyLoader,
    language: LanguageManager,
    lightbox: RefCell<Lightbox>,
    menu: Cell<MenuToggle>,
    visits: u64,
    /// Frames handed to the intersection observer at start-up.
    observed: Vec<ElementKey>,
}

impl SiteRuntime {
    pub fn start(
        config: Config,
        platform: Platform,
        assets: PageAssets,
        context: PageContext,
    ) -> Rc<Self> {
        let prefs = Preferences::new(Rc::clone(&platform.store), config.storage.clone());

        let coordinator = PlaybackCoordinator::new(
            prefs.clone(),
            Rc::clone(&platform.factory),
            Rc::clone(&platform.loader),
            Rc::clone(&platform.scheduler),
            PlaybackPolicy::from_config(&config),
        );

        for element in assets.media {
            coordinator.register_media(element);
        }
        if let Some(sentinel) = assets.sentinel {
            coordinator.set_sentinel(sentinel);
        }

        let visits = prefs.record_visit();

        let language = LanguageManager::new(assets.translations, &config.site, prefs.clone());
        language.init();

        let navigator = Navigator::new(
            config.site.clone(),
            &config.tabs,
            Rc::clone(&platform.surface),
            Rc::clone(&coordinator),
        );
        navigator.init_all_tabs();
        navigator.init(&context.fragment);

        let lazy = LazyLoader::new(
            config.lazy.clone(),
            embed_origin(&context.protocol, &context.origin),
            Rc::clone(&coordinator),
            Rc::clone(&platform.scheduler),
        );
        let observed = assets
            .frames
            .into_iter()
            .filter_map(|frame| {
                let key = frame.key();
                lazy.observe(frame).then_some(key)
            })
            .collect();

        tracing::info!(
            "Runtime started (visit {}, language {}, section {})",
            visits,
            language.language(),
            navigator.active_section().unwrap_or_default()
        );

        Rc::new(Self {
            lightbox: RefCell::new(Lightbox::new(assets.photos)),
            config,
            prefs,
            coordinator,
            navigator,
            lazy,
            language,
            menu: Cell::new(MenuToggle::default()),
            visits,
            observed,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn coordinator(&self) -> &Rc<PlaybackCoordinator> {
        &self.coordinator
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn lazy(&self) -> &LazyLoader {
        &self.lazy
    }

    pub fn language(&self) -> &LanguageManager {
        &self.language
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Frames the host should hand to its intersection observer.
    pub fn observed_frames(&self) -> &[ElementKey] {
        &self.observed
    }

    /// A media element was inserted into the document after start-up.
    pub fn on_media_inserted(&self, element: Rc<dyn MediaElement>) -> bool {
        self.coordinator.register_media(element)
    }

    /// An embed frame was inserted after start-up. Returns `true` if the
    /// host should observe it.
    pub fn on_frame_inserted(&self, frame: Rc<dyn EmbedFrame>) -> bool {
        self.lazy.observe(frame)
    }

    pub fn on_intersection(&self, entries: &[IntersectionEntry]) -> Vec<ElementKey> {
        self.lazy.on_intersection(entries)
    }

    pub fn on_location_change(&self, fragment: &str) -> bool {
        self.navigator.handle_location_change(fragment)
    }

    /// A navigation link was clicked. Closes the mobile menu.
    pub fn navigate_to(&self, fragment: &str) -> bool {
        let mut menu = self.menu.get();
        menu.on_link_click();
        self.menu.set(menu);
        self.navigator.navigate_to(fragment)
    }

    pub fn select_tab(&self, group: &str, tab: &str) -> bool {
        self.navigator.select_tab(group, tab)
    }

    pub fn on_user_gesture(&self) {
        self.coordinator.notify_user_gesture();
    }

    pub fn on_sentinel_visibility(&self, visible: bool) {
        self.coordinator.notify_sentinel_visibility(visible);
    }

    pub fn toggle_mute(&self) -> bool {
        self.coordinator.toggle_global_mute();
        self.coordinator.is_muted()
    }

    pub fn toggle_language(&self) -> String {
        self.language.toggle_language()
    }

    pub fn on_scroll(&self, scroll_y: f64, scrollable: f64) -> ScrollState {
        ScrollState::compute(&self.config.chrome, scroll_y, scrollable)
    }

    /// The section the nav should highlight while scrolling. `offsets`
    /// holds `(id, offset_top)` for the sections present in the document.
    pub fn spy_section(&self, offsets: &[(String, f64)], scroll_y: f64) -> Option<String> {
        scroll_spy(&self.config.chrome, offsets, scroll_y).map(str::to_string)
    }

    /// Texts of the visit counter and the page-wide buttons.
    pub fn labels(&self) -> ChromeLabels {
        ChromeLabels::compute(&self.language, self.coordinator.is_muted(), self.visits)
    }

    /// What replaces the sentinel video when the browser cannot play it.
    pub fn video_fallback(
        &self,
        can_play_mp4: bool,
        source: Option<&str>,
        poster: Option<&str>,
    ) -> Option<VideoFallback> {
        video_fallback(
            can_play_mp4,
            source,
            poster,
            self.config.media.fallback_href.as_deref(),
            &self.language,
        )
    }

    pub fn toggle_menu(&self) -> MenuToggle {
        let mut menu = self.menu.get();
        menu.toggle();
        self.menu.set(menu);
        menu
    }

    pub fn menu(&self) -> MenuToggle {
        self.menu.get()
    }

    pub fn lightbox(&self) -> std::cell::RefMut<'_, Lightbox> {
        self.lightbox.borrow_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MuteOptions;
    use crate::platform::EmbeddedController;
    use crate::platform::memory::{MemoryFrame, MemoryMedia};
    use crate::test_utils::Harness;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[[tabs]]
id = "videoGroup"
section = "videos"
tabs = [{ id = "tabA", pane = "a" }, { id = "tabX", pane = "x" }]
"#,
        )
        .unwrap()
    }

    fn start(h: &Harness, assets: PageAssets, fragment: &str) -> Rc<SiteRuntime> {
        SiteRuntime::start(
            h.config.clone(),
            h.platform(),
            assets,
            PageContext {
                fragment: fragment.to_string(),
                ..PageContext::default()
            },
        )
    }

    #[test]
    fn section_switch_pauses_media() {
        let h = Harness::with_config(config(), true);
        let audio = MemoryMedia::new("audio");
        let assets = PageAssets {
            media: vec![audio.clone()],
            ..PageAssets::default()
        };
        let rt = start(&h, assets, "#inicio");
        audio.start();

        rt.navigate_to("#bio");
        rt.select_tab("videoGroup", "tabX");
        assert!(audio.is_paused());
    }

    #[test]
    fn concurrent_play_resolves_to_last() {
        let h = Harness::with_config(config(), true);
        let a = MemoryMedia::new("a");
        let frame = MemoryFrame::new("b", "https://www.youtube.com/embed/b");
        let assets = PageAssets {
            media: vec![a.clone()],
            frames: vec![frame.clone()],
            ..PageAssets::default()
        };
        let rt = start(&h, assets, "");
        rt.on_intersection(&[IntersectionEntry {
            key: frame.key(),
            is_intersecting: true,
        }]);

        a.start();
        let b = h.factory.controller(frame.key()).unwrap();
        b.start();
        assert!(a.is_paused());
        assert!(b.is_playing());
    }

    #[test]
    fn persisted_mute_survives_reload() {
        let h = Harness::with_config(config(), true);
        let rt = start(&h, PageAssets::default(), "");
        rt.coordinator().set_global_muted(true, MuteOptions::default());
        drop(rt);

        let next = h.reload();
        let audio = MemoryMedia::new("audio");
        let rt = start(
            &next,
            PageAssets {
                media: vec![audio.clone()],
                ..PageAssets::default()
            },
            "",
        );
        assert!(rt.coordinator().is_muted());
        assert!(audio.is_muted());
    }

    #[test]
    fn start_up_order_and_counters() {
        let h = Harness::with_config(config(), true);
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/c");
        let rt = start(
            &h,
            PageAssets {
                frames: vec![frame.clone()],
                ..PageAssets::default()
            },
            "#videos",
        );
        assert_eq!(rt.visits(), 1);
        assert_eq!(rt.language().language(), "es");
        assert_eq!(rt.navigator().active_section().as_deref(), Some("videos"));
        assert_eq!(h.surface.active_tabs("videoGroup"), vec!["tabA"]);
        assert_eq!(rt.observed_frames(), &[frame.key()]);

        let again = start(&h.reload(), PageAssets::default(), "");
        assert_eq!(again.visits(), 2);
    }

    #[test]
    fn landing_autoplay_starts_muted_when_persisted() {
        let mut cfg = config();
        cfg.media.landing_autoplay = true;
        let h = Harness::with_config(cfg, true);
        h.prefs().set_muted(true);
        let hero = MemoryMedia::new("hero");
        hero.block_unmuted_autoplay(true);

        let _rt = start(
            &h,
            PageAssets {
                sentinel: Some(hero.clone()),
                ..PageAssets::default()
            },
            "",
        );
        assert!(hero.is_muted());
        assert!(!hero.is_paused());
    }

    #[test]
    fn inserted_media_is_muted_immediately() {
        let h = Harness::with_config(config(), true);
        let rt = start(&h, PageAssets::default(), "");
        rt.toggle_mute();
        let late = MemoryMedia::new("late");
        assert!(rt.on_media_inserted(late.clone()));
        assert!(late.is_muted());
    }

    #[test]
    fn file_pages_load_without_origin() {
        let h = Harness::with_config(config(), true);
        let frame = MemoryFrame::new("clip", "https://www.youtube.com/embed/c");
        let rt = SiteRuntime::start(
            h.config.clone(),
            h.platform(),
            PageAssets {
                frames: vec![frame.clone()],
                ..PageAssets::default()
            },
            PageContext {
                fragment: String::new(),
                protocol: "file:".into(),
                origin: "null".into(),
            },
        );
        rt.lazy().activate_placeholder(frame.key());
        let src = frame.src().unwrap();
        assert!(src.contains("enablejsapi=1"));
        assert!(!src.contains("origin="));
    }

    #[test]
    fn labels_track_mute_and_language() {
        let h = Harness::with_config(config(), true);
        let mut translations = Translations::default();
        translations.insert("en", "counter.label", "Visits: {count}");
        translations.insert("en", "globalMute.unmute", "Unmute all audio");
        let rt = start(
            &h,
            PageAssets {
                translations,
                ..PageAssets::default()
            },
            "",
        );

        let labels = rt.labels();
        assert_eq!(labels.visit_counter, "Visitas: 1");
        assert_eq!(labels.mute_button.text, crate::chrome::UNMUTED_GLYPH);
        assert_eq!(labels.language_toggle.text, "English");

        rt.toggle_mute();
        rt.toggle_language();
        let labels = rt.labels();
        assert_eq!(labels.visit_counter, "Visits: 1");
        assert_eq!(labels.mute_button.text, crate::chrome::MUTED_GLYPH);
        assert_eq!(labels.mute_button.label, "Unmute all audio");
        assert_eq!(labels.language_toggle.text, "Castellano");
    }

    #[test]
    fn spy_follows_scroll_position() {
        let h = Harness::with_config(config(), true);
        let rt = start(&h, PageAssets::default(), "");
        let offsets = vec![("inicio".to_string(), 0.0), ("bio".to_string(), 1000.0)];
        assert_eq!(rt.spy_section(&offsets, 650.0).as_deref(), Some("inicio"));
        assert_eq!(rt.spy_section(&offsets, 700.0).as_deref(), Some("bio"));
    }

    #[test]
    fn fallback_uses_configured_link() {
        let mut cfg = config();
        cfg.media.fallback_href = Some("hero.mp4".into());
        let h = Harness::with_config(cfg, true);
        let rt = start(&h, PageAssets::default(), "");
        assert_eq!(rt.video_fallback(true, None, None), None);
        let fallback = rt.video_fallback(false, None, Some("hero.jpg")).unwrap();
        assert_eq!(fallback.href, "hero.mp4");
        assert_eq!(fallback.poster.as_deref(), Some("hero.jpg"));
    }

    #[test]
    fn menu_closes_on_navigation() {
        let h = Harness::with_config(config(), true);
        let rt = start(&h, PageAssets::default(), "");
        assert!(rt.toggle_menu().is_expanded());
        rt.navigate_to("#fotos");
        assert!(!rt.menu().is_expanded());
    }
}
