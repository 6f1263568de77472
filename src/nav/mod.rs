//! Section and tab navigation.
//!
//! The location fragment picks one visible section; inside a section, tab
//! groups pick one visible pane. Both are driven by navigation events only.
//! The playback coordinator is told about section changes and is asked to
//! silence everything before a tab switch, but it never drives navigation.

mod tabs;

pub use tabs::TabGroup;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::config::{SiteConfig, TabGroupConfig};
use crate::media::PlaybackCoordinator;
use crate::platform::NavSurface;

#[derive(Default)]
struct NavState {
    active_section: Option<String>,
    groups: BTreeMap<String, TabGroup>,
}

pub struct Navigator {
    site: SiteConfig,
    surface: Rc<dyn NavSurface>,
    coordinator: Rc<PlaybackCoordinator>,
    state: RefCell<NavState>,
}

impl Navigator {
    pub fn new(
        site: SiteConfig,
        groups: &[TabGroupConfig],
        surface: Rc<dyn NavSurface>,
        coordinator: Rc<PlaybackCoordinator>,
    ) -> Self {
        let groups = groups
            .iter()
            .map(|g| (g.id.clone(), TabGroup::new(g.clone())))
            .collect();
        Self {
            site,
            surface,
            coordinator,
            state: RefCell::new(NavState {
                active_section: None,
                groups,
            }),
        }
    }

    /// Map a location fragment (with or without `#`) to a declared section.
    /// Anything unset or unrecognized resolves to the home section.
    pub fn resolve(&self, fragment: &str) -> String {
        let id = fragment.strip_prefix('#').unwrap_or(fragment);
        if self.site.sections.iter().any(|s| s == id) {
            id.to_string()
        } else {
            self.site.home.clone()
        }
    }

    pub fn active_section(&self) -> Option<String> {
        self.state.borrow().active_section.clone()
    }

    pub fn active_tab(&self, group: &str) -> Option<String> {
        self.state
            .borrow()
            .groups
            .get(group)
            .and_then(|g| g.active().map(str::to_string))
    }

    /// Derive the initial state from the page's location fragment.
    pub fn init(&self, fragment: &str) -> String {
        let section = self.resolve(fragment);
        tracing::info!("Initial section: {}", section);
        self.enter(&section);
        section
    }

    /// A navigation link was followed. Returns `false` if the target is
    /// already the active section, in which case nothing happens.
    pub fn navigate_to(&self, fragment: &str) -> bool {
        let section = self.resolve(fragment);
        if self.is_active(&section) {
            return false;
        }
        self.surface.push_history(&format!("#{section}"));
        self.enter(&section);
        true
    }

    /// The browser changed the location by itself (back/forward or a direct
    /// fragment edit). History is already up to date.
    pub fn handle_location_change(&self, fragment: &str) -> bool {
        let section = self.resolve(fragment);
        if self.is_active(&section) {
            return false;
        }
        self.enter(&section);
        true
    }

    /// Apply the default selection to one group. Unknown groups are ignored.
    pub fn init_tabs(&self, group: &str) {
        let mut state = self.state.borrow_mut();
        match state.groups.get_mut(group) {
            Some(g) => g.reset(self.surface.as_ref()),
            None => tracing::debug!("No tab group {} on this page", group),
        }
    }

    pub fn init_all_tabs(&self) {
        let ids: Vec<String> = self.state.borrow().groups.keys().cloned().collect();
        for id in ids {
            self.init_tabs(&id);
        }
    }

    /// A tab was clicked. Everything playing is paused before the switch.
    /// Unknown groups or tabs are ignored and pause nothing.
    pub fn select_tab(&self, group: &str, tab: &str) -> bool {
        let known = self
            .state
            .borrow()
            .groups
            .get(group)
            .is_some_and(|g| g.contains(tab));
        if !known {
            tracing::debug!("Ignoring unknown tab {}/{}", group, tab);
            return false;
        }

        self.coordinator.pause_all_media();

        let mut state = self.state.borrow_mut();
        let selected = state
            .groups
            .get_mut(group)
            .is_some_and(|g| g.select(self.surface.as_ref(), tab));
        selected
    }

    fn is_active(&self, section: &str) -> bool {
        self.state.borrow().active_section.as_deref() == Some(section)
    }

    fn enter(&self, section: &str) {
        for s in &self.site.sections {
            let active = s == section;
            self.surface.set_section_active(s, active);
            self.surface.set_nav_link_active(s, active);
        }

        {
            let mut state = self.state.borrow_mut();
            state.active_section = Some(section.to_string());
            for group in state.groups.values_mut() {
                if group.section() == Some(section) && !group.is_explicit() {
                    group.reset(self.surface.as_ref());
                }
            }
        }

        self.coordinator.notify_section_change(section);
    }
}
