//! Tab groups: one active tab and one active pane per group.

use crate::config::{TabConfig, TabGroupConfig};
use crate::platform::NavSurface;

/// A declared tab group and its current selection.
#[derive(Debug, Clone)]
pub struct TabGroup {
    config: TabGroupConfig,
    active: Option<String>,
    /// Set once the visitor picked a tab; default selection no longer applies.
    explicit: bool,
}

impl TabGroup {
    pub fn new(config: TabGroupConfig) -> Self {
        Self {
            config,
            active: None,
            explicit: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Section the group lives in, if declared.
    pub fn section(&self) -> Option<&str> {
        self.config.section.as_deref()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn contains(&self, tab: &str) -> bool {
        self.find(tab).is_some()
    }

    /// The tab marked active in markup, otherwise the first declared tab.
    pub fn default_tab(&self) -> Option<&TabConfig> {
        self.config
            .tabs
            .iter()
            .find(|t| t.active)
            .or_else(|| self.config.tabs.first())
    }

    /// Activate the default tab. Groups without tabs are left alone.
    pub(super) fn reset(&mut self, surface: &dyn NavSurface) {
        let Some(tab) = self.default_tab().map(|t| t.id.clone()) else {
            tracing::debug!("Tab group {} has no tabs", self.config.id);
            return;
        };
        self.apply(surface, &tab);
        self.explicit = false;
    }

    /// Activate `tab` as a visitor choice. Returns `false` for unknown tabs.
    pub(super) fn select(&mut self, surface: &dyn NavSurface, tab: &str) -> bool {
        if !self.contains(tab) {
            return false;
        }
        self.apply(surface, tab);
        self.explicit = true;
        true
    }

    fn find(&self, tab: &str) -> Option<&TabConfig> {
        self.config.tabs.iter().find(|t| t.id == tab)
    }

    /// Deactivate every tab and pane, then activate exactly `tab` and its
    /// pane.
    fn apply(&mut self, surface: &dyn NavSurface, tab: &str) {
        let Some(pane) = self.find(tab).map(|t| t.pane_id().to_string()) else {
            return;
        };
        let group = self.config.id.as_str();
        for t in &self.config.tabs {
            surface.set_tab_selected(group, &t.id, t.id == tab);
            surface.set_pane_active(group, t.pane_id(), t.pane_id() == pane);
        }
        self.active = Some(tab.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemorySurface;

    fn group(marked: Option<&str>) -> TabGroup {
        let tabs = ["clips", "live", "interviews"]
            .into_iter()
            .map(|id| TabConfig {
                id: id.to_string(),
                pane: format!("{id}-pane"),
                active: Some(id) == marked,
            })
            .collect();
        TabGroup::new(TabGroupConfig {
            id: "videoGroup".into(),
            section: Some("videos".into()),
            tabs,
        })
    }

    #[test]
    fn reset_picks_first_tab_when_none_marked() {
        let surface = MemorySurface::new();
        let mut g = group(None);
        g.reset(surface.as_ref());

        assert_eq!(surface.active_tabs("videoGroup"), vec!["clips"]);
        assert_eq!(surface.active_panes("videoGroup"), vec!["clips-pane"]);
        assert_eq!(surface.focusable_tabs("videoGroup"), vec!["clips"]);
        assert!(!g.is_explicit());
    }

    #[test]
    fn reset_honors_marked_tab() {
        let surface = MemorySurface::new();
        let mut g = group(Some("live"));
        g.reset(surface.as_ref());
        assert_eq!(g.active(), Some("live"));
        assert_eq!(surface.active_panes("videoGroup"), vec!["live-pane"]);
    }

    #[test]
    fn select_keeps_aria_in_step() {
        let surface = MemorySurface::new();
        let mut g = group(None);
        g.reset(surface.as_ref());
        assert!(g.select(surface.as_ref(), "interviews"));

        let attrs = surface.tab("videoGroup", "interviews").unwrap();
        assert!(attrs.active && attrs.aria_selected);
        assert_eq!(attrs.tabindex, 0);
        let old = surface.tab("videoGroup", "clips").unwrap();
        assert!(!old.aria_selected);
        assert_eq!(old.tabindex, -1);
        assert_eq!(surface.focusable_tabs("videoGroup"), vec!["interviews"]);
        assert!(g.is_explicit());
    }

    #[test]
    fn unknown_tab_changes_nothing() {
        let surface = MemorySurface::new();
        let mut g = group(None);
        g.reset(surface.as_ref());
        assert!(!g.select(surface.as_ref(), "nope"));
        assert_eq!(g.active(), Some("clips"));
    }

    #[test]
    fn empty_group_is_a_no_op() {
        let surface = MemorySurface::new();
        let mut g = TabGroup::new(TabGroupConfig {
            id: "empty".into(),
            section: None,
            tabs: Vec::new(),
        });
        g.reset(surface.as_ref());
        assert_eq!(g.active(), None);
        assert!(surface.active_tabs("empty").is_empty());
    }
}
