//! Scroll-driven page chrome, the mobile menu and the labels of the
//! page-wide buttons.
//!
//! Pure state: the host feeds scroll positions and clicks in and applies
//! the resulting flags and texts to the document.

use serde::Serialize;

use crate::config::ChromeConfig;
use crate::i18n::LanguageManager;

pub const MUTED_GLYPH: &str = "🔇";
pub const UNMUTED_GLYPH: &str = "🔈";

/// Flags derived from the scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollState {
    /// The navbar switches to its compact style.
    pub navbar_scrolled: bool,
    pub back_to_top_visible: bool,
    /// Reading progress, 0 to 100.
    pub progress_percent: f64,
}

impl ScrollState {
    /// `scroll_y` is the current offset, `scrollable` the document height
    /// minus the viewport height.
    pub fn compute(config: &ChromeConfig, scroll_y: f64, scrollable: f64) -> Self {
        let scroll_y = if scroll_y.is_finite() { scroll_y.max(0.0) } else { 0.0 };
        let progress_percent = if scrollable > 0.0 && scrollable.is_finite() {
            (scroll_y / scrollable * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            navbar_scrolled: scroll_y > config.navbar_scrolled_px,
            back_to_top_visible: scroll_y > config.back_to_top_px,
            progress_percent,
        }
    }
}

/// The last section whose top, minus the lead, is at or above the scroll
/// position. `sections` holds `(id, offset_top)` in document order.
pub fn scroll_spy<'a>(
    config: &ChromeConfig,
    sections: &'a [(String, f64)],
    scroll_y: f64,
) -> Option<&'a str> {
    sections
        .iter()
        .rev()
        .find(|(_, top)| scroll_y >= top - config.scroll_spy_lead_px)
        .map(|(id, _)| id.as_str())
}

/// The hamburger menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MenuToggle {
    expanded: bool,
}

impl MenuToggle {
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// `aria-expanded` value for the button.
    pub fn aria_expanded(&self) -> &'static str {
        if self.expanded { "true" } else { "false" }
    }

    /// Body scroll is locked while the menu is open.
    pub fn body_locked(&self) -> bool {
        self.expanded
    }

    pub fn toggle(&mut self) -> bool {
        self.expanded = !self.expanded;
        self.expanded
    }

    /// A link inside the menu was followed.
    pub fn on_link_click(&mut self) {
        self.expanded = false;
    }
}

/// Visible text and accessible name of a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonLabel {
    pub text: String,
    /// Used for both `aria-label` and `title`.
    pub label: String,
    /// `aria-pressed`, for toggle buttons.
    pub pressed: Option<bool>,
}

/// Accessible names of the lightbox and its buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryLabels {
    pub dialog: String,
    pub close: String,
    pub previous: String,
    pub next: String,
}

/// Texts of the page-wide controls in the current language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChromeLabels {
    pub visit_counter: String,
    pub mute_button: ButtonLabel,
    pub language_toggle: ButtonLabel,
    pub gallery: GalleryLabels,
}

impl ChromeLabels {
    pub fn compute(language: &LanguageManager, muted: bool, visits: u64) -> Self {
        let count = visits.to_string();
        let visit_counter =
            language.t_or("counter.label", &[("count", count.as_str())], "Visitas: {count}");

        let mute_button = if muted {
            ButtonLabel {
                text: MUTED_GLYPH.to_string(),
                label: language.t_or("globalMute.unmute", &[], "Activar todo el audio"),
                pressed: Some(true),
            }
        } else {
            ButtonLabel {
                text: UNMUTED_GLYPH.to_string(),
                label: language.t_or("globalMute.mute", &[], "Silenciar todo"),
                pressed: Some(false),
            }
        };

        let (key, fallback, text) = if language.next_language() == "en" {
            ("language.toggle.toEnglish", "Cambiar idioma a inglés", "English")
        } else {
            ("language.toggle.toSpanish", "Cambiar idioma a castellano", "Castellano")
        };
        let language_toggle = ButtonLabel {
            text: text.to_string(),
            label: language.t_or(key, &[], fallback),
            pressed: None,
        };

        let gallery = GalleryLabels {
            dialog: language.t_or("gallery.dialogLabel", &[], "Visor de fotografías"),
            close: language.t_or("gallery.close", &[], "Cerrar galería"),
            previous: language.t_or("gallery.prev", &[], "Ver foto anterior"),
            next: language.t_or("gallery.next", &[], "Ver foto siguiente"),
        };

        Self {
            visit_counter,
            mute_button,
            language_toggle,
            gallery,
        }
    }
}
