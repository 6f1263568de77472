//! Page language switching.
//!
//! Translations are a flat `{language: {key: text}}` table. The markup is
//! written in the default language, so that language shows the original
//! markup of each bound element rather than a table lookup. Several elements
//! may share one key; each keeps its own original.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::platform::ElementKey;
use crate::prefs::Preferences;

/// The translation table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Translations(BTreeMap<String, BTreeMap<String, String>>);

impl Translations {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn has_language(&self, lang: &str) -> bool {
        self.0.contains_key(lang)
    }

    pub fn get(&self, lang: &str, key: &str) -> Option<&str> {
        self.0.get(lang).and_then(|t| t.get(key)).map(String::as_str)
    }

    pub fn insert(&mut self, lang: &str, key: &str, text: &str) {
        self.0
            .entry(lang.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
    }
}

/// Replace every `{token}` with its value.
pub fn format_template(template: &str, replacements: &[(&str, &str)]) -> String {
    replacements
        .iter()
        .fold(template.to_string(), |acc, (token, value)| {
            acc.replace(&format!("{{{token}}}"), value)
        })
}

/// Where a bound element shows its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingTarget {
    /// The element's inner markup.
    Content,
    /// A named attribute such as `aria-label` or `title`.
    Attribute(String),
}

impl BindingTarget {
    /// From an optional `data-i18n-attr` value.
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(str::trim).filter(|a| !a.is_empty()) {
            Some(attr) => Self::Attribute(attr.to_string()),
            None => Self::Content,
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    element: ElementKey,
    key: String,
    target: BindingTarget,
    original: String,
}

/// What one bound element should show now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBinding {
    pub element: ElementKey,
    pub key: String,
    pub target: BindingTarget,
    pub text: String,
}

type LanguageSubscriber = Rc<dyn Fn(&str)>;

pub struct LanguageManager {
    translations: Translations,
    default_language: String,
    order: Vec<String>,
    prefs: Preferences,
    current: RefCell<String>,
    bindings: RefCell<Vec<Binding>>,
    subscribers: RefCell<Vec<LanguageSubscriber>>,
}

impl LanguageManager {
    pub fn new(translations: Translations, site: &SiteConfig, prefs: Preferences) -> Self {
        Self {
            translations,
            default_language: site.default_language.clone(),
            order: site.languages.clone(),
            prefs,
            current: RefCell::new(site.default_language.clone()),
            bindings: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn language(&self) -> String {
        self.current.borrow().clone()
    }

    /// Apply the stored preference if it names a known language, otherwise
    /// the default. Nothing is written back.
    pub fn init(&self) -> String {
        let initial = self
            .prefs
            .language()
            .filter(|lang| self.is_known(lang))
            .unwrap_or_else(|| self.default_language.clone());
        self.apply(&initial, false);
        initial
    }

    /// Switch language and remember the choice. Unknown languages fall
    /// back to the default.
    pub fn set_language(&self, lang: &str) -> String {
        let target = if self.is_known(lang) {
            lang.to_string()
        } else {
            self.default_language.clone()
        };
        self.apply(&target, true);
        target
    }

    /// Move to the next language in the configured order.
    pub fn toggle_language(&self) -> String {
        let next = self.next_language();
        self.set_language(&next)
    }

    /// The language a toggle would switch to.
    pub fn next_language(&self) -> String {
        let current = self.current.borrow();
        let index = self.order.iter().position(|l| *l == *current);
        let next = index.map_or(0, |i| (i + 1) % self.order.len().max(1));
        self.order
            .get(next)
            .cloned()
            .unwrap_or_else(|| self.default_language.clone())
    }

    pub fn on_change(&self, callback: impl Fn(&str) + 'static) {
        self.subscribers.borrow_mut().push(Rc::new(callback));
    }

    /// Look up `key` in `lang` (or the current language), falling back to
    /// the default language. Missing keys render as an empty string.
    pub fn t(&self, key: &str, replacements: &[(&str, &str)], lang: Option<&str>) -> String {
        let current = self.language();
        let lang = lang.unwrap_or(current.as_str());
        let template = self.translations.get(lang, key).or_else(|| {
            if lang != self.default_language {
                self.translations.get(&self.default_language, key)
            } else {
                None
            }
        });
        template
            .map(|t| format_template(t, replacements))
            .unwrap_or_default()
    }

    /// Like [`t`](Self::t), with `fallback` for keys missing everywhere.
    pub fn t_or(&self, key: &str, replacements: &[(&str, &str)], fallback: &str) -> String {
        let text = self.t(key, replacements, None);
        if text.is_empty() {
            format_template(fallback, replacements)
        } else {
            text
        }
    }

    /// The text a bound element shows in the current language.
    pub fn text_for(&self, key: &str, original: &str) -> String {
        let lang = self.language();
        if lang == self.default_language {
            return original.to_string();
        }
        self.translations
            .get(&lang, key)
            .map_or_else(|| original.to_string(), str::to_string)
    }

    /// Bind one element's content or attribute to `key` and return what it
    /// should show now. Registering the same element and target again keeps
    /// the first original.
    pub fn register(
        &self,
        element: ElementKey,
        key: &str,
        target: BindingTarget,
        original: &str,
    ) -> String {
        let original = {
            let mut bindings = self.bindings.borrow_mut();
            match bindings
                .iter()
                .find(|b| b.element == element && b.key == key && b.target == target)
            {
                Some(existing) => existing.original.clone(),
                None => {
                    bindings.push(Binding {
                        element,
                        key: key.to_string(),
                        target,
                        original: original.to_string(),
                    });
                    original.to_string()
                }
            }
        };
        self.text_for(key, &original)
    }

    /// Every binding with its current text, in registration order.
    pub fn rendered(&self) -> Vec<RenderedBinding> {
        let bindings = self.bindings.borrow().clone();
        bindings
            .into_iter()
            .map(|b| RenderedBinding {
                text: self.text_for(&b.key, &b.original),
                element: b.element,
                key: b.key,
                target: b.target,
            })
            .collect()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    fn is_known(&self, lang: &str) -> bool {
        lang == self.default_language || self.translations.has_language(lang)
    }

    fn apply(&self, lang: &str, persist: bool) {
        *self.current.borrow_mut() = lang.to_string();
        if persist {
            self.prefs.set_language(lang);
        }
        tracing::debug!("Language set to {}", lang);

        let subscribers: Vec<LanguageSubscriber> = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            subscriber(lang);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::platform::KeyValueStore;
    use crate::platform::memory::MemoryStore;
    use std::cell::RefCell;

    const TABLE: &str = r#"{
        "es": { "ui.greeting": "Hola {name}", "ui.only_es": "solo" },
        "en": { "ui.greeting": "Hello {name}", "nav.bio": "Biography" }
    }"#;

    fn manager(store: Rc<MemoryStore>) -> LanguageManager {
        let prefs = Preferences::new(store, StorageConfig::default());
        LanguageManager::new(
            Translations::from_json(TABLE).unwrap(),
            &SiteConfig::default(),
            prefs,
        )
    }

    #[test]
    fn init_uses_stored_language_without_persisting() {
        let store = MemoryStore::new();
        store.set("siteLanguage", "en").unwrap();
        let lm = manager(store.clone());
        assert_eq!(lm.init(), "en");

        let fresh = MemoryStore::new();
        let lm = manager(fresh.clone());
        assert_eq!(lm.init(), "es");
        assert!(fresh.entries().is_empty());
    }

    #[test]
    fn unknown_stored_language_falls_back() {
        let store = MemoryStore::new();
        store.set("siteLanguage", "fr").unwrap();
        assert_eq!(manager(store).init(), "es");
    }

    #[test]
    fn toggle_cycles_and_persists() {
        let store = MemoryStore::new();
        let lm = manager(store.clone());
        lm.init();
        assert_eq!(lm.toggle_language(), "en");
        assert_eq!(store.get("siteLanguage").as_deref(), Some("en"));
        assert_eq!(lm.toggle_language(), "es");
    }

    #[test]
    fn t_substitutes_and_falls_back() {
        let lm = manager(MemoryStore::new());
        lm.set_language("en");
        assert_eq!(lm.t("ui.greeting", &[("name", "Ana")], None), "Hello Ana");
        assert_eq!(lm.t("ui.greeting", &[("name", "Ana")], Some("es")), "Hola Ana");
        assert_eq!(lm.t("ui.only_es", &[], None), "solo");
        assert_eq!(lm.t("missing", &[], None), "");
    }

    fn texts(lm: &LanguageManager) -> Vec<String> {
        lm.rendered().into_iter().map(|r| r.text).collect()
    }

    #[test]
    fn default_language_shows_original_text() {
        let lm = manager(MemoryStore::new());
        lm.init();
        let heading = ElementKey::fresh();
        assert_eq!(
            lm.register(heading, "nav.bio", BindingTarget::Content, "<b>Biografía</b>"),
            "<b>Biografía</b>"
        );
        lm.set_language("en");
        assert_eq!(texts(&lm), vec!["Biography"]);
        lm.set_language("es");
        assert_eq!(texts(&lm), vec!["<b>Biografía</b>"]);
        assert_eq!(lm.text_for("nav.unknown", "Original"), "Original");
    }

    #[test]
    fn elements_sharing_a_key_keep_their_own_original() {
        let lm = manager(MemoryStore::new());
        lm.init();
        let first = ElementKey::fresh();
        let second = ElementKey::fresh();
        lm.register(first, "gallery.caption", BindingTarget::Content, "Con Juan Quintero");
        lm.register(second, "gallery.caption", BindingTarget::Content, "Con Aca Seca");

        let rendered = lm.rendered();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].element, first);
        assert_eq!(rendered[0].text, "Con Juan Quintero");
        assert_eq!(rendered[1].element, second);
        assert_eq!(rendered[1].text, "Con Aca Seca");

        lm.set_language("en");
        assert_eq!(texts(&lm), vec!["Con Juan Quintero", "Con Aca Seca"]);
    }

    #[test]
    fn attribute_and_content_bindings_are_separate() {
        let lm = manager(MemoryStore::new());
        lm.init();
        let link = ElementKey::fresh();
        let label = BindingTarget::from_attr(Some("aria-label"));
        lm.register(link, "nav.bio", label.clone(), "Ir a biografía");
        lm.register(link, "nav.bio", BindingTarget::Content, "Biografía");
        lm.register(link, "nav.bio", label.clone(), "ignored");
        assert_eq!(lm.binding_count(), 2);

        lm.set_language("en");
        let rendered = lm.rendered();
        assert_eq!(rendered[0].target, BindingTarget::Attribute("aria-label".into()));
        assert_eq!(rendered[0].text, "Biography");
        lm.set_language("es");
        assert_eq!(lm.rendered()[0].text, "Ir a biografía");
        assert_eq!(BindingTarget::from_attr(Some("  ")), BindingTarget::Content);
    }

    #[test]
    fn t_or_uses_fallback_template() {
        let lm = manager(MemoryStore::new());
        lm.init();
        assert_eq!(lm.t_or("counter.label", &[("count", "3")], "Visitas: {count}"), "Visitas: 3");
        assert_eq!(lm.t_or("ui.greeting", &[("name", "Ana")], "x"), "Hola Ana");
        assert_eq!(lm.next_language(), "en");
    }

    #[test]
    fn subscribers_hear_changes() {
        let lm = manager(MemoryStore::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        lm.on_change(move |lang| sink.borrow_mut().push(lang.to_string()));
        lm.set_language("en");
        lm.set_language("xx");
        assert_eq!(*seen.borrow(), vec!["en", "es"]);
    }

    #[test]
    fn format_template_replaces_every_occurrence() {
        assert_eq!(format_template("{a}-{a}-{b}", &[("a", "1"), ("b", "2")]), "1-1-2");
        assert_eq!(format_template("plain", &[]), "plain");
    }
}
