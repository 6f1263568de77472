//! Per-browser persisted scalars.
//!
//! Three values live in storage: the global mute flag (a JSON boolean), a
//! visit counter and the language preference. None of them carry a schema
//! version; malformed values read as their defaults.

use std::rc::Rc;

use crate::config::StorageConfig;
use crate::platform::KeyValueStore;

/// Typed access to the persisted flags.
#[derive(Clone)]
pub struct Preferences {
    store: Rc<dyn KeyValueStore>,
    keys: StorageConfig,
}

impl Preferences {
    pub fn new(store: Rc<dyn KeyValueStore>, keys: StorageConfig) -> Self {
        Self { store, keys }
    }

    /// The persisted global mute flag. Missing or malformed reads as `false`.
    pub fn muted(&self) -> bool {
        let Some(raw) = self.store.get(&self.keys.mute_key) else {
            return false;
        };
        match serde_json::from_str::<bool>(&raw) {
            Ok(muted) => muted,
            Err(e) => {
                tracing::warn!("Ignoring malformed mute flag {:?}: {}", raw, e);
                false
            }
        }
    }

    pub fn set_muted(&self, muted: bool) {
        // serde_json renders a bool as `true`/`false`, which is what the
        // page's other scripts expect to parse back.
        match serde_json::to_string(&muted) {
            Ok(raw) => self.write(&self.keys.mute_key, &raw),
            Err(e) => tracing::warn!("Could not encode mute flag: {}", e),
        }
    }

    /// The number of recorded page loads in this browser.
    pub fn visit_count(&self) -> u64 {
        self.store
            .get(&self.keys.visits_key)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Record one more page load and return the new count.
    pub fn record_visit(&self) -> u64 {
        let count = self.visit_count().saturating_add(1);
        self.write(&self.keys.visits_key, &count.to_string());
        count
    }

    pub fn language(&self) -> Option<String> {
        self.store
            .get(&self.keys.language_key)
            .filter(|s| !s.is_empty())
    }

    pub fn set_language(&self, language: &str) {
        self.write(&self.keys.language_key, language);
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!("Could not persist {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryStore;

    fn prefs() -> (Rc<MemoryStore>, Preferences) {
        let store = MemoryStore::new();
        let prefs = Preferences::new(store.clone(), StorageConfig::default());
        (store, prefs)
    }

    #[test]
    fn mute_flag_is_json_encoded() {
        let (store, prefs) = prefs();
        assert!(!prefs.muted());
        prefs.set_muted(true);
        assert_eq!(store.get("siteGlobalMuted").as_deref(), Some("true"));
        assert!(prefs.muted());
    }

    #[test]
    fn malformed_mute_flag_reads_false() {
        let (store, prefs) = prefs();
        store.set("siteGlobalMuted", "yes please").unwrap();
        assert!(!prefs.muted());
    }

    #[test]
    fn visits_increment() {
        let (store, prefs) = prefs();
        assert_eq!(prefs.record_visit(), 1);
        assert_eq!(prefs.record_visit(), 2);
        assert_eq!(store.get("visitCount").as_deref(), Some("2"));

        store.set("visitCount", "garbage").unwrap();
        assert_eq!(prefs.record_visit(), 1);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let (store, prefs) = prefs();
        store.set_read_only(true);
        prefs.set_muted(true);
        prefs.set_language("en");
        assert!(!prefs.muted());
        assert_eq!(prefs.language(), None);
    }
}
