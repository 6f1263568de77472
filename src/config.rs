//! Site configuration using TOML files.
//!
//! The configuration describes the page the runtime is attached to: which
//! sections exist, which tab groups live in them, which element is the
//! sentinel, how embeds are lazy-loaded, and which storage keys hold the
//! persisted flags. Every table is optional; missing fields take the
//! defaults of the artist site the runtime was written for.
//!
//! ```toml
//! [site]
//! home = "inicio"
//! sections = ["inicio", "videos", "bio"]
//!
//! [[tabs]]
//! id = "videos"
//! section = "videos"
//! tabs = [{ id = "tab-clips", pane = "clips" }, { id = "tab-live", pane = "live" }]
//!
//! [media]
//! landing_autoplay = false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Site configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sections and languages
    pub site: SiteConfig,

    /// Tab groups
    pub tabs: Vec<TabGroupConfig>,

    /// Playback policy
    pub media: MediaConfig,

    /// Lazy-loading of embeds
    pub lazy: LazyConfig,

    /// Storage keys of the persisted flags
    pub storage: StorageConfig,

    /// Scroll and menu thresholds
    pub chrome: ChromeConfig,
}

/// Sections and languages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Section shown when the fragment is empty or unknown
    pub home: String,

    /// Section ids in document order
    pub sections: Vec<String>,

    /// Language of the markup's original text
    pub default_language: String,

    /// Languages in toggle order
    pub languages: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home: "inicio".to_string(),
            sections: ["inicio", "videos", "premios", "bio", "fotos", "contacto"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_language: "es".to_string(),
            languages: vec!["es".to_string(), "en".to_string()],
        }
    }
}

/// One tab group (a tab list plus its panes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabGroupConfig {
    /// Group id
    pub id: String,

    /// Section the group lives in, if any
    pub section: Option<String>,

    /// Tabs in declaration order
    pub tabs: Vec<TabConfig>,
}

/// One tab and the pane it reveals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    /// Tab id
    pub id: String,

    /// Pane id the tab targets; empty means the pane shares the tab's id
    pub pane: String,

    /// Marked active in markup
    pub active: bool,
}

impl TabConfig {
    pub fn pane_id(&self) -> &str {
        if self.pane.is_empty() { &self.id } else { &self.pane }
    }
}

/// Playback policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Element id of the sentinel (landing/hero) media element
    pub sentinel: Option<String>,

    /// Auto-play the sentinel when the landing section becomes active
    pub landing_autoplay: bool,

    /// Landing section (defaults to the home section)
    pub landing_section: Option<String>,

    /// Delays of the follow-up autoplay attempts, in milliseconds
    pub retry_delays_ms: Vec<u64>,

    /// Delay before restoring sound after a muted autoplay start
    pub unmute_delay_ms: u64,

    /// Download link offered when the browser cannot play the sentinel's
    /// MP4 and the element declares no `<source>`
    pub fallback_href: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            sentinel: Some("hero-video".to_string()),
            landing_autoplay: false,
            landing_section: None,
            retry_delays_ms: vec![160, 180, 400, 900],
            unmute_delay_ms: 250,
            fallback_href: None,
        }
    }
}

impl MediaConfig {
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }
}

/// Lazy-loading of embeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyConfig {
    /// How far outside the viewport loading starts, in pixels
    pub root_margin_px: u32,

    /// Delay between assigning a source and registering the player
    pub register_delay_ms: u64,

    /// Only load on explicit click of the placeholder
    pub click_to_load: bool,

    /// URL fragments identifying controllable embeds
    pub embed_hosts: Vec<String>,

    /// Presentation parameters appended to embed URLs
    pub params: BTreeMap<String, String>,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            root_margin_px: 200,
            register_delay_ms: 0,
            click_to_load: false,
            embed_hosts: vec![
                "youtube.com/embed".to_string(),
                "youtube-nocookie.com/embed".to_string(),
            ],
            params: BTreeMap::from([
                ("playsinline".to_string(), "1".to_string()),
                ("rel".to_string(), "0".to_string()),
            ]),
        }
    }
}

impl LazyConfig {
    pub fn register_delay(&self) -> Duration {
        Duration::from_millis(self.register_delay_ms)
    }
}

/// Storage keys of the persisted flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mute_key: String,
    pub visits_key: String,
    pub language_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mute_key: "siteGlobalMuted".to_string(),
            visits_key: "visitCount".to_string(),
            language_key: "siteLanguage".to_string(),
        }
    }
}

/// Scroll and menu thresholds, in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    pub navbar_scrolled_px: f64,
    pub back_to_top_px: f64,
    pub scroll_spy_lead_px: f64,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            navbar_scrolled_px: 36.0,
            back_to_top_px: 420.0,
            scroll_spy_lead_px: 300.0,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The landing section: explicit, or the home section.
    pub fn landing_section(&self) -> &str {
        self.media
            .landing_section
            .as_deref()
            .unwrap_or(&self.site.home)
    }

    pub fn tab_group(&self, id: &str) -> Option<&TabGroupConfig> {
        self.tabs.iter().find(|g| g.id == id)
    }

    /// Check the structural rules the runtime relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.sections.is_empty() {
            return Err(ConfigError::Invalid("no sections declared".into()));
        }
        let sections: HashSet<&str> = self.site.sections.iter().map(String::as_str).collect();
        if sections.len() != self.site.sections.len() {
            return Err(ConfigError::Invalid("duplicate section id".into()));
        }
        if !sections.contains(self.site.home.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "home section {:?} is not declared",
                self.site.home
            )));
        }
        if !sections.contains(self.landing_section()) {
            return Err(ConfigError::Invalid(format!(
                "landing section {:?} is not declared",
                self.landing_section()
            )));
        }
        if !self.site.languages.contains(&self.site.default_language) {
            return Err(ConfigError::Invalid(format!(
                "default language {:?} is not in the language list",
                self.site.default_language
            )));
        }

        let mut groups = HashSet::new();
        for group in &self.tabs {
            if !groups.insert(group.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tab group {:?}", group.id)));
            }
            if group.tabs.is_empty() {
                return Err(ConfigError::Invalid(format!("tab group {:?} has no tabs", group.id)));
            }
            if let Some(section) = &group.section {
                if !sections.contains(section.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "tab group {:?} refers to unknown section {:?}",
                        group.id, section
                    )));
                }
            }
            let mut tabs = HashSet::new();
            for tab in &group.tabs {
                if !tabs.insert(tab.id.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate tab {:?} in group {:?}",
                        tab.id, group.id
                    )));
                }
            }
            if group.tabs.iter().filter(|t| t.active).count() > 1 {
                return Err(ConfigError::Invalid(format!(
                    "tab group {:?} marks more than one tab active",
                    group.id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Read and validate a config file.
pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let config = Config::from_toml_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from disk
///
/// Returns the default config if the file doesn't exist or can't be used.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match from_path(path) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load config file {:?}: {}", path, e);
            tracing::warn!("Using default configuration");
            Config::default()
        }
    }
}

/// Render a config as pretty TOML.
pub fn to_toml(config: &Config) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(ConfigError::Serialize)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn with_groups() -> Config {
        Config::from_toml_str(
            r#"
[[tabs]]
id = "videos"
section = "videos"
tabs = [{ id = "tab-clips", pane = "clips" }, { id = "tab-live", pane = "live" }]

[[tabs]]
id = "bio"
section = "bio"
tabs = [{ id = "tab-short", pane = "short" }, { id = "tab-long", pane = "long", active = true }]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = to_toml(&config).unwrap();
        assert!(toml.contains("[site]"));
        assert!(toml.contains("[media]"));
        assert!(toml.contains("[lazy]"));
        assert!(toml.contains("[storage]"));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = with_groups();
        config.media.landing_autoplay = true;
        config.lazy.params.insert("controls".into(), "1".into());

        let toml = to_toml(&config).unwrap();
        let parsed = Config::from_toml_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
[site]
home = "bio"
sections = ["bio", "fotos"]
"#,
        )
        .unwrap();

        assert_eq!(config.site.home, "bio");
        assert_eq!(config.site.default_language, "es");
        assert_eq!(config.storage.mute_key, "siteGlobalMuted");
        assert_eq!(config.media.retry_delays().len(), 4);
        assert_eq!(config.landing_section(), "bio");
        config.validate().unwrap();
    }

    #[test]
    fn test_tab_groups_parse() {
        let config = with_groups();
        config.validate().unwrap();
        let bio = config.tab_group("bio").unwrap();
        assert!(bio.tabs[1].active);
        assert_eq!(bio.section.as_deref(), Some("bio"));
    }

    #[test]
    fn test_validate_rejects_unknown_home() {
        let mut config = Config::default();
        config.site.home = "nowhere".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_tabs() {
        let mut config = with_groups();
        config.tabs[0].tabs[1].id = "tab-clips".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tab"));
    }

    #[test]
    fn test_validate_rejects_unknown_group_section() {
        let mut config = with_groups();
        config.tabs[0].section = Some("discography".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Config::from_toml_str("[site\nhome=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = load(Path::new("/definitely/not/here/showcase.toml"));
        assert_eq!(config, Config::default());
    }
}
